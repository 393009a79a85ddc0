use burn::{
    backend::NdArray,
    module::Module,
    tensor::{Distribution, Tensor},
};
use occlusion_gan::{build_model, ModelConfig, ModelError};

type TestBackend = NdArray<f32>;

fn small_config() -> ModelConfig {
    ModelConfig::new()
        .with_img_size(32)
        .with_max_conv_dim(512)
        .with_num_class(2)
        .with_n_heads(2)
        .with_d_k(8)
        .with_d_v(8)
        .with_dim(32)
        .with_d_ff(64)
        .with_n_layers(2)
        .with_hidden_size(16)
}

#[test]
fn build_model_shapes() {
    let device = Default::default();
    let (nets, nets_ema) = build_model::<TestBackend>(&small_config(), &device).unwrap();

    let x = Tensor::<TestBackend, 4>::random([2, 3, 32, 32], Distribution::Default, &device);
    let t = Tensor::<TestBackend, 4>::random([2, 3, 32, 32], Distribution::Default, &device);
    let s = Tensor::<TestBackend, 4>::random([2, 3, 32, 32], Distribution::Default, &device);

    let fake = nets.generator.forward(x.clone(), t.clone(), s.clone(), None);
    assert_eq!(fake.dims(), [2, 3, 32, 32]);

    let fake_ema = nets_ema.generator.forward(x.clone(), t.clone(), s, None);
    assert_eq!(
        fake.clone().into_data().to_vec::<f32>().unwrap(),
        fake_ema.into_data().to_vec::<f32>().unwrap()
    );

    assert_eq!(nets.discriminator.forward(fake).dims(), [2, 2]);
    assert_eq!(nets.transformer.forward(x, t).dims(), [2, 3, 32, 32]);
}

#[test]
fn ema_generator_is_an_independent_copy() {
    let device = Default::default();
    let config = small_config();
    let (nets, nets_ema) = build_model::<TestBackend>(&config, &device).unwrap();

    let x = Tensor::<TestBackend, 4>::random([1, 3, 32, 32], Distribution::Default, &device);
    let s = Tensor::<TestBackend, 4>::random([1, 3, 32, 32], Distribution::Default, &device);
    let forward = |generator: &occlusion_gan::model::generator::Generator<TestBackend>| {
        generator
            .forward(x.clone(), x.clone(), s.clone(), None)
            .into_data()
            .to_vec::<f32>()
            .unwrap()
    };
    let before = forward(&nets_ema.generator);

    // stand-in for an optimizer step on the trainable generator
    let fresh = config.generator_config().init::<TestBackend>(&device);
    let generator = nets.generator.load_record(fresh.into_record());

    assert_ne!(forward(&generator), before);
    assert_eq!(forward(&nets_ema.generator), before);
}

#[test]
fn build_model_rejects_invalid_config() {
    let device = Default::default();
    let config = small_config().with_img_size(48).with_hidden_size(24);

    let result = build_model::<TestBackend>(&config, &device);
    assert!(matches!(result, Err(ModelError::ImageSizeNotPowerOfTwo(48))));
}

#[test]
fn generator_full_resolution() {
    let device = Default::default();
    let config = ModelConfig::new().with_img_size(256).with_max_conv_dim(512);
    let generator = config.generator_config().init::<TestBackend>(&device);

    let x = Tensor::<TestBackend, 4>::random([2, 3, 256, 256], Distribution::Default, &device);
    let t = Tensor::<TestBackend, 4>::random([2, 3, 256, 256], Distribution::Default, &device);
    let s = Tensor::<TestBackend, 4>::random([2, 3, 256, 256], Distribution::Default, &device);

    assert_eq!(generator.forward(x, t, s, None).dims(), [2, 3, 256, 256]);
}
