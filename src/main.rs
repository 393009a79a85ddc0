use burn::tensor::Tensor;
use burn::config::Config;
use occlusion_gan::{
    build_model,
    utils::{image_to_tensor, load_image, save_image},
    ModelConfig,
};
use std::{error::Error, path::Path};
use tracing_subscriber::EnvFilter;

#[cfg(not(feature = "wgpu"))]
type MyBackend = burn::backend::NdArray<f32>;
#[cfg(feature = "wgpu")]
type MyBackend = burn::backend::Wgpu<f32>;

fn load<B: burn::prelude::Backend>(
    path: &str,
    size: usize,
    device: &B::Device,
) -> Result<Tensor<B, 4>, Box<dyn Error>> {
    let image = load_image(path, size as u32)?;
    Ok(image_to_tensor::<B>(&image, device).unsqueeze())
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!(
            "Usage: {} <source> <target> <style> [config.json] [outdir]",
            args[0]
        );
        std::process::exit(1);
    }

    let config = match args.get(4) {
        Some(path) => ModelConfig::load_file(path)?,
        None => ModelConfig::new(),
    };
    let outdir = args.get(5).map(String::as_str).unwrap_or("/tmp/occlusion-gan");
    std::fs::create_dir_all(outdir)?;

    let device = Default::default();
    let (nets, nets_ema) = build_model::<MyBackend>(&config, &device)?;

    let x = load::<MyBackend>(&args[1], config.img_size, &device)?;
    let t = load::<MyBackend>(&args[2], config.img_size, &device)?;
    let s = load::<MyBackend>(&args[3], config.img_size, &device)?;

    let fake = nets_ema.generator.forward(x.clone(), t.clone(), s, None);
    let transformed = nets.transformer.forward(x.clone(), t);
    let logits = nets.discriminator.forward(fake.clone());
    tracing::info!(logits = ?logits.into_data().to_vec::<f32>(), "discriminator scores");

    // source | generated | transformer
    let grid = Tensor::cat(vec![x, fake.clamp(-1.0, 1.0), transformed.clamp(-1.0, 1.0)], 0);
    let path = Path::new(outdir).join("stylized.png");
    save_image(grid, 3, &path)?;
    tracing::info!(path = %path.display(), "saved");

    config.save(Path::new(outdir).join("config.json"))?;

    Ok(())
}
