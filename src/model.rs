pub mod attention;
pub mod discriminator;
pub mod generator;
pub mod layers;
pub mod transformer;

use burn::{module::Module, prelude::*};

use crate::{
    error::{self, ModelError},
    model::{
        discriminator::{Discriminator, DiscriminatorConfig},
        generator::{Generator, GeneratorConfig},
        transformer::{Transformer, TransformerConfig},
    },
};

/// Smallest image the discriminator can reduce to a single 4x4 map.
pub const MIN_IMG_SIZE: usize = 32;

/// Trainable networks.
#[derive(Module, Debug)]
pub struct Nets<B: Backend> {
    pub generator: Generator<B>,
    pub discriminator: Discriminator<B>,
    pub transformer: Transformer<B>,
}

/// Shadow networks tracked by an exponential moving average outside this crate.
#[derive(Module, Debug)]
pub struct NetsEma<B: Backend> {
    pub generator: Generator<B>,
}

#[derive(Config, Debug)]
pub struct ModelConfig {
    #[config(default = 256)]
    pub img_size: usize,
    #[config(default = 512)]
    pub max_conv_dim: usize,
    #[config(default = 1)]
    pub num_class: usize,
    #[config(default = 8)]
    pub n_heads: usize,
    #[config(default = 64)]
    pub d_k: usize,
    #[config(default = 64)]
    pub d_v: usize,
    #[config(default = 512)]
    pub dim: usize,
    #[config(default = 2048)]
    pub d_ff: usize,
    #[config(default = 6)]
    pub n_layers: usize,
    #[config(default = 3)]
    pub input_dim: usize,
    #[config(default = 128)]
    pub hidden_size: usize,
}
impl ModelConfig {
    pub fn validate(&self) -> error::Result<()> {
        if !self.img_size.is_power_of_two() {
            return Err(ModelError::ImageSizeNotPowerOfTwo(self.img_size));
        }
        if self.img_size < MIN_IMG_SIZE {
            return Err(ModelError::ImageSizeTooSmall {
                actual: self.img_size,
                min: MIN_IMG_SIZE,
            });
        }

        let dims = [
            ("max_conv_dim", self.max_conv_dim),
            ("num_class", self.num_class),
            ("n_heads", self.n_heads),
            ("d_k", self.d_k),
            ("d_v", self.d_v),
            ("dim", self.dim),
            ("d_ff", self.d_ff),
            ("n_layers", self.n_layers),
            ("input_dim", self.input_dim),
        ];
        if let Some((name, _)) = dims.iter().find(|(_, value)| *value == 0) {
            return Err(ModelError::ZeroDimension(*name));
        }

        if self.hidden_size != self.img_size / 2 {
            return Err(ModelError::HiddenSizeMismatch {
                expected: self.img_size / 2,
                actual: self.hidden_size,
            });
        }

        Ok(())
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig::new()
            .with_img_size(self.img_size)
            .with_max_conv_dim(self.max_conv_dim)
    }

    /// The discriminator always caps at 512 channels, independent of `max_conv_dim`.
    pub fn discriminator_config(&self) -> DiscriminatorConfig {
        DiscriminatorConfig::new()
            .with_img_size(self.img_size)
            .with_num_class(self.num_class)
    }

    pub fn transformer_config(&self) -> TransformerConfig {
        TransformerConfig::new()
            .with_n_heads(self.n_heads)
            .with_d_k(self.d_k)
            .with_d_v(self.d_v)
            .with_dim(self.dim)
            .with_d_ff(self.d_ff)
            .with_n_layers(self.n_layers)
            .with_input_dim(self.input_dim)
            .with_hidden_size(self.hidden_size)
    }

    pub fn load_file(path: &str) -> error::Result<Self> {
        Self::load(path).map_err(|e| ModelError::Config(format!("{e:?}")))
    }
}

/// Builds the trainable networks and an independent copy of the generator for EMA.
pub fn build_model<B: Backend>(
    config: &ModelConfig,
    device: &B::Device,
) -> error::Result<(Nets<B>, NetsEma<B>)> {
    config.validate()?;

    let transformer = config.transformer_config().init(device);
    let generator = config.generator_config().init(device);
    let discriminator = config.discriminator_config().init(device);

    // burn tensors are immutable, a module clone is a value copy
    let generator_ema = generator.clone();

    tracing::info!(
        img_size = config.img_size,
        max_conv_dim = config.max_conv_dim,
        generator_params = generator.num_params(),
        discriminator_params = discriminator.num_params(),
        transformer_params = transformer.num_params(),
        "built model"
    );

    let nets = Nets {
        generator,
        discriminator,
        transformer,
    };
    let nets_ema = NetsEma {
        generator: generator_ema,
    };

    Ok((nets, nets_ema))
}
