use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        InstanceNorm, InstanceNormConfig, LeakyRelu, LeakyReluConfig, PaddingConfig2d,
    },
    prelude::*,
};

use crate::model::layers::{AdainResBlk, ResBlk};

/// Base channel width shared by the generator and discriminator stems.
pub fn base_dim(img_size: usize) -> usize {
    (1 << 14) / img_size
}

/// Encoder/decoder style-transfer network.
///
/// `x` and `t` share `from_rgb` and the encoder; only `x` is decoded, with every
/// decoder block conditioned on the style image `s`.
#[derive(Module, Debug)]
pub struct Generator<B: Backend> {
    from_rgb: Conv2d<B>,
    encode: Vec<ResBlk<B>>,
    decode: Vec<AdainResBlk<B>>,
    to_rgb_norm: InstanceNorm<B>,
    to_rgb_conv: Conv2d<B>,
    lrelu: LeakyRelu,
}
impl<B: Backend> Generator<B> {
    /// Runs both images through the shared stem and encoder.
    pub fn encode(&self, x: Tensor<B, 4>, t: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let mut x = self.from_rgb.forward(x);
        let mut t = self.from_rgb.forward(t);
        for block in &self.encode {
            x = block.forward(x);
            t = block.forward(t);
        }
        (x, t)
    }

    pub fn decode(&self, x: Tensor<B, 4>, s: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = x;
        for block in &self.decode {
            x = block.forward(x, s.clone());
        }

        let x = self.to_rgb_norm.forward(x);
        let x = self.lrelu.forward(x);
        self.to_rgb_conv.forward(x)
    }

    /// `mask` is accepted for interface parity and ignored.
    pub fn forward(
        &self,
        x: Tensor<B, 4>,
        t: Tensor<B, 4>,
        s: Tensor<B, 4>,
        _mask: Option<Tensor<B, 4>>,
    ) -> Tensor<B, 4> {
        // t's encoding never reaches the decoder
        let (x, _t) = self.encode(x, t);
        self.decode(x, s)
    }
}

#[derive(Config, Debug)]
pub struct GeneratorConfig {
    #[config(default = 256)]
    pub img_size: usize,
    #[config(default = 512)]
    pub max_conv_dim: usize,
}
impl GeneratorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Generator<B> {
        let mut dim_in = base_dim(self.img_size);
        let from_rgb = Conv2dConfig::new([3, dim_in], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let to_rgb_norm = InstanceNormConfig::new(dim_in).init(device);
        let to_rgb_conv = Conv2dConfig::new([dim_in, 3], [1, 1]).init(device);

        let mut encode = Vec::new();
        let mut decode = Vec::new();

        // down/up-sampling stages, decoder mirrors the encoder
        let repeat_num = (self.img_size.ilog2() as usize).saturating_sub(4);
        let mut dim_out = dim_in;
        for _ in 0..repeat_num {
            dim_out = (dim_in * 2).min(self.max_conv_dim);
            encode.push(ResBlk::new([dim_in, dim_out], true, true, device));
            decode.insert(
                0,
                AdainResBlk::new([dim_out, dim_in], self.img_size, true, device),
            );
            tracing::debug!(dim_in, dim_out, "generator sampling stage");
            dim_in = dim_out;
        }

        // bottleneck
        for _ in 0..2 {
            encode.push(ResBlk::new([dim_out, dim_out], true, false, device));
            decode.insert(
                0,
                AdainResBlk::new([dim_out, dim_out], self.img_size, false, device),
            );
        }

        Generator {
            from_rgb,
            encode,
            decode,
            to_rgb_norm,
            to_rgb_conv,
            lrelu: LeakyReluConfig::new().with_negative_slope(0.2).init(),
        }
    }
}
