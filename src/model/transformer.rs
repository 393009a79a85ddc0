use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Linear, LinearConfig, PaddingConfig2d,
    },
    prelude::*,
};

use crate::model::{
    attention::{Decoder, Encoder},
    layers::upsample2x,
};

/// Image-to-image path through an encoder/decoder attention stack.
///
/// Each image is reduced by a strided 7x7 stem to one channel; the rows of that
/// map form the sequence and its width is `hidden_size`.
#[derive(Module, Debug)]
pub struct Transformer<B: Backend> {
    encoder: Encoder<B>,
    decoder: Decoder<B>,
    stem: Conv2d<B>,
    projection: Linear<B>,
    reprojection: Linear<B>,
    final_conv: Conv2d<B>,
}

/// Output image plus every attention map of the stack.
#[derive(Debug, Clone)]
pub struct TransformerOutput<B: Backend> {
    pub image: Tensor<B, 4>,
    pub enc_self_attns: Vec<Tensor<B, 4>>,
    pub dec_self_attns: Vec<Tensor<B, 4>>,
    pub dec_enc_attns: Vec<Tensor<B, 4>>,
}

impl<B: Backend> Transformer<B> {
    /// `[B, C, H, W]` -> `[B, H/2, hidden]` -> `[B, H/2, dim]`
    fn embed(&self, image: Tensor<B, 4>) -> Tensor<B, 3> {
        let stem: Tensor<B, 3> = self.stem.forward(image).squeeze(1);
        self.projection.forward(stem)
    }

    pub fn forward_with_attention(
        &self,
        enc_inputs: Tensor<B, 4>,
        dec_inputs: Tensor<B, 4>,
    ) -> TransformerOutput<B> {
        let enc_inputs = self.embed(enc_inputs);
        let dec_inputs = self.embed(dec_inputs);

        let (enc_outputs, enc_self_attns) = self.encoder.forward(enc_inputs);
        let decoded = self.decoder.forward(dec_inputs, enc_outputs);

        let output = self.reprojection.forward(decoded.output);
        let output = self.final_conv.forward(output.unsqueeze_dim(1));
        let image = upsample2x(output);

        TransformerOutput {
            image,
            enc_self_attns,
            dec_self_attns: decoded.self_attns,
            dec_enc_attns: decoded.enc_attns,
        }
    }

    pub fn forward(&self, enc_inputs: Tensor<B, 4>, dec_inputs: Tensor<B, 4>) -> Tensor<B, 4> {
        self.forward_with_attention(enc_inputs, dec_inputs).image
    }
}

#[derive(Config, Debug)]
pub struct TransformerConfig {
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
impl TransformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Transformer<B> {
        let stem = Conv2dConfig::new([self.input_dim, 1], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .init(device);
        let projection = LinearConfig::new(self.hidden_size, self.dim)
            .with_bias(false)
            .init(device);
        let reprojection = LinearConfig::new(self.dim, self.hidden_size)
            .with_bias(false)
            .init(device);
        let final_conv = Conv2dConfig::new([1, self.input_dim], [7, 7])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .init(device);

        Transformer {
            encoder: Encoder::new(self, device),
            decoder: Decoder::new(self, device),
            stem,
            projection,
            reprojection,
            final_conv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MyBackend;
    use burn::tensor::Distribution;

    fn config() -> TransformerConfig {
        TransformerConfig::new()
            .with_n_heads(2)
            .with_d_k(8)
            .with_d_v(8)
            .with_dim(32)
            .with_d_ff(64)
            .with_n_layers(2)
            .with_hidden_size(16)
    }

    #[test]
    fn test_forward_preserves_image_shape() {
        let device = Default::default();
        let transformer = config().init::<MyBackend>(&device);

        let enc = Tensor::<MyBackend, 4>::random([2, 3, 32, 32], Distribution::Default, &device);
        let dec = Tensor::<MyBackend, 4>::random([2, 3, 32, 32], Distribution::Default, &device);
        assert_eq!(transformer.forward(enc, dec).dims(), [2, 3, 32, 32]);
    }

    #[test]
    fn test_attention_maps_are_collected() {
        let device = Default::default();
        let transformer = config().init::<MyBackend>(&device);

        let enc = Tensor::<MyBackend, 4>::random([1, 3, 32, 32], Distribution::Default, &device);
        let dec = Tensor::<MyBackend, 4>::random([1, 3, 32, 32], Distribution::Default, &device);
        let output = transformer.forward_with_attention(enc, dec);

        assert_eq!(output.image.dims(), [1, 3, 32, 32]);
        assert_eq!(output.enc_self_attns.len(), 2);
        assert_eq!(output.dec_self_attns.len(), 2);
        assert_eq!(output.dec_enc_attns.len(), 2);
        // 16 rows of the stem map, 2 heads
        assert_eq!(output.dec_enc_attns[0].dims(), [1, 2, 16, 16]);
    }
}
