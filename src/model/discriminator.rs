use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        LeakyRelu, LeakyReluConfig, PaddingConfig2d,
    },
    prelude::*,
};

use crate::model::{generator::base_dim, layers::ResBlk};

#[derive(Module, Debug)]
pub struct Discriminator<B: Backend> {
    in_layer: Conv2d<B>,
    blocks: Vec<ResBlk<B>>,
    conv: Conv2d<B>,
    out_layer: Conv2d<B>,
    lrelu: LeakyRelu,
}
impl<B: Backend> Discriminator<B> {
    /// Returns `[batch, num_class]` logits.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut output = self.in_layer.forward(input);
        for block in &self.blocks {
            output = block.forward(output);
        }

        // [B, C, 4, 4] -> [B, C, 1, 1]
        let output = self.lrelu.forward(output);
        let output = self.conv.forward(output);
        let output = self.lrelu.forward(output);
        let output = self.out_layer.forward(output);

        output.flatten(1, 3)
    }
}

#[derive(Config, Debug)]
pub struct DiscriminatorConfig {
    #[config(default = 256)]
    pub img_size: usize,
    #[config(default = 1)]
    pub num_class: usize,
    #[config(default = 512)]
    pub max_conv_dim: usize,
}
impl DiscriminatorConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Discriminator<B> {
        let mut dim_in = base_dim(self.img_size);
        let in_layer = Conv2dConfig::new([3, dim_in], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);

        let repeat_num = (self.img_size.ilog2() as usize).saturating_sub(2);
        let mut dim_out = dim_in;
        let mut blocks = Vec::with_capacity(repeat_num);
        for _ in 0..repeat_num {
            dim_out = (dim_in * 2).min(self.max_conv_dim);
            blocks.push(ResBlk::new([dim_in, dim_out], false, true, device));
            dim_in = dim_out;
        }

        let conv = Conv2dConfig::new([dim_out, dim_out], [4, 4]).init(device);
        let out_layer = Conv2dConfig::new([dim_out, self.num_class], [1, 1]).init(device);

        Discriminator {
            in_layer,
            blocks,
            conv,
            out_layer,
            lrelu: LeakyReluConfig::new().with_negative_slope(0.2).init(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MyBackend;
    use burn::tensor::Distribution;

    #[test]
    fn test_logits_shape() {
        let device = Default::default();
        let discriminator = DiscriminatorConfig::new()
            .with_img_size(32)
            .with_num_class(2)
            .init::<MyBackend>(&device);

        let input = Tensor::<MyBackend, 4>::random([3, 3, 32, 32], Distribution::Default, &device);
        assert_eq!(discriminator.forward(input).dims(), [3, 2]);
    }

    #[test]
    fn test_single_class_logits() {
        let device = Default::default();
        let discriminator = DiscriminatorConfig::new()
            .with_img_size(64)
            .with_max_conv_dim(256)
            .init::<MyBackend>(&device);

        let input = Tensor::<MyBackend, 4>::random([2, 3, 64, 64], Distribution::Default, &device);
        let logits = discriminator.forward(input);
        assert_eq!(logits.dims(), [2, 1]);
        assert!(logits
            .into_data()
            .to_vec::<f32>()
            .unwrap()
            .iter()
            .all(|v| v.is_finite()));
    }
}
