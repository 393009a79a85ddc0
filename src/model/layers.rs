use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AvgPool2d, AvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        InstanceNorm, InstanceNormConfig, LeakyRelu, LeakyReluConfig, Linear, LinearConfig,
        PaddingConfig2d,
    },
    prelude::*,
    tensor::{
        activation::sigmoid,
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

fn conv3x3<B: Backend>(channels: [usize; 2], device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new(channels, [3, 3])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .init(device)
}

fn conv1x1<B: Backend>(channels: [usize; 2], device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new(channels, [1, 1]).with_bias(false).init(device)
}

fn lrelu() -> LeakyRelu {
    LeakyReluConfig::new().with_negative_slope(0.2).init()
}

/// Nearest-neighbour 2x upsampling of a feature map.
pub fn upsample2x<B: Backend>(input: Tensor<B, 4>) -> Tensor<B, 4> {
    let [_, _, height, width] = input.dims();
    interpolate(
        input,
        [height * 2, width * 2],
        InterpolateOptions::new(InterpolateMode::Nearest),
    )
}

// ////////////////////////////////////////////////////////////////////////////
// ResBlk

/// Residual block with optional instance norm and 2x average-pool downsampling.
///
/// Output is `(shortcut + residual) / sqrt(2)` so two independent unit-variance
/// paths sum to roughly unit variance.
#[derive(Module, Debug)]
pub struct ResBlk<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    norm1: Option<InstanceNorm<B>>,
    norm2: Option<InstanceNorm<B>>,
    conv1x1: Option<Conv2d<B>>,
    pool: Option<AvgPool2d>,
    lrelu: LeakyRelu,
}
impl<B: Backend> ResBlk<B> {
    pub fn new(
        channels: [usize; 2],
        normalize: bool,
        downsample: bool,
        device: &B::Device,
    ) -> Self {
        let [dim_in, dim_out] = channels;

        let conv1 = conv3x3([dim_in, dim_in], device);
        let conv2 = conv3x3([dim_in, dim_out], device);
        let (norm1, norm2) = if normalize {
            (
                Some(InstanceNormConfig::new(dim_in).init(device)),
                Some(InstanceNormConfig::new(dim_in).init(device)),
            )
        } else {
            (None, None)
        };
        let conv1x1 = (dim_in != dim_out).then(|| conv1x1([dim_in, dim_out], device));
        let pool = downsample.then(|| AvgPool2dConfig::new([2, 2]).with_strides([2, 2]).init());

        Self {
            conv1,
            conv2,
            norm1,
            norm2,
            conv1x1,
            pool,
            lrelu: lrelu(),
        }
    }

    pub fn shortcut(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = match &self.conv1x1 {
            Some(conv) => conv.forward(input),
            None => input,
        };
        match &self.pool {
            Some(pool) => pool.forward(output),
            None => output,
        }
    }

    pub fn residual(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = match &self.norm1 {
            Some(norm) => norm.forward(input),
            None => input,
        };
        let output = self.lrelu.forward(output);
        let output = self.conv1.forward(output);
        let output = match &self.pool {
            Some(pool) => pool.forward(output),
            None => output,
        };
        let output = match &self.norm2 {
            Some(norm) => norm.forward(output),
            None => output,
        };
        let output = self.lrelu.forward(output);
        self.conv2.forward(output)
    }

    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = self.shortcut(input.clone()) + self.residual(input);
        output / core::f32::consts::SQRT_2
    }
}

// ////////////////////////////////////////////////////////////////////////////
// AdaIN

/// Adaptive instance norm whose affine parameters come from an occlusion map of
/// the style image rather than a global style vector.
#[derive(Module, Debug)]
pub struct AdaIN<B: Backend> {
    norm: InstanceNorm<B>,
    occlusion_map: Conv2d<B>,
    pool: MaxPool2d,
    fc: Linear<B>,
    num_features: usize,
}
impl<B: Backend> AdaIN<B> {
    pub fn new(num_features: usize, style_size: usize, device: &B::Device) -> Self {
        let norm = InstanceNormConfig::new(num_features)
            .with_affine(false)
            .init(device);
        let occlusion_map = Conv2dConfig::new([3, 1], [9, 9])
            .with_stride([4, 4])
            .with_padding(PaddingConfig2d::Explicit(4, 4))
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let side = Self::attention_side(style_size);
        let fc = LinearConfig::new(side * side, num_features * 2).init(device);

        Self {
            norm,
            occlusion_map,
            pool,
            fc,
            num_features,
        }
    }

    /// Side length of the pooled occlusion map for a square style image.
    pub fn attention_side(style_size: usize) -> usize {
        // 9x9 conv, stride 4, padding 4, then 2x2 max pool
        ((style_size + 2 * 4 - 9) / 4 + 1) / 2
    }

    /// Per-channel `(gamma, beta)`, each `[batch, num_features, 1, 1]`.
    pub fn style_params(&self, style: Tensor<B, 4>) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let attention = self.pool.forward(self.occlusion_map.forward(style));
        let attention = sigmoid(attention);
        let [batch, _, height, width] = attention.dims();
        let attention = attention.reshape([batch, height * width]);

        let params = self.fc.forward(attention);
        let n = self.num_features;
        let gamma = params.clone().slice([0..batch, 0..n]).reshape([batch, n, 1, 1]);
        let beta = params.slice([0..batch, n..2 * n]).reshape([batch, n, 1, 1]);

        (gamma, beta)
    }

    pub fn forward(&self, input: Tensor<B, 4>, style: Tensor<B, 4>) -> Tensor<B, 4> {
        let (gamma, beta) = self.style_params(style);
        let normalized = self.norm.forward(input);
        (gamma + 1.0) * normalized + beta
    }
}

// ////////////////////////////////////////////////////////////////////////////
// AdainResBlk

/// Residual block conditioned on a style image through two AdaIN layers.
///
/// The output is the residual path alone; `shortcut` is built but never added,
/// and unlike [`ResBlk`] nothing is rescaled.
#[derive(Module, Debug)]
pub struct AdainResBlk<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    norm1: AdaIN<B>,
    norm2: AdaIN<B>,
    conv1x1: Option<Conv2d<B>>,
    upsample: bool,
    lrelu: LeakyRelu,
}
impl<B: Backend> AdainResBlk<B> {
    pub fn new(
        channels: [usize; 2],
        style_size: usize,
        upsample: bool,
        device: &B::Device,
    ) -> Self {
        let [dim_in, dim_out] = channels;

        Self {
            conv1: conv3x3([dim_in, dim_out], device),
            conv2: conv3x3([dim_out, dim_out], device),
            norm1: AdaIN::new(dim_in, style_size, device),
            norm2: AdaIN::new(dim_out, style_size, device),
            conv1x1: (dim_in != dim_out).then(|| conv1x1([dim_in, dim_out], device)),
            upsample,
            lrelu: lrelu(),
        }
    }

    pub fn shortcut(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = if self.upsample {
            upsample2x(input)
        } else {
            input
        };
        match &self.conv1x1 {
            Some(conv) => conv.forward(output),
            None => output,
        }
    }

    pub fn residual(&self, input: Tensor<B, 4>, style: Tensor<B, 4>) -> Tensor<B, 4> {
        let output = self.norm1.forward(input, style.clone());
        let output = self.lrelu.forward(output);
        let output = if self.upsample {
            upsample2x(output)
        } else {
            output
        };
        let output = self.conv1.forward(output);
        let output = self.norm2.forward(output, style);
        let output = self.lrelu.forward(output);
        self.conv2.forward(output)
    }

    pub fn forward(&self, input: Tensor<B, 4>, style: Tensor<B, 4>) -> Tensor<B, 4> {
        self.residual(input, style)
    }
}
