use burn::{
    module::Module,
    nn::{
        conv::{Conv1d, Conv1dConfig},
        LayerNorm, LayerNormConfig, Linear, LinearConfig, Relu,
    },
    prelude::*,
    tensor::activation::softmax,
};

use crate::model::transformer::TransformerConfig;

/// `softmax(Q K^T / sqrt(d_k)) V` over `[batch, heads, len, d]` tensors.
#[derive(Module, Debug, Clone)]
pub struct ScaledDotProductAttention {
    d_k: usize,
}
impl ScaledDotProductAttention {
    pub fn new(d_k: usize) -> Self {
        Self { d_k }
    }

    /// Returns the context `[B, H, len_q, d_v]` and the weights `[B, H, len_q, len_k]`.
    pub fn forward<B: Backend>(
        &self,
        q: Tensor<B, 4>,
        k: Tensor<B, 4>,
        v: Tensor<B, 4>,
    ) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let scores = q.matmul(k.swap_dims(2, 3)) / (self.d_k as f32).sqrt();
        let attn = softmax(scores, 3);
        let context = attn.clone().matmul(v);

        (context, attn)
    }
}

#[derive(Module, Debug)]
pub struct MultiHeadAttention<B: Backend> {
    w_q: Linear<B>,
    w_k: Linear<B>,
    w_v: Linear<B>,
    output: Linear<B>,
    norm: LayerNorm<B>,
    attention: ScaledDotProductAttention,
    n_heads: usize,
    d_k: usize,
    d_v: usize,
}
impl<B: Backend> MultiHeadAttention<B> {
    pub fn new(config: &TransformerConfig, device: &B::Device) -> Self {
        let TransformerConfig {
            n_heads,
            d_k,
            d_v,
            dim,
            ..
        } = *config;

        Self {
            w_q: LinearConfig::new(dim, d_k * n_heads).init(device),
            w_k: LinearConfig::new(dim, d_k * n_heads).init(device),
            w_v: LinearConfig::new(dim, d_v * n_heads).init(device),
            output: LinearConfig::new(n_heads * d_v, dim).init(device),
            norm: LayerNormConfig::new(dim).init(device),
            attention: ScaledDotProductAttention::new(d_k),
            n_heads,
            d_k,
            d_v,
        }
    }

    /// Inputs are `[batch, len, dim]`; keys and values share a length.
    pub fn forward(
        &self,
        q: Tensor<B, 3>,
        k: Tensor<B, 3>,
        v: Tensor<B, 3>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let [batch, len_q, _] = q.dims();
        let [_, len_k, _] = k.dims();
        let residual = q.clone();

        // [B, S, H * W] -> [B, S, H, W] -> [B, H, S, W]
        let q_s = self
            .w_q
            .forward(q)
            .reshape([batch, len_q, self.n_heads, self.d_k])
            .swap_dims(1, 2);
        let k_s = self
            .w_k
            .forward(k)
            .reshape([batch, len_k, self.n_heads, self.d_k])
            .swap_dims(1, 2);
        let v_s = self
            .w_v
            .forward(v)
            .reshape([batch, len_k, self.n_heads, self.d_v])
            .swap_dims(1, 2);

        let (context, attn) = self.attention.forward(q_s, k_s, v_s);
        let context = context
            .swap_dims(1, 2)
            .reshape([batch, len_q, self.n_heads * self.d_v]);
        let output = self.output.forward(context);

        (self.norm.forward(output + residual), attn)
    }
}

/// Two kernel-1 convolutions over the sequence, i.e. a per-position MLP.
#[derive(Module, Debug)]
pub struct PoswiseFeedForwardNet<B: Backend> {
    conv1: Conv1d<B>,
    conv2: Conv1d<B>,
    norm: LayerNorm<B>,
    relu: Relu,
}
impl<B: Backend> PoswiseFeedForwardNet<B> {
    pub fn new(config: &TransformerConfig, device: &B::Device) -> Self {
        Self {
            conv1: Conv1dConfig::new(config.dim, config.d_ff, 1).init(device),
            conv2: Conv1dConfig::new(config.d_ff, config.dim, 1).init(device),
            norm: LayerNormConfig::new(config.dim).init(device),
            relu: Relu::new(),
        }
    }

    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 3> {
        // conv1d wants [B, C, L]
        let output = self.conv1.forward(input.clone().swap_dims(1, 2));
        let output = self.relu.forward(output);
        let output = self.conv2.forward(output).swap_dims(1, 2);

        self.norm.forward(output + input)
    }
}

#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    self_attn: MultiHeadAttention<B>,
    pos_ffn: PoswiseFeedForwardNet<B>,
}
impl<B: Backend> EncoderLayer<B> {
    pub fn new(config: &TransformerConfig, device: &B::Device) -> Self {
        Self {
            self_attn: MultiHeadAttention::new(config, device),
            pos_ffn: PoswiseFeedForwardNet::new(config, device),
        }
    }

    pub fn forward(&self, input: Tensor<B, 3>) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let (output, attn) = self
            .self_attn
            .forward(input.clone(), input.clone(), input);
        (self.pos_ffn.forward(output), attn)
    }
}

#[derive(Module, Debug)]
pub struct DecoderLayer<B: Backend> {
    self_attn: MultiHeadAttention<B>,
    enc_attn: MultiHeadAttention<B>,
    pos_ffn: PoswiseFeedForwardNet<B>,
}
impl<B: Backend> DecoderLayer<B> {
    pub fn new(config: &TransformerConfig, device: &B::Device) -> Self {
        Self {
            self_attn: MultiHeadAttention::new(config, device),
            enc_attn: MultiHeadAttention::new(config, device),
            pos_ffn: PoswiseFeedForwardNet::new(config, device),
        }
    }

    /// Returns the output, the self-attention weights and the cross-attention weights.
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        enc_outputs: Tensor<B, 3>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>, Tensor<B, 4>) {
        let (output, self_attn) = self
            .self_attn
            .forward(input.clone(), input.clone(), input);
        let (output, enc_attn) = self
            .enc_attn
            .forward(output, enc_outputs.clone(), enc_outputs);

        (self.pos_ffn.forward(output), self_attn, enc_attn)
    }
}

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    layers: Vec<EncoderLayer<B>>,
}
impl<B: Backend> Encoder<B> {
    pub fn new(config: &TransformerConfig, device: &B::Device) -> Self {
        let layers = (0..config.n_layers)
            .map(|_| EncoderLayer::new(config, device))
            .collect();
        Self { layers }
    }

    pub fn forward(&self, input: Tensor<B, 3>) -> (Tensor<B, 3>, Vec<Tensor<B, 4>>) {
        let mut output = input;
        let mut attns = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let (next, attn) = layer.forward(output);
            output = next;
            attns.push(attn);
        }
        (output, attns)
    }
}

/// Collected decoder outputs.
#[derive(Debug, Clone)]
pub struct DecoderOutput<B: Backend> {
    pub output: Tensor<B, 3>,
    pub self_attns: Vec<Tensor<B, 4>>,
    pub enc_attns: Vec<Tensor<B, 4>>,
}

#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    layers: Vec<DecoderLayer<B>>,
}
impl<B: Backend> Decoder<B> {
    pub fn new(config: &TransformerConfig, device: &B::Device) -> Self {
        let layers = (0..config.n_layers)
            .map(|_| DecoderLayer::new(config, device))
            .collect();
        Self { layers }
    }

    pub fn forward(&self, input: Tensor<B, 3>, enc_outputs: Tensor<B, 3>) -> DecoderOutput<B> {
        let mut output = input;
        let mut self_attns = Vec::with_capacity(self.layers.len());
        let mut enc_attns = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let (next, self_attn, enc_attn) = layer.forward(output, enc_outputs.clone());
            output = next;
            self_attns.push(self_attn);
            enc_attns.push(enc_attn);
        }

        DecoderOutput {
            output,
            self_attns,
            enc_attns,
        }
    }
}
