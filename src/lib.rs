pub mod error;
pub mod model;
pub mod utils;

pub use error::ModelError;
pub use model::{build_model, ModelConfig, Nets, NetsEma};

use crate::model::generator::{Generator, GeneratorConfig};
use burn::{
    backend::NdArray,
    tensor::{Device, Tensor, TensorData},
};
use wasm_bindgen::prelude::*;

type MyBackend = NdArray<f32>;

#[wasm_bindgen]
pub struct Model {
    generator: Generator<MyBackend>,
    img_size: usize,
    device: Device<MyBackend>,
}

#[wasm_bindgen]
impl Model {
    #[wasm_bindgen(constructor)]
    pub fn new(img_size: usize) -> Result<Model, JsValue> {
        let config = ModelConfig::new()
            .with_img_size(img_size)
            .with_hidden_size(img_size / 2);
        config
            .validate()
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let device = Default::default();
        let generator = GeneratorConfig::new()
            .with_img_size(img_size)
            .init(&device);

        Ok(Self {
            generator,
            img_size,
            device,
        })
    }

    /// Each input is a `3 * img_size * img_size` CHW buffer of 0-255 values.
    #[wasm_bindgen]
    pub fn stylize(
        &self,
        source: Vec<f32>,
        target: Vec<f32>,
        style: Vec<f32>,
    ) -> Result<Vec<f32>, JsValue> {
        let x = self.to_tensor(source)?;
        let t = self.to_tensor(target)?;
        let s = self.to_tensor(style)?;

        let image: Tensor<MyBackend, 3> = self.generator.forward(x, t, s, None).squeeze(0);
        let data = image
            .to_data()
            .to_vec::<f32>()
            .map_err(|e| JsValue::from_str(&format!("{e:?}")))?
            .iter()
            .map(|c| (255.0 * ((c + 1.0) / 2.0)))
            .collect::<Vec<_>>();

        Ok(data)
    }
}

impl Model {
    fn to_tensor(&self, image: Vec<f32>) -> Result<Tensor<MyBackend, 4>, JsValue> {
        let expected = 3 * self.img_size * self.img_size;
        if image.len() != expected {
            return Err(JsValue::from_str(&format!(
                "expected {expected} values, got {}",
                image.len()
            )));
        }

        let image = image.into_iter().map(|c| c / 127.5 - 1.0).collect::<Vec<_>>();
        let tensor = Tensor::<MyBackend, 3>::from_data(
            TensorData::new(image, [3, self.img_size, self.img_size]),
            &self.device,
        );
        Ok(tensor.unsqueeze())
    }
}
