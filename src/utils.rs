use burn::{prelude::*, tensor::TensorData};
use image::{imageops, imageops::FilterType, ImageResult, RgbImage};
use std::path::Path;

/// Loads an image as RGB, resized to `size x size`.
pub fn load_image<P: AsRef<Path>>(path: P, size: u32) -> ImageResult<RgbImage> {
    let image = image::open(path)?.to_rgb8();
    if image.dimensions() == (size, size) {
        return Ok(image);
    }
    Ok(imageops::resize(&image, size, size, FilterType::Triangle))
}

/// RGB image -> `[3, H, W]` tensor scaled to `[-1, 1]`.
pub fn image_to_tensor<B: Backend>(image: &RgbImage, device: &B::Device) -> Tensor<B, 3> {
    let (width, height) = image.dimensions();
    let values = image
        .as_raw()
        .iter()
        .map(|&c| c as f32 / 127.5 - 1.0)
        .collect::<Vec<_>>();

    // [H, W, C] -> [C, H, W]
    Tensor::<B, 3>::from_data(
        TensorData::new(values, [height as usize, width as usize, 3]),
        device,
    )
    .permute([2, 0, 1])
}

/// `[3, H, W]` tensor in `[-1, 1]` -> RGB image.
pub fn tensor_to_image<B: Backend>(tensor: Tensor<B, 3>) -> RgbImage {
    let [_, height, width] = tensor.dims();
    let values = tensor
        .permute([1, 2, 0])
        .into_data()
        .iter::<f32>()
        .map(|c| (255.0 * (c + 1.0) / 2.0).clamp(0.0, 255.0) as u8)
        .collect::<Vec<_>>();

    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let idx = (y as usize * width + x as usize) * 3;
        image::Rgb([values[idx], values[idx + 1], values[idx + 2]])
    })
}

/// Writes a `[N, 3, H, W]` batch as a grid with `nrow` images per row.
pub fn save_image<B: Backend, Q: AsRef<Path>>(
    images: Tensor<B, 4>,
    nrow: u32,
    path: Q,
) -> ImageResult<()> {
    let [batch_size, _, height, width] = images.dims();
    let nrow = nrow.max(1);
    let ncol = (batch_size as u32).div_ceil(nrow);
    let (width, height) = (width as u32, height as u32);

    let mut grid = RgbImage::new(nrow * width, ncol * height);
    for index in 0..batch_size {
        let image: Tensor<B, 3> = images.clone().slice([index..index + 1]).squeeze(0);
        let image = tensor_to_image(image);

        let (col, row) = (index as u32 % nrow, index as u32 / nrow);
        imageops::replace(
            &mut grid,
            &image,
            (col * width) as i64,
            (row * height) as i64,
        );
    }
    grid.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MyBackend;

    #[test]
    fn test_image_tensor_layout() {
        let device = Default::default();
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, image::Rgb([255, 0, 0]));
        image.put_pixel(1, 0, image::Rgb([0, 0, 255]));

        let tensor = image_to_tensor::<MyBackend>(&image, &device);
        assert_eq!(tensor.dims(), [3, 1, 2]);
        assert_eq!(
            tensor.clone().into_data().to_vec::<f32>().unwrap(),
            vec![1.0, -1.0, -1.0, -1.0, -1.0, 1.0]
        );

        let restored = tensor_to_image(tensor);
        assert_eq!(restored, image);
    }

    #[test]
    fn test_save_image_grid() {
        let device = Default::default();
        // batch of 3 solid images: black, white, black
        let black = Tensor::<MyBackend, 4>::ones([1, 3, 4, 2], &device) * -1.0;
        let white = Tensor::<MyBackend, 4>::ones([1, 3, 4, 2], &device);
        let images = Tensor::cat(vec![black.clone(), white, black], 0);

        let dir = std::env::temp_dir().join(format!("occlusion-gan-grid-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("grid.png");
        save_image(images, 2, &path).unwrap();

        let grid = image::open(&path).unwrap().to_rgb8();
        // 2 per row, 2 rows of 2x4 tiles
        assert_eq!(grid.dimensions(), (4, 8));
        assert_eq!(grid.get_pixel(0, 0), &image::Rgb([0, 0, 0]));
        assert_eq!(grid.get_pixel(2, 0), &image::Rgb([255, 255, 255]));
        assert_eq!(grid.get_pixel(1, 5), &image::Rgb([0, 0, 0]));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
