//! Image preprocessing shared by training and serving
//!
//! Images are resized (bilinear) to the model's square input resolution and scaled to
//! `[0, 1]` in CHW layout. No further normalization is applied, and the network does
//! not rescale internally, so this is the only place pixel values are transformed.

use burn::prelude::*;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};

use crate::utils::error::{Result, RiceDiseaseError};

/// Decode encoded image bytes (JPEG, PNG, ...) into an image
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(RiceDiseaseError::InvalidImage("empty upload".to_string()));
    }

    let img = image::load_from_memory(bytes)?;
    if img.width() == 0 || img.height() == 0 {
        return Err(RiceDiseaseError::InvalidImage(
            "image has zero width or height".to_string(),
        ));
    }

    Ok(img)
}

/// Resize to `size x size` RGB with bilinear interpolation
pub fn resize_rgb(image: &DynamicImage, size: usize) -> RgbImage {
    image
        .resize_exact(size as u32, size as u32, FilterType::Triangle)
        .to_rgb8()
}

/// Flatten an RGB image into CHW floats in `[0, 1]`
pub fn rgb_to_chw(image: &RgbImage) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let num_pixels = (width * height) as usize;
    let mut data = vec![0.0f32; 3 * num_pixels];

    // CHW layout: all R values, then all G values, then all B values
    for (i, pixel) in image.pixels().enumerate() {
        data[i] = pixel[0] as f32 / 255.0;
        data[num_pixels + i] = pixel[1] as f32 / 255.0;
        data[2 * num_pixels + i] = pixel[2] as f32 / 255.0;
    }

    data
}

/// An image prepared for the classifier, with the resized copy kept for overlays
#[derive(Debug, Clone)]
pub struct PreprocessedImage<B: Backend> {
    /// The image at model resolution, as seen by the network
    pub resized: RgbImage,
    /// Tensor of shape [1, 3, size, size]
    pub tensor: Tensor<B, 4>,
}

/// Turns arbitrary images into model input tensors
#[derive(Debug, Clone, Copy)]
pub struct ImagePreprocessor {
    image_size: usize,
}

impl ImagePreprocessor {
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }

    /// Square side length of the produced tensors
    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Preprocess a decoded image
    pub fn preprocess<B: Backend>(
        &self,
        image: &DynamicImage,
        device: &B::Device,
    ) -> PreprocessedImage<B> {
        let resized = resize_rgb(image, self.image_size);
        let tensor = self.to_tensor(&resized, device);
        PreprocessedImage { resized, tensor }
    }

    /// Decode and preprocess encoded image bytes
    pub fn preprocess_bytes<B: Backend>(
        &self,
        bytes: &[u8],
        device: &B::Device,
    ) -> Result<PreprocessedImage<B>> {
        let image = decode_image(bytes)?;
        Ok(self.preprocess(&image, device))
    }

    /// Batch tensor from already resized images, shape [n, 3, size, size]
    pub fn batch_tensor<B: Backend>(&self, images: &[RgbImage], device: &B::Device) -> Tensor<B, 4> {
        let size = self.image_size;
        let data: Vec<f32> = images.iter().flat_map(|img| rgb_to_chw(img)).collect();
        Tensor::<B, 4>::from_floats(TensorData::new(data, [images.len(), 3, size, size]), device)
    }

    fn to_tensor<B: Backend>(&self, resized: &RgbImage, device: &B::Device) -> Tensor<B, 4> {
        let size = self.image_size;
        Tensor::<B, 4>::from_floats(
            TensorData::new(rgb_to_chw(resized), [1, 3, size, size]),
            device,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use image::Rgb;
    use std::io::Cursor;

    type TestBackend = NdArray;

    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img.clone())
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_tensor_shape_and_range() {
        let device = Default::default();
        let img = RgbImage::from_fn(50, 30, |x, y| Rgb([(x * 5) as u8, (y * 8) as u8, 255]));
        let pre = ImagePreprocessor::new(16)
            .preprocess_bytes::<TestBackend>(&encode_png(&img), &device)
            .unwrap();

        assert_eq!(pre.tensor.dims(), [1, 3, 16, 16]);
        assert_eq!(pre.resized.dimensions(), (16, 16));

        let values: Vec<f32> = pre.tensor.into_data().to_vec().unwrap();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        // Blue channel is constant 255
        assert!(values[2 * 256..].iter().all(|v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_chw_layout() {
        let img = RgbImage::from_pixel(2, 2, Rgb([0, 51, 255]));
        let chw = rgb_to_chw(&img);
        assert_eq!(chw.len(), 12);
        assert!(chw[..4].iter().all(|v| *v == 0.0));
        assert!(chw[4..8].iter().all(|v| (v - 0.2).abs() < 1e-6));
        assert!(chw[8..].iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_undecodable_bytes_are_invalid_image() {
        let err = decode_image(b"definitely not a jpeg").unwrap_err();
        assert!(matches!(err, RiceDiseaseError::InvalidImage(_)));
        assert!(err.is_client_error());

        assert!(matches!(
            decode_image(&[]),
            Err(RiceDiseaseError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_batch_tensor() {
        let device = Default::default();
        let pre = ImagePreprocessor::new(4);
        let images = vec![RgbImage::new(4, 4), RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]))];
        let batch = pre.batch_tensor::<TestBackend>(&images, &device);
        assert_eq!(batch.dims(), [2, 3, 4, 4]);
    }
}
