//! Heatmap overlay rendering and image encoding
//!
//! The heatmap is upsampled to the image size, colored with the JET colormap
//! (blue for low, red for high) and added onto the image at half strength.

use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use super::gradcam::Heatmap;
use crate::utils::error::{Result, RiceDiseaseError};

/// Strength of the colored heatmap added onto the image
pub const OVERLAY_ALPHA: f32 = 0.5;

/// Quality of every JPEG this crate produces
pub const JPEG_QUALITY: u8 = 95;

/// Largest side length a baseline JPEG can store
pub const MAX_JPEG_DIMENSION: u32 = 65535;

/// JET colormap for a value in `[0, 1]`
pub fn jet_color(value: f32) -> Rgb<u8> {
    let v = value.clamp(0.0, 1.0);
    let channel = |offset: f32| ((1.5 - (4.0 * v - offset).abs()).clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

/// Superimpose a heatmap on an image: `out = image + alpha * jet(heatmap)`, clipped
///
/// The heatmap is bilinearly resized to the image's dimensions first, so the output
/// always has the same size as `image`.
pub fn overlay_heatmap(image: &RgbImage, heatmap: &Heatmap, alpha: f32) -> Result<RgbImage> {
    let (width, height) = image.dimensions();
    let scaled = heatmap.upsample(width, height)?;

    let mut out = RgbImage::new(width, height);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let base = image.get_pixel(x, y);
        // `scaled` has the image's dimensions, so every pixel is in range
        let jet = jet_color(scaled.get(x as usize, y as usize).unwrap_or(0.0));
        for c in 0..3 {
            let v = base[c] as f32 + alpha * jet[c] as f32;
            pixel[c] = v.clamp(0.0, 255.0) as u8;
        }
    }

    Ok(out)
}

/// Encode an RGB image as JPEG bytes
pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(image)
        .map_err(|e| RiceDiseaseError::Inference(format!("JPEG encoding failed: {}", e)))?;
    Ok(bytes)
}

/// JPEG-encode and base64 the result, for JSON transport
pub fn jpeg_base64(image: &RgbImage) -> Result<String> {
    Ok(general_purpose::STANDARD.encode(encode_jpeg(image)?))
}

/// Shrink an image so neither side exceeds `MAX_JPEG_DIMENSION`, keeping the aspect ratio
pub fn fit_jpeg_dimensions(image: &DynamicImage) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let longest = width.max(height);
    if longest <= MAX_JPEG_DIMENSION {
        return image.clone();
    }

    let scale = MAX_JPEG_DIMENSION as f64 / longest as f64;
    let fit = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, MAX_JPEG_DIMENSION);
    image.resize_exact(fit(width), fit(height), FilterType::Triangle)
}

/// Base64 of the uploaded image for the response
///
/// JPEG uploads are passed through byte for byte. Anything else is re-encoded as a
/// JPEG, shrunk first if a side is too long for the format.
pub fn original_base64(bytes: &[u8], image: &DynamicImage) -> Result<String> {
    if matches!(image::guess_format(bytes), Ok(ImageFormat::Jpeg)) {
        return Ok(general_purpose::STANDARD.encode(bytes));
    }
    jpeg_base64(&fit_jpeg_dimensions(image).to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(jet_color(0.0), Rgb([0, 0, 128]));
        assert_eq!(jet_color(0.5), Rgb([128, 255, 128]));
        assert_eq!(jet_color(1.0), Rgb([128, 0, 0]));

        let low = jet_color(0.1);
        let high = jet_color(0.9);
        assert!(low[2] > low[0], "low values are blue");
        assert!(high[0] > high[2], "high values are red");
    }

    #[test]
    fn test_overlay_matches_image_dimensions() {
        let image = RgbImage::from_pixel(37, 23, Rgb([100, 100, 100]));
        let heatmap = Heatmap::new(3, 3, vec![0.0, 0.5, 1.0, 0.2, 0.4, 0.6, 1.0, 0.0, 0.3]).unwrap();

        let out = overlay_heatmap(&image, &heatmap, OVERLAY_ALPHA).unwrap();
        assert_eq!(out.dimensions(), image.dimensions());
    }

    #[test]
    fn test_overlay_clips_to_255() {
        let image = RgbImage::from_pixel(4, 4, Rgb([250, 250, 250]));
        let heatmap = Heatmap::new(1, 1, vec![1.0]).unwrap();

        let out = overlay_heatmap(&image, &heatmap, OVERLAY_ALPHA).unwrap();
        // 250 + 0.5 * 128 saturates
        assert_eq!(out.get_pixel(0, 0)[0], 255);
        // green of jet(1.0) is zero
        assert_eq!(out.get_pixel(0, 0)[1], 250);
    }

    #[test]
    fn test_original_jpeg_is_echoed() {
        let jpeg = encode_jpeg(&RgbImage::from_pixel(12, 9, Rgb([90, 140, 30]))).unwrap();
        let image = image::load_from_memory(&jpeg).unwrap();

        let encoded = original_base64(&jpeg, &image).unwrap();
        assert_eq!(general_purpose::STANDARD.decode(encoded).unwrap(), jpeg);
    }

    #[test]
    fn test_original_png_is_reencoded_as_jpeg() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 7, Rgb([0, 90, 200])));
        let mut png = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();

        let bytes = general_purpose::STANDARD
            .decode(original_base64(&png, &image).unwrap())
            .unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (10, 7));
    }

    #[test]
    fn test_fit_jpeg_dimensions() {
        let small = DynamicImage::ImageRgb8(RgbImage::new(300, 300));
        assert_eq!(fit_jpeg_dimensions(&small).width(), 300);

        let wide = DynamicImage::ImageRgb8(RgbImage::new(70_000, 2));
        let fitted = fit_jpeg_dimensions(&wide);
        assert_eq!(fitted.width(), MAX_JPEG_DIMENSION);
        assert_eq!(fitted.height(), 2);

        let tall = DynamicImage::ImageRgb8(RgbImage::new(1, 140_000));
        let fitted = fit_jpeg_dimensions(&tall);
        assert_eq!((fitted.width(), fitted.height()), (1, MAX_JPEG_DIMENSION));
        assert!(encode_jpeg(&fitted.to_rgb8()).is_ok());
    }

    #[test]
    fn test_jpeg_base64_decodes_back() {
        let image = RgbImage::from_pixel(8, 6, Rgb([10, 200, 30]));
        let encoded = jpeg_base64(&image).unwrap();
        let bytes = general_purpose::STANDARD.decode(encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }
}
