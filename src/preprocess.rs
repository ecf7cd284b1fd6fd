//! Converts uploaded image bytes into the classifier's input layout.
//!
//! The model was trained on 112x112 images decoded in blue-green-red channel
//! order with values scaled into `[0, 1]`, then flattened into fixed-width
//! rows. Every upload goes through exactly the same transform.

use image::imageops::FilterType;
use thiserror::Error;

/// Side length of the square image the model expects.
pub const TARGET_SIDE: u32 = 112;
pub const CHANNELS: usize = 3;
/// Number of scalar values produced for one image.
pub const FLAT_LEN: usize = (TARGET_SIDE as usize) * (TARGET_SIDE as usize) * CHANNELS;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("row width {width} does not evenly divide {} values", FLAT_LEN)]
    IncompatibleWidth { width: usize },
}

/// Normalized pixel values laid out as `rows x row_width`.
#[derive(Debug, Clone)]
pub struct ModelInput {
    values: Vec<f32>,
    row_width: usize,
}

impl ModelInput {
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn row_width(&self) -> usize {
        self.row_width
    }

    pub fn rows(&self) -> usize {
        self.values.len() / self.row_width
    }

    #[cfg(test)]
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        self.values.chunks_exact(self.row_width).nth(index)
    }
}

pub fn validate_row_width(width: usize) -> Result<(), PreprocessError> {
    if width == 0 || FLAT_LEN % width != 0 {
        return Err(PreprocessError::IncompatibleWidth { width });
    }
    Ok(())
}

/// Decodes `bytes`, resizes to [`TARGET_SIDE`] squared and flattens the
/// result into rows of `row_width` values.
pub fn preprocess(bytes: &[u8], row_width: usize) -> Result<ModelInput, PreprocessError> {
    validate_row_width(row_width)?;

    let decoded = image::load_from_memory(bytes)?;
    let resized = decoded
        .resize_exact(TARGET_SIDE, TARGET_SIDE, FilterType::Triangle)
        .to_rgb8();

    let mut values = Vec::with_capacity(FLAT_LEN);
    for pixel in resized.pixels() {
        let [r, g, b] = pixel.0;
        values.push(f32::from(b) / 255.0);
        values.push(f32::from(g) / 255.0);
        values.push(f32::from(r) / 255.0);
    }

    Ok(ModelInput { values, row_width })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};

    use super::*;

    pub(crate) fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).expect("encode png");
        buf.into_inner()
    }

    #[test]
    fn produces_fixed_length_rows() {
        let input = preprocess(&solid_png(300, 40, [10, 20, 30]), 768).expect("preprocess");
        assert_eq!(input.values().len(), FLAT_LEN);
        assert_eq!(input.row_width(), 768);
        assert_eq!(input.rows(), 49);
        assert_eq!(input.row(0).map(<[f32]>::len), Some(768));
        assert!(input.row(49).is_none());
    }

    #[test]
    fn scales_into_unit_range_in_bgr_order() {
        let input = preprocess(&solid_png(8, 8, [255, 0, 51]), 768).expect("preprocess");
        let first = &input.values()[..3];
        assert!((first[0] - 0.2).abs() < 1e-6);
        assert!(first[1].abs() < 1e-6);
        assert!((first[2] - 1.0).abs() < 1e-6);
        assert!(input.values().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn is_deterministic() {
        let bytes = solid_png(64, 64, [120, 33, 200]);
        let a = preprocess(&bytes, 768).expect("first");
        let b = preprocess(&bytes, 768).expect("second");
        assert_eq!(a.values(), b.values());
    }

    #[test]
    fn corrupt_bytes_are_a_decode_error() {
        let err = preprocess(b"definitely not an image", 768).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
    }

    #[test]
    fn rejects_incompatible_width() {
        let err = preprocess(&solid_png(4, 4, [0, 0, 0]), 1000).unwrap_err();
        assert!(matches!(err, PreprocessError::IncompatibleWidth { width: 1000 }));
        assert!(validate_row_width(0).is_err());
        assert!(validate_row_width(FLAT_LEN).is_ok());
    }
}
