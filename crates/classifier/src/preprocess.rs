//! Decode, resize and normalize an uploaded image.

use dermassist_core::error::ClassifierError;
use image::imageops::FilterType;

/// A square RGB image with channel values scaled to `[0, 1]`, stored
/// row-major as height × width × 3.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    size: u32,
    data: Vec<f32>,
}

impl ImageTensor {
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Nested `[height][width][channel]` rows, the layout TF Serving takes
    /// for a single instance.
    pub fn to_rows(&self) -> Vec<Vec<[f32; 3]>> {
        let size = self.size as usize;
        self.data
            .chunks_exact(size * 3)
            .map(|row| {
                row.chunks_exact(3)
                    .map(|px| [px[0], px[1], px[2]])
                    .collect()
            })
            .collect()
    }
}

/// Decode `bytes` in any supported format (PNG, JPEG, WebP, BMP) and resize
/// it to `size` × `size`. Alpha is dropped and grayscale is expanded to RGB.
pub fn preprocess(bytes: &[u8], size: u32) -> Result<ImageTensor, ClassifierError> {
    if bytes.is_empty() {
        return Err(ClassifierError::InvalidImage("empty upload".into()));
    }
    if size == 0 {
        return Err(ClassifierError::Unavailable("input size must be positive".into()));
    }

    let decoded =
        image::load_from_memory(bytes).map_err(|e| ClassifierError::InvalidImage(e.to_string()))?;
    let rgb = decoded
        .resize_exact(size, size, FilterType::CatmullRom)
        .to_rgb8();

    let data = rgb
        .into_raw()
        .into_iter()
        .map(|v| f32::from(v) / 255.0)
        .collect();

    Ok(ImageTensor { size, data })
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// Encode a solid-colour PNG.
    pub fn solid_png(width: u32, height: u32, colour: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(colour));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png)
            .expect("png encoding");
        out.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::solid_png;
    use super::*;

    #[test]
    fn resizes_to_square_input() {
        let png = solid_png(40, 25, [255, 0, 51]);
        let tensor = preprocess(&png, 8).unwrap();
        assert_eq!(tensor.size(), 8);
        assert_eq!(tensor.data().len(), 8 * 8 * 3);
    }

    #[test]
    fn scales_channels_to_unit_range() {
        let png = solid_png(4, 4, [255, 0, 51]);
        let tensor = preprocess(&png, 4).unwrap();
        let px = &tensor.data()[..3];
        assert!((px[0] - 1.0).abs() < 1e-6);
        assert!(px[1].abs() < 1e-6);
        assert!((px[2] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn rows_follow_height_width_channel_layout() {
        let png = solid_png(3, 3, [0, 255, 0]);
        let rows = preprocess(&png, 2).unwrap().to_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[1][1], [0.0, 1.0, 0.0]);
    }

    #[test]
    fn garbage_bytes_are_an_input_error() {
        let err = preprocess(b"definitely not an image", 224).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn empty_bytes_are_an_input_error() {
        assert!(preprocess(&[], 224).unwrap_err().is_input_error());
    }
}
