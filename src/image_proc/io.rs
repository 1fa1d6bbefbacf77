//! 8-bit export of camera frames and detection images
//!
//! Camera frames carry a sensor bias, so scaling stretches the observed
//! `[min, max]` range onto `[0, 255]` rather than `[0, max]`.

use std::path::Path;

use ndarray::{Array2, ArrayView2};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageIoError {
    #[error("image {width}x{height} does not fit the image encoder")]
    TooLarge { width: usize, height: usize },
    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

/// Save an 8-bit grayscale image; the format follows the file extension.
pub fn save_u8_image<P: AsRef<Path>>(image: &Array2<u8>, path: P) -> Result<(), ImageIoError> {
    use image::{ImageBuffer, Luma};

    let (height, width) = image.dim();
    let too_large = || ImageIoError::TooLarge { width, height };
    let w = u32::try_from(width).map_err(|_| too_large())?;
    let h = u32::try_from(height).map_err(|_| too_large())?;

    let buffer = ImageBuffer::from_fn(w, h, |x, y| Luma([image[[y as usize, x as usize]]]));
    buffer.save(path)?;
    Ok(())
}

fn stretch<I>(values: I, dim: (usize, usize)) -> Array2<u8>
where
    I: Iterator<Item = f64> + Clone,
{
    let (min, max) = values
        .clone()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if max <= min {
        return Array2::zeros(dim);
    }
    let scale = 255.0 / (max - min);
    let data: Vec<u8> = values.map(|v| ((v - min) * scale).round() as u8).collect();
    Array2::from_shape_vec(dim, data).unwrap_or_else(|_| Array2::zeros(dim))
}

/// Stretch raw sensor counts onto the full 8-bit range.
///
/// A flat image (including an all-zero one) maps to black.
pub fn u16_to_u8_auto_scale(image: &Array2<u16>) -> Array2<u8> {
    stretch(image.iter().map(|&v| v as f64), image.dim())
}

/// Stretch a floating-point image, such as a detection slice, onto 8 bits
pub fn f32_to_u8_auto_scale(image: ArrayView2<f32>) -> Array2<u8> {
    stretch(image.iter().map(|&v| v as f64), image.dim())
}
