//! Conversion and export of rendered images for inspection

pub mod io;

pub use io::{f32_to_u8_auto_scale, save_u8_image, u16_to_u8_auto_scale, ImageIoError};
