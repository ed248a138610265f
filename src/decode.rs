//! Decoding of uploaded image files into [`ImageData`].
//!
//! The container is detected from its signature, not from the file name,
//! so renamed uploads still decode. Only PNG and JPEG are accepted; which
//! of them actually decode depends on the `png-decode` / `jpeg-decode`
//! features.
//!
//! # Example
//!
//! ```ignore
//! use image2vec::decode::load_image;
//!
//! let image = load_image("cover.jpg")?;
//! println!("{}x{}", image.width(), image.height());
//! ```

use std::path::Path;

use ::image::DynamicImage;

use crate::error::{Error, Result};
use crate::image::ImageData;

/// Container formats accepted by [`decode_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Portable Network Graphics.
    Png,
    /// JPEG / JFIF.
    Jpeg,
}

impl ImageFormat {
    fn name(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }

    fn container(self) -> ::image::ImageFormat {
        match self {
            Self::Png => ::image::ImageFormat::Png,
            Self::Jpeg => ::image::ImageFormat::Jpeg,
        }
    }
}

/// Identify the container format from the leading bytes.
#[must_use]
pub fn sniff_format(data: &[u8]) -> Option<ImageFormat> {
    match ::image::guess_format(data).ok()? {
        ::image::ImageFormat::Png => Some(ImageFormat::Png),
        ::image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
        _ => None,
    }
}

/// Decode PNG or JPEG bytes.
///
/// Images without alpha become [`ImageData::RgbSlice`], the rest
/// [`ImageData::RgbaSlice`]. Grayscale, palette and 16-bit input are
/// converted to 8-bit RGB(A).
pub fn decode_image(data: &[u8]) -> Result<ImageData> {
    let format = sniff_format(data).ok_or_else(|| Error::Decode {
        format: "unknown".to_string(),
        reason: "not a PNG or JPEG file".to_string(),
    })?;

    let decoded = ::image::load_from_memory_with_format(data, format.container()).map_err(|e| {
        Error::Decode {
            format: format.name().to_string(),
            reason: e.to_string(),
        }
    })?;

    Ok(into_image_data(decoded))
}

/// Read and decode an image file.
pub fn load_image(path: impl AsRef<Path>) -> Result<ImageData> {
    let data = std::fs::read(path.as_ref())?;
    decode_image(&data)
}

fn into_image_data(decoded: DynamicImage) -> ImageData {
    let width = decoded.width() as usize;
    let height = decoded.height() as usize;

    if decoded.color().has_alpha() {
        ImageData::RgbaSlice {
            data: decoded.into_rgba8().into_raw(),
            width,
            height,
        }
    } else {
        ImageData::RgbSlice {
            data: decoded.into_rgb8().into_raw(),
            width,
            height,
        }
    }
}
