//! Raster input and resampling.
//!
//! [`ImageData`] is the in-memory image handed to the extractors. Anything
//! that can be expressed as interleaved RGB or RGBA bytes is accepted.
//! [`resample`] plays the role of drawing the source onto a fixed-size
//! canvas, and [`resample_f32`] feeds the network without 8-bit rounding.
//! Both delegate the filtering to `image::imageops`.

use ::image::imageops::{self, FilterType};
use ::image::{Rgb, Rgb32FImage, Rgba, RgbaImage};
use imgref::{ImgRef, ImgVec};
use rgb::{RGB8, RGBA8};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Image data accepted by the extractors.
///
/// Supports both `imgref::ImgVec` types and raw slices for flexibility.
#[derive(Debug, Clone)]
pub enum ImageData {
    /// RGB8 image using imgref.
    Rgb8(ImgVec<RGB8>),

    /// RGBA8 image using imgref.
    Rgba8(ImgVec<RGBA8>),

    /// RGB8 raw slice with dimensions.
    RgbSlice {
        /// Pixel data in row-major order.
        data: Vec<u8>,
        /// Image width.
        width: usize,
        /// Image height.
        height: usize,
    },

    /// RGBA8 raw slice with dimensions.
    RgbaSlice {
        /// Pixel data in row-major order.
        data: Vec<u8>,
        /// Image width.
        width: usize,
        /// Image height.
        height: usize,
    },
}

/// Natural size of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
}

impl ImageData {
    /// Create an image filled with a single color.
    #[must_use]
    pub fn solid(width: usize, height: usize, color: RGB8) -> Self {
        Self::Rgb8(ImgVec::new(vec![color; width * height], width, height))
    }

    /// Get image width.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            Self::Rgb8(img) => img.width(),
            Self::Rgba8(img) => img.width(),
            Self::RgbSlice { width, .. } | Self::RgbaSlice { width, .. } => *width,
        }
    }

    /// Get image height.
    #[must_use]
    pub fn height(&self) -> usize {
        match self {
            Self::Rgb8(img) => img.height(),
            Self::Rgba8(img) => img.height(),
            Self::RgbSlice { height, .. } | Self::RgbaSlice { height, .. } => *height,
        }
    }

    /// Natural size of the image.
    #[must_use]
    pub fn size(&self) -> ImageSize {
        ImageSize {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Check that the image has pixels and that raw buffers match their
    /// declared dimensions.
    pub fn validate(&self) -> Result<()> {
        let (width, height) = (self.width(), self.height());
        if width == 0 || height == 0 {
            return Err(Error::InvalidImage(format!(
                "image has zero natural size ({width}x{height})"
            )));
        }

        let (len, channels) = match self {
            Self::Rgb8(_) | Self::Rgba8(_) => return Ok(()),
            Self::RgbSlice { data, .. } => (data.len(), 3),
            Self::RgbaSlice { data, .. } => (data.len(), 4),
        };
        let expected = width * height * channels;
        if len < expected {
            return Err(Error::InvalidImage(format!(
                "buffer holds {len} bytes, {width}x{height}x{channels} needs {expected}"
            )));
        }
        Ok(())
    }

    /// Convert to an RGBA8 image. Missing alpha is filled with 255.
    ///
    /// Call [`ImageData::validate`] first; a short raw buffer yields an
    /// image padded with transparent black.
    #[must_use]
    pub fn to_rgba8(&self) -> ImgVec<RGBA8> {
        let (width, height) = (self.width(), self.height());
        let pixels: Vec<RGBA8> = match self {
            Self::Rgb8(img) => img.pixels().map(|p| RGBA8::new(p.r, p.g, p.b, 255)).collect(),
            Self::Rgba8(img) => img.pixels().collect(),
            Self::RgbSlice { data, .. } => data
                .chunks_exact(3)
                .take(width * height)
                .map(|c| RGBA8::new(c[0], c[1], c[2], 255))
                .collect(),
            Self::RgbaSlice { data, .. } => data
                .chunks_exact(4)
                .take(width * height)
                .map(|c| RGBA8::new(c[0], c[1], c[2], c[3]))
                .collect(),
        };

        let mut pixels = pixels;
        pixels.resize(width * height, RGBA8::new(0, 0, 0, 0));
        ImgVec::new(pixels, width, height)
    }
}

/// Resample an image onto a `width` x `height` canvas.
///
/// Uses a triangle (bilinear) filter from `image::imageops`, rounded back
/// to 8 bits. Same-size input is copied as is.
#[must_use]
pub fn resample(src: ImgRef<'_, RGBA8>, width: usize, height: usize) -> ImgVec<RGBA8> {
    if src.width() == width && src.height() == height {
        return ImgVec::new(src.pixels().collect(), width, height);
    }
    if src.width() == 0 || src.height() == 0 || width == 0 || height == 0 {
        return ImgVec::new(vec![RGBA8::new(0, 0, 0, 0); width * height], width, height);
    }

    let resized = imageops::resize(&to_rgba_image(src), width as u32, height as u32, FilterType::Triangle);
    let pixels = resized
        .pixels()
        .map(|&Rgba([r, g, b, a])| RGBA8::new(r, g, b, a))
        .collect();
    ImgVec::new(pixels, width, height)
}

/// Resample onto a `width` x `height` canvas keeping full float precision.
///
/// Channels are returned as RGB in `[0, 1]`, row-major and interleaved.
#[must_use]
pub fn resample_f32(src: ImgRef<'_, RGBA8>, width: usize, height: usize) -> Vec<f32> {
    if src.width() == 0 || src.height() == 0 || width == 0 || height == 0 {
        return vec![0.0; width * height * 3];
    }

    let buf = src.buf();
    let stride = src.stride();
    let float = Rgb32FImage::from_fn(src.width() as u32, src.height() as u32, |x, y| {
        let p = buf[y as usize * stride + x as usize];
        Rgb([p.r, p.g, p.b].map(|c| f32::from(c) / 255.0))
    });

    if src.width() == width && src.height() == height {
        return float.into_raw();
    }
    imageops::resize(&float, width as u32, height as u32, FilterType::Triangle).into_raw()
}

fn to_rgba_image(src: ImgRef<'_, RGBA8>) -> RgbaImage {
    let buf = src.buf();
    let stride = src.stride();
    RgbaImage::from_fn(src.width() as u32, src.height() as u32, |x, y| {
        let p = buf[y as usize * stride + x as usize];
        Rgba([p.r, p.g, p.b, p.a])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_data_dimensions() {
        let img = ImageData::RgbSlice {
            data: vec![0; 100 * 50 * 3],
            width: 100,
            height: 50,
        };
        assert_eq!(img.width(), 100);
        assert_eq!(img.height(), 50);
        assert!(img.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_size() {
        let img = ImageData::RgbaSlice {
            data: vec![],
            width: 0,
            height: 10,
        };
        assert!(matches!(img.validate(), Err(Error::InvalidImage(_))));
    }

    #[test]
    fn test_validate_rejects_short_buffer() {
        let img = ImageData::RgbSlice {
            data: vec![0; 10],
            width: 4,
            height: 4,
        };
        assert!(matches!(img.validate(), Err(Error::InvalidImage(_))));
    }

    #[test]
    fn test_to_rgba8_adds_opaque_alpha() {
        let img = ImageData::RgbSlice {
            data: vec![1, 2, 3, 4, 5, 6],
            width: 2,
            height: 1,
        };
        let rgba = img.to_rgba8();
        assert_eq!(rgba.buf(), &[RGBA8::new(1, 2, 3, 255), RGBA8::new(4, 5, 6, 255)]);
    }

    #[test]
    fn test_resample_uniform_stays_uniform() {
        let color = RGBA8::new(200, 17, 93, 255);
        let src = ImgVec::new(vec![color; 37 * 211], 37, 211);
        let out = resample(src.as_ref(), 64, 64);
        assert_eq!(out.width(), 64);
        assert_eq!(out.height(), 64);
        assert!(out.pixels().all(|p| p == color));
    }

    #[test]
    fn test_resample_identity() {
        let pixels: Vec<RGBA8> = (0..16u8).map(|i| RGBA8::new(i, i, i, 255)).collect();
        let src = ImgVec::new(pixels.clone(), 4, 4);
        let out = resample(src.as_ref(), 4, 4);
        assert_eq!(out.buf(), &pixels[..]);
    }

    #[test]
    fn test_resample_f32_keeps_precision() {
        // 1x2 -> 1x1 blends 0 and 1 into a value no 8-bit channel can hold
        let src = ImgVec::new(vec![RGBA8::new(0, 0, 0, 255), RGBA8::new(1, 1, 1, 255)], 1, 2);
        let out = resample_f32(src.as_ref(), 1, 1);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 0.5 / 255.0).abs() < 1e-6, "{out:?}");
    }

    #[test]
    fn test_resample_f32_uniform() {
        let src = ImgVec::new(vec![RGBA8::new(255, 0, 51, 255); 10 * 7], 10, 7);
        let out = resample_f32(src.as_ref(), 224, 224);
        assert_eq!(out.len(), 224 * 224 * 3);
        for px in out.chunks_exact(3) {
            assert!((px[0] - 1.0).abs() < 1e-5 && px[1].abs() < 1e-5 && (px[2] - 0.2).abs() < 1e-5);
        }
    }

    #[test]
    fn test_resample_downscale_averages_pairs() {
        // 2x1 -> 1x1 samples the midpoint between the two pixels
        let src = ImgVec::new(vec![RGBA8::new(0, 0, 0, 255), RGBA8::new(100, 200, 50, 255)], 2, 1);
        let out = resample(src.as_ref(), 1, 1);
        assert_eq!(out.buf()[0], RGBA8::new(50, 100, 25, 255));
    }
}
