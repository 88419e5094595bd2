//! Pixel buffer preparation for `TessBaseAPISetImage`
//!
//! Small images are upscaled to a minimum width before recognition, then
//! every pixel is written as 4 bytes (RGBA) in row-major order.

use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer};
use tracing::{debug, info};

use crate::engine::{EngineError, EngineResult};

/// Bytes per pixel handed to the engine
pub const BYTES_PER_PIXEL: u32 = 4;

/// Width below which images are upscaled
pub const DEFAULT_MIN_WIDTH: u32 = 150;

/// Widest buffer whose row stride still fits the engine's C `int`
pub const MAX_WIDTH: u32 = i32::MAX as u32 / BYTES_PER_PIXEL;

/// Largest buffer (in bytes) the engine's image container can hold
const MAX_BUFFER_BYTES: u64 = i32::MAX as u64;

const OPAQUE: u8 = 255;

/// Decoded image: `width * height` pixels of `channels` samples each
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescriptor {
    width: u32,
    height: u32,
    channels: u8,
    samples: Vec<u8>,
}

impl ImageDescriptor {
    /// Validate and wrap raw row-major samples
    pub fn new(width: u32, height: u32, channels: u8, samples: Vec<u8>) -> EngineResult<Self> {
        if width == 0 || height == 0 {
            return Err(EngineError::InvalidImage(format!(
                "dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        if !(1..=4).contains(&channels) {
            return Err(EngineError::InvalidImage(format!(
                "unsupported channel count {}",
                channels
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if samples.len() != expected {
            return Err(EngineError::InvalidImage(format!(
                "{} samples for a {}x{} image with {} channels, expected {}",
                samples.len(),
                width,
                height,
                channels,
                expected
            )));
        }

        Ok(Self {
            width,
            height,
            channels,
            samples,
        })
    }

    /// Take the samples of a decoded image, keeping its channel layout when
    /// it is 8-bit and converting anything else to RGBA
    pub fn from_dynamic(image: &DynamicImage) -> EngineResult<Self> {
        let (width, height) = (image.width(), image.height());
        match image {
            DynamicImage::ImageLuma8(buf) => Self::new(width, height, 1, buf.as_raw().clone()),
            DynamicImage::ImageLumaA8(buf) => Self::new(width, height, 2, buf.as_raw().clone()),
            DynamicImage::ImageRgb8(buf) => Self::new(width, height, 3, buf.as_raw().clone()),
            DynamicImage::ImageRgba8(buf) => Self::new(width, height, 4, buf.as_raw().clone()),
            other => Self::new(width, height, 4, other.to_rgba8().into_raw()),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    fn to_dynamic(&self) -> EngineResult<DynamicImage> {
        let (w, h, raw) = (self.width, self.height, self.samples.clone());
        let image = match self.channels {
            1 => ImageBuffer::from_raw(w, h, raw).map(DynamicImage::ImageLuma8),
            2 => ImageBuffer::from_raw(w, h, raw).map(DynamicImage::ImageLumaA8),
            3 => ImageBuffer::from_raw(w, h, raw).map(DynamicImage::ImageRgb8),
            4 => ImageBuffer::from_raw(w, h, raw).map(DynamicImage::ImageRgba8),
            _ => None,
        };
        image.ok_or_else(|| {
            EngineError::InvalidImage("sample layout does not match dimensions".into())
        })
    }
}

/// Contiguous RGBA pixels in the layout the engine reads
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl PixelBuffer {
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        BYTES_PER_PIXEL
    }

    /// Row stride in bytes
    pub fn bytes_per_line(&self) -> u32 {
        self.width * BYTES_PER_PIXEL
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Build the engine pixel buffer, upscaling to `min_width` first when the
/// image is narrower
pub fn build(image: &ImageDescriptor, min_width: u32) -> EngineResult<PixelBuffer> {
    if min_width == 0 {
        return Err(EngineError::InvalidImage("minimum width must be positive".into()));
    }

    if image.width >= min_width {
        debug!("Image {}x{} needs no resize", image.width, image.height);
        check_engine_limits(image.width, image.height)?;
        return expand_to_rgba(image);
    }

    let (new_width, new_height) = upscaled_dimensions(image.width, image.height, min_width);
    check_engine_limits(new_width, new_height)?;
    info!(
        "Resizing image from ({}, {}) to ({}, {})",
        image.width, image.height, new_width, new_height
    );

    // Lanczos3 keeps glyph edges smooth; nearest-neighbor aliasing hurts recognition
    let resized = image
        .to_dynamic()?
        .resize_exact(new_width, new_height, FilterType::Lanczos3);
    expand_to_rgba(&ImageDescriptor::from_dynamic(&resized)?)
}

/// Target size for an image narrower than `min_width`, keeping aspect ratio
pub fn upscaled_dimensions(width: u32, height: u32, min_width: u32) -> (u32, u32) {
    let ratio = min_width as f64 / width as f64;
    let new_height = (height as f64 * ratio).round().max(1.0) as u32;
    (min_width, new_height)
}

/// Reject sizes the engine cannot address before any pixel is allocated
fn check_engine_limits(width: u32, height: u32) -> EngineResult<()> {
    if width > MAX_WIDTH {
        return Err(EngineError::InvalidImage(format!(
            "width {} exceeds the engine limit of {} pixels",
            width, MAX_WIDTH
        )));
    }
    let total = u64::from(width) * u64::from(BYTES_PER_PIXEL) * u64::from(height);
    if total > MAX_BUFFER_BYTES {
        return Err(EngineError::InvalidImage(format!(
            "{}x{} image needs {} bytes, more than the engine accepts",
            width, height, total
        )));
    }
    Ok(())
}

/// One pass over the source, keyed by its channel stride
fn expand_to_rgba(image: &ImageDescriptor) -> EngineResult<PixelBuffer> {
    let pixels = image.width as usize * image.height as usize;
    let mut data = vec![OPAQUE; pixels * BYTES_PER_PIXEL as usize];
    let stride = image.channels as usize;

    match stride {
        4 => data.copy_from_slice(&image.samples),
        3 => {
            for (dst, px) in data.chunks_exact_mut(4).zip(image.samples.chunks_exact(3)) {
                dst[..3].copy_from_slice(px);
            }
        }
        2 => {
            for (dst, px) in data.chunks_exact_mut(4).zip(image.samples.chunks_exact(2)) {
                dst[..3].fill(px[0]);
                dst[3] = px[1];
            }
        }
        1 => {
            for (dst, px) in data.chunks_exact_mut(4).zip(image.samples.iter()) {
                dst[..3].fill(*px);
            }
        }
        _ => {
            return Err(EngineError::InvalidImage(format!(
                "unsupported channel count {}",
                stride
            )))
        }
    }

    Ok(PixelBuffer {
        data,
        width: image.width,
        height: image.height,
    })
}
