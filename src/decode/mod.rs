use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use image::{imageops, GrayImage, Rgba, RgbaImage};

/// One captured video frame as an RGBA bitmap.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbaImage,
    captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }

    /// Wrap raw RGBA bytes (4 per pixel, row-major).
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let len = pixels.len();
        let image = RgbaImage::from_raw(width, height, pixels).ok_or_else(|| {
            anyhow!("pixel buffer of {len} bytes does not fit a {width}x{height} RGBA frame")
        })?;
        Ok(Self::new(image))
    }

    /// Opaque black frame.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Grayscale copy; most QR binarizers start from luminance.
    pub fn to_luma(&self) -> GrayImage {
        imageops::grayscale(&self.image)
    }
}

/// Extracts a machine-readable payload from a frame.
///
/// `None` means no code was found, which is the common case and not an
/// error. Implementations run inline on the decode tick and should stay
/// cheap enough for the 100 ms sampling period.
pub trait Decoder: Send + Sync {
    fn decode(&self, frame: &Frame) -> Option<String>;
}

impl<F> Decoder for F
where
    F: Fn(&Frame) -> Option<String> + Send + Sync,
{
    fn decode(&self, frame: &Frame) -> Option<String> {
        self(frame)
    }
}
