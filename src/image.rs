//! Camera frames and still images.
//!
//! [`Image`] is an owned RGBA frame as delivered by a [`Camera`]. It can be decoded from and
//! encoded to JPEG, which is the format captured photos are handed out in.
//!
//! [`Camera`]: crate::video::Camera

mod resolution;

#[cfg(test)]
mod tests;

use std::{fmt, path::Path};

use image::{codecs::jpeg::JpegEncoder, ColorType, DynamicImage, ImageBuffer, RgbaImage};

pub use resolution::*;

/// JPEG quality used when no explicit quality is requested.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("jpg" | "jpeg") => Ok(Self::Jpeg),
            Some("png") => Ok(Self::Png),
            _ => anyhow::bail!(
                "invalid image path '{}' (must have one of the supported extensions)",
                path.display()
            ),
        }
    }

    /// Returns the MIME type of this format.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    fn to_image_crate(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
        }
    }
}

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    buf: RgbaImage,
}

impl Image {
    /// Loads an image from the filesystem.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`).
    pub fn load<A: AsRef<Path>>(path: A) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        let format = ImageFormat::from_path(path)?;
        let data = std::fs::read(path)?;
        Self::decode(&data, format)
    }

    /// Decodes an encoded image from a byte slice.
    pub fn decode(data: &[u8], format: ImageFormat) -> anyhow::Result<Self> {
        let buf = image::load_from_memory_with_format(data, format.to_image_crate())?.to_rgba8();
        Ok(Self { buf })
    }

    /// Decodes a JFIF JPEG or Motion JPEG from a byte slice.
    pub fn decode_jpeg(data: &[u8]) -> anyhow::Result<Self> {
        Self::decode(data, ImageFormat::Jpeg)
    }

    /// Creates an image from raw RGBA8 pixel data.
    ///
    /// # Panics
    ///
    /// Panics if `buf` does not contain exactly `4 * width * height` bytes.
    pub fn from_rgba8(res: Resolution, buf: &[u8]) -> Self {
        let expected_size = res.width() as usize * res.height() as usize * 4;
        assert_eq!(
            expected_size,
            buf.len(),
            "incorrect buffer size {} for {} image (expected {} bytes)",
            buf.len(),
            res,
            expected_size,
        );

        Self {
            buf: ImageBuffer::from_vec(res.width(), res.height(), buf.to_vec())
                .expect("buffer size does not match image resolution"),
        }
    }

    /// Encodes this image as a baseline JPEG.
    ///
    /// JPEG has no alpha channel, so transparency is discarded.
    pub fn encode_jpeg(&self, quality: u8) -> anyhow::Result<Vec<u8>> {
        let rgb = DynamicImage::ImageRgba8(self.buf.clone()).to_rgb8();
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality).encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ColorType::Rgb8,
        )?;
        Ok(out)
    }

    /// Saves an image to the file system.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        match ImageFormat::from_path(path)? {
            ImageFormat::Jpeg => Ok(std::fs::write(path, self.encode_jpeg(DEFAULT_JPEG_QUALITY)?)?),
            ImageFormat::Png => Ok(self.buf.save(path)?),
        }
    }

    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Returns the width of this image, in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    /// Returns the height of this image, in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Returns the size of this image.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Mirrors the image along its vertical axis.
    ///
    /// Front-facing cameras are usually displayed this way.
    pub fn flip_horizontal_in_place(&mut self) {
        image::imageops::flip_horizontal_in_place(&mut self.buf);
    }

    /// Sets every pixel to the given RGBA value.
    pub fn fill(&mut self, rgba: [u8; 4]) {
        self.buf.pixels_mut().for_each(|pix| pix.0 = rgba);
    }

    /// Returns the RGBA value of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn get(&self, x: u32, y: u32) -> [u8; 4] {
        self.buf[(x, y)].0
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} Image", self.width(), self.height())
    }
}
