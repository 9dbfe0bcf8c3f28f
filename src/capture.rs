//! Countdown and still-photo capture.

use std::{
    io,
    path::Path,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

use crate::image::{Image, ImageFormat, Resolution, DEFAULT_JPEG_QUALITY};

/// Number of countdown ticks between successful verification and capture.
pub const DEFAULT_COUNTDOWN: u32 = 3;

/// Time between two countdown ticks.
pub const COUNTDOWN_INTERVAL: Duration = Duration::from_secs(1);

/// Result of [`Countdown::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    /// The countdown is still running, with this many ticks left.
    Remaining(u32),
    /// The countdown reached zero; the photo should be taken now.
    Elapsed,
}

/// A countdown decremented once per interval tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
}

impl Countdown {
    pub fn new(from: u32) -> Self {
        Self { remaining: from }
    }

    #[inline]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Decrements the counter.
    ///
    /// Ticking an elapsed countdown keeps returning [`CountdownTick::Elapsed`].
    pub fn tick(&mut self) -> CountdownTick {
        self.remaining = self.remaining.saturating_sub(1);
        match self.remaining {
            0 => CountdownTick::Elapsed,
            n => CountdownTick::Remaining(n),
        }
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(DEFAULT_COUNTDOWN)
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera has no frame available yet")]
    FrameNotReady,

    #[error("failed to read camera frame: {0}")]
    Camera(#[source] anyhow::Error),

    #[error("failed to encode photo: {0}")]
    Encode(#[source] anyhow::Error),

    #[error("failed to read photo: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported photo file: {0}")]
    Unsupported(#[source] anyhow::Error),

    #[error("manual capture is not allowed while gesture verification is required")]
    GestureRequired,

    #[error("capture session is not open")]
    SessionClosed,
}

/// A captured still photo, ready to be attached to an application.
#[derive(Clone)]
pub struct CapturedPhoto {
    file_name: String,
    mime: &'static str,
    data: Vec<u8>,
    resolution: Resolution,
}

impl CapturedPhoto {
    /// Encodes a camera frame as a JPEG photo named `photo-<unix millis>.jpg`.
    pub fn from_frame(frame: &Image) -> Result<Self, CaptureError> {
        if frame.resolution().is_empty() {
            return Err(CaptureError::FrameNotReady);
        }

        let data = frame
            .encode_jpeg(DEFAULT_JPEG_QUALITY)
            .map_err(CaptureError::Encode)?;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);

        Ok(Self {
            file_name: format!("photo-{millis}.jpg"),
            mime: ImageFormat::Jpeg.mime_type(),
            data,
            resolution: frame.resolution(),
        })
    }

    /// Wraps a photo picked from the file system.
    ///
    /// The file is decoded once to validate it; its bytes are kept as-is.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();
        let format = ImageFormat::from_path(path).map_err(CaptureError::Unsupported)?;
        let data = std::fs::read(path)?;
        let image = Image::decode(&data, format).map_err(CaptureError::Unsupported)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".into());

        Ok(Self {
            file_name,
            mime: format.mime_type(),
            data,
            resolution: image.resolution(),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime
    }

    /// The encoded image file.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    /// Renders the photo as a `data:` URI, eg. `data:image/jpeg;base64,/9j/4AAQ...`.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.to_base64())
    }

    /// Writes the encoded image to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        std::fs::write(path, &self.data)
    }
}

impl std::fmt::Debug for CapturedPhoto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedPhoto")
            .field("file_name", &self.file_name)
            .field("mime", &self.mime)
            .field("bytes", &self.data.len())
            .field("resolution", &self.resolution)
            .finish()
    }
}
