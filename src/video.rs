//! Camera access.
//!
//! A capture session only needs two things from a camera: the current frame, and a way to stop
//! the stream. [`Camera`] abstracts over that, [`CameraProvider`] over acquiring one.

pub mod webcam;

use std::io;

use thiserror::Error;

use crate::image::{Image, Resolution};

/// Reasons a camera could not be opened.
///
/// All of these are recoverable: the caller is expected to offer picking a photo from a file
/// instead.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera access was denied")]
    PermissionDenied,

    #[error("no usable camera device found")]
    DeviceUnavailable,

    #[error("failed to open camera: {0}")]
    Other(#[from] anyhow::Error),
}

impl CameraError {
    /// Classifies an I/O error raised while enumerating or opening a device.
    pub fn from_io(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::NotFound => Self::DeviceUnavailable,
            _ => Self::Other(error.into()),
        }
    }
}

/// A live camera stream.
///
/// The session that opened a camera owns it exclusively; frames returned by [`Camera::read`] are
/// only borrowed for the duration of a single classification or capture.
pub trait Camera {
    /// Returns the current frame.
    ///
    /// Returns `Ok(None)` if the stream has no decodable frame yet (or has been stopped). Callers
    /// should treat that as transient and try again on the next tick.
    fn read(&mut self) -> anyhow::Result<Option<Image>>;

    /// The resolution of the frames produced by this camera.
    fn resolution(&self) -> Resolution;

    /// Stops all tracks of the stream and releases the device.
    ///
    /// Calling this more than once must be harmless.
    fn stop(&mut self);
}

/// Opens [`Camera`]s.
pub trait CameraProvider {
    fn open(&mut self) -> Result<Box<dyn Camera>, CameraError>;
}
