//! Hand-gesture liveness check for camera photo capture.
//!
//! A capture [`Session`] opens a camera, feeds every displayed frame through a hand
//! [`Landmarker`] and the finger classifier in [`hand::fingers`], and only takes the photo once
//! the user has shown three, then two, then one extended finger(s) in that order. After the last
//! pose is recognized a short countdown runs and the current frame is encoded as a JPEG
//! [`CapturedPhoto`].
//!
//! The hand landmark engine itself is not part of this crate: anything that can turn a frame into
//! 21 normalized hand keypoints can be plugged in through the [`Landmarker`] trait.
//!
//! # Coordinates
//!
//! Landmarks use normalized image coordinates: `(0, 0)` is the top left corner of the frame,
//! `(1, 1)` the bottom right one. Y points *down*, so a finger pointing "up" has a smaller Y
//! coordinate at its tip than at its knuckles.
//!
//! # Environment Variables
//!
//! * `HANDCHECK_WEBCAM_NAME`: Forces the device to use for [`Webcam`]s created without an explicit
//!   device name. If unset, the first device that supports a compatible image format will be used.
//!
//! [`Session`]: session::Session
//! [`Landmarker`]: landmark::Landmarker
//! [`CapturedPhoto`]: capture::CapturedPhoto
//! [`Webcam`]: video::webcam::Webcam

use log::LevelFilter;

pub mod capture;
pub mod hand;
pub mod image;
pub mod landmark;
pub mod schedule;
pub mod session;
pub mod timer;
pub mod verify;
pub mod video;

#[cfg(test)]
mod test;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and handcheck will log at *trace*
/// level. Otherwise, they will log at *debug* level. `RUST_LOG` can override both.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
