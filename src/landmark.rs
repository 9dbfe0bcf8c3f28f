//! Interface to hand landmark engines.
//!
//! Hand landmark detection is delegated to a third-party engine (typically a neural network).
//! Such an engine is wrapped in a [`Landmarker`], which the capture session creates through a
//! [`LandmarkerFactory`] when a session starts and drops when it ends. There is no global engine
//! instance, so a failed initialization in one session cannot leak into the next.

use std::time::{Duration, Instant};

use crate::hand::fingers::{FingerClassifier, FingerExtension};
use crate::hand::landmark::HandLandmarks;
use crate::image::Image;
use crate::timer::Timer;

/// Initialization state reported by [`Landmarker::poll_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The engine is still loading (eg. downloading or compiling its model).
    Loading,
    /// The engine can process frames.
    Ready,
}

/// A hand landmark engine.
pub trait Landmarker {
    /// Polls the initialization state of the engine.
    ///
    /// Called once per frame until it returns [`Readiness::Ready`]. An error means the engine
    /// failed to initialize and will never become ready.
    fn poll_ready(&mut self) -> anyhow::Result<Readiness> {
        Ok(Readiness::Ready)
    }

    /// Detects a hand in `frame`.
    ///
    /// Returns `Ok(None)` if no hand is visible. If several hands are visible, the engine should
    /// return the most confident one.
    fn detect(&mut self, frame: &Image) -> anyhow::Result<Option<HandLandmarks>>;

    /// Releases the resources held by the engine.
    ///
    /// Called exactly once, before the landmarker is dropped.
    fn close(&mut self) {}
}

/// Creates a fresh [`Landmarker`] for every gesture-verified capture session.
pub type LandmarkerFactory = Box<dyn Fn() -> anyhow::Result<Box<dyn Landmarker>>>;

const DETECTION_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Runs a [`Landmarker`] and a [`FingerClassifier`] on camera frames.
pub struct HandEstimator {
    landmarker: Box<dyn Landmarker>,
    classifier: FingerClassifier,
    closed: bool,
    last_log: Option<Instant>,
    t_detect: Timer,
    t_classify: Timer,
}

impl HandEstimator {
    pub fn new(landmarker: Box<dyn Landmarker>, classifier: FingerClassifier) -> Self {
        Self {
            landmarker,
            classifier,
            closed: false,
            last_log: None,
            t_detect: Timer::new("detect"),
            t_classify: Timer::new("classify"),
        }
    }

    /// Polls the landmarker's initialization state.
    pub fn poll_ready(&mut self) -> anyhow::Result<Readiness> {
        self.landmarker.poll_ready()
    }

    /// Detects a hand in `frame` and classifies its fingers.
    ///
    /// Returns `Ok(None)` if no hand was detected. Frames with a zero-sized resolution are treated
    /// like frames without a hand.
    pub fn estimate(&mut self, frame: &Image) -> anyhow::Result<Option<FingerExtension>> {
        if frame.resolution().is_empty() {
            log::warn!("skipping frame with invalid dimensions {}", frame.resolution());
            return Ok(None);
        }

        let hand = self.t_detect.time(|| self.landmarker.detect(frame))?;
        let fingers = self
            .t_classify
            .time(|| self.classifier.classify_frame(hand.as_ref()));

        if let Some(fingers) = fingers {
            let now = Instant::now();
            if self
                .last_log
                .map_or(true, |last| now - last >= DETECTION_LOG_INTERVAL)
            {
                log::debug!("hand detected, extended fingers: {}", fingers);
                self.last_log = Some(now);
            }
        }

        Ok(fingers)
    }

    /// Returns profiling timers for detection and classification.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_detect, &self.t_classify].into_iter()
    }

    /// Closes the underlying [`Landmarker`]. Subsequent calls do nothing.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.landmarker.close();
            log::debug!("hand landmarker closed");
        }
    }
}

impl Drop for HandEstimator {
    fn drop(&mut self) {
        self.close();
    }
}
