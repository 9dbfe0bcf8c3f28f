//! Capture sessions.
//!
//! A [`Session`] ties everything together: it opens the camera, creates a hand [`Landmarker`],
//! runs every frame through the [`GestureVerifier`], counts down once all poses were shown and
//! finally captures the photo. All work happens inside the host callbacks [`Session::on_frame`]
//! and [`Session::on_interval`]; the session never blocks waiting for anything.
//!
//! Results are reported as [`SessionEvent`]s, collected with [`Session::take_events`].
//!
//! Closing a session releases its resources in a fixed order: the pending frame callback, the
//! countdown interval, the landmarker, and finally the camera stream. Callbacks that were already
//! dispatched by the host when the session closed are ignored.


use std::{collections::VecDeque, time::Duration};

use itertools::Itertools;

use crate::capture::{
    CaptureError, CapturedPhoto, Countdown, CountdownTick, COUNTDOWN_INTERVAL, DEFAULT_COUNTDOWN,
};
use crate::hand::fingers::{ClassifierParams, FingerClassifier, FingerExtension};
use crate::landmark::{HandEstimator, Landmarker, LandmarkerFactory, Readiness};
use crate::schedule::{FrameHandle, IntervalHandle, Scheduler};
use crate::verify::{GestureVerifier, Step, Transition};
use crate::video::{Camera, CameraError, CameraProvider};

/// Where the photo should come from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSource {
    /// Take the photo with the camera.
    #[default]
    Camera,
    /// Let the user pick an existing image file.
    File,
}

/// Capture session configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    source: PhotoSource,
    require_gesture: bool,
    countdown_from: u32,
    countdown_interval: Duration,
    init_timeout_frames: Option<u32>,
    classifier: ClassifierParams,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            source: PhotoSource::Camera,
            require_gesture: true,
            countdown_from: DEFAULT_COUNTDOWN,
            countdown_interval: COUNTDOWN_INTERVAL,
            init_timeout_frames: None,
            classifier: ClassifierParams::default(),
        }
    }
}

impl SessionOptions {
    /// Selects where the photo should come from.
    ///
    /// With [`PhotoSource::File`], [`Session::start`] does not open the camera and returns
    /// [`StartOutcome::FallbackToFilePicker`].
    #[inline]
    pub fn source(mut self, source: PhotoSource) -> Self {
        self.source = source;
        self
    }

    /// Sets whether the gesture sequence has to be completed before a photo is taken.
    ///
    /// Enabled by default. When disabled, no landmarker is created and the photo is taken with
    /// [`Session::capture_now`].
    #[inline]
    pub fn require_gesture(mut self, require: bool) -> Self {
        self.require_gesture = require;
        self
    }

    /// Sets the number of countdown ticks between verification and capture.
    ///
    /// A value of 0 captures immediately after the last pose was recognized.
    #[inline]
    pub fn countdown_from(mut self, ticks: u32) -> Self {
        self.countdown_from = ticks;
        self
    }

    /// Sets the time between two countdown ticks.
    #[inline]
    pub fn countdown_interval(mut self, interval: Duration) -> Self {
        self.countdown_interval = interval;
        self
    }

    /// Gives up on the landmarker if it is not ready after this many frames.
    ///
    /// By default, the session waits indefinitely. After a timeout, the session falls back to
    /// manual capture and emits [`SessionEvent::GestureUnavailable`].
    #[inline]
    pub fn init_timeout_frames(mut self, frames: u32) -> Self {
        self.init_timeout_frames = Some(frames);
        self
    }

    /// Overrides the finger classification thresholds.
    #[inline]
    pub fn classifier(mut self, params: ClassifierParams) -> Self {
        self.classifier = params;
        self
    }
}

/// Result of [`Session::start`].
#[derive(Debug)]
pub enum StartOutcome {
    /// The camera is streaming.
    Started {
        /// Whether the gesture sequence is being verified. If `false`, the photo has to be taken
        /// with [`Session::capture_now`].
        gesture: bool,
    },
    /// The camera could not be used; the host should offer picking a file instead.
    FallbackToFilePicker {
        /// `None` if the file source was selected explicitly.
        reason: Option<CameraError>,
    },
}

/// Something the host needs to react to.
#[derive(Debug)]
pub enum SessionEvent {
    /// A photo was taken. Emitted at most once per session.
    Captured(CapturedPhoto),
    /// The session was closed before a photo was taken.
    Cancelled,
    /// The landmarker failed to load. The session continues in manual capture mode.
    GestureUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Open,
    /// A photo was captured and the resources are released, but [`Session::close`] has not been
    /// called yet.
    Finished,
}

/// A gesture-verified photo capture session.
pub struct Session<S: Scheduler> {
    scheduler: S,
    cameras: Box<dyn CameraProvider>,
    landmarkers: Option<LandmarkerFactory>,
    options: SessionOptions,

    phase: Phase,
    camera: Option<Box<dyn Camera>>,
    estimator: Option<HandEstimator>,
    verifier: GestureVerifier,
    countdown: Option<Countdown>,
    frame: Option<FrameHandle>,
    interval: Option<IntervalHandle>,
    init_frames: u32,
    detected: Option<usize>,
    events: VecDeque<SessionEvent>,
}

impl<S: Scheduler> Session<S> {
    /// Creates a closed session.
    ///
    /// Without a landmarker (see [`Session::with_landmarker`]), gesture verification is not
    /// available and photos are taken manually.
    pub fn new<C: CameraProvider + 'static>(
        scheduler: S,
        cameras: C,
        options: SessionOptions,
    ) -> Self {
        Self {
            scheduler,
            cameras: Box::new(cameras),
            landmarkers: None,
            options,
            phase: Phase::Closed,
            camera: None,
            estimator: None,
            verifier: GestureVerifier::new(),
            countdown: None,
            frame: None,
            interval: None,
            init_frames: 0,
            detected: None,
            events: VecDeque::new(),
        }
    }

    /// Sets the factory that creates a new [`Landmarker`] every time the session starts.
    pub fn with_landmarker<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn Landmarker>> + 'static,
    {
        self.landmarkers = Some(Box::new(factory));
        self
    }

    /// Opens the camera and, if gesture verification is required, the landmarker.
    ///
    /// Camera failures are not fatal: they result in [`StartOutcome::FallbackToFilePicker`].
    /// Starting a session that is already open does nothing.
    pub fn start(&mut self) -> StartOutcome {
        if self.phase == Phase::Open {
            log::warn!("capture session is already open");
            return StartOutcome::Started {
                gesture: self.estimator.is_some(),
            };
        }

        self.verifier.reset();
        self.phase = Phase::Closed;
        self.init_frames = 0;
        self.detected = None;

        if self.options.source == PhotoSource::File {
            log::debug!("file source selected, not opening camera");
            return StartOutcome::FallbackToFilePicker { reason: None };
        }

        let camera = match self.cameras.open() {
            Ok(camera) => camera,
            Err(e) => {
                log::warn!("camera unavailable, falling back to file picker: {}", e);
                return StartOutcome::FallbackToFilePicker { reason: Some(e) };
            }
        };
        log::info!("camera opened at {}", camera.resolution());
        self.camera = Some(camera);
        self.phase = Phase::Open;

        if !self.options.require_gesture {
            log::info!("gesture verification disabled, waiting for manual capture");
            return StartOutcome::Started { gesture: false };
        }

        let landmarker = match &self.landmarkers {
            Some(factory) => factory(),
            None => Err(anyhow::anyhow!("no hand landmarker configured")),
        };
        match landmarker {
            Ok(landmarker) => {
                let classifier = FingerClassifier::new(self.options.classifier);
                self.estimator = Some(HandEstimator::new(landmarker, classifier));
                self.frame = Some(self.scheduler.request_frame());
                StartOutcome::Started { gesture: true }
            }
            Err(e) => {
                log::warn!("failed to create hand landmarker: {:#}", e);
                self.gesture_unavailable();
                StartOutcome::Started { gesture: false }
            }
        }
    }

    /// Frame callback requested through [`Scheduler::request_frame`].
    pub fn on_frame(&mut self, handle: FrameHandle) {
        if self.phase != Phase::Open || self.frame != Some(handle) {
            log::trace!("ignoring stale frame callback {:?}", handle);
            return;
        }
        self.frame = None;

        let Some(estimator) = &mut self.estimator else {
            return;
        };

        if self.verifier.step() == Step::Idle {
            match estimator.poll_ready() {
                Ok(Readiness::Ready) => {
                    log::info!("hand landmarker ready after {} frames", self.init_frames);
                    self.verifier.ready();
                }
                Ok(Readiness::Loading) => {
                    self.init_frames += 1;
                    if self
                        .options
                        .init_timeout_frames
                        .map_or(false, |limit| self.init_frames >= limit)
                    {
                        log::warn!(
                            "hand landmarker not ready after {} frames, giving up",
                            self.init_frames
                        );
                        self.gesture_unavailable();
                    } else {
                        self.frame = Some(self.scheduler.request_frame());
                    }
                    return;
                }
                Err(e) => {
                    log::warn!("hand landmarker failed to initialize: {:#}", e);
                    self.gesture_unavailable();
                    return;
                }
            }
        }

        if !self.verifier.step().is_awaiting() {
            return;
        }

        let fingers = self.classify_current_frame();
        self.detected = fingers.map(|fingers| fingers.count());
        if let Some(Transition {
            to: Step::Capturing,
            ..
        }) = self.verifier.observe(fingers)
        {
            self.start_countdown();
        }

        if self.phase == Phase::Open && self.verifier.step().is_awaiting() {
            self.frame = Some(self.scheduler.request_frame());
        }
    }

    /// Interval callback requested through [`Scheduler::set_interval`].
    pub fn on_interval(&mut self, handle: IntervalHandle) {
        if self.phase != Phase::Open || self.interval != Some(handle) {
            log::trace!("ignoring stale interval callback {:?}", handle);
            return;
        }
        let Some(countdown) = &mut self.countdown else {
            return;
        };

        match countdown.tick() {
            CountdownTick::Remaining(n) => log::debug!("capturing in {}", n),
            CountdownTick::Elapsed => self.capture_after_countdown(),
        }
    }

    /// Takes the photo immediately.
    ///
    /// Only allowed when gesture verification is disabled or unavailable.
    pub fn capture_now(&mut self) -> Result<(), CaptureError> {
        if self.phase != Phase::Open {
            return Err(CaptureError::SessionClosed);
        }
        if self.estimator.is_some() {
            return Err(CaptureError::GestureRequired);
        }

        let photo = self.grab()?;
        self.finish(photo);
        Ok(())
    }

    /// Ends the session and releases all resources.
    ///
    /// If no photo was taken, [`SessionEvent::Cancelled`] is emitted. The step returns to
    /// [`Step::Idle`]. Closing a closed session does nothing.
    pub fn close(&mut self) {
        if self.phase == Phase::Open {
            log::info!("capture session cancelled in step {}", self.verifier.step());
            self.verifier.cancel();
            self.release();
            self.events.push_back(SessionEvent::Cancelled);
        }
        self.phase = Phase::Closed;
        self.verifier.reset();
    }

    /// Returns the events emitted since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    #[inline]
    pub fn step(&self) -> Step {
        self.verifier.step()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.phase == Phase::Open
    }

    /// Returns whether photos are currently gated by the gesture sequence.
    #[inline]
    pub fn gesture_enabled(&self) -> bool {
        self.estimator.is_some()
    }

    /// Remaining countdown ticks, while the countdown runs.
    pub fn countdown(&self) -> Option<u32> {
        self.countdown.map(|countdown| countdown.remaining())
    }

    /// Number of extended fingers in the most recently classified frame.
    ///
    /// `None` if no hand was visible.
    pub fn detected_fingers(&self) -> Option<usize> {
        self.detected
    }

    /// Registers a closure that is invoked on every verification step change.
    pub fn subscribe(&mut self, observer: impl FnMut(Transition) + 'static) {
        self.verifier.subscribe(observer);
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    fn classify_current_frame(&mut self) -> Option<FingerExtension> {
        let (Some(camera), Some(estimator)) = (&mut self.camera, &mut self.estimator) else {
            return None;
        };

        let frame = match camera.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::debug!("video not ready, skipping frame");
                return None;
            }
            Err(e) => {
                log::warn!("failed to read camera frame: {:#}", e);
                return None;
            }
        };

        match estimator.estimate(&frame) {
            Ok(fingers) => fingers,
            Err(e) => {
                log::warn!("hand detection failed: {:#}", e);
                None
            }
        }
    }

    fn start_countdown(&mut self) {
        if let Some(handle) = self.frame.take() {
            self.scheduler.cancel_frame(handle);
        }
        if let Some(estimator) = &self.estimator {
            log::debug!("{}", estimator.timers().format(", "));
        }

        self.countdown = Some(Countdown::new(self.options.countdown_from));
        if self.options.countdown_from == 0 {
            self.capture_after_countdown();
            if self.phase != Phase::Open {
                return;
            }
        }

        // Also armed after a failed immediate capture, so that it is retried.
        log::info!("gesture verified, capturing in {}", self.options.countdown_from);
        self.interval = Some(self.scheduler.set_interval(self.options.countdown_interval));
    }

    fn capture_after_countdown(&mut self) {
        match self.grab() {
            Ok(photo) => self.finish(photo),
            // The interval keeps running, so the capture is retried on the next tick.
            Err(e) => log::warn!("capture failed: {}", e),
        }
    }

    fn grab(&mut self) -> Result<CapturedPhoto, CaptureError> {
        let camera = self.camera.as_mut().ok_or(CaptureError::SessionClosed)?;
        let frame = camera
            .read()
            .map_err(CaptureError::Camera)?
            .ok_or(CaptureError::FrameNotReady)?;
        CapturedPhoto::from_frame(&frame)
    }

    fn finish(&mut self, photo: CapturedPhoto) {
        log::info!(
            "captured {} ({}, {} bytes)",
            photo.file_name(),
            photo.resolution(),
            photo.data().len()
        );
        self.verifier.finish();
        self.release();
        self.phase = Phase::Finished;
        self.events.push_back(SessionEvent::Captured(photo));
    }

    fn gesture_unavailable(&mut self) {
        if let Some(handle) = self.frame.take() {
            self.scheduler.cancel_frame(handle);
        }
        if let Some(mut estimator) = self.estimator.take() {
            estimator.close();
        }
        log::info!("falling back to manual capture");
        self.events.push_back(SessionEvent::GestureUnavailable);
    }

    fn release(&mut self) {
        if let Some(handle) = self.frame.take() {
            self.scheduler.cancel_frame(handle);
        }
        if let Some(handle) = self.interval.take() {
            self.scheduler.clear_interval(handle);
        }
        self.countdown = None;
        if let Some(mut estimator) = self.estimator.take() {
            estimator.close();
        }
        if let Some(mut camera) = self.camera.take() {
            camera.stop();
        }
        self.detected = None;
    }
}

impl<S: Scheduler> Drop for Session<S> {
    fn drop(&mut self) {
        self.release();
    }
}
