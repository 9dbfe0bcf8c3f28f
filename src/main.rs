//! Replays a recorded hand landmark trace through a capture session.
//!
//! ```text
//! handcheck <trace.jsonl> [output.jpg]
//! ```
//!
//! Every line of the trace describes one frame: either `null` (no hand visible), or an object like
//! `{"handedness": "Right", "landmarks": [[0.5, 0.9], ...]}` with all 21 landmarks. Frames are
//! taken from the first available webcam, or are blank if there is none.

use std::{
    env, fs,
    path::{Path, PathBuf},
    rc::Rc,
    thread,
};

use anyhow::{bail, Context};
use serde::Deserialize;

use handcheck::{
    capture::CapturedPhoto,
    hand::landmark::{HandLandmarks, Handedness},
    image::{Image, Resolution},
    landmark::Landmarker,
    schedule::ManualScheduler,
    session::{Session, SessionEvent, SessionOptions, StartOutcome},
    timer::FpsCounter,
    video::{
        webcam::{ParamPreference, WebcamOptions},
        Camera, CameraError, CameraProvider,
    },
};

/// Frames to keep going after the trace ends, so that the countdown can complete.
const EXTRA_FRAMES: usize = 10;

#[derive(Deserialize)]
struct TraceFrame {
    #[serde(default)]
    handedness: Option<String>,
    landmarks: Vec<[f32; 2]>,
}

fn load_trace(path: &Path) -> anyhow::Result<Rc<[Option<HandLandmarks>]>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read trace '{}'", path.display()))?;

    let mut frames = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let frame: Option<TraceFrame> =
            serde_json::from_str(line).with_context(|| format!("trace line {}", i + 1))?;
        let hand = match frame {
            Some(frame) => {
                let mut hand = HandLandmarks::from_points(&frame.landmarks)
                    .with_context(|| format!("trace line {}", i + 1))?;
                if let Some(label) = &frame.handedness {
                    hand = hand.with_handedness(label.parse::<Handedness>()?);
                }
                Some(hand)
            }
            None => None,
        };
        frames.push(hand);
    }

    log::info!("loaded {} frames from '{}'", frames.len(), path.display());
    Ok(frames.into())
}

/// Plays back a recorded trace, one entry per frame.
struct TraceLandmarker {
    frames: Rc<[Option<HandLandmarks>]>,
    pos: usize,
}

impl Landmarker for TraceLandmarker {
    fn detect(&mut self, _frame: &Image) -> anyhow::Result<Option<HandLandmarks>> {
        let hand = self.frames.get(self.pos).cloned().flatten();
        self.pos += 1;
        Ok(hand)
    }
}

/// Produces black frames when no webcam is connected.
struct BlankCamera {
    resolution: Resolution,
    stopped: bool,
}

impl Camera for BlankCamera {
    fn read(&mut self) -> anyhow::Result<Option<Image>> {
        if self.stopped {
            return Ok(None);
        }
        let mut image = Image::new(self.resolution.width(), self.resolution.height());
        image.fill([0, 0, 0, 255]);
        Ok(Some(image))
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

struct WebcamOrBlank {
    webcam: WebcamOptions,
}

impl CameraProvider for WebcamOrBlank {
    fn open(&mut self) -> Result<Box<dyn Camera>, CameraError> {
        match self.webcam.open() {
            Ok(camera) => Ok(camera),
            Err(e @ CameraError::PermissionDenied) => Err(e),
            Err(e) => {
                log::warn!("{}, using blank frames", e);
                Ok(Box::new(BlankCamera {
                    resolution: Resolution::new(640, 480),
                    stopped: false,
                }))
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    handcheck::init_logger!();

    let mut args = env::args_os().skip(1);
    let (Some(trace_path), output) = (args.next(), args.next()) else {
        bail!("usage: handcheck <trace.jsonl> [output.jpg]");
    };
    let trace = load_trace(Path::new(&trace_path))?;
    let frame_budget = trace.len() + EXTRA_FRAMES;

    let cameras = WebcamOrBlank {
        webcam: WebcamOptions::default()
            .resolution(Resolution::RES_720P)
            .fps(30)
            .prefer(ParamPreference::Framerate),
    };
    let mut session = Session::new(ManualScheduler::new(), cameras, SessionOptions::default())
        .with_landmarker(move || -> anyhow::Result<Box<dyn Landmarker>> {
            Ok(Box::new(TraceLandmarker {
                frames: trace.clone(),
                pos: 0,
            }))
        });
    session.subscribe(|t| log::info!("{} -> {}: {}", t.from, t.to, t.to.instruction()));

    match session.start() {
        StartOutcome::Started { gesture: true } => {}
        StartOutcome::Started { gesture: false } => bail!("hand landmarker unavailable"),
        StartOutcome::FallbackToFilePicker { reason } => match reason {
            Some(e) => return Err(e).context("cannot replay without a camera"),
            None => bail!("file source selected"),
        },
    }

    let mut fps = FpsCounter::new("replay");
    let mut frames = 0;
    let photo = loop {
        if let Some(photo) = take_photo(&mut session) {
            break Some(photo);
        }

        if let Some(handle) = session.scheduler_mut().take_frame() {
            if frames == frame_budget {
                break None;
            }
            frames += 1;
            session.on_frame(handle);
            fps.tick();
        } else if let Some(&(handle, period)) = session.scheduler().active_intervals().first() {
            if let Some(n) = session.countdown() {
                log::info!("{}...", n);
            }
            thread::sleep(period);
            session.on_interval(handle);
        } else {
            break None;
        }
    };

    let Some(photo) = photo else {
        let step = session.step();
        session.close();
        bail!(
            "gesture sequence not completed after {} frames (stopped in step {})",
            frames,
            step
        );
    };

    let output = output
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(photo.file_name()));
    photo
        .save(&output)
        .with_context(|| format!("failed to write '{}'", output.display()))?;
    log::info!("wrote {} ({} bytes)", output.display(), photo.data().len());

    session.close();
    Ok(())
}

fn take_photo(session: &mut Session<ManualScheduler>) -> Option<CapturedPhoto> {
    session
        .take_events()
        .into_iter()
        .find_map(|event| match event {
            SessionEvent::Captured(photo) => Some(photo),
            event => {
                log::debug!("session event: {:?}", event);
                None
            }
        })
}
