//! V4L2 webcam access.
//!
//! Currently, only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are
//! supported.

use std::{cmp::Reverse, env, io};

use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, PixelFormat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::image::{Image, Resolution};
use crate::timer::Timer;
use crate::video::{Camera, CameraError, CameraProvider};

/// Indicates whether to prefer a higher resolution or frame rate.
///
/// By default, [`ParamPreference::Resolution`] is used, selecting the maximum resolution at the
/// desired frame rate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParamPreference {
    /// Prefer increased resolution over higher frame rates.
    #[default]
    Resolution,
    /// Prefer higher frame rate over higher image resolution.
    Framerate,
}

#[derive(Debug, Default, Clone, Copy)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Format negotiation options.
///
/// [`WebcamOptions`] also acts as a [`CameraProvider`], opening a new [`Webcam`] with these
/// options for every capture session.
#[derive(Debug, Default, Clone)]
pub struct WebcamOptions {
    name: Option<String>,
    frame: FramePrefs,
    mirror: bool,
}

impl WebcamOptions {
    /// Sets the name of the webcam device to open.
    ///
    /// If no webcam with the given name can be found, opening the webcam will result in an error.
    #[inline]
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the desired image resolution.
    ///
    /// A lower resolution might be selected if the webcam cannot deliver the desired resolution.
    #[inline]
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Sets the desired frame rate.
    ///
    /// A lower frame rate might be selected if the webcam cannot deliver the desired resolution.
    #[inline]
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }

    /// Selects whether to prefer a higher resolution or frame rate.
    #[inline]
    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }

    /// Mirrors every frame horizontally, like a selfie preview.
    ///
    /// Note that this also mirrors the handedness reported by landmark engines.
    #[inline]
    pub fn mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }
}

impl CameraProvider for WebcamOptions {
    fn open(&mut self) -> Result<Box<dyn Camera>, CameraError> {
        Ok(Box::new(Webcam::open(self.clone())?))
    }
}

#[derive(Clone, Copy)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

fn negotiate_format(device: &Device, mut prefs: FramePrefs) -> anyhow::Result<(PixFormat, Fract)> {
    let mut pixel_format = None;
    for format in device.formats(BufType::VIDEO_CAPTURE) {
        let format = format?;
        if format.pixel_format() == PixelFormat::JPEG || format.pixel_format() == PixelFormat::MJPG {
            pixel_format = Some(format.pixel_format());
            break;
        }
    }

    let Some(pixel_format) = pixel_format else {
        bail!("no supported pixel format found");
    };

    let mut formats = Vec::new();
    match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => {
            for size in sizes {
                let intervals =
                    match device.frame_intervals(pixel_format, size.width(), size.height())? {
                        FrameIntervals::Discrete(intervals) => intervals,
                        FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                            bail!("stepwise or continuous frame rates are not supported")
                        }
                    };
                formats.extend(intervals.iter().map(|rate| FrameFormat {
                    resolution: Resolution::new(size.width(), size.height()),
                    frame_interval: *rate.fract(),
                }));
            }
        }
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    }

    // Relax the preferences one at a time, dropping the less important one first.
    loop {
        if let Some(fmt) = pick_format(&formats, prefs) {
            let pix = PixFormat::new(
                fmt.resolution.width(),
                fmt.resolution.height(),
                pixel_format,
            );
            return Ok((pix, fmt.frame_interval));
        }

        log::debug!("no format satisfies {:?}", prefs);
        let relaxed = match prefs.pref {
            ParamPreference::Resolution => {
                prefs.fps.take().is_some() || prefs.resolution.take().is_some()
            }
            ParamPreference::Framerate => {
                prefs.resolution.take().is_some() || prefs.fps.take().is_some()
            }
        };
        if !relaxed {
            break;
        }
    }

    bail!("failed to negotiate a webcam format")
}

fn pick_format(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let mut eligible = formats
        .iter()
        .filter(|fmt| {
            prefs.resolution.map_or(true, |res| {
                fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
            }) && prefs.fps.map_or(true, |fps| {
                (1.0 / fmt.frame_interval.as_f32()).round() >= fps as f32
            })
        })
        .copied()
        .collect::<Vec<_>>();
    match prefs.pref {
        ParamPreference::Resolution => {
            eligible.sort_by_key(|fmt| (fmt.resolution.num_pixels(), Reverse(fmt.frame_interval)))
        }
        ParamPreference::Framerate => {
            eligible.sort_by_key(|fmt| (Reverse(fmt.frame_interval), fmt.resolution.num_pixels()))
        }
    }
    eligible.last().copied()
}

/// A V4L2 webcam.
pub struct Webcam {
    /// `None` once the stream has been stopped.
    stream: Option<ReadStream>,
    resolution: Resolution,
    mirror: bool,
    t_dequeue: Timer,
    t_decode: Timer,
}

const ENV_VAR_WEBCAM_NAME: &str = "HANDCHECK_WEBCAM_NAME";

impl Webcam {
    /// Opens the first supported webcam found.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    ///
    /// If any device could not be opened due to missing permissions and no other device worked,
    /// [`CameraError::PermissionDenied`] is returned.
    pub fn open(options: WebcamOptions) -> Result<Self, CameraError> {
        if let Ok(name) = env::var(ENV_VAR_WEBCAM_NAME) {
            log::debug!(
                "webcam override: `{}` is set to '{}'",
                ENV_VAR_WEBCAM_NAME,
                name,
            );
        }

        let mut denied = false;
        for res in linuxvideo::list().map_err(CameraError::from_io)? {
            match res {
                Ok(dev) => match Self::open_impl(dev, &options) {
                    Ok(Some(webcam)) => return Ok(webcam),
                    Ok(None) => {}
                    Err(e) => {
                        denied |= is_permission_error(&e);
                        log::debug!("{}", e);
                    }
                },
                Err(e) => {
                    denied |= e.kind() == io::ErrorKind::PermissionDenied;
                    log::warn!("{}", e);
                }
            }
        }

        if denied {
            Err(CameraError::PermissionDenied)
        } else {
            Err(CameraError::DeviceUnavailable)
        }
    }

    fn open_impl(dev: Device, options: &WebcamOptions) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        let cam_name_from_env = env::var(ENV_VAR_WEBCAM_NAME).ok();
        if let Some(name) = options.name.as_deref().or(cam_name_from_env.as_deref()) {
            if caps.card() != name {
                return Ok(None);
            }
        }

        let cap_flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            cap_flags,
        );

        if !cap_flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, fract) = negotiate_format(&dev, options.frame)?;
        let capture = dev.video_capture(pixfmt)?;

        let format = capture.format();
        let resolution = Resolution::new(format.width(), format.height());
        let actual = capture.set_frame_interval(fract)?;

        log::info!(
            "opened {} ({}), {} @ {:.1}Hz",
            caps.card(),
            path.display(),
            resolution,
            1.0 / actual.as_f32(),
        );

        let stream = capture.into_stream()?;

        Ok(Some(Self {
            stream: Some(stream),
            resolution,
            mirror: options.mirror,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    /// Returns profiling timers for webcam access and decoding.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_dequeue, &self.t_decode].into_iter()
    }
}

fn is_permission_error(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<io::Error>()
        .map_or(false, |e| e.kind() == io::ErrorKind::PermissionDenied)
}

impl Camera for Webcam {
    /// Reads the next frame from the camera.
    ///
    /// If no frame is available, this method will block until one is. Corrupted frames are
    /// reported as "not ready" so that the caller simply retries on its next tick.
    fn read(&mut self) -> anyhow::Result<Option<Image>> {
        let Some(stream) = &mut self.stream else {
            return Ok(None);
        };

        let dequeue_guard = self.t_dequeue.start();
        let t_decode = &self.t_decode;
        let frame = stream.dequeue(|buf| {
            drop(dequeue_guard);
            // Even good webcams produce the occasional corrupted MJPG frame.
            match t_decode.time(|| Image::decode_jpeg(&buf)) {
                Ok(image) => Ok(Some(image)),
                Err(e) => {
                    log::warn!("webcam decode error: {}", e);
                    Ok(None)
                }
            }
        })?;

        Ok(frame.map(|mut image| {
            if self.mirror {
                image.flip_horizontal_in_place();
            }
            image
        }))
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn stop(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("webcam stream stopped");
        }
    }
}
