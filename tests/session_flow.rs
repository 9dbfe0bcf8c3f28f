use std::{cell::RefCell, rc::Rc};

use handcheck::{
    hand::{
        fingers::{classify, Finger, FingerExtension},
        landmark::{HandLandmarks, Handedness},
    },
    image::{Image, Resolution},
    landmark::Landmarker,
    schedule::{ManualScheduler, ScheduleOp},
    session::{Session, SessionEvent, SessionOptions, StartOutcome},
    verify::Step,
    video::{Camera, CameraError, CameraProvider},
};

/// An upright right hand; `extended` selects the straight fingers, everything else is curled.
fn hand(extended: &[Finger]) -> HandLandmarks {
    let mut points = vec![[0.5, 0.9], [0.42, 0.82], [0.36, 0.74]];
    if extended.contains(&Finger::Thumb) {
        points.extend([[0.31, 0.68], [0.25, 0.62]]);
    } else {
        points.extend([[0.40, 0.72], [0.48, 0.72]]);
    }
    for (finger, x) in [
        (Finger::Index, 0.45),
        (Finger::Middle, 0.5),
        (Finger::Ring, 0.55),
        (Finger::Pinky, 0.6),
    ] {
        points.push([x, 0.6]);
        if extended.contains(&finger) {
            points.extend([[x, 0.5], [x, 0.42], [x, 0.35]]);
        } else {
            points.extend([[x, 0.52], [x, 0.58], [x, 0.62]]);
        }
    }
    HandLandmarks::from_points(&points)
        .unwrap()
        .with_handedness(Handedness::Right)
}

struct StillCamera;

impl Camera for StillCamera {
    fn read(&mut self) -> anyhow::Result<Option<Image>> {
        let mut image = Image::new(32, 24);
        image.fill([200, 180, 160, 255]);
        Ok(Some(image))
    }

    fn resolution(&self) -> Resolution {
        Resolution::new(32, 24)
    }

    fn stop(&mut self) {}
}

struct Cameras;

impl CameraProvider for Cameras {
    fn open(&mut self) -> Result<Box<dyn Camera>, CameraError> {
        Ok(Box::new(StillCamera))
    }
}

struct NoCamera;

impl CameraProvider for NoCamera {
    fn open(&mut self) -> Result<Box<dyn Camera>, CameraError> {
        Err(CameraError::DeviceUnavailable)
    }
}

/// Reports whatever hand the test put in front of the camera.
struct Mirror(Rc<RefCell<Option<HandLandmarks>>>);

impl Landmarker for Mirror {
    fn detect(&mut self, _frame: &Image) -> anyhow::Result<Option<HandLandmarks>> {
        Ok(self.0.borrow().clone())
    }
}

fn session() -> (Session<ManualScheduler>, Rc<RefCell<Option<HandLandmarks>>>) {
    let in_view = Rc::new(RefCell::new(None));
    let session = Session::new(ManualScheduler::new(), Cameras, SessionOptions::default())
        .with_landmarker({
            let in_view = in_view.clone();
            move || -> anyhow::Result<Box<dyn Landmarker>> {
                Ok(Box::new(Mirror(in_view.clone())))
            }
        });
    (session, in_view)
}

fn run_frame(session: &mut Session<ManualScheduler>) {
    let handle = session.scheduler_mut().take_frame().unwrap();
    session.on_frame(handle);
}

#[test]
fn classify_synthetic_hands() {
    assert_eq!(classify(&hand(&[])), FingerExtension::NONE);
    assert_eq!(
        classify(&hand(&[Finger::Index, Finger::Middle])),
        FingerExtension::from_fingers([Finger::Index, Finger::Middle])
    );
    assert_eq!(classify(&hand(&Finger::ALL)).count(), 5);
}

#[test]
fn gesture_gated_capture() {
    let (mut session, in_view) = session();
    assert!(matches!(
        session.start(),
        StartOutcome::Started { gesture: true }
    ));

    // Holding the same pose for many frames only advances once.
    *in_view.borrow_mut() = Some(hand(&[Finger::Index, Finger::Middle, Finger::Ring]));
    for _ in 0..5 {
        run_frame(&mut session);
    }
    assert_eq!(session.step(), Step::AwaitingTwoFingers);
    assert_eq!(session.detected_fingers(), Some(3));

    *in_view.borrow_mut() = None;
    run_frame(&mut session);
    assert_eq!(session.detected_fingers(), None);

    *in_view.borrow_mut() = Some(hand(&[Finger::Index, Finger::Middle]));
    run_frame(&mut session);
    *in_view.borrow_mut() = Some(hand(&[Finger::Index]));
    run_frame(&mut session);
    assert_eq!(session.step(), Step::Capturing);
    assert!(!session.scheduler().has_pending_frame());

    let mut photos = Vec::new();
    for _ in 0..3 {
        let (handle, _) = session.scheduler().active_intervals()[0];
        session.on_interval(handle);
        for event in session.take_events() {
            if let SessionEvent::Captured(photo) = event {
                photos.push(photo);
            }
        }
    }
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].resolution(), Resolution::new(32, 24));
    assert!(photos[0].to_data_uri().starts_with("data:image/jpeg;base64,"));
    assert!(session.scheduler().active_intervals().is_empty());
}

#[test]
fn close_cancels_pending_callbacks() {
    let (mut session, _in_view) = session();
    session.start();
    run_frame(&mut session);
    let pending = match session.scheduler().ops().last() {
        Some(&ScheduleOp::RequestFrame(handle)) => handle,
        op => panic!("expected a frame request, got {:?}", op),
    };

    session.close();
    session.close();
    assert_eq!(
        session.scheduler().ops().last(),
        Some(&ScheduleOp::CancelFrame(pending))
    );
    assert!(matches!(
        session.take_events()[..],
        [SessionEvent::Cancelled]
    ));
    assert_eq!(session.step(), Step::Idle);
}

#[test]
fn missing_camera_offers_file_picker() {
    let mut session = Session::new(ManualScheduler::new(), NoCamera, SessionOptions::default());
    assert!(matches!(
        session.start(),
        StartOutcome::FallbackToFilePicker {
            reason: Some(CameraError::DeviceUnavailable)
        }
    ));
    assert!(!session.is_open());
}
