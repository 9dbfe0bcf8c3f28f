//! The three-step gesture verification sequence.
//!
//! [`GestureVerifier`] requires the user to show three, two and then one extended finger(s), in
//! that order, before a photo may be taken. It is a plain state object: it is fed the per-frame
//! [`FingerExtension`] and reports every [`Transition`] to its observers, but it does not know
//! anything about cameras or timers.

use std::fmt;

use crate::hand::fingers::{Finger, FingerExtension};

/// The current stage of the verification sequence.
///
/// Steps are ordered: while a session is open, the step never decreases.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    /// Waiting for the landmark engine to become ready.
    #[default]
    Idle,
    AwaitingThreeFingers,
    AwaitingTwoFingers,
    AwaitingOneFinger,
    /// All poses were recognized; the capture countdown is running.
    Capturing,
    /// The photo was taken.
    Done,
    /// The user aborted the session.
    Cancelled,
}

impl Step {
    /// The pose that advances past this step, if this is an `Awaiting*` step.
    pub fn required_pose(self) -> Option<Pose> {
        match self {
            Step::AwaitingThreeFingers => Some(Pose::ThreeFingers),
            Step::AwaitingTwoFingers => Some(Pose::TwoFingers),
            Step::AwaitingOneFinger => Some(Pose::OneFinger),
            _ => None,
        }
    }

    #[inline]
    pub fn is_awaiting(self) -> bool {
        self.required_pose().is_some()
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Step::Done | Step::Cancelled)
    }

    /// 1-based index of an `Awaiting*` step, as shown to the user ("Step 2 of 3").
    pub fn number(self) -> Option<u8> {
        match self {
            Step::AwaitingThreeFingers => Some(1),
            Step::AwaitingTwoFingers => Some(2),
            Step::AwaitingOneFinger => Some(3),
            _ => None,
        }
    }

    /// The prompt to display to the user while in this step.
    pub fn instruction(self) -> &'static str {
        match self {
            Step::Idle => "Loading hand detection...",
            Step::AwaitingThreeFingers => "Show 3 fingers (index, middle and ring)",
            Step::AwaitingTwoFingers => "Show 2 fingers (index and middle)",
            Step::AwaitingOneFinger => "Show 1 finger (index only)",
            Step::Capturing => "Verified! Hold still...",
            Step::Done => "Photo captured",
            Step::Cancelled => "Verification cancelled",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A required finger combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pose {
    /// Index, middle and ring finger; thumb and pinky curled.
    ThreeFingers,
    /// Index and middle finger.
    TwoFingers,
    /// Index finger only.
    OneFinger,
}

impl Pose {
    /// Returns the exact finger combination of this pose.
    pub fn expected(self) -> FingerExtension {
        match self {
            Pose::ThreeFingers => {
                FingerExtension::from_fingers([Finger::Index, Finger::Middle, Finger::Ring])
            }
            Pose::TwoFingers => FingerExtension::from_fingers([Finger::Index, Finger::Middle]),
            Pose::OneFinger => FingerExtension::from_fingers([Finger::Index]),
        }
    }

    /// Returns whether `fingers` is exactly this pose (no extra fingers, none missing).
    #[inline]
    pub fn matches(self, fingers: &FingerExtension) -> bool {
        *fingers == self.expected()
    }
}

/// A change of [`Step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Step,
    pub to: Step,
}

/// Sequences the required poses.
pub struct GestureVerifier {
    step: Step,
    observers: Vec<Box<dyn FnMut(Transition)>>,
}

impl Default for GestureVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureVerifier {
    pub fn new() -> Self {
        Self {
            step: Step::Idle,
            observers: Vec::new(),
        }
    }

    #[inline]
    pub fn step(&self) -> Step {
        self.step
    }

    /// Registers a closure that is invoked on every step change.
    pub fn subscribe(&mut self, observer: impl FnMut(Transition) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Signals that the landmark engine is ready, starting the sequence.
    ///
    /// Does nothing unless the verifier is [`Step::Idle`].
    pub fn ready(&mut self) -> Option<Transition> {
        if self.step == Step::Idle {
            self.transition(Step::AwaitingThreeFingers)
        } else {
            None
        }
    }

    /// Feeds the classification result of one frame.
    ///
    /// `None` means no hand was visible in the frame. A pose that does not match the current step
    /// (including the pose of a *later* step) is ignored. A match advances exactly one step.
    pub fn observe(&mut self, fingers: Option<FingerExtension>) -> Option<Transition> {
        let pose = self.step.required_pose()?;
        let fingers = fingers?;
        if !pose.matches(&fingers) {
            log::trace!("{}: {} does not match {:?}", self.step, fingers, pose);
            return None;
        }

        let next = match self.step {
            Step::AwaitingThreeFingers => Step::AwaitingTwoFingers,
            Step::AwaitingTwoFingers => Step::AwaitingOneFinger,
            _ => Step::Capturing,
        };
        self.transition(next)
    }

    /// Marks the photo as taken. Does nothing unless the verifier is [`Step::Capturing`].
    pub fn finish(&mut self) -> Option<Transition> {
        if self.step == Step::Capturing {
            self.transition(Step::Done)
        } else {
            None
        }
    }

    /// Aborts the sequence.
    ///
    /// Valid from every step except [`Step::Done`] (and [`Step::Cancelled`] itself).
    pub fn cancel(&mut self) -> Option<Transition> {
        if self.step.is_terminal() {
            None
        } else {
            self.transition(Step::Cancelled)
        }
    }

    /// Returns to [`Step::Idle`] so that a new session can start over.
    pub fn reset(&mut self) -> Option<Transition> {
        if self.step == Step::Idle {
            None
        } else {
            self.transition(Step::Idle)
        }
    }

    fn transition(&mut self, to: Step) -> Option<Transition> {
        let transition = Transition {
            from: self.step,
            to,
        };
        log::debug!("verification step {} -> {}", transition.from, transition.to);
        self.step = to;
        for observer in &mut self.observers {
            observer(transition);
        }
        Some(transition)
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    fn pose(fingers: &[Finger]) -> Option<FingerExtension> {
        Some(FingerExtension::from_fingers(fingers.iter().copied()))
    }

    const THREE: &[Finger] = &[Finger::Index, Finger::Middle, Finger::Ring];
    const TWO: &[Finger] = &[Finger::Index, Finger::Middle];
    const ONE: &[Finger] = &[Finger::Index];

    fn started() -> GestureVerifier {
        let mut verifier = GestureVerifier::new();
        verifier.ready();
        verifier
    }

    #[test]
    fn full_sequence() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut verifier = GestureVerifier::new();
        verifier.subscribe({
            let log = log.clone();
            move |t| log.borrow_mut().push(t.to)
        });

        assert_eq!(verifier.observe(pose(THREE)), None, "not ready yet");
        verifier.ready();
        verifier.observe(pose(THREE));
        verifier.observe(pose(TWO));
        verifier.observe(pose(ONE));
        assert_eq!(verifier.step(), Step::Capturing);
        assert_eq!(verifier.observe(pose(ONE)), None);
        verifier.finish();

        assert_eq!(
            *log.borrow(),
            [
                Step::AwaitingThreeFingers,
                Step::AwaitingTwoFingers,
                Step::AwaitingOneFinger,
                Step::Capturing,
                Step::Done,
            ]
        );
    }

    #[test]
    fn no_hand_is_ignored() {
        let mut verifier = started();
        assert_eq!(verifier.observe(None), None);
        assert_eq!(verifier.step(), Step::AwaitingThreeFingers);
    }

    #[test]
    fn duplicate_match_advances_once() {
        let mut verifier = started();
        assert_eq!(
            verifier.observe(pose(THREE)),
            Some(Transition {
                from: Step::AwaitingThreeFingers,
                to: Step::AwaitingTwoFingers,
            })
        );
        assert_eq!(verifier.observe(pose(THREE)), None);
        assert_eq!(verifier.step(), Step::AwaitingTwoFingers);
    }

    #[test]
    fn extra_thumb_does_not_match() {
        let mut verifier = started();
        verifier.observe(pose(&[Finger::Thumb, Finger::Index, Finger::Middle, Finger::Ring]));
        assert_eq!(verifier.step(), Step::AwaitingThreeFingers);

        verifier.observe(pose(&[Finger::Index, Finger::Middle, Finger::Pinky]));
        assert_eq!(verifier.step(), Step::AwaitingThreeFingers);
    }

    #[test]
    fn later_pose_is_ignored() {
        let mut verifier = started();
        verifier.observe(pose(ONE));
        verifier.observe(pose(TWO));
        assert_eq!(verifier.step(), Step::AwaitingThreeFingers);
    }

    #[test]
    fn cancel_and_reset() {
        let mut verifier = started();
        verifier.observe(pose(THREE));
        assert!(verifier.cancel().is_some());
        assert_eq!(verifier.step(), Step::Cancelled);
        assert_eq!(verifier.cancel(), None);
        assert_eq!(verifier.observe(pose(TWO)), None);

        verifier.reset();
        assert_eq!(verifier.step(), Step::Idle);
        assert_eq!(verifier.reset(), None);

        let mut verifier = started();
        verifier.observe(pose(THREE));
        verifier.observe(pose(TWO));
        verifier.observe(pose(ONE));
        verifier.finish();
        assert_eq!(verifier.cancel(), None, "a finished session cannot be cancelled");
        assert_eq!(verifier.step(), Step::Done);
    }

    #[test]
    fn step_metadata() {
        assert_eq!(Step::AwaitingTwoFingers.number(), Some(2));
        assert_eq!(Step::Capturing.number(), None);
        assert!(Step::AwaitingOneFinger.is_awaiting());
        assert!(!Step::Idle.is_awaiting());
        assert!(Step::Cancelled.is_terminal());
        assert!(Step::Idle < Step::AwaitingThreeFingers);
        assert!(Step::AwaitingOneFinger < Step::Capturing);
        assert!(Step::AwaitingTwoFingers.instruction().contains('2'));
    }

    /// Reaching `Capturing` must be equivalent to the input containing the three poses as an
    /// ordered subsequence, and the step must never decrease.
    #[test]
    fn random_sequences() {
        let candidates = [
            pose(THREE),
            pose(TWO),
            pose(ONE),
            None,
            pose(&[]),
            pose(&[Finger::Thumb, Finger::Index]),
            pose(&[Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky]),
        ];
        let expected = [pose(THREE), pose(TWO), pose(ONE)];

        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..500 {
            let len = rng.usize(0..12);
            let input = (0..len)
                .map(|_| candidates[rng.usize(..candidates.len())])
                .collect::<Vec<_>>();

            let mut matched = 0;
            for item in &input {
                if matched < expected.len() && *item == expected[matched] {
                    matched += 1;
                }
            }

            let mut verifier = started();
            let mut prev = verifier.step();
            for item in &input {
                verifier.observe(*item);
                assert!(verifier.step() >= prev, "{:?}", input);
                prev = verifier.step();
            }

            assert_eq!(
                verifier.step() == Step::Capturing,
                matched == expected.len(),
                "{:?}",
                input
            );
        }
    }
}
