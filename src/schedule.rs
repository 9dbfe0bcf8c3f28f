//! Host scheduling primitives.
//!
//! A capture session does no work on its own: it asks its host to call it back on the next display
//! refresh ([`Scheduler::request_frame`]) and periodically while the countdown runs
//! ([`Scheduler::set_interval`]). The host then calls [`Session::on_frame`] and
//! [`Session::on_interval`] with the handle that fired.
//!
//! [`Session::on_frame`]: crate::session::Session::on_frame
//! [`Session::on_interval`]: crate::session::Session::on_interval

use std::time::Duration;

/// Identifies a pending frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Identifies a repeating interval callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalHandle(pub u64);

/// Callback scheduling provided by the host environment.
pub trait Scheduler {
    /// Requests a single callback on the next displayed frame.
    fn request_frame(&mut self) -> FrameHandle;

    /// Cancels a frame callback. Cancelling a handle that already fired must be harmless.
    fn cancel_frame(&mut self, handle: FrameHandle);

    /// Requests a callback every `period` until cleared.
    fn set_interval(&mut self, period: Duration) -> IntervalHandle;

    /// Stops an interval. Clearing an unknown handle must be harmless.
    fn clear_interval(&mut self, handle: IntervalHandle);
}

/// A scheduling operation, as recorded by [`ManualScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOp {
    RequestFrame(FrameHandle),
    CancelFrame(FrameHandle),
    SetInterval(IntervalHandle, Duration),
    ClearInterval(IntervalHandle),
}

/// A [`Scheduler`] that is advanced explicitly by its owner.
///
/// Nothing fires on its own: the owner takes the pending frame with [`take_frame`] and calls the
/// session, and ticks intervals by calling the session with handles from [`active_intervals`].
/// Every operation is recorded so that ordering can be checked afterwards.
///
/// [`take_frame`]: ManualScheduler::take_frame
/// [`active_intervals`]: ManualScheduler::active_intervals
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    frame: Option<FrameHandle>,
    intervals: Vec<(IntervalHandle, Duration)>,
    ops: Vec<ScheduleOp>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns the pending frame callback, if any.
    pub fn take_frame(&mut self) -> Option<FrameHandle> {
        self.frame.take()
    }

    pub fn has_pending_frame(&self) -> bool {
        self.frame.is_some()
    }

    /// Returns the intervals that have been set and not cleared yet.
    pub fn active_intervals(&self) -> &[(IntervalHandle, Duration)] {
        &self.intervals
    }

    /// Returns all operations performed so far, oldest first.
    pub fn ops(&self) -> &[ScheduleOp] {
        &self.ops
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Scheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle(self.next_id());
        if let Some(prev) = self.frame.replace(handle) {
            log::trace!("frame request {:?} superseded by {:?}", prev, handle);
        }
        self.ops.push(ScheduleOp::RequestFrame(handle));
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.frame == Some(handle) {
            self.frame = None;
        }
        self.ops.push(ScheduleOp::CancelFrame(handle));
    }

    fn set_interval(&mut self, period: Duration) -> IntervalHandle {
        let handle = IntervalHandle(self.next_id());
        self.intervals.push((handle, period));
        self.ops.push(ScheduleOp::SetInterval(handle, period));
        handle
    }

    fn clear_interval(&mut self, handle: IntervalHandle) {
        self.intervals.retain(|(h, _)| *h != handle);
        self.ops.push(ScheduleOp::ClearInterval(handle));
    }
}
