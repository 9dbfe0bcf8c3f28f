//! Performance measurement tools.

use std::{
    fmt, mem,
    sync::Mutex,
    time::{Duration, Instant},
};

use itertools::Itertools;

/// A timer that can measure and average the time an operation takes.
///
/// Collected timings are averaged and reset when the timer is displayed using `{}`
/// ([`std::fmt::Display`]).
pub struct Timer {
    name: &'static str,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    total: Duration,
    /// The number of time measurements that contributed to `total`.
    count: u32,
}

impl Timer {
    /// Creates a new timer.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(State::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation using a drop guard.
    ///
    /// When the returned [`TimerGuard`] is dropped, the time between the call to `start` and the
    /// drop is measured and recorded.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    /// Returns the number of measurements recorded since the timer was last displayed.
    pub fn count(&self) -> u32 {
        self.lock().count
    }

    fn stop(&self, start: Instant) {
        let mut state = self.lock();
        state.total += start.elapsed();
        state.count += 1;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave `State` inconsistent.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Displays the average recorded time and resets it.
impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let State { total, count } = mem::take(&mut *self.lock());
        let avg_ms = if count == 0 {
            0.0
        } else {
            total.as_secs_f32() * 1000.0 / count as f32
        };

        write!(f, "{}: {count}x{avg_ms:.01}ms", self.name)
    }
}

/// Cloning a timer resets its collected timings.
impl Clone for Timer {
    fn clone(&self) -> Self {
        Self::new(self.name)
    }
}

/// Guard returned by [`Timer::start`]. Stops timing the operation when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.stop(self.start);
    }
}

/// Logs frames per second with optional extra data.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Advances the frame counter by 1 and logs FPS if one second has passed.
    pub fn tick(&mut self) {
        self.tick_with(std::iter::empty::<&Timer>());
    }

    /// Advances the frame counter by 1 and logs FPS and `extra` data if one second has passed.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, extra: I) {
        self.frames += 1;
        if self.start.elapsed() > Duration::from_secs(1) {
            let extra = extra.into_iter().join(", ");
            if extra.is_empty() {
                log::debug!("{}: {} FPS", self.name, self.frames);
            } else {
                log::debug!("{}: {} FPS ({})", self.name, self.frames, extra);
            }

            self.frames = 0;
            self.start = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_resets() {
        let timer = Timer::new("work");
        timer.time(|| ());
        {
            let _guard = timer.start();
        }
        assert_eq!(timer.count(), 2);

        let shown = timer.to_string();
        assert!(shown.starts_with("work: 2x"), "{shown}");
        assert_eq!(timer.count(), 0);
        assert_eq!(timer.to_string(), "work: 0x0.0ms");
    }

    #[test]
    fn clone_resets() {
        let timer = Timer::new("work");
        timer.time(|| ());
        assert_eq!(timer.clone().count(), 0);
        assert_eq!(timer.clone().name(), "work");
    }
}
