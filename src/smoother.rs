//! Rate and ETA estimation.
//!
//! [`Smoother`] keeps a single exponential moving average of the throughput. Each
//! update is turned into an instantaneous rate (`delta / elapsed since the last
//! sample`) and blended into the average with factor `alpha`:
//!
//! * `alpha = 1.0`: no smoothing, the display follows the latest sample.
//! * `alpha → 0.0`: heavy smoothing, the first sample dominates.
//!
//! No history is buffered; memory use is constant.

use std::time::Duration;

use web_time::Instant;

/// Exponential moving average of the update rate.
#[derive(Clone, Debug)]
pub struct Smoother {
    alpha: f64,
    rate: Option<f64>,
    /// Time of the last accepted sample.
    anchor: Instant,
    /// Count accumulated since `anchor` by samples that could not be timed.
    pending: u64,
}

impl Smoother {
    /// Creates an estimator whose first sample is measured from `start`.
    ///
    /// `alpha` is expected to be within `[0, 1]`; the builder validates it.
    #[must_use]
    pub const fn new(alpha: f64, start: Instant) -> Self {
        Self {
            alpha,
            rate: None,
            anchor: start,
            pending: 0,
        }
    }

    /// Records `delta` items completed at `now`.
    ///
    /// A sample that arrives at or before the previous one (clock jitter, or two
    /// updates within the clock's resolution) does not move the average; its
    /// count is carried into the next sample so no work goes unmeasured.
    pub fn sample(&mut self, now: Instant, delta: u64) {
        self.pending = self.pending.saturating_add(delta);
        let elapsed = now
            .checked_duration_since(self.anchor)
            .map_or(0.0, |d| d.as_secs_f64());
        if elapsed <= 0.0 {
            return;
        }

        #[allow(clippy::cast_precision_loss)]
        let instant = self.pending as f64 / elapsed;
        self.rate = Some(match self.rate {
            None => instant,
            Some(prev) => self.alpha * instant + (1.0 - self.alpha) * prev,
        });
        self.anchor = now;
        self.pending = 0;
    }

    /// Smoothed items per second, once at least one sample has been timed.
    #[must_use]
    pub const fn rate(&self) -> Option<f64> {
        self.rate
    }

    /// Time needed for `remaining` items at the smoothed rate.
    ///
    /// `None` while the rate is unknown or zero.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn eta(&self, remaining: u64) -> Option<Duration> {
        let rate = self.rate.filter(|r| *r > 0.0)?;
        Duration::try_from_secs_f64(remaining as f64 / rate).ok()
    }

    /// Forgets every sample and measures the next one from `start`.
    pub fn reset(&mut self, start: Instant) {
        self.rate = None;
        self.anchor = start;
        self.pending = 0;
    }
}

/// Back-and-forth position for indeterminate bars.
///
/// The position walks `0, 1, ..., bound, bound - 1, ..., 1, 0, 1, ...` as the
/// tick counter grows and never leaves `[0, bound]`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Bounce {
    bound: usize,
}

impl Bounce {
    /// Creates a cycle over `[0, bound]`.
    #[must_use]
    pub const fn new(bound: usize) -> Self {
        Self { bound }
    }

    /// Largest position the cycle reaches.
    #[must_use]
    pub const fn bound(&self) -> usize {
        self.bound
    }

    /// Position after `tick` redraws.
    #[must_use]
    pub const fn position(&self, tick: u64) -> usize {
        if self.bound == 0 {
            return 0;
        }
        let period = 2 * self.bound as u64;
        let t = tick % period;
        if t <= self.bound as u64 {
            t as usize
        } else {
            (period - t) as usize
        }
    }
}
