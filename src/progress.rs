//! Live state of one progress bar.
//!
//! [`BarState`] is the mutable record behind every bar: the count, the total,
//! timestamps, the rate estimator, the suffix text and the redraw gate. It does
//! not write anything itself. Every mutation returns a [`Decision`] telling the
//! owner whether a frame or a status line is due, and the owner renders from a
//! [`ProgressSnapshot`].
//!
//! # Overshoot
//!
//! Updates may push the count past the total. The stored count is never clamped,
//! so a later [`set_position`](BarState::set_position) correction reflects the
//! true state; only the displayed fraction is capped at 100%.

use std::{sync::Arc, time::Duration};

use compact_str::CompactString;
use web_time::Instant;

use crate::{
    builder::BarConfig,
    smoother::{Bounce, Smoother},
    style::BOUNCE_BLOCK,
    terminal::{Decision, Mode, RedrawGate},
};

/// Mutable record for one bar.
#[derive(Clone, Debug)]
pub struct BarState {
    config: Arc<BarConfig>,
    total: Option<u64>,
    current: u64,
    started_at: Instant,
    last_update_at: Instant,
    smoother: Smoother,
    bounce: Bounce,
    suffix: CompactString,
    ticks: u64,
    gate: RedrawGate,
    finished: bool,
}

impl BarState {
    /// Fresh state for `config`, deciding output for `mode`, started at `start`.
    #[must_use]
    pub fn new(config: Arc<BarConfig>, mode: Mode, start: Instant) -> Self {
        let width = config.width();
        Self {
            total: config.total(),
            current: 0,
            started_at: start,
            last_update_at: start,
            smoother: Smoother::new(config.smoothing(), start),
            bounce: Bounce::new(width - BOUNCE_BLOCK.min(width)),
            suffix: CompactString::default(),
            ticks: 0,
            gate: RedrawGate::new(mode, config.min_redraw_interval(), config.log_interval()),
            finished: false,
            config,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Validated configuration.
    #[must_use]
    pub fn config(&self) -> &BarConfig {
        &self.config
    }

    /// Shared handle to the configuration.
    #[must_use]
    pub fn config_arc(&self) -> Arc<BarConfig> {
        Arc::clone(&self.config)
    }

    /// Unclamped count.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.current
    }

    /// Total, or `None` for an indeterminate bar.
    #[must_use]
    pub const fn total(&self) -> Option<u64> {
        self.total
    }

    /// Current suffix text.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// When the bar started (or was last reset).
    #[must_use]
    pub const fn started_at(&self) -> Instant {
        self.started_at
    }

    /// When the count last changed.
    #[must_use]
    pub const fn last_update_at(&self) -> Instant {
        self.last_update_at
    }

    /// Whether the bar has been finalized.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Mode the redraw gate decides for.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.gate.mode()
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// First output of the bar.
    pub fn start(&mut self, now: Instant) -> Decision {
        let decision = self.gate.on_start(now);
        self.tick_if(decision);
        decision
    }

    /// Adds `delta` to the count and records a rate sample.
    pub fn update(&mut self, delta: u64, now: Instant) -> Decision {
        let before = self.current;
        self.current = self.current.saturating_add(delta);
        self.last_update_at = now;
        self.smoother.sample(now, delta);
        if self.finished {
            return Decision::Skip;
        }
        let completed = self.total.is_some_and(|t| before < t && self.current >= t);
        let decision = self.gate.on_update(now, completed);
        tracing::trace!(position = self.current, ?decision, "update");
        self.tick_if(decision);
        decision
    }

    /// Moves the count to `position`.
    ///
    /// Moving forward counts as regular progress. Moving backward is a
    /// correction: no rate sample is recorded for it.
    pub fn set_position(&mut self, position: u64, now: Instant) -> Decision {
        if position >= self.current {
            return self.update(position - self.current, now);
        }
        self.current = position;
        self.last_update_at = now;
        self.changed(now)
    }

    /// Count back to zero; elapsed time and rate start over.
    pub fn reset(&mut self, now: Instant) -> Decision {
        self.current = 0;
        self.started_at = now;
        self.last_update_at = now;
        self.smoother.reset(now);
        self.changed(now)
    }

    /// Replaces the suffix text.
    pub fn set_suffix(&mut self, suffix: impl Into<CompactString>, now: Instant) -> Decision {
        self.suffix = suffix.into();
        self.changed(now)
    }

    /// Marks the bar finished. Returns `false` if it already was.
    pub fn finish(&mut self) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;
        self.ticks = self.ticks.wrapping_add(1);
        true
    }

    fn changed(&mut self, now: Instant) -> Decision {
        if self.finished {
            return Decision::Skip;
        }
        let decision = self.gate.on_change(now);
        self.tick_if(decision);
        decision
    }

    // The spinner and bounce advance once per drawn frame, not per update.
    fn tick_if(&mut self, decision: Decision) {
        if decision == Decision::Draw {
            self.ticks = self.ticks.wrapping_add(1);
        }
    }

    /// Immutable copy of the displayable state at `now`.
    #[must_use]
    pub fn snapshot(&self, now: Instant) -> ProgressSnapshot {
        let eta = match self.total {
            Some(total) if !self.finished => {
                self.smoother.eta(total.saturating_sub(self.current))
            }
            _ => None,
        };
        ProgressSnapshot {
            desc: self.config.desc().into(),
            suffix: self.suffix.clone(),
            position: self.current,
            total: self.total,
            elapsed: now.saturating_duration_since(self.started_at),
            rate: self.smoother.rate(),
            eta,
            tick: self.ticks,
            bounce: self.bounce.position(self.ticks),
            finished: self.finished,
        }
    }
}

/// A plain-data view of a [`BarState`] at one instant.
///
/// Owns its data and needs no locking, so renderers work from it after the
/// state's lock has been released.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgressSnapshot {
    desc: CompactString,
    suffix: CompactString,
    position: u64,
    total: Option<u64>,
    elapsed: Duration,
    rate: Option<f64>,
    eta: Option<Duration>,
    tick: u64,
    bounce: usize,
    finished: bool,
}

impl ProgressSnapshot {
    /// Description label.
    #[must_use]
    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Suffix text, possibly multi-line and styled.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Unclamped count.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.position
    }

    /// Total, or `None` when indeterminate.
    #[must_use]
    pub const fn total(&self) -> Option<u64> {
        self.total
    }

    /// Time since start.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Smoothed items per second, once known.
    #[must_use]
    pub const fn rate(&self) -> Option<f64> {
        self.rate
    }

    /// Estimated time left. Always `None` for indeterminate or finished bars.
    #[must_use]
    pub const fn eta(&self) -> Option<Duration> {
        self.eta
    }

    /// Frames drawn so far; drives the spinner.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Marker offset of an indeterminate bar.
    #[must_use]
    pub const fn bounce(&self) -> usize {
        self.bounce
    }

    /// Whether the bar has been finalized.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the count has reached the total.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total.is_some_and(|t| self.position >= t)
    }

    /// Displayed fraction in `[0, 1]`.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn fraction(&self) -> Option<f64> {
        self.total
            .map(|t| self.position.min(t) as f64 / t.max(1) as f64)
    }

    /// Displayed percentage in `[0, 100]`.
    #[must_use]
    pub fn percent(&self) -> Option<f64> {
        self.fraction().map(|f| f * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::builder::ProgressBuilder;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn state(builder: ProgressBuilder, mode: Mode, start: Instant) -> BarState {
        BarState::new(Arc::new(builder.resolve().unwrap()), mode, start)
    }

    /// Basic Lifecycle
    /// Updates accumulate and the snapshot reports derived values.
    #[test]
    #[allow(clippy::float_cmp)]
    fn test_basic_lifecycle() {
        let t0 = Instant::now();
        let mut s = state(ProgressBuilder::new_bar(100).desc("job"), Mode::Animated, t0);
        assert_eq!(s.start(t0), Decision::Draw);

        s.update(25, t0 + ms(1000));
        s.update(25, t0 + ms(2000));
        let snap = s.snapshot(t0 + ms(2000));
        assert_eq!(snap.desc(), "job");
        assert_eq!(snap.position(), 50);
        assert_eq!(snap.percent(), Some(50.0));
        assert_eq!(snap.elapsed(), ms(2000));
        assert!(snap.eta().is_some());

        s.update(50, t0 + ms(2010));
        assert!(s.snapshot(t0 + ms(2010)).is_complete());
        assert!(s.finish());
        assert!(!s.finish(), "finishing twice is a no-op");
        assert!(s.snapshot(t0 + ms(3000)).eta().is_none());
    }

    /// Completion Redraw
    /// The update that first reaches the total draws even inside the throttle.
    #[test]
    fn test_completion_bypasses_throttle() {
        let t0 = Instant::now();
        let mut s = state(ProgressBuilder::new_bar(10), Mode::Animated, t0);
        s.start(t0);
        assert_eq!(s.update(5, t0 + ms(1)), Decision::Skip);
        assert_eq!(s.update(5, t0 + ms(2)), Decision::Draw);
        assert_eq!(s.update(5, t0 + ms(3)), Decision::Skip);
    }

    /// Overshoot
    /// The stored count is kept; a correction brings it back.
    #[test]
    #[allow(clippy::float_cmp)]
    fn test_overshoot_and_correction() {
        let t0 = Instant::now();
        let mut s = state(ProgressBuilder::new_bar(10), Mode::Animated, t0);
        s.update(15, t0 + ms(100));
        let snap = s.snapshot(t0 + ms(100));
        assert_eq!(snap.position(), 15);
        assert_eq!(snap.percent(), Some(100.0));
        assert_eq!(snap.eta(), Some(Duration::ZERO));

        let rate = s.snapshot(t0 + ms(100)).rate();
        s.set_position(7, t0 + ms(200));
        let snap = s.snapshot(t0 + ms(200));
        assert_eq!(snap.position(), 7);
        assert_eq!(snap.rate(), rate, "backward moves record no sample");
    }

    /// Reset
    #[test]
    fn test_reset() {
        let t0 = Instant::now();
        let mut s = state(ProgressBuilder::new_bar(10), Mode::Animated, t0);
        s.update(4, t0 + ms(1000));
        s.reset(t0 + ms(5000));
        let snap = s.snapshot(t0 + ms(6000));
        assert_eq!(snap.position(), 0);
        assert_eq!(snap.elapsed(), ms(1000));
        assert!(snap.rate().is_none());
    }

    /// Suffix Forces Redraw
    #[test]
    fn test_suffix_forces_redraw() {
        let t0 = Instant::now();
        let mut s = state(ProgressBuilder::new_bar(10), Mode::Animated, t0);
        s.start(t0);
        assert_eq!(s.update(1, t0 + ms(1)), Decision::Skip);
        assert_eq!(s.set_suffix("loss=0.1", t0 + ms(2)), Decision::Draw);
        assert_eq!(s.suffix(), "loss=0.1");

        let mut quiet = state(ProgressBuilder::new_bar(10), Mode::Fallback, t0);
        quiet.start(t0);
        assert_eq!(quiet.set_suffix("x", t0 + ms(2)), Decision::Skip);
    }

    /// Indeterminate Bounce
    /// Ten updates never produce an ETA and the marker stays within bounds.
    #[test]
    fn test_indeterminate_bounce() {
        let t0 = Instant::now();
        let builder = ProgressBuilder::new_indeterminate()
            .width(8)
            .min_redraw_interval(Duration::ZERO);
        let mut s = state(builder, Mode::Animated, t0);
        s.start(t0);
        let mut seen = Vec::new();
        for i in 1..=10 {
            assert_eq!(s.update(1, t0 + ms(i * 10)), Decision::Draw);
            let snap = s.snapshot(t0 + ms(i * 10));
            assert!(snap.eta().is_none());
            assert!(snap.percent().is_none());
            assert!(snap.bounce() <= 8 - BOUNCE_BLOCK);
            seen.push(snap.bounce());
        }
        assert!(seen.contains(&(8 - BOUNCE_BLOCK)), "marker reaches the far end");
        assert!(seen.windows(2).any(|w| w[1] < w[0]), "marker turns around");
    }

    proptest! {
        /// Percent Bounds
        /// Any sequence of updates keeps the displayed percentage in [0, 100].
        #[test]
        fn test_percent_bounded(
            total in 1u64..1_000,
            deltas in proptest::collection::vec(0u64..500, 0..40),
        ) {
            let t0 = Instant::now();
            let mut s = state(ProgressBuilder::new_bar(total), Mode::Animated, t0);
            for (i, d) in deltas.iter().enumerate() {
                s.update(*d, t0 + ms(i as u64 * 7));
                let pct = s.snapshot(t0 + ms(i as u64 * 7)).percent().unwrap();
                prop_assert!((0.0..=100.0).contains(&pct));
            }
            prop_assert_eq!(s.position(), deltas.iter().sum::<u64>());
        }
    }
}
