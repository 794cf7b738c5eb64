//! Fluent configuration for bars.
//!
//! [`ProgressBuilder`] collects options as the caller supplies them (color and
//! style may still be names or raw values) and validates them all at once in
//! [`resolve`](ProgressBuilder::resolve). A malformed value is an error; it is
//! never replaced by a default.
//!
//! | option | default |
//! |---|---|
//! | `bar_style` | `gradient` |
//! | `color` | `cyan` |
//! | `width` | 35 columns |
//! | `unit` / `unit_scale` | `it`, no scaling |
//! | `smoothing` | 0.3 |
//! | `log_interval` | 30 s |
//! | `log_timestamp` | off |
//! | `min_redraw_interval` | 50 ms |
//! | `suffix_lines` | 3 |

use std::time::Duration;

use compact_str::CompactString;
use web_time::Instant;

use crate::{
    bar::{ProgressBar, SharedProgressBar},
    color::{Color, ColorSpec},
    error::{Error, Result},
    style::{BarStyle, StyleSpec},
    terminal::Terminal,
    units::UnitScale,
};

/// Default glyph region width.
pub const DEFAULT_WIDTH: usize = 35;
/// Default EMA factor.
pub const DEFAULT_SMOOTHING: f64 = 0.3;
/// Default spacing of fallback status lines.
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(30);
/// Default animated redraw throttle.
pub const DEFAULT_MIN_REDRAW_INTERVAL: Duration = Duration::from_millis(50);
/// Default cap on suffix continuation lines.
pub const DEFAULT_SUFFIX_LINES: usize = 3;

/// Validated, immutable bar configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BarConfig {
    total: Option<u64>,
    desc: CompactString,
    style: BarStyle,
    color: Color,
    width: usize,
    unit: CompactString,
    unit_scale: UnitScale,
    smoothing: f64,
    log_interval: Duration,
    log_timestamp: bool,
    min_redraw_interval: Duration,
    suffix_lines: usize,
}

impl BarConfig {
    /// Initial total, `None` for indeterminate bars.
    #[must_use]
    pub const fn total(&self) -> Option<u64> {
        self.total
    }

    /// Description label.
    #[must_use]
    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Glyph table.
    #[must_use]
    pub const fn style(&self) -> BarStyle {
        self.style
    }

    /// Canonical bar color.
    #[must_use]
    pub const fn color(&self) -> Color {
        self.color
    }

    /// Columns of the glyph region.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Unit label, e.g. `it` or `B`.
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Count abbreviation rule.
    #[must_use]
    pub const fn unit_scale(&self) -> UnitScale {
        self.unit_scale
    }

    /// EMA factor in `[0, 1]`.
    #[must_use]
    pub const fn smoothing(&self) -> f64 {
        self.smoothing
    }

    /// Minimum spacing of fallback status lines; zero disables periodic lines.
    #[must_use]
    pub const fn log_interval(&self) -> Duration {
        self.log_interval
    }

    /// Whether fallback lines carry a timestamp.
    #[must_use]
    pub const fn log_timestamp(&self) -> bool {
        self.log_timestamp
    }

    /// Minimum spacing of animated redraws.
    #[must_use]
    pub const fn min_redraw_interval(&self) -> Duration {
        self.min_redraw_interval
    }

    /// Most continuation lines a wrapped suffix may take.
    #[must_use]
    pub const fn suffix_lines(&self) -> usize {
        self.suffix_lines
    }
}

/// Builder for [`ProgressBar`], [`SharedProgressBar`] and group members.
#[derive(Debug)]
pub struct ProgressBuilder {
    total: Option<u64>,
    desc: CompactString,
    style: StyleSpec,
    color: ColorSpec,
    width: usize,
    unit: CompactString,
    unit_scale: UnitScale,
    smoothing: f64,
    log_interval: Duration,
    log_timestamp: bool,
    min_redraw_interval: Duration,
    suffix_lines: usize,
    start: Option<Instant>,
    terminal: Option<Terminal>,
}

impl Default for ProgressBuilder {
    fn default() -> Self {
        Self {
            total: None,
            desc: CompactString::default(),
            style: StyleSpec::default(),
            color: ColorSpec::default(),
            width: DEFAULT_WIDTH,
            unit: CompactString::const_new("it"),
            unit_scale: UnitScale::default(),
            smoothing: DEFAULT_SMOOTHING,
            log_interval: DEFAULT_LOG_INTERVAL,
            log_timestamp: false,
            min_redraw_interval: DEFAULT_MIN_REDRAW_INTERVAL,
            suffix_lines: DEFAULT_SUFFIX_LINES,
            start: None,
            terminal: None,
        }
    }
}

impl ProgressBuilder {
    /// Starts building a bar with a known total.
    #[must_use]
    pub fn new_bar(total: u64) -> Self {
        Self {
            total: Some(total),
            ..Default::default()
        }
    }

    /// Starts building a bar without a total (bouncing marker, no ETA).
    #[must_use]
    pub fn new_indeterminate() -> Self {
        Self::default()
    }

    /// Label shown before the bar.
    #[must_use]
    pub fn desc(mut self, desc: impl Into<CompactString>) -> Self {
        self.desc = desc.into();
        self
    }

    /// Glyph table, by value or by name.
    #[must_use]
    pub fn bar_style(mut self, style: impl Into<StyleSpec>) -> Self {
        self.style = style.into();
        self
    }

    /// Palette name, `#rgb`/`#rrggbb` string, RGB triple or [`Color`].
    #[must_use]
    pub fn color(mut self, color: impl Into<ColorSpec>) -> Self {
        self.color = color.into();
        self
    }

    /// Columns reserved for the glyph region.
    #[must_use]
    pub const fn width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Unit label.
    #[must_use]
    pub fn unit(mut self, unit: impl Into<CompactString>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Count abbreviation rule.
    #[must_use]
    pub const fn unit_scale(mut self, scale: UnitScale) -> Self {
        self.unit_scale = scale;
        self
    }

    /// EMA factor: 1 follows the latest sample, values near 0 barely move.
    #[must_use]
    pub const fn smoothing(mut self, alpha: f64) -> Self {
        self.smoothing = alpha;
        self
    }

    /// Minimum spacing of status lines when no terminal is attached.
    #[must_use]
    pub const fn log_interval(mut self, interval: Duration) -> Self {
        self.log_interval = interval;
        self
    }

    /// Prefix status lines with the local date and time.
    #[must_use]
    pub const fn log_timestamp(mut self, enabled: bool) -> Self {
        self.log_timestamp = enabled;
        self
    }

    /// Minimum spacing of animated redraws.
    #[must_use]
    pub const fn min_redraw_interval(mut self, interval: Duration) -> Self {
        self.min_redraw_interval = interval;
        self
    }

    /// Most continuation lines a long suffix may wrap onto; zero is rejected by `resolve`.
    #[must_use]
    pub fn suffix_lines(mut self, lines: usize) -> Self {
        self.suffix_lines = lines;
        self
    }

    /// Sets the start time explicitly.
    #[must_use]
    pub const fn with_start_time(mut self, start: Instant) -> Self {
        self.start = Some(start);
        self
    }

    /// Sets the start time to `Instant::now()`.
    #[must_use]
    pub fn with_start_time_now(self) -> Self {
        self.with_start_time(Instant::now())
    }

    /// Output destination; [`Terminal::detect`] when unset.
    ///
    /// Ignored by [`ProgressGroup::add_bar`](crate::ProgressGroup::add_bar),
    /// which draws every member on the group's terminal.
    #[must_use]
    pub fn terminal(mut self, terminal: Terminal) -> Self {
        self.terminal = Some(terminal);
        self
    }

    /// Validates every option.
    pub fn resolve(&self) -> Result<BarConfig> {
        if self.total == Some(0) {
            return Err(Error::ZeroTotal);
        }
        if self.width == 0 {
            return Err(Error::ZeroWidth);
        }
        if self.suffix_lines == 0 {
            return Err(Error::ZeroSuffixLines);
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(Error::InvalidSmoothing(self.smoothing));
        }
        Ok(BarConfig {
            total: self.total,
            desc: self.desc.clone(),
            style: self.style.resolve()?,
            color: self.color.resolve()?,
            width: self.width,
            unit: self.unit.clone(),
            unit_scale: self.unit_scale,
            smoothing: self.smoothing,
            log_interval: self.log_interval,
            log_timestamp: self.log_timestamp,
            min_redraw_interval: self.min_redraw_interval,
            suffix_lines: self.suffix_lines,
        })
    }

    /// Validated configuration, the destination (if one was set) and the start time.
    pub(crate) fn into_parts(self) -> Result<(BarConfig, Option<Terminal>, Instant)> {
        let config = self.resolve()?;
        let start = self.start.unwrap_or_else(Instant::now);
        Ok((config, self.terminal, start))
    }

    /// Builds an exclusively owned bar and draws its first frame.
    pub fn build(self) -> Result<ProgressBar> {
        let (config, terminal, start) = self.into_parts()?;
        ProgressBar::new(config, terminal.unwrap_or_else(Terminal::detect), start)
    }

    /// Builds a bar that may be updated from several threads.
    pub fn build_shared(self) -> Result<SharedProgressBar> {
        self.build().map(SharedProgressBar::from)
    }
}
