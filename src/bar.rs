//! Stand-alone bars.
//!
//! A [`ProgressBar`] is the one-row case of a group: it owns its state and
//! its output outright, so updates need no locking. [`SharedProgressBar`] puts
//! the same bar behind a [`SyncGuard`] for use from several threads.
//!
//! Both finalize when dropped: one last full frame (or, without a terminal, a
//! final status line) is written and the cursor is left at the start of a
//! fresh line, however the scope was left.

use std::fmt;

use compact_str::CompactString;
use web_time::Instant;

use crate::{
    builder::BarConfig,
    error::Result,
    progress::{BarState, ProgressSnapshot},
    render,
    stack::Coordinator,
    sync::SyncGuard,
    terminal::{Decision, Mode, Terminal, log_timestamp},
};

/// An exclusively owned progress bar.
pub struct ProgressBar {
    state: BarState,
    output: Coordinator,
}

impl fmt::Debug for ProgressBar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressBar")
            .field("state", &self.state)
            .field("output", &self.output)
            .finish()
    }
}

impl ProgressBar {
    /// Starts a bar and writes its first frame or status line.
    pub(crate) fn new(config: BarConfig, terminal: Terminal, start: Instant) -> Result<Self> {
        let state = BarState::new(config.into(), terminal.mode(), start);
        let mut bar = Self {
            state,
            output: Coordinator::new(terminal),
        };
        let decision = bar.state.start(start);
        bar.emit(decision, start)?;
        Ok(bar)
    }

    fn emit(&mut self, decision: Decision, now: Instant) -> Result<()> {
        match decision {
            Decision::Skip => {}
            Decision::Draw => {
                let frame = self.frame(now);
                if !self.output.redraw_row(0, &frame)? {
                    self.output.redraw_from(0, &[frame])?;
                }
            }
            Decision::Log => {
                let line = self.log_line(now, false);
                self.output.log(&line)?;
            }
        }
        Ok(())
    }

    fn frame(&self, now: Instant) -> render::RenderFrame {
        render::frame(
            self.state.config(),
            &self.state.snapshot(now),
            self.output.columns(),
        )
    }

    fn log_line(&self, now: Instant, done: bool) -> String {
        let config = self.state.config();
        let ts = config.log_timestamp().then(log_timestamp);
        render::log_line(config, &self.state.snapshot(now), ts.as_deref(), done)
    }

    /// Adds `n` to the count.
    pub fn update(&mut self, n: u64) -> Result<()> {
        self.update_at(n, Instant::now())
    }

    /// [`update`](Self::update) with an explicit clock.
    pub fn update_at(&mut self, n: u64, now: Instant) -> Result<()> {
        let decision = self.state.update(n, now);
        self.emit(decision, now)
    }

    /// Moves the count to `position`; a backward move records no rate sample.
    pub fn set_position(&mut self, position: u64) -> Result<()> {
        let now = Instant::now();
        let decision = self.state.set_position(position, now);
        self.emit(decision, now)
    }

    /// Count back to zero; elapsed time and rate start over.
    pub fn reset(&mut self) -> Result<()> {
        let now = Instant::now();
        let decision = self.state.reset(now);
        self.emit(decision, now)
    }

    /// Replaces the suffix and redraws immediately.
    pub fn set_suffix(&mut self, suffix: impl Into<CompactString>) -> Result<()> {
        self.set_suffix_at(suffix, Instant::now())
    }

    /// [`set_suffix`](Self::set_suffix) with an explicit clock.
    pub fn set_suffix_at(&mut self, suffix: impl Into<CompactString>, now: Instant) -> Result<()> {
        let decision = self.state.set_suffix(suffix, now);
        self.emit(decision, now)
    }

    /// Prints a line above the bar without disturbing it.
    pub fn println(&mut self, text: &str) -> Result<()> {
        let frames = match self.output.mode() {
            Mode::Animated if !self.state.is_finished() => vec![self.frame(Instant::now())],
            _ => Vec::new(),
        };
        self.output.println(text, &frames)?;
        Ok(())
    }

    /// Current unclamped count.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.state.position()
    }

    /// Immutable copy of the displayable state.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.snapshot(Instant::now())
    }

    /// Writes the final frame and releases the terminal.
    pub fn finish(mut self) -> Result<()> {
        self.finalize(Instant::now())
    }

    /// [`finish`](Self::finish) with an explicit clock.
    pub fn finish_at(mut self, now: Instant) -> Result<()> {
        self.finalize(now)
    }

    fn finalize(&mut self, now: Instant) -> Result<()> {
        if !self.state.finish() {
            return Ok(());
        }
        tracing::debug!(position = self.state.position(), "finalizing progress bar");
        match self.output.mode() {
            Mode::Animated => {
                let frame = self.frame(now);
                self.output.finish(&[frame])?;
            }
            Mode::Fallback => {
                let line = self.log_line(now, true);
                self.output.log(&line)?;
            }
        }
        Ok(())
    }
}

impl Drop for ProgressBar {
    fn drop(&mut self) {
        if let Err(err) = self.finalize(Instant::now()) {
            tracing::warn!(%err, "failed to finalize progress bar");
        }
    }
}

/// A [`ProgressBar`] that can be cloned and updated from several threads.
///
/// Every mutation and the redraw it triggers happen under one lock, so each
/// frame reflects a fully applied update. The bar finalizes when the last
/// handle is dropped, or earlier through [`finish`](Self::finish).
#[derive(Clone, Debug)]
pub struct SharedProgressBar(SyncGuard<ProgressBar>);

impl From<ProgressBar> for SharedProgressBar {
    fn from(bar: ProgressBar) -> Self {
        Self(SyncGuard::new(bar))
    }
}

impl SharedProgressBar {
    /// Adds `n` to the count.
    pub fn update(&self, n: u64) -> Result<()> {
        self.0.with(|bar| bar.update(n))
    }

    /// [`update`](Self::update) with an explicit clock.
    pub fn update_at(&self, n: u64, now: Instant) -> Result<()> {
        self.0.with(|bar| bar.update_at(n, now))
    }

    /// See [`ProgressBar::set_position`].
    pub fn set_position(&self, position: u64) -> Result<()> {
        self.0.with(|bar| bar.set_position(position))
    }

    /// See [`ProgressBar::reset`].
    pub fn reset(&self) -> Result<()> {
        self.0.with(ProgressBar::reset)
    }

    /// Replaces the suffix and redraws immediately.
    pub fn set_suffix(&self, suffix: impl Into<CompactString>) -> Result<()> {
        self.0.with(|bar| bar.set_suffix(suffix))
    }

    /// Prints a line above the bar.
    pub fn println(&self, text: &str) -> Result<()> {
        self.0.with(|bar| bar.println(text))
    }

    /// Current unclamped count.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.0.with(|bar| bar.position())
    }

    /// Immutable copy of the displayable state.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.0.with(|bar| bar.snapshot())
    }

    /// Finalizes the bar for every handle. Idempotent.
    pub fn finish(&self) -> Result<()> {
        self.finish_at(Instant::now())
    }

    /// [`finish`](Self::finish) with an explicit clock.
    pub fn finish_at(&self, now: Instant) -> Result<()> {
        self.0.with(|bar| bar.finalize(now))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{self, Write},
        thread,
        time::Duration,
    };

    use super::*;
    use crate::{
        builder::ProgressBuilder,
        error::Error,
        terminal::Capture,
        width::strip,
    };

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn captured(builder: ProgressBuilder, mode: Mode) -> (ProgressBar, Capture) {
        let (term, capture) = Terminal::capture(mode, 100);
        (builder.terminal(term).build().unwrap(), capture)
    }

    /// Three Updates To Completion
    /// 25 + 25 + 50 of 100 ends on a full, finished frame and a new line.
    #[test]
    fn test_updates_to_completion() {
        let t0 = Instant::now();
        let (mut bar, capture) = captured(
            ProgressBuilder::new_bar(100).desc("job").with_start_time(t0),
            Mode::Animated,
        );
        bar.update_at(25, t0 + ms(100)).unwrap();
        bar.update_at(25, t0 + ms(200)).unwrap();
        bar.update_at(50, t0 + ms(300)).unwrap();
        assert_eq!(bar.position(), 100);
        bar.finish_at(t0 + ms(300)).unwrap();

        let written = capture.frames();
        assert!(written.starts_with("\x1b[?25l"));
        assert!(written.ends_with('\n'));
        assert_eq!(written.matches("\x1b[?25h").count(), 1);
        let last = strip(written.rsplit("\x1b[?25h").next().unwrap());
        assert!(last.contains("100.0%"), "{last}");
        assert!(last.contains("100/100"));
        assert!(last.starts_with('✓'));
        assert_eq!(last.matches('\n').count(), 1);
        assert!(capture.log().is_empty());
    }

    /// Finalize On Drop
    /// Leaving the scope early still writes exactly one final frame.
    #[test]
    fn test_finalize_on_drop() {
        let t0 = Instant::now();
        let (term, capture) = Terminal::capture(Mode::Animated, 100);
        let run = || -> Result<()> {
            let mut bar = ProgressBuilder::new_bar(10)
                .with_start_time(t0)
                .terminal(term)
                .build()?;
            bar.update_at(3, t0 + ms(100))?;
            Err(Error::ZeroWidth)
        };
        assert!(run().is_err());

        let written = capture.frames();
        assert_eq!(written.matches("\x1b[?25h").count(), 1);
        assert!(written.ends_with('\n'));
        let last = strip(written.rsplit("\x1b[?25h").next().unwrap());
        assert!(last.starts_with('✗'));
        assert!(last.contains("3/10"));
    }

    /// Throttled Redraws
    /// Tight loops do not redraw more often than the minimum interval.
    #[test]
    fn test_throttle() {
        let t0 = Instant::now();
        let (mut bar, capture) = captured(
            ProgressBuilder::new_bar(1000).with_start_time(t0),
            Mode::Animated,
        );
        capture.clear();
        for i in 1..=100 {
            bar.update_at(1, t0 + ms(i)).unwrap();
        }
        // redraws at 50 ms and 100 ms
        assert_eq!(capture.frames().matches("\x1b[2K").count(), 2);
        bar.set_suffix_at("now", t0 + ms(101)).unwrap();
        assert_eq!(capture.frames().matches("\x1b[2K").count(), 3);
    }

    /// Non-TTY Logging
    /// 1000 updates within 5 s of a 30 s interval log one line, plus the final one.
    #[test]
    fn test_fallback_interval() {
        let t0 = Instant::now();
        let (mut bar, capture) = captured(
            ProgressBuilder::new_bar(2000)
                .desc("load")
                .log_interval(Duration::from_secs(30))
                .with_start_time(t0),
            Mode::Fallback,
        );
        for i in 1..=1000 {
            bar.update_at(1, t0 + ms(i * 5)).unwrap();
        }
        assert_eq!(capture.log_lines().len(), 1);
        bar.finish_at(t0 + ms(5000)).unwrap();

        let lines = capture.log_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("load: 50.0% (1000/2000)"), "{}", lines[1]);
        assert!(lines[1].ends_with(" - done"));
        assert!(capture.frames().is_empty(), "no escape sequences without a terminal");
    }

    /// Suffix In Status Lines
    /// Without a terminal a suffix change is carried into the next line.
    #[test]
    fn test_fallback_suffix() {
        let (mut bar, capture) = captured(ProgressBuilder::new_bar(10), Mode::Fallback);
        bar.set_suffix("loss=0.123").unwrap();
        assert_eq!(capture.log_lines().len(), 1);
        bar.update(10).unwrap();
        bar.finish().unwrap();
        let lines = capture.log_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("loss=0.123"));
    }

    /// Println
    #[test]
    fn test_println() {
        let (mut bar, capture) = captured(ProgressBuilder::new_bar(5), Mode::Animated);
        bar.println("note").unwrap();
        assert!(capture.frames().contains("\x1b[1A\r\x1b[Jnote\n"));

        let (mut bar, capture) = captured(ProgressBuilder::new_bar(5), Mode::Fallback);
        bar.println("note").unwrap();
        assert_eq!(capture.frames(), "note\n");
    }

    /// Corrections
    #[test]
    fn test_set_position_and_reset() {
        let (mut bar, _capture) = captured(ProgressBuilder::new_bar(10), Mode::Animated);
        bar.update(8).unwrap();
        bar.set_position(3).unwrap();
        assert_eq!(bar.position(), 3);
        bar.update(20).unwrap();
        assert_eq!(bar.position(), 23);
        assert_eq!(bar.snapshot().percent(), Some(100.0));
        bar.reset().unwrap();
        assert_eq!(bar.position(), 0);
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Stream Errors Surface
    #[test]
    fn test_stream_error() {
        let term = Terminal::new(Broken, Broken, Mode::Animated, 80);
        let err = ProgressBuilder::new_bar(3).terminal(term).build().unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == io::ErrorKind::BrokenPipe));
    }

    /// Shared Bar
    /// Concurrent updates through clones are all applied and finalization happens once.
    #[test]
    fn test_shared_bar() {
        let (term, capture) = Terminal::capture(Mode::Animated, 100);
        let bar = ProgressBuilder::new_bar(800)
            .min_redraw_interval(Duration::ZERO)
            .terminal(term)
            .build_shared()
            .unwrap();
        thread::scope(|scope| {
            for _ in 0..8 {
                let bar = bar.clone();
                scope.spawn(move || {
                    for _ in 0..100 {
                        bar.update(1).unwrap();
                    }
                });
            }
        });
        assert_eq!(bar.position(), 800);
        bar.finish().unwrap();
        bar.finish().unwrap();
        drop(bar);
        assert_eq!(capture.frames().matches("\x1b[?25h").count(), 1);
    }
}
