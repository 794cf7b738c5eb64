//! Output streams and the animated/fallback decision.
//!
//! A [`Terminal`] bundles the two streams a bar writes to: the frame stream
//! (stdout by default) that receives animated redraws, and the log stream
//! (stderr by default) that receives plain status lines when no interactive
//! terminal is attached. Whether the destination is interactive is decided once,
//! when the terminal is created, and fixed as its [`Mode`].
//!
//! [`RedrawGate`] turns state changes into draw decisions: throttled redraws in
//! animated mode, interval-limited status lines in fallback mode.

use std::{
    fmt,
    io::{self, Write},
    sync::Arc,
    time::Duration,
};

use is_terminal::IsTerminal as _;
use parking_lot::Mutex;
use web_time::Instant;

/// Columns assumed when the terminal size cannot be queried.
pub const DEFAULT_COLUMNS: usize = 80;

/// How a bar presents itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mode {
    /// Interactive terminal: frames are redrawn in place with escape sequences.
    Animated,
    /// Pipe, file or CI log: periodic plain-text status lines, no escapes.
    Fallback,
}

/// Destination for progress output.
pub struct Terminal {
    frames: Box<dyn Write + Send>,
    log: Box<dyn Write + Send>,
    mode: Mode,
    columns: usize,
}

impl fmt::Debug for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Terminal")
            .field("mode", &self.mode)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl Terminal {
    /// Frames on stdout, status lines on stderr; animated only if stdout is a TTY.
    #[must_use]
    pub fn detect() -> Self {
        let stdout = io::stdout();
        let mode = if stdout.is_terminal() {
            Mode::Animated
        } else {
            Mode::Fallback
        };
        let columns = crossterm::terminal::size()
            .map(|(w, _)| usize::from(w))
            .ok()
            .filter(|w| *w > 0)
            .unwrap_or(DEFAULT_COLUMNS);
        tracing::debug!(?mode, columns, "detected terminal");
        Self::new(stdout, io::stderr(), mode, columns)
    }

    /// Uses arbitrary streams with a fixed mode and width.
    pub fn new(
        frames: impl Write + Send + 'static,
        log: impl Write + Send + 'static,
        mode: Mode,
        columns: usize,
    ) -> Self {
        Self {
            frames: Box::new(frames),
            log: Box::new(log),
            mode,
            columns: columns.max(1),
        }
    }

    /// An in-memory terminal, plus a handle to inspect what was written to it.
    #[must_use]
    pub fn capture(mode: Mode, columns: usize) -> (Self, Capture) {
        let capture = Capture::default();
        let terminal = Self::new(capture.frames.clone(), capture.log.clone(), mode, columns);
        (terminal, capture)
    }

    /// Presentation mode fixed at creation.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether frames are animated in place.
    #[must_use]
    pub fn is_animated(&self) -> bool {
        self.mode == Mode::Animated
    }

    /// Width of the terminal in columns.
    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Writes raw bytes (frames and escape sequences) and flushes.
    pub(crate) fn write_frame(&mut self, bytes: &str) -> io::Result<()> {
        self.frames.write_all(bytes.as_bytes())?;
        self.frames.flush()
    }

    /// Writes one newline-terminated status line to the log stream.
    pub(crate) fn write_log_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.log, "{line}")?;
        self.log.flush()
    }
}

/// Formats the wall-clock prefix of fallback status lines.
pub(crate) fn log_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

// ============================================================================
// Capture
// ============================================================================

#[derive(Clone, Debug, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

/// Read side of [`Terminal::capture`].
#[derive(Clone, Debug, Default)]
pub struct Capture {
    frames: SharedBuffer,
    log: SharedBuffer,
}

impl Capture {
    /// Everything written to the frame stream, escapes included.
    #[must_use]
    pub fn frames(&self) -> String {
        self.frames.contents()
    }

    /// Everything written to the log stream.
    #[must_use]
    pub fn log(&self) -> String {
        self.log.contents()
    }

    /// The log stream split into lines.
    #[must_use]
    pub fn log_lines(&self) -> Vec<String> {
        self.log().lines().map(str::to_owned).collect()
    }

    /// Discards everything captured so far.
    pub fn clear(&self) {
        self.frames.0.lock().clear();
        self.log.0.lock().clear();
    }
}

// ============================================================================
// Redraw decisions
// ============================================================================

/// What a state change should produce on screen.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    /// Nothing to emit.
    Skip,
    /// Redraw the animated frame.
    Draw,
    /// Write a fallback status line.
    Log,
}

/// Rate limiter between state changes and output.
#[derive(Clone, Debug)]
pub struct RedrawGate {
    mode: Mode,
    min_interval: Duration,
    log_interval: Duration,
    last_draw: Option<Instant>,
    last_log: Option<Instant>,
}

impl RedrawGate {
    /// `min_interval` throttles animated redraws, `log_interval` fallback lines
    /// (zero disables periodic lines; start and finish lines are still written).
    #[must_use]
    pub const fn new(mode: Mode, min_interval: Duration, log_interval: Duration) -> Self {
        Self {
            mode,
            min_interval,
            log_interval,
            last_draw: None,
            last_log: None,
        }
    }

    /// Mode this gate decides for.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// The bar appeared: draw the first frame, or write the first status line.
    pub fn on_start(&mut self, now: Instant) -> Decision {
        match self.mode {
            Mode::Animated => {
                self.last_draw = Some(now);
                Decision::Draw
            }
            Mode::Fallback => {
                self.last_log = Some(now);
                Decision::Log
            }
        }
    }

    /// The count changed. `completed` is set when this change reached the total.
    pub fn on_update(&mut self, now: Instant, completed: bool) -> Decision {
        match self.mode {
            Mode::Animated => {
                let due = completed
                    || self
                        .last_draw
                        .is_none_or(|at| now.saturating_duration_since(at) >= self.min_interval);
                if due {
                    self.last_draw = Some(now);
                    Decision::Draw
                } else {
                    Decision::Skip
                }
            }
            Mode::Fallback => {
                if self.log_interval.is_zero() {
                    return Decision::Skip;
                }
                let due = self
                    .last_log
                    .is_none_or(|at| now.saturating_duration_since(at) >= self.log_interval);
                if due {
                    self.last_log = Some(now);
                    Decision::Log
                } else {
                    Decision::Skip
                }
            }
        }
    }

    /// Suffix text or an explicit correction changed.
    ///
    /// Animated bars redraw regardless of the throttle; fallback bars carry the
    /// change into their next status line.
    pub fn on_change(&mut self, now: Instant) -> Decision {
        match self.mode {
            Mode::Animated => {
                self.last_draw = Some(now);
                Decision::Draw
            }
            Mode::Fallback => Decision::Skip,
        }
    }
}
