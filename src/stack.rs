//! Several bars sharing one output stream.
//!
//! A [`ProgressGroup`] renders its bars as a block of rows below an anchor
//! line. The cursor rests on the line just below the block between writes, so
//! each bar redraws its own row by moving up to it, rewriting it and moving
//! back down, without touching its neighbours.
//!
//! # Synchronization Strategy
//!
//! Two kinds of locks are involved, always taken in the same order:
//!
//! * **Output lock** (one per group): guards the [`Coordinator`] (row layout
//!   and terminal) and the member list. Held for the duration of a write.
//! * **Bar locks** (one per member): guard each [`BarState`].
//!
//! An update takes its bar lock, applies the change, decides whether output is
//! due and releases the lock. Only then, if a redraw is due, does it take the
//! output lock, and it re-reads the bar state under that lock. Code holding a
//! bar lock never waits for the output lock, so the two cannot deadlock, and a
//! redraw always reflects fully applied updates.

use std::{fmt, fmt::Write as _, io, sync::Arc};

use compact_str::CompactString;
use parking_lot::Mutex;
use web_time::Instant;

use crate::{
    builder::ProgressBuilder,
    error::Result,
    progress::{BarState, ProgressSnapshot},
    render::{self, RenderFrame},
    sync::SyncGuard,
    terminal::{Decision, Mode, Terminal, log_timestamp},
};

const HIDE_CURSOR: &str = "\x1b[?25l";
const SHOW_CURSOR: &str = "\x1b[?25h";
const CLEAR_LINE: &str = "\x1b[2K";
const CLEAR_BELOW: &str = "\x1b[J";

// ============================================================================
// Coordinator
// ============================================================================

/// Row layout of a block of frames and the escape sequences that maintain it.
///
/// Rows are addressed by index; a row's offset below the anchor is the sum of
/// the heights of the rows above it. Every write leaves the cursor at the start
/// of the line below the block. In fallback mode frame writes are no-ops and
/// only plain lines are written.
pub(crate) struct Coordinator {
    terminal: Terminal,
    heights: Vec<usize>,
    cursor_hidden: bool,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("terminal", &self.terminal)
            .field("heights", &self.heights)
            .field("cursor_hidden", &self.cursor_hidden)
            .finish()
    }
}

impl Coordinator {
    pub(crate) const fn new(terminal: Terminal) -> Self {
        Self {
            terminal,
            heights: Vec::new(),
            cursor_hidden: false,
        }
    }

    pub(crate) const fn mode(&self) -> Mode {
        self.terminal.mode()
    }

    pub(crate) const fn columns(&self) -> usize {
        self.terminal.columns()
    }

    pub(crate) fn rows(&self) -> usize {
        self.heights.len()
    }

    /// Total height of the block in terminal lines.
    pub(crate) fn height(&self) -> usize {
        self.heights.iter().sum()
    }

    /// Lines between the anchor and the first line of row `index`.
    pub(crate) fn offset_of(&self, index: usize) -> usize {
        self.heights[..index.min(self.heights.len())].iter().sum()
    }

    /// Rewrites row `index` in place.
    ///
    /// Returns `false`, writing nothing, when the row does not exist or the
    /// frame's height differs from the row's; the caller then redraws from
    /// that row with [`redraw_from`](Self::redraw_from).
    pub(crate) fn redraw_row(&mut self, index: usize, frame: &RenderFrame) -> io::Result<bool> {
        if self.mode() == Mode::Fallback {
            return Ok(true);
        }
        if self.heights.get(index) != Some(&frame.height()) {
            return Ok(false);
        }

        let up = self.height() - self.offset_of(index);
        let down = up - frame.height();
        let mut out = self.begin();
        move_up(&mut out, up);
        for line in frame.lines() {
            let _ = writeln!(out, "\r{CLEAR_LINE}{line}");
        }
        move_down(&mut out, down);
        out.push('\r');
        self.terminal.write_frame(&out)?;
        Ok(true)
    }

    /// Clears everything from row `index` down and writes `frames` in its place.
    ///
    /// `frames` become the new rows `index..`; rows that were there before are
    /// replaced, so the same call appends, removes and resizes rows.
    pub(crate) fn redraw_from(&mut self, index: usize, frames: &[RenderFrame]) -> io::Result<()> {
        if self.mode() == Mode::Fallback {
            self.relayout(index, frames);
            return Ok(());
        }
        let mut out = self.begin();
        self.clear_from(&mut out, index);
        push_frames(&mut out, frames);
        self.relayout(index, frames);
        self.terminal.write_frame(&out)
    }

    /// Removes row `index`; `below` are the fresh frames of the rows after it.
    pub(crate) fn remove_row(&mut self, index: usize, below: &[RenderFrame]) -> io::Result<()> {
        tracing::debug!(index, rows = self.rows(), "removing row");
        self.redraw_from(index, below)
    }

    /// Writes `text` above the block, then redraws the whole block below it.
    pub(crate) fn println(&mut self, text: &str, frames: &[RenderFrame]) -> io::Result<()> {
        if self.mode() == Mode::Fallback {
            return self.terminal.write_frame(&format!("{text}\n"));
        }
        let mut out = self.begin();
        self.clear_from(&mut out, 0);
        let _ = writeln!(out, "{text}");
        push_frames(&mut out, frames);
        self.relayout(0, frames);
        self.terminal.write_frame(&out)
    }

    /// Final redraw of the whole block; shows the cursor again.
    pub(crate) fn finish(&mut self, frames: &[RenderFrame]) -> io::Result<()> {
        if self.mode() == Mode::Fallback {
            return Ok(());
        }
        let mut out = String::new();
        self.clear_from(&mut out, 0);
        out.push_str(SHOW_CURSOR);
        self.cursor_hidden = false;
        push_frames(&mut out, frames);
        self.relayout(0, frames);
        self.terminal.write_frame(&out)
    }

    /// Writes one fallback status line.
    pub(crate) fn log(&mut self, line: &str) -> io::Result<()> {
        self.terminal.write_log_line(line)
    }

    fn begin(&mut self) -> String {
        let mut out = String::new();
        if !self.cursor_hidden {
            out.push_str(HIDE_CURSOR);
            self.cursor_hidden = true;
        }
        out
    }

    fn clear_from(&self, out: &mut String, index: usize) {
        move_up(out, self.height() - self.offset_of(index));
        out.push('\r');
        out.push_str(CLEAR_BELOW);
    }

    fn relayout(&mut self, index: usize, frames: &[RenderFrame]) {
        self.heights.truncate(index);
        self.heights.extend(frames.iter().map(RenderFrame::height));
    }
}

fn move_up(out: &mut String, n: usize) {
    if n > 0 {
        let _ = write!(out, "\x1b[{n}A");
    }
}

fn move_down(out: &mut String, n: usize) {
    if n > 0 {
        let _ = write!(out, "\x1b[{n}B");
    }
}

fn push_frames(out: &mut String, frames: &[RenderFrame]) {
    for line in frames.iter().flat_map(RenderFrame::lines) {
        let _ = writeln!(out, "{CLEAR_LINE}{line}");
    }
}

// ============================================================================
// ProgressGroup
// ============================================================================

struct Member {
    id: usize,
    state: SyncGuard<BarState>,
}

struct GroupOutput {
    coordinator: Coordinator,
    members: Vec<Member>,
    next_id: usize,
    finished: bool,
}

impl GroupOutput {
    fn index_of(&self, id: usize) -> Option<usize> {
        self.members.iter().position(|m| m.id == id)
    }

    /// Ids are only unique within a group, so a handle also has to share the
    /// member's state to count as that member.
    fn index_of_bar(&self, bar: &GroupBar) -> Option<usize> {
        self.members
            .iter()
            .position(|m| m.id == bar.id && m.state.ptr_eq(&bar.state))
    }

    fn frames_from(&self, index: usize, now: Instant) -> Vec<RenderFrame> {
        let columns = self.coordinator.columns();
        self.members[index..]
            .iter()
            .map(|m| m.state.with(|s| render::frame(s.config(), &s.snapshot(now), columns)))
            .collect()
    }

    fn draw(&mut self, index: usize, now: Instant) -> io::Result<()> {
        let columns = self.coordinator.columns();
        let frame = self.members[index]
            .state
            .with(|s| render::frame(s.config(), &s.snapshot(now), columns));
        if !self.coordinator.redraw_row(index, &frame)? {
            let frames = self.frames_from(index, now);
            self.coordinator.redraw_from(index, &frames)?;
        }
        Ok(())
    }

    fn log(&mut self, index: usize, now: Instant, done: bool) -> io::Result<()> {
        let line = self.members[index].state.with(|s| {
            let ts = s.config().log_timestamp().then(log_timestamp);
            render::log_line(s.config(), &s.snapshot(now), ts.as_deref(), done)
        });
        self.coordinator.log(&line)
    }

    fn emit(&mut self, id: usize, decision: Decision, now: Instant) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        let Some(index) = self.index_of(id) else {
            return Ok(());
        };
        tracing::trace!(id, ?decision, "group output");
        match decision {
            Decision::Skip => Ok(()),
            Decision::Draw => self.draw(index, now),
            Decision::Log => self.log(index, now, false),
        }
    }

    fn finish_member(&mut self, id: usize, now: Instant) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        let Some(index) = self.index_of(id) else {
            return Ok(());
        };
        match self.coordinator.mode() {
            Mode::Animated => self.draw(index, now),
            Mode::Fallback => self.log(index, now, true),
        }
    }

    fn finalize(&mut self, now: Instant) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        tracing::debug!(bars = self.members.len(), "finalizing progress group");

        let newly: Vec<bool> = self
            .members
            .iter()
            .map(|m| m.state.with(BarState::finish))
            .collect();
        match self.coordinator.mode() {
            Mode::Animated => {
                let frames = self.frames_from(0, now);
                self.coordinator.finish(&frames)
            }
            Mode::Fallback => {
                for (index, _) in newly.iter().enumerate().filter(|(_, n)| **n) {
                    self.log(index, now, true)?;
                }
                Ok(())
            }
        }
    }
}

struct GroupShared {
    output: Mutex<GroupOutput>,
}

/// A block of bars drawn together on one terminal.
///
/// Dropping the group (or calling [`finish`](Self::finish)) finalizes every
/// member, redraws the block one last time and leaves the cursor below it.
pub struct ProgressGroup {
    shared: Arc<GroupShared>,
}

impl fmt::Debug for ProgressGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only the count; member states are not locked for formatting.
        f.debug_struct("ProgressGroup")
            .field("count", &self.len())
            .finish()
    }
}

impl Default for ProgressGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressGroup {
    /// A group drawing on the detected terminal.
    #[must_use]
    pub fn new() -> Self {
        Self::with_terminal(Terminal::detect())
    }

    /// A group drawing on `terminal`.
    #[must_use]
    pub fn with_terminal(terminal: Terminal) -> Self {
        Self {
            shared: Arc::new(GroupShared {
                output: Mutex::new(GroupOutput {
                    coordinator: Coordinator::new(terminal),
                    members: Vec::new(),
                    next_id: 0,
                    finished: false,
                }),
            }),
        }
    }

    /// Number of bars in the group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.output.lock().members.len()
    }

    /// Returns `true` if the group has no bars.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a bar as the new bottom row and redraws the block.
    ///
    /// The builder's own terminal, if any, is ignored.
    pub fn add_bar(&self, builder: ProgressBuilder) -> Result<GroupBar> {
        let (config, _, start) = builder.into_parts()?;
        let mut out = self.shared.output.lock();
        let mut state = BarState::new(Arc::new(config), out.coordinator.mode(), start);
        let decision = state.start(start);

        let id = out.next_id;
        out.next_id += 1;
        let guard = SyncGuard::new(state);
        out.members.push(Member {
            id,
            state: guard.clone(),
        });
        tracing::debug!(id, bars = out.members.len(), "added bar to group");

        match decision {
            Decision::Draw => {
                let frames = out.frames_from(0, start);
                out.coordinator.redraw_from(0, &frames)?;
            }
            Decision::Log => {
                let index = out.members.len() - 1;
                out.log(index, start, false)?;
            }
            Decision::Skip => {}
        }
        drop(out);

        Ok(GroupBar {
            id,
            state: guard,
            group: Arc::clone(&self.shared),
        })
    }

    /// Removes `bar` from the block; the rows below it move up.
    ///
    /// The bar is marked finished and later updates through its handle are
    /// not drawn. Removing a bar that is not a member does nothing.
    pub fn remove_bar(&self, bar: &GroupBar) -> Result<()> {
        self.remove_bar_at(bar, Instant::now())
    }

    /// [`remove_bar`](Self::remove_bar) with an explicit clock.
    pub fn remove_bar_at(&self, bar: &GroupBar, now: Instant) -> Result<()> {
        let mut out = self.shared.output.lock();
        let Some(index) = out.index_of_bar(bar) else {
            return Ok(());
        };
        let newly = out.members[index].state.with(BarState::finish);
        if newly && !out.finished && out.coordinator.mode() == Mode::Fallback {
            out.log(index, now, true)?;
        }
        out.members.remove(index);
        tracing::debug!(id = bar.id, bars = out.members.len(), "removed bar from group");

        let below = out.frames_from(index, now);
        out.coordinator.remove_row(index, &below)?;
        Ok(())
    }

    /// Redraws every row (or, without a terminal, logs every bar's status).
    pub fn refresh(&self) -> Result<()> {
        self.refresh_at(Instant::now())
    }

    /// [`refresh`](Self::refresh) with an explicit clock.
    pub fn refresh_at(&self, now: Instant) -> Result<()> {
        let mut out = self.shared.output.lock();
        if out.finished {
            return Ok(());
        }
        match out.coordinator.mode() {
            Mode::Animated => {
                let frames = out.frames_from(0, now);
                out.coordinator.redraw_from(0, &frames)?;
            }
            Mode::Fallback => {
                for index in 0..out.members.len() {
                    out.log(index, now, false)?;
                }
            }
        }
        Ok(())
    }

    /// Prints a line above the block without disturbing it.
    pub fn println(&self, text: &str) -> Result<()> {
        let now = Instant::now();
        let mut out = self.shared.output.lock();
        let frames = if out.finished || out.coordinator.mode() == Mode::Fallback {
            Vec::new()
        } else {
            out.frames_from(0, now)
        };
        out.coordinator.println(text, &frames)?;
        Ok(())
    }

    /// Lines between the anchor and `bar`'s row, if it is a member.
    #[must_use]
    pub fn row_offset(&self, bar: &GroupBar) -> Option<usize> {
        let out = self.shared.output.lock();
        out.index_of_bar(bar)
            .map(|index| out.coordinator.offset_of(index))
    }

    /// Finalizes every member and redraws the block one last time.
    pub fn finish(self) -> Result<()> {
        self.finalize(Instant::now())
    }

    fn finalize(&self, now: Instant) -> Result<()> {
        self.shared.output.lock().finalize(now)?;
        Ok(())
    }
}

impl Drop for ProgressGroup {
    fn drop(&mut self) {
        if let Err(err) = self.finalize(Instant::now()) {
            tracing::warn!(%err, "failed to finalize progress group");
        }
    }
}

/// Handle to one bar of a [`ProgressGroup`].
///
/// Cloneable and usable from any thread; every handle drives the same bar.
#[derive(Clone)]
pub struct GroupBar {
    id: usize,
    state: SyncGuard<BarState>,
    group: Arc<GroupShared>,
}

impl fmt::Debug for GroupBar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupBar")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl GroupBar {
    fn emit(&self, decision: Decision, now: Instant) -> Result<()> {
        if decision != Decision::Skip {
            self.group.output.lock().emit(self.id, decision, now)?;
        }
        Ok(())
    }

    /// Adds `n` to the count.
    pub fn update(&self, n: u64) -> Result<()> {
        self.update_at(n, Instant::now())
    }

    /// [`update`](Self::update) with an explicit clock.
    pub fn update_at(&self, n: u64, now: Instant) -> Result<()> {
        let decision = self.state.with(|s| s.update(n, now));
        self.emit(decision, now)
    }

    /// Moves the count to `position`; see [`BarState::set_position`].
    pub fn set_position(&self, position: u64) -> Result<()> {
        let now = Instant::now();
        let decision = self.state.with(|s| s.set_position(position, now));
        self.emit(decision, now)
    }

    /// Replaces the suffix and redraws immediately.
    pub fn set_suffix(&self, suffix: impl Into<CompactString>) -> Result<()> {
        self.set_suffix_at(suffix, Instant::now())
    }

    /// [`set_suffix`](Self::set_suffix) with an explicit clock.
    pub fn set_suffix_at(&self, suffix: impl Into<CompactString>, now: Instant) -> Result<()> {
        let decision = self.state.with(|s| s.set_suffix(suffix, now));
        self.emit(decision, now)
    }

    /// Marks this bar finished and draws its final state. Idempotent.
    ///
    /// The row stays in the block until removed or the group finishes.
    pub fn finish(&self) -> Result<()> {
        self.finish_at(Instant::now())
    }

    /// [`finish`](Self::finish) with an explicit clock.
    pub fn finish_at(&self, now: Instant) -> Result<()> {
        if self.state.with(BarState::finish) {
            self.group.output.lock().finish_member(self.id, now)?;
        }
        Ok(())
    }

    /// Current unclamped count.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.state.with(|s| s.position())
    }

    /// Immutable copy of the bar's displayable state.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let now = Instant::now();
        self.state.with(|s| s.snapshot(now))
    }
}
