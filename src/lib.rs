//! # `zobar`
//!
//! Live, in-place terminal progress bars.
//!
//! `zobar` draws progress bars that redraw themselves in place on an
//! interactive terminal and fall back to rate-limited plain status lines when
//! the output is a pipe, a file or a CI log. It is designed to be:
//!
//! * **Pull-driven**: no background threads or timers. All output happens
//!   synchronously inside `update`, `set_suffix` and finalization.
//! * **Escape-aware**: widths are measured in visible columns, so colored
//!   descriptions and suffixes never break the layout or bleed their style.
//! * **Scoped**: dropping a bar or a group always writes one final frame and
//!   leaves the cursor on a fresh line.
//!
//! ## Modules
//!
//! * [`bar`]: Stand-alone [`ProgressBar`] and its thread-safe [`SharedProgressBar`].
//! * [`builder`]: The [`ProgressBuilder`] configuration layer.
//! * [`color`]: Color input normalization.
//! * [`error`]: The crate's [`Error`] type.
//! * [`io`]: Wrappers for [`std::io::Read`] and [`std::io::Write`] that count bytes.
//! * [`iter`]: Extension traits for tracking progress on Iterators.
//! * [`progress`]: The per-bar state record and its snapshots.
//! * [`render`]: Frame and status-line layout.
//! * [`smoother`]: Rate/ETA smoothing and the indeterminate bounce cycle.
//! * [`stack`]: [`ProgressGroup`], several bars on one terminal.
//! * [`style`]: Glyph tables.
//! * [`sync`]: [`SyncGuard`], the shared lock used by thread-safe bars.
//! * [`terminal`]: Output streams and the animated/fallback decision.
//! * [`units`]: Human-readable counts.
//! * [`width`]: Escape-aware width measurement, truncation and wrapping.
//!
//! ## Example
//!
//! ```no_run
//! use zobar::ProgressBuilder;
//!
//! # fn main() -> zobar::Result<()> {
//! let mut bar = ProgressBuilder::new_bar(100)
//!     .desc("download")
//!     .color("#ff8800")
//!     .bar_style("braille")
//!     .build()?;
//! for _ in 0..100 {
//!     bar.update(1)?;
//! }
//! bar.finish()
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bar;
pub mod builder;
pub mod color;
pub mod error;
pub mod io;
pub mod iter;
pub mod progress;
pub mod render;
pub mod smoother;
pub mod stack;
pub mod style;
pub mod sync;
pub mod terminal;
pub mod units;
pub mod width;

pub use bar::{ProgressBar, SharedProgressBar};
pub use builder::{BarConfig, ProgressBuilder};
pub use color::{Color, ColorSpec, NamedColor, Rgb};
pub use error::{Error, Result};
pub use io::{ProgressReader, ProgressWriter};
pub use iter::{Advance, ProgressIter, ProgressIteratorExt};
pub use progress::{BarState, ProgressSnapshot};
pub use render::RenderFrame;
pub use stack::{GroupBar, ProgressGroup};
pub use style::{BarStyle, StyleSpec};
pub use sync::SyncGuard;
pub use terminal::{Capture, Mode, Terminal};
pub use units::UnitScale;
