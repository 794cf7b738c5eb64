//! Iterator adapters for automatic progress tracking.
//!
//! [`ProgressIteratorExt`] adds methods to every [`Iterator`] that drive a bar
//! from the loop itself: each yielded item advances the bar by one, and
//! exhausting the iterator finishes it.
//!
//! # Heuristics
//!
//! The adapters check [`Iterator::size_hint`]:
//! * If the iterator reports an exact, non-zero length, a determinate bar is
//!   created with that total.
//! * Otherwise the bar is indeterminate.
//!
//! # Example
//!
//! ```ignore
//! use zobar::ProgressIteratorExt;
//!
//! for item in vec![1, 2, 3].into_iter().progress()? {
//!     // ...
//! }
//! ```

use compact_str::CompactString;

use crate::{
    bar::{ProgressBar, SharedProgressBar},
    builder::ProgressBuilder,
    error::Result,
    stack::{GroupBar, ProgressGroup},
};

/// Anything an adapter can drive.
pub trait Advance {
    /// Adds `n` to the count.
    fn advance(&mut self, n: u64) -> Result<()>;

    /// The source is exhausted.
    fn complete(self) -> Result<()>
    where
        Self: Sized;
}

impl Advance for ProgressBar {
    fn advance(&mut self, n: u64) -> Result<()> {
        self.update(n)
    }

    fn complete(self) -> Result<()> {
        self.finish()
    }
}

impl Advance for SharedProgressBar {
    fn advance(&mut self, n: u64) -> Result<()> {
        self.update(n)
    }

    fn complete(self) -> Result<()> {
        self.finish()
    }
}

impl Advance for GroupBar {
    fn advance(&mut self, n: u64) -> Result<()> {
        self.update(n)
    }

    fn complete(self) -> Result<()> {
        self.finish()
    }
}

/// An iterator adapter that advances a bar for every item.
///
/// Output errors cannot be returned through [`Iterator::next`]; after the
/// first one is logged the bar is dropped and the iteration continues untracked.
pub struct ProgressIter<I, B: Advance> {
    iter: I,
    bar: Option<B>,
}

impl<I, B: Advance> ProgressIter<I, B> {
    /// Wraps `iter`, advancing `bar`.
    ///
    /// Note: This is usually constructed via [`ProgressIteratorExt`] methods.
    pub const fn new(iter: I, bar: B) -> Self {
        Self {
            iter,
            bar: Some(bar),
        }
    }

    /// The bar, while the iteration is still tracked.
    pub const fn bar(&self) -> Option<&B> {
        self.bar.as_ref()
    }
}

impl<I: Iterator, B: Advance> Iterator for ProgressIter<I, B> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.iter.next();

        let outcome = if item.is_some() {
            self.bar.as_mut().map_or(Ok(()), |bar| bar.advance(1))
        } else {
            // Iterator exhausted
            self.bar.take().map_or(Ok(()), B::complete)
        };
        if let Err(err) = outcome {
            tracing::warn!(%err, "progress output failed; no longer tracking iterator");
            self.bar = None;
        }

        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

/// Extension trait to attach a bar to any Iterator.
pub trait ProgressIteratorExt: Iterator + Sized {
    /// Wraps the iterator in a new bar on the detected terminal.
    fn progress(self) -> Result<ProgressIter<Self, ProgressBar>> {
        self.progress_with_desc(CompactString::default())
    }

    /// Wraps the iterator in a new bar with a description.
    fn progress_with_desc(
        self,
        desc: impl Into<CompactString>,
    ) -> Result<ProgressIter<Self, ProgressBar>> {
        let bar = self.size_hint_builder().desc(desc).build()?;
        Ok(ProgressIter::new(self, bar))
    }

    /// Wraps the iterator using an existing bar.
    fn progress_with<B: Advance>(self, bar: B) -> ProgressIter<Self, B> {
        ProgressIter::new(self, bar)
    }

    /// Adds a new bar to `group` and wraps the iterator.
    fn progress_in(self, group: &ProgressGroup) -> Result<ProgressIter<Self, GroupBar>> {
        let bar = group.add_bar(self.size_hint_builder())?;
        Ok(ProgressIter::new(self, bar))
    }

    /// Builder for a bar matching this iterator's `size_hint`.
    fn size_hint_builder(&self) -> ProgressBuilder {
        match self.size_hint() {
            (lower, Some(upper)) if lower == upper && upper > 0 => {
                ProgressBuilder::new_bar(upper as u64)
            }
            _ => ProgressBuilder::new_indeterminate(),
        }
    }
}

impl<I: Iterator> ProgressIteratorExt for I {}
