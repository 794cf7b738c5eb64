//! I/O wrappers for tracking data transfer.
//!
//! [`ProgressReader`] and [`ProgressWriter`] wrap any [`Read`] or [`Write`]
//! and advance a bar by the number of bytes that passed through, which suits
//! downloads, hashing and (de)compression streams. Pair them with
//! [`UnitScale::Binary`](crate::UnitScale::Binary) and the unit `B` for
//! byte-sized labels.
//!
//! Bytes that reached the inner stream are always reported, so a failure to
//! draw the bar never hides data from the caller. The failure is kept and
//! returned as an [`io::Error`] from the next `read`, `write` or `flush`,
//! before the inner stream is touched again.

use std::io::{self, Read, Write};

use crate::{error::Error, iter::Advance};

/// Advances `bar`, parking a drawing failure in `pending`.
fn advance(bar: &mut impl Advance, pending: &mut Option<Error>, n: usize) {
    if let Err(err) = bar.advance(n as u64) {
        tracing::debug!(error = %err, "progress stream failed; deferring the error");
        *pending = Some(err);
    }
}

fn take_pending(pending: &mut Option<Error>) -> io::Result<()> {
    pending.take().map_or(Ok(()), |err| Err(io::Error::other(err)))
}

/// A wrapper around [`Read`] that advances a bar by the bytes read.
pub struct ProgressReader<R, B> {
    inner: R,
    bar: B,
    pending: Option<Error>,
}

impl<R, B: Advance> ProgressReader<R, B> {
    /// Wraps `inner`, advancing `bar`.
    pub const fn new(inner: R, bar: B) -> Self {
        Self {
            inner,
            bar,
            pending: None,
        }
    }

    /// The bar being advanced.
    pub const fn bar(&self) -> &B {
        &self.bar
    }

    /// Unwraps the reader and the bar.
    pub fn into_parts(self) -> (R, B) {
        (self.inner, self.bar)
    }
}

impl<R: Read, B: Advance> Read for ProgressReader<R, B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        take_pending(&mut self.pending)?;
        let n = self.inner.read(buf)?;
        advance(&mut self.bar, &mut self.pending, n);
        Ok(n)
    }
}

/// A wrapper around [`Write`] that advances a bar by the bytes written.
pub struct ProgressWriter<W, B> {
    inner: W,
    bar: B,
    pending: Option<Error>,
}

impl<W, B: Advance> ProgressWriter<W, B> {
    /// Wraps `inner`, advancing `bar`.
    pub const fn new(inner: W, bar: B) -> Self {
        Self {
            inner,
            bar,
            pending: None,
        }
    }

    /// The bar being advanced.
    pub const fn bar(&self) -> &B {
        &self.bar
    }

    /// Unwraps the writer and the bar.
    pub fn into_parts(self) -> (W, B) {
        (self.inner, self.bar)
    }
}

impl<W: Write, B: Advance> Write for ProgressWriter<W, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        take_pending(&mut self.pending)?;
        let n = self.inner.write(buf)?;
        advance(&mut self.bar, &mut self.pending, n);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()?;
        take_pending(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{self, Cursor, Read as _, Write},
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    };

    use super::{ProgressReader, ProgressWriter};
    use crate::{
        bar::ProgressBar,
        builder::ProgressBuilder,
        iter::Advance as _,
        terminal::{Mode, Terminal},
    };

    /// A frame stream that starts failing once `broken` is set.
    #[derive(Clone, Default)]
    struct Breakable {
        broken: Arc<AtomicBool>,
    }

    impl Write for Breakable {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn breakable_bar(total: u64) -> (ProgressBar, Breakable) {
        let stream = Breakable::default();
        let term = Terminal::new(stream.clone(), io::sink(), Mode::Animated, 80);
        let bar = ProgressBuilder::new_bar(total)
            .min_redraw_interval(Duration::ZERO)
            .terminal(term)
            .build()
            .unwrap();
        (bar, stream)
    }

    /// Reader Tracking
    /// Bytes read are counted.
    #[test]
    fn test_io_reader() {
        let (term, _capture) = Terminal::capture(Mode::Animated, 80);
        let bar = ProgressBuilder::new_bar(100)
            .unit("B")
            .terminal(term)
            .build()
            .unwrap();
        let data = vec![0u8; 100];
        let mut reader = ProgressReader::new(Cursor::new(&data), bar);

        let mut buf = [0u8; 10];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(reader.bar().position(), 10);

        io::copy(&mut reader, &mut io::sink()).unwrap();
        let (_, bar) = reader.into_parts();
        assert_eq!(bar.position(), 100);
        bar.complete().unwrap();
    }

    /// Writer Tracking
    /// Bytes written are counted.
    #[test]
    fn test_io_writer() {
        let (term, capture) = Terminal::capture(Mode::Fallback, 80);
        let bar = ProgressBuilder::new_bar(50)
            .desc("write")
            .terminal(term)
            .build_shared()
            .unwrap();
        let mut writer = ProgressWriter::new(Vec::new(), bar.clone());

        writer.write_all(&[1, 2, 3, 4, 5]).unwrap();
        writer.flush().unwrap();

        assert_eq!(bar.position(), 5);
        drop(writer);
        drop(bar);
        assert!(capture.log_lines()[1].starts_with("write: 10.0% (5/50)"));
    }

    /// Broken Stream While Reading
    /// Bytes already read are returned; the drawing error comes from the next read.
    #[test]
    fn test_reader_keeps_bytes_on_stream_error() {
        let (bar, stream) = breakable_bar(100);
        let data: Vec<u8> = (0..100).collect();
        let mut reader = ProgressReader::new(Cursor::new(data), bar);

        stream.broken.store(true, Ordering::SeqCst);
        let mut buf = [0u8; 10];
        assert_eq!(reader.read(&mut buf).unwrap(), 10);
        assert_eq!(buf[9], 9);
        assert_eq!(reader.bar().position(), 10);

        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        let (inner, _bar) = reader.into_parts();
        assert_eq!(inner.position(), 10, "the failing call reads nothing");
    }

    /// Broken Stream While Writing
    /// A committed write reports its length; the error surfaces at flush.
    #[test]
    fn test_writer_reports_committed_bytes() {
        let (bar, stream) = breakable_bar(100);
        let mut writer = ProgressWriter::new(Vec::new(), bar);

        stream.broken.store(true, Ordering::SeqCst);
        assert_eq!(writer.write(&[7; 4]).unwrap(), 4);
        assert!(writer.flush().is_err());
        writer.flush().unwrap();

        let (inner, bar) = writer.into_parts();
        assert_eq!(inner, vec![7; 4]);
        assert_eq!(bar.position(), 4);
    }
}
