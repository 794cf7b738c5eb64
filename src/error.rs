//! Error taxonomy.
//!
//! Configuration problems are reported once, when a bar is built. Runtime
//! arithmetic edge cases (zero elapsed time, zero rate) never surface here; they
//! degrade to an unknown ETA instead. The only runtime error is a failed write
//! to the output stream.

use compact_str::CompactString;

/// Errors produced while configuring or drawing progress bars.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A color name that is not part of the palette.
    #[error("unknown color name `{0}`")]
    UnknownColor(CompactString),

    /// A `#rgb` / `#rrggbb` string that could not be parsed.
    #[error("invalid hex color `{0}`: expected `#` followed by 3 or 6 hex digits")]
    InvalidHexColor(CompactString),

    /// A bar style name that is not one of the known glyph tables.
    #[error("unknown bar style `{0}`: expected one of classic, gradient, braille, circles, blocks")]
    UnknownStyle(CompactString),

    /// A unit scale name other than `none`, `kmg` or `binary`.
    #[error("unknown unit scale `{0}`: expected one of none, kmg, binary")]
    UnknownUnitScale(CompactString),

    /// The glyph region must be at least one column wide.
    #[error("bar width must be positive")]
    ZeroWidth,

    /// A suffix needs at least one continuation line to wrap onto.
    #[error("suffix_lines must be positive")]
    ZeroSuffixLines,

    /// Determinate bars need a positive total.
    #[error("total must be positive; leave it unset for an indeterminate bar")]
    ZeroTotal,

    /// The EMA factor lies outside `[0, 1]` (or is NaN).
    #[error("smoothing factor must be within [0, 1], got {0}")]
    InvalidSmoothing(f64),

    /// Writing to the terminal or log stream failed.
    #[error("failed to write progress output: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::Error;

    /// Messages
    /// Configuration errors name the offending value.
    #[test]
    fn test_messages_name_the_value() {
        let err = Error::UnknownStyle("zigzag".into());
        assert!(err.to_string().contains("zigzag"));

        let err = Error::InvalidSmoothing(1.5);
        assert!(err.to_string().contains("1.5"));
    }

    /// I/O Conversion
    /// Stream failures convert through `?` without losing the kind.
    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: Error = io.into();
        match err {
            Error::Io(inner) => assert_eq!(inner.kind(), std::io::ErrorKind::BrokenPipe),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
