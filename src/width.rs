//! ANSI-aware width measurement and truncation.
//!
//! Terminal output mixes visible characters with escape sequences that occupy no
//! columns. Everything in this module walks a string as a sequence of
//! [`Segment`]s: either a complete escape sequence (zero columns) or a single
//! character together with its display width (East Asian wide glyphs count as
//! two columns).
//!
//! Cutting a string never splits an escape sequence, and a cut that leaves an SGR
//! style open appends [`RESET`] so colors do not bleed into whatever the terminal
//! prints next.

use unicode_width::UnicodeWidthChar;

/// SGR sequence resetting every color and style attribute.
pub const RESET: &str = "\x1b[0m";

/// Marker appended to text that had to be shortened.
pub const ELLIPSIS: &str = "...";

const ESC: u8 = 0x1b;

/// One unit of a string as the terminal sees it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Segment<'a> {
    /// A complete escape sequence. Occupies no columns.
    Escape(&'a str),
    /// A single character and the number of columns it occupies.
    Text(&'a str, usize),
}

impl<'a> Segment<'a> {
    /// The raw slice of the source string this segment covers.
    #[must_use]
    pub const fn as_str(&self) -> &'a str {
        match self {
            Self::Escape(s) | Self::Text(s, _) => s,
        }
    }

    /// Columns occupied on screen.
    #[must_use]
    pub const fn width(&self) -> usize {
        match self {
            Self::Escape(_) => 0,
            Self::Text(_, w) => *w,
        }
    }
}

/// Iterator over the [`Segment`]s of a string.
#[derive(Clone, Debug)]
pub struct Segments<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let c = self.rest.chars().next()?;
        if c == '\x1b' {
            let (seq, rest) = self.rest.split_at(escape_len(self.rest.as_bytes()));
            self.rest = rest;
            return Some(Segment::Escape(seq));
        }
        let (text, rest) = self.rest.split_at(c.len_utf8());
        self.rest = rest;
        Some(Segment::Text(text, c.width().unwrap_or(0)))
    }
}

/// Length in bytes of the escape sequence at the start of `bytes`.
///
/// CSI sequences (`ESC [ params final`) run until their final byte. A malformed
/// sequence stops before the first byte that cannot belong to it, and a lone ESC
/// is one byte long. Every returned length lands on a char boundary because all
/// consumed bytes are ASCII.
fn escape_len(bytes: &[u8]) -> usize {
    debug_assert_eq!(bytes.first(), Some(&ESC));
    if bytes.get(1) != Some(&b'[') {
        return 1;
    }
    for (i, &b) in bytes.iter().enumerate().skip(2) {
        match b {
            0x40..=0x7e => return i + 1,
            0x20..=0x3f => {}
            _ => return i,
        }
    }
    bytes.len()
}

/// Splits `s` into escape sequences and visible characters.
#[must_use]
pub const fn segments(s: &str) -> Segments<'_> {
    Segments { rest: s }
}

/// Number of terminal columns the visible characters of `s` occupy.
#[must_use]
pub fn visible_width(s: &str) -> usize {
    segments(s).map(|seg| seg.width()).sum()
}

/// Removes every escape sequence, keeping only the visible text.
#[must_use]
pub fn strip(s: &str) -> String {
    segments(s)
        .filter_map(|seg| match seg {
            Segment::Text(t, _) => Some(t),
            Segment::Escape(_) => None,
        })
        .collect()
}

fn is_sgr(seq: &str) -> bool {
    seq.starts_with("\x1b[") && seq.ends_with('m')
}

/// Tracks which SGR sequences are in effect at a point in a string.
#[derive(Debug, Default)]
struct Styles<'a> {
    active: Vec<&'a str>,
}

impl<'a> Styles<'a> {
    fn observe(&mut self, seq: &'a str) {
        if !is_sgr(seq) {
            return;
        }
        let params = &seq[2..seq.len() - 1];
        let mut fields = params.split(';');
        if fields.next().is_none_or(|first| first.is_empty() || first == "0") {
            self.active.clear();
            if fields.all(|f| f.is_empty() || f == "0") {
                return;
            }
        }
        self.active.push(seq);
    }

    fn is_open(&self) -> bool {
        !self.active.is_empty()
    }

    fn reopen(&self) -> String {
        self.active.concat()
    }
}

/// Returns `true` if `s` ends with a color or style still in effect.
#[must_use]
pub fn has_open_style(s: &str) -> bool {
    let mut styles = Styles::default();
    for seg in segments(s) {
        if let Segment::Escape(seq) = seg {
            styles.observe(seq);
        }
    }
    styles.is_open()
}

/// Appends [`RESET`] if `s` leaves a style open.
#[must_use]
pub fn close(mut s: String) -> String {
    if has_open_style(&s) {
        s.push_str(RESET);
    }
    s
}

/// Longest prefix of `s` whose visible width is at most `width`.
///
/// Escape sequences are kept whole. If characters were cut while a style was
/// open, [`RESET`] is appended. A zero target yields just [`RESET`].
#[must_use]
pub fn truncate(s: &str, width: usize) -> String {
    if width == 0 {
        return RESET.to_owned();
    }
    if visible_width(s) <= width {
        return s.to_owned();
    }

    let mut out = String::with_capacity(s.len());
    let mut styles = Styles::default();
    let mut used = 0;
    for seg in segments(s) {
        match seg {
            Segment::Escape(seq) => {
                styles.observe(seq);
                out.push_str(seq);
            }
            Segment::Text(text, w) => {
                if used + w > width {
                    break;
                }
                used += w;
                out.push_str(text);
            }
        }
    }
    if styles.is_open() {
        out.push_str(RESET);
    }
    out
}

/// Shortens `s` to `width` columns, ending it with `marker` when anything was cut.
#[must_use]
pub fn elide(s: &str, width: usize, marker: &str) -> String {
    if visible_width(s) <= width {
        return s.to_owned();
    }
    let marker_width = visible_width(marker);
    if width <= marker_width {
        return truncate(marker, width);
    }
    let mut out = truncate(s, width - marker_width);
    out.push_str(marker);
    out
}

/// Splits `s` after at most `width` columns.
///
/// The head is closed with [`RESET`] if a style is open at the cut, and the tail
/// starts by re-applying those styles, so both halves render as they did in the
/// unsplit text. The head always takes at least one character, which keeps repeated
/// splitting finite even for glyphs wider than `width`.
#[must_use]
pub fn split_at_width(s: &str, width: usize) -> (String, String) {
    let mut head = String::with_capacity(s.len());
    let mut styles = Styles::default();
    let mut used = 0;
    let mut offset = 0;
    for seg in segments(s) {
        match seg {
            Segment::Escape(seq) => {
                styles.observe(seq);
                head.push_str(seq);
            }
            Segment::Text(text, w) => {
                if used > 0 && used + w > width {
                    break;
                }
                used += w;
                head.push_str(text);
            }
        }
        offset += seg.as_str().len();
    }

    let rest = &s[offset..];
    if rest.is_empty() {
        return (head, String::new());
    }
    let mut tail = styles.reopen();
    tail.push_str(rest);
    if styles.is_open() {
        head.push_str(RESET);
    }
    (head, tail)
}

/// Breaks `s` into lines no wider than `width` columns (minimum one).
#[must_use]
pub fn wrap(s: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut rest = s.to_owned();
    loop {
        if visible_width(&rest) <= width {
            lines.push(rest);
            break;
        }
        let (head, tail) = split_at_width(&rest, width);
        lines.push(head);
        // a tail of bare escape sequences would only produce an empty line
        if visible_width(&tail) == 0 {
            break;
        }
        rest = tail;
    }
    lines
}
