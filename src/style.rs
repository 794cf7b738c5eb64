//! Glyph tables for the bar region.
//!
//! Each [`BarStyle`] is a list of glyphs ordered from "full" to "empty". Fully
//! covered cells use the first glyph, untouched cells the last, and styles with
//! intermediate glyphs use them for the single partially covered cell at the
//! progress boundary.

use std::{fmt, str::FromStr};

use compact_str::CompactString;

use crate::{
    color::Color,
    error::{Error, Result},
    width::RESET,
};

/// Number of cells the indeterminate marker occupies.
pub const BOUNCE_BLOCK: usize = 3;

/// How much darker the first gradient cell is than the configured color.
const GRADIENT_START: f64 = 0.45;

/// Visual style of the bar region.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum BarStyle {
    /// `█` and `░`.
    Classic,
    /// Shaded blocks, with filled cells shading from dark to the bar color.
    #[default]
    Gradient,
    /// Braille dot patterns.
    Braille,
    /// `●` and `○`.
    Circles,
    /// Medium and light shade blocks.
    Blocks,
}

impl BarStyle {
    /// Every style, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Classic,
        Self::Gradient,
        Self::Braille,
        Self::Circles,
        Self::Blocks,
    ];

    /// Lowercase style name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Gradient => "gradient",
            Self::Braille => "braille",
            Self::Circles => "circles",
            Self::Blocks => "blocks",
        }
    }

    /// Glyphs ordered from full to empty.
    #[must_use]
    pub const fn glyphs(self) -> &'static [char] {
        match self {
            Self::Classic => &['█', '░'],
            Self::Gradient => &['█', '▓', '▒', '░'],
            Self::Braille => &['⣿', '⣤', '⣄', '⡤', '⠤', '⠔', '⠒', '⠉', ' '],
            Self::Circles => &['●', '○'],
            Self::Blocks => &['▓', '▒', '░'],
        }
    }

    const fn full(self) -> char {
        self.glyphs()[0]
    }

    const fn empty(self) -> char {
        let glyphs = self.glyphs();
        glyphs[glyphs.len() - 1]
    }

    /// Glyphs for `fraction` (clamped to `[0, 1]`) of a `width`-cell region.
    ///
    /// Returns the text and the number of lit cells (full or partial).
    #[must_use]
    pub fn fill(self, fraction: f64, width: usize) -> (String, usize) {
        let glyphs = self.glyphs();
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        let exact = fraction * width as f64;
        let full = (exact.floor() as usize).min(width);
        let partial = exact - full as f64;

        let mut out = String::with_capacity(width * 3);
        out.extend(std::iter::repeat_n(self.full(), full));
        let mut lit = full;
        if full < width {
            let intermediates = glyphs.len().saturating_sub(2);
            if intermediates > 0 && partial > 0.0 {
                let step = ((1.0 - partial) * intermediates as f64) as usize;
                out.push(glyphs[1 + step.min(intermediates - 1)]);
                lit += 1;
            } else {
                out.push(self.empty());
            }
            out.extend(std::iter::repeat_n(self.empty(), width - full - 1));
        }
        (out, lit)
    }

    /// Glyphs for the indeterminate marker at `position`.
    ///
    /// The marker is [`BOUNCE_BLOCK`] cells wide (or the whole region if it is
    /// narrower); `position` is clamped so the marker never leaves the region.
    #[must_use]
    pub fn bounce(self, position: usize, width: usize) -> String {
        let block = BOUNCE_BLOCK.min(width);
        let position = position.min(width - block);
        let mut out = String::with_capacity(width * 3);
        out.extend(std::iter::repeat_n(self.empty(), position));
        out.extend(std::iter::repeat_n(self.full(), block));
        out.extend(std::iter::repeat_n(self.empty(), width - position - block));
        out
    }

    /// Colors a glyph region produced by [`fill`](Self::fill).
    ///
    /// The gradient style shades each lit cell individually, interpolating across
    /// the full region width so a cell keeps its shade as the bar grows.
    #[must_use]
    pub fn paint(self, cells: &str, lit: usize, color: Color) -> String {
        let base = color.sgr();
        if self != Self::Gradient || lit == 0 {
            return format!("{base}{cells}{RESET}");
        }

        let width = cells.chars().count();
        let end = color.rgb();
        let start = end.dim(GRADIENT_START);
        let span = width.saturating_sub(1).max(1) as f64;

        let mut out = String::with_capacity(cells.len() + lit * 20);
        let mut chars = cells.chars();
        for (i, glyph) in chars.by_ref().take(lit).enumerate() {
            out.push_str(&start.lerp(end, i as f64 / span).sgr());
            out.push(glyph);
        }
        out.push_str(&base);
        out.extend(chars);
        out.push_str(RESET);
        out
    }
}

impl FromStr for BarStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|style| style.name() == s)
            .ok_or_else(|| Error::UnknownStyle(s.into()))
    }
}

impl fmt::Display for BarStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bar style as supplied by the caller, before validation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StyleSpec {
    /// A style name such as `"braille"`.
    Named(CompactString),
    /// A known style.
    Style(BarStyle),
}

impl StyleSpec {
    /// Validates the input into a [`BarStyle`].
    pub fn resolve(&self) -> Result<BarStyle> {
        match self {
            Self::Named(name) => name.parse(),
            Self::Style(style) => Ok(*style),
        }
    }
}

impl Default for StyleSpec {
    fn default() -> Self {
        Self::Style(BarStyle::default())
    }
}

impl From<BarStyle> for StyleSpec {
    fn from(style: BarStyle) -> Self {
        Self::Style(style)
    }
}

impl From<&str> for StyleSpec {
    fn from(name: &str) -> Self {
        Self::Named(name.into())
    }
}

impl From<String> for StyleSpec {
    fn from(name: String) -> Self {
        Self::Named(name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        color::{NamedColor, Rgb},
        width::visible_width,
    };

    /// Classic Half
    /// Half progress fills exactly half the cells.
    #[test]
    fn test_classic_half() {
        let (cells, lit) = BarStyle::Classic.fill(0.5, 10);
        assert_eq!(cells, "█████░░░░░");
        assert_eq!(lit, 5);
    }

    /// Partial Cell
    /// The boundary cell uses an intermediate glyph, heavier for more progress.
    #[test]
    fn test_gradient_partial_cell() {
        let (cells, lit) = BarStyle::Gradient.fill(0.32, 10);
        assert_eq!(cells, "███▒░░░░░░");
        assert_eq!(lit, 4);

        let (cells, _) = BarStyle::Gradient.fill(0.38, 10);
        assert_eq!(cells, "███▓░░░░░░");
    }

    /// Bounds
    /// Every style keeps the region width at 0%, 100% and beyond.
    #[test]
    fn test_fill_bounds() {
        for style in BarStyle::ALL {
            for fraction in [0.0, 0.33, 1.0, 1.7, -0.2, f64::NAN] {
                let (cells, lit) = style.fill(fraction, 7);
                assert_eq!(cells.chars().count(), 7, "{style} at {fraction}");
                assert!(lit <= 7);
            }
            let (cells, _) = style.fill(1.0, 4);
            assert!(cells.chars().all(|c| c == style.glyphs()[0]));
        }
    }

    /// Bounce Marker
    /// The marker is clamped inside the region.
    #[test]
    fn test_bounce() {
        assert_eq!(BarStyle::Classic.bounce(0, 6), "███░░░");
        assert_eq!(BarStyle::Classic.bounce(2, 6), "░░███░");
        assert_eq!(BarStyle::Classic.bounce(99, 6), "░░░███");
        assert_eq!(BarStyle::Classic.bounce(1, 2), "██");
    }

    /// Gradient Painting
    /// Each lit cell carries its own truecolor sequence; the region stays its width.
    #[test]
    fn test_paint_gradient() {
        let color = Color::Rgb(Rgb::new(200, 100, 0));
        let (cells, lit) = BarStyle::Gradient.fill(0.5, 4);
        let painted = BarStyle::Gradient.paint(&cells, lit, color);
        assert_eq!(visible_width(&painted), 4);
        // two shaded cells plus the base color for the rest
        assert_eq!(painted.matches("\x1b[38;2;").count(), 3);
        assert!(painted.starts_with(Rgb::new(90, 45, 0).sgr().as_str()));
        assert!(painted.ends_with(RESET));

        let plain = BarStyle::Classic.paint("██░░", 2, Color::Palette(NamedColor::Green));
        assert_eq!(plain, "\x1b[92m██░░\x1b[0m");
    }

    /// Names
    #[test]
    fn test_parse_names() {
        for style in BarStyle::ALL {
            assert_eq!(style.name().parse::<BarStyle>().unwrap(), style);
        }
        assert!(matches!(
            StyleSpec::from("zigzag").resolve(),
            Err(Error::UnknownStyle(_))
        ));
    }
}
