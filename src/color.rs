//! Color input normalization.
//!
//! Callers may name a color in three ways (a palette name, an RGB triple or a
//! hex string). [`ColorSpec`] captures that input as given; [`ColorSpec::resolve`]
//! validates it once, at construction time, into the canonical [`Color`] that
//! the renderer works with.

use std::{fmt, str::FromStr};

use compact_str::{CompactString, format_compact};

use crate::error::{Error, Result};

/// The named palette: the bright variants of the eight standard ANSI colors.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum NamedColor {
    /// Bright black (grey), SGR 90.
    Black,
    /// Bright red, SGR 91.
    Red,
    /// Bright green, SGR 92.
    Green,
    /// Bright yellow, SGR 93.
    Yellow,
    /// Bright blue, SGR 94.
    Blue,
    /// Bright magenta, SGR 95.
    Magenta,
    /// Bright cyan, SGR 96.
    Cyan,
    /// Bright white, SGR 97.
    White,
}

impl NamedColor {
    const ALL: [Self; 8] = [
        Self::Black,
        Self::Red,
        Self::Green,
        Self::Yellow,
        Self::Blue,
        Self::Magenta,
        Self::Cyan,
        Self::White,
    ];

    /// Lowercase palette name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Red => "red",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Blue => "blue",
            Self::Magenta => "magenta",
            Self::Cyan => "cyan",
            Self::White => "white",
        }
    }

    const fn sgr_code(self) -> u8 {
        match self {
            Self::Black => 90,
            Self::Red => 91,
            Self::Green => 92,
            Self::Yellow => 93,
            Self::Blue => 94,
            Self::Magenta => 95,
            Self::Cyan => 96,
            Self::White => 97,
        }
    }

    // xterm's default rendering of the bright palette.
    const fn approx_rgb(self) -> Rgb {
        match self {
            Self::Black => Rgb::new(127, 127, 127),
            Self::Red => Rgb::new(255, 0, 0),
            Self::Green => Rgb::new(0, 255, 0),
            Self::Yellow => Rgb::new(255, 255, 0),
            Self::Blue => Rgb::new(92, 92, 255),
            Self::Magenta => Rgb::new(255, 0, 255),
            Self::Cyan => Rgb::new(0, 255, 255),
            Self::White => Rgb::new(255, 255, 255),
        }
    }
}

/// A 24-bit color.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Creates a color from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear interpolation towards `other`; `t` is clamped to `[0, 1]`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Self::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    /// Scales every channel by `factor` (clamped to `[0, 1]`).
    #[must_use]
    pub fn dim(self, factor: f64) -> Self {
        Self::default().lerp(self, factor)
    }

    /// Truecolor foreground SGR sequence.
    #[must_use]
    pub fn sgr(self) -> CompactString {
        format_compact!("\x1b[38;2;{};{};{}m", self.r, self.g, self.b)
    }
}

/// The canonical color every renderer consumes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Color {
    /// An entry of the terminal's own palette.
    Palette(NamedColor),
    /// An exact 24-bit color.
    Rgb(Rgb),
}

impl Color {
    /// Foreground SGR sequence selecting this color.
    #[must_use]
    pub fn sgr(self) -> CompactString {
        match self {
            Self::Palette(named) => format_compact!("\x1b[{}m", named.sgr_code()),
            Self::Rgb(rgb) => rgb.sgr(),
        }
    }

    /// RGB value, approximated for palette entries.
    #[must_use]
    pub const fn rgb(self) -> Rgb {
        match self {
            Self::Palette(named) => named.approx_rgb(),
            Self::Rgb(rgb) => rgb,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::Palette(NamedColor::Cyan)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Palette(named) => f.write_str(named.name()),
            Self::Rgb(Rgb { r, g, b }) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
        }
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ColorSpec::from(s).resolve()
    }
}

/// Color as supplied by the caller, before validation.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColorSpec {
    /// A palette name such as `"cyan"`.
    Named(CompactString),
    /// An RGB triple.
    Rgb(u8, u8, u8),
    /// `"#rgb"` or `"#rrggbb"`.
    Hex(CompactString),
    /// An already resolved color.
    Resolved(Color),
}

impl ColorSpec {
    /// Validates the input into a [`Color`].
    pub fn resolve(&self) -> Result<Color> {
        match self {
            Self::Named(name) => NamedColor::ALL
                .into_iter()
                .find(|c| c.name().eq_ignore_ascii_case(name))
                .map(Color::Palette)
                .ok_or_else(|| Error::UnknownColor(name.clone())),
            Self::Rgb(r, g, b) => Ok(Color::Rgb(Rgb::new(*r, *g, *b))),
            Self::Hex(hex) => parse_hex(hex).map(Color::Rgb),
            Self::Resolved(color) => Ok(*color),
        }
    }
}

impl Default for ColorSpec {
    fn default() -> Self {
        Self::Resolved(Color::default())
    }
}

impl From<&str> for ColorSpec {
    fn from(s: &str) -> Self {
        if s.starts_with('#') {
            Self::Hex(s.into())
        } else {
            Self::Named(s.into())
        }
    }
}

impl From<String> for ColorSpec {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<(u8, u8, u8)> for ColorSpec {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::Rgb(r, g, b)
    }
}

impl From<Color> for ColorSpec {
    fn from(color: Color) -> Self {
        Self::Resolved(color)
    }
}

impl From<NamedColor> for ColorSpec {
    fn from(color: NamedColor) -> Self {
        Self::Resolved(Color::Palette(color))
    }
}

fn parse_hex(input: &str) -> Result<Rgb> {
    let invalid = || Error::InvalidHexColor(input.into());
    let digits = input.strip_prefix('#').ok_or_else(invalid)?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
    match digits.len() {
        3 => {
            let expand = |i: usize| channel(&digits[i..=i].repeat(2));
            Ok(Rgb::new(expand(0)?, expand(1)?, expand(2)?))
        }
        6 => Ok(Rgb::new(
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        )),
        _ => Err(invalid()),
    }
}
