//! Frame and status-line layout.
//!
//! Rendering is a pure function of a [`BarConfig`], a [`ProgressSnapshot`] and
//! the terminal width: the same inputs always produce byte-identical output.
//!
//! A determinate frame reads
//!
//! ```text
//! ⠹ desc [████▓░░░░░]  42.0% 42/100 12.5 it/s 3.4s ETA: 5s suffix
//! ```
//!
//! and an indeterminate one
//!
//! ```text
//! [░░░███░░░░] desc 42 it 12.5 it/s 3.4s suffix
//! ```
//!
//! The bar and the numeric stats are never cut. When the line is too wide the
//! suffix moves onto continuation lines first (at most
//! [`BarConfig::suffix_lines`] of them, the last elided with `...`); a
//! description that still does not fit is shortened, then dropped.

use std::{fmt::Write as _, time::Duration};

use crate::{
    builder::BarConfig,
    color::{Color, NamedColor},
    progress::ProgressSnapshot,
    width::{ELLIPSIS, RESET, close, elide, strip, truncate, visible_width, wrap},
};

/// Spinner frames, advanced once per drawn frame.
pub const SPINNER: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

const DONE: char = '✓';
const ABANDONED: char = '✗';

/// The last terminal column is left free so a full line never triggers an
/// automatic wrap.
const MARGIN: usize = 1;

/// One rendered bar: one or more terminal lines, each at most `width` columns.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RenderFrame {
    lines: Vec<String>,
    width: usize,
}

impl RenderFrame {
    /// Lines to write, without trailing newlines.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of terminal rows the frame occupies.
    #[must_use]
    pub fn height(&self) -> usize {
        self.lines.len()
    }

    /// Visible width of the widest line.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }
}

/// Lays out one animated frame for a terminal `columns` wide.
#[must_use]
pub fn frame(config: &BarConfig, snap: &ProgressSnapshot, columns: usize) -> RenderFrame {
    let avail = columns.saturating_sub(MARGIN).max(1);

    let glyph = status_glyph(config, snap);
    let bar = bar_region(config, snap);
    let stats = stats(config, snap);
    let main = main_line(config, snap, glyph.as_deref(), &bar, &stats, avail);

    let mut lines = vec![main];
    let suffix = snap.suffix();
    if !suffix.is_empty() {
        let main_width = visible_width(&lines[0]);
        let single = !suffix.contains('\n');
        if single && main_width + 1 + visible_width(suffix) <= avail {
            lines[0] = format!("{} {}", lines[0], paint_suffix(suffix));
        } else {
            lines.extend(continuation(suffix, avail, config.suffix_lines()));
        }
    }

    let width = lines.iter().map(|l| visible_width(l)).max().unwrap_or(0);
    RenderFrame { lines, width }
}

fn main_line(
    config: &BarConfig,
    snap: &ProgressSnapshot,
    glyph: Option<&str>,
    bar: &str,
    stats: &str,
    avail: usize,
) -> String {
    let compose = |desc: Option<&str>| -> String {
        let desc = desc.map(|d| paint(d, config.color()));
        let parts: Vec<&str> = if snap.total().is_some() {
            [glyph, desc.as_deref(), Some(bar), Some(stats)]
                .into_iter()
                .flatten()
                .collect()
        } else {
            [glyph, Some(bar), desc.as_deref(), Some(stats)]
                .into_iter()
                .flatten()
                .collect()
        };
        parts.join(" ")
    };

    let desc = snap.desc();
    let bare = compose(None);
    if desc.is_empty() {
        return fit(bare, avail);
    }
    let full = compose(Some(desc));
    if visible_width(&full) <= avail {
        return full;
    }

    let room = avail.saturating_sub(visible_width(&bare) + 1);
    if room > visible_width(ELLIPSIS) {
        compose(Some(&elide(desc, room, ELLIPSIS)))
    } else {
        fit(bare, avail)
    }
}

/// Last resort for terminals narrower than the bar and its stats.
fn fit(line: String, avail: usize) -> String {
    if visible_width(&line) <= avail {
        line
    } else {
        close(elide(&line, avail, ELLIPSIS))
    }
}

fn paint(text: &str, color: Color) -> String {
    format!("{}{text}{RESET}", color.sgr())
}

fn paint_suffix(text: &str) -> String {
    paint(text, Color::Palette(NamedColor::Yellow))
}

fn continuation(suffix: &str, avail: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = suffix.lines().flat_map(|l| wrap(l, avail)).collect();
    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.pop() {
            lines.push(mark_elided(&last, avail));
        }
    }
    lines.iter().map(|l| paint_suffix(l)).collect()
}

fn mark_elided(line: &str, avail: usize) -> String {
    let marker = visible_width(ELLIPSIS);
    if avail <= marker {
        return truncate(ELLIPSIS, avail);
    }
    let mut out = truncate(line, avail - marker);
    out.push_str(ELLIPSIS);
    out
}

fn status_glyph(config: &BarConfig, snap: &ProgressSnapshot) -> Option<String> {
    if snap.is_finished() {
        let ok = snap.total().is_none() || snap.is_complete();
        return Some(if ok {
            paint(&DONE.to_string(), Color::Palette(NamedColor::Green))
        } else {
            paint(&ABANDONED.to_string(), Color::Palette(NamedColor::Red))
        });
    }
    if snap.total().is_none() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let frame = SPINNER[(snap.tick() % SPINNER.len() as u64) as usize];
    Some(paint(&frame.to_string(), config.color()))
}

fn bar_region(config: &BarConfig, snap: &ProgressSnapshot) -> String {
    let style = config.style();
    let width = config.width();
    let painted = match snap.fraction() {
        Some(fraction) => {
            let (cells, lit) = style.fill(fraction, width);
            style.paint(&cells, lit, config.color())
        }
        None => style.paint(&style.bounce(snap.bounce(), width), 0, config.color()),
    };
    format!("[{painted}]")
}

#[allow(clippy::cast_precision_loss)]
fn stats(config: &BarConfig, snap: &ProgressSnapshot) -> String {
    let scale = config.unit_scale();
    let unit = config.unit();
    let rate = snap
        .rate()
        .map_or_else(|| "?".into(), |r| scale.format_rate(r));
    let elapsed = snap.elapsed().as_secs_f64();
    let current = scale.format_count(snap.position() as f64);

    let mut out = String::new();
    match (snap.total(), snap.percent()) {
        (Some(total), Some(pct)) => {
            let _ = write!(
                out,
                "{pct:5.1}% {current}/{} {rate} {unit}/s {elapsed:.1}s",
                scale.format_count(total as f64)
            );
            if !snap.is_complete() && !snap.is_finished() {
                match snap.eta() {
                    Some(eta) => {
                        let _ = write!(out, " ETA: {}", format_duration(eta));
                    }
                    None => out.push_str(" ETA: ?"),
                }
            }
        }
        _ => {
            let _ = write!(out, "{current} {unit} {rate} {unit}/s {elapsed:.1}s");
        }
    }
    out
}

/// `42s`, `3m07s` or `2h05m`.
fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64().round() as u64;
    match secs {
        0..60 => format!("{secs}s"),
        60..3600 => format!("{}m{:02}s", secs / 60, secs % 60),
        _ => format!("{}h{:02}m", secs / 3600, secs % 3600 / 60),
    }
}

/// One plain-text status line for fallback mode, without a trailing newline.
///
/// `timestamp` is prefixed when given; `done` marks the finalization line.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn log_line(
    config: &BarConfig,
    snap: &ProgressSnapshot,
    timestamp: Option<&str>,
    done: bool,
) -> String {
    let scale = config.unit_scale();
    let unit = config.unit();
    let mut line = String::new();
    if let Some(ts) = timestamp {
        let _ = write!(line, "{ts} | ");
    }
    let desc = strip(snap.desc());
    if !desc.is_empty() {
        let _ = write!(line, "{desc}: ");
    }

    let current = scale.format_count(snap.position() as f64);
    match (snap.total(), snap.percent()) {
        (Some(total), Some(pct)) => {
            let _ = write!(
                line,
                "{pct:.1}% ({current}/{})",
                scale.format_count(total as f64)
            );
            if let Some(rate) = snap.rate() {
                let _ = write!(line, " {} {unit}/s", scale.format_rate(rate));
            }
        }
        _ => {
            let _ = write!(line, "{current} {unit} processed");
        }
    }

    let suffix = strip(snap.suffix());
    let suffix = suffix.lines().map(str::trim).filter(|l| !l.is_empty());
    for (i, part) in suffix.enumerate() {
        line.push_str(if i == 0 { " " } else { " | " });
        line.push_str(part);
    }
    if done {
        line.push_str(" - done");
    }
    line
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use web_time::Instant;

    use super::*;
    use crate::{
        builder::ProgressBuilder,
        progress::BarState,
        style::BarStyle,
        terminal::Mode,
    };

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn state(builder: ProgressBuilder) -> (BarState, Instant) {
        let t0 = Instant::now();
        let config = Arc::new(builder.resolve().unwrap());
        (BarState::new(config, Mode::Animated, t0), t0)
    }

    fn render(s: &BarState, now: Instant, columns: usize) -> RenderFrame {
        frame(s.config(), &s.snapshot(now), columns)
    }

    /// Determinate Layout
    /// Label, bar, percentage, count, rate, elapsed time and ETA in order.
    #[test]
    fn test_determinate_layout() {
        let (mut s, t0) = state(
            ProgressBuilder::new_bar(100)
                .desc("copy")
                .bar_style(BarStyle::Classic)
                .width(10)
                .smoothing(1.0),
        );
        s.update(50, t0 + ms(2000));
        let f = render(&s, t0 + ms(2000), 120);
        assert_eq!(f.height(), 1);
        let plain = strip(&f.lines()[0]);
        assert_eq!(
            plain,
            "⠙ copy [█████░░░░░]  50.0% 50/100 25.0 it/s 2.0s ETA: 2s"
        );
        assert_eq!(f.width(), visible_width(&plain));
    }

    /// Determinism
    /// Identical state and width give byte-identical frames.
    #[test]
    fn test_deterministic() {
        let (mut s, t0) = state(ProgressBuilder::new_bar(7).desc("x").color("#123456"));
        s.update(3, t0 + ms(900));
        s.set_suffix("\x1b[1mbold\x1b[0m tail", t0 + ms(950));
        let now = t0 + ms(1000);
        assert_eq!(render(&s, now, 60), render(&s, now, 60));
    }

    /// Indeterminate Layout
    /// No percentage and no ETA, just the moving marker and counters.
    #[test]
    fn test_indeterminate_layout() {
        let (mut s, t0) = state(
            ProgressBuilder::new_indeterminate()
                .desc("scan")
                .bar_style(BarStyle::Classic)
                .width(6)
                .unit("files"),
        );
        s.update(42, t0 + ms(1000));
        let plain = strip(&render(&s, t0 + ms(1000), 100).lines()[0]);
        assert_eq!(plain, "[░███░░] scan 42 files 42.0 files/s 1.0s");
        assert!(!plain.contains("ETA"));
        assert!(!plain.contains('%'));
    }

    /// Unknown Rate
    #[test]
    fn test_unknown_rate_and_eta() {
        let (s, t0) = state(ProgressBuilder::new_bar(10).bar_style("classic").width(4));
        let plain = strip(&render(&s, t0, 100).lines()[0]);
        assert!(plain.ends_with("0/10 ? it/s 0.0s ETA: ?"), "{plain}");
    }

    /// Completed And Abandoned
    /// Finished bars show a check mark when complete and a cross otherwise.
    #[test]
    fn test_finish_glyphs() {
        let (mut s, t0) = state(ProgressBuilder::new_bar(4).width(4));
        s.update(4, t0 + ms(10));
        s.finish();
        let line = strip(&render(&s, t0 + ms(10), 100).lines()[0]);
        assert!(line.starts_with('✓'));
        assert!(line.contains("100.0% 4/4"));
        assert!(!line.contains("ETA"));

        let (mut s, t0) = state(ProgressBuilder::new_bar(4).width(4));
        s.update(1, t0 + ms(10));
        s.finish();
        let line = strip(&render(&s, t0 + ms(10), 100).lines()[0]);
        assert!(line.starts_with('✗'));
    }

    /// Inline Suffix
    #[test]
    fn test_inline_suffix() {
        let (mut s, t0) = state(ProgressBuilder::new_bar(10).width(5));
        s.set_suffix("loss=0.25", t0);
        let f = render(&s, t0, 120);
        assert_eq!(f.height(), 1);
        assert!(f.lines()[0].ends_with(&format!("\x1b[93mloss=0.25{RESET}")));
    }

    /// Suffix Wrapping
    /// A suffix too long for the line wraps below; stats and bar stay intact.
    #[test]
    fn test_suffix_wraps_before_stats_are_cut() {
        let (mut s, t0) = state(ProgressBuilder::new_bar(10).width(5).bar_style("classic"));
        s.update(5, t0 + ms(1000));
        s.set_suffix("a".repeat(70), t0 + ms(1000));
        let f = render(&s, t0 + ms(1000), 61);
        assert_eq!(f.height(), 3);
        let main = strip(&f.lines()[0]);
        assert!(main.contains("[██░░░]"));
        assert!(main.contains("5/10"));
        assert!(main.contains("ETA: 1s"));
        for line in f.lines() {
            assert!(visible_width(line) <= 60);
        }
        let rest: String = f.lines()[1..].iter().map(|l| strip(l)).collect();
        assert_eq!(rest, "a".repeat(70));
    }

    /// Suffix Elision
    /// Continuation lines are capped and the last one carries the marker.
    #[test]
    fn test_suffix_elided_past_cap() {
        let (mut s, t0) = state(ProgressBuilder::new_bar(10).width(5).suffix_lines(2));
        s.set_suffix("one\ntwo\nthree\nfour", t0);
        let f = render(&s, t0, 80);
        assert_eq!(f.height(), 3);
        assert_eq!(strip(&f.lines()[1]), "one");
        assert_eq!(strip(&f.lines()[2]), "two...");
    }

    /// Narrow Terminal
    /// The description gives way before the bar or the stats do.
    #[test]
    fn test_description_elided_first() {
        let (mut s, t0) = state(
            ProgressBuilder::new_bar(10)
                .desc("a rather long description")
                .width(5)
                .bar_style("classic"),
        );
        s.update(5, t0 + ms(1000));
        let wide = strip(&render(&s, t0 + ms(1000), 200).lines()[0]);
        let (_, stats) = wide.split_once("] ").unwrap();
        let bare_width = visible_width(&wide) - "a rather long description ".len();

        let narrow = strip(&render(&s, t0 + ms(1000), bare_width + 12).lines()[0]);
        assert!(narrow.contains("a rathe..."), "{narrow}");
        assert!(narrow.contains("[██░░░]"));
        assert!(narrow.ends_with(stats));
        assert!(visible_width(&narrow) <= bare_width + 11);

        let tight = strip(&render(&s, t0 + ms(1000), bare_width + 2).lines()[0]);
        assert!(!tight.contains("rather"));
        assert!(tight.contains("5/10"));
    }

    /// Wide Glyphs
    /// Double-width characters are measured as two columns when wrapping.
    #[test]
    fn test_wide_suffix_wrap() {
        let (mut s, t0) = state(ProgressBuilder::new_bar(10).width(3));
        s.set_suffix("日本語".repeat(20), t0);
        let f = render(&s, t0, 21);
        for line in f.lines() {
            assert!(visible_width(line) <= 20, "{line:?}");
        }
    }

    /// Fallback Line
    /// Plain text, no escape sequences, timestamp and done marker optional.
    #[test]
    fn test_log_line() {
        let (mut s, t0) = state(
            ProgressBuilder::new_bar(200)
                .desc("\x1b[1mtrain\x1b[0m")
                .smoothing(1.0),
        );
        s.update(50, t0 + ms(2000));
        s.set_suffix("\x1b[33mloss=0.3\x1b[0m", t0 + ms(2000));
        let snap = s.snapshot(t0 + ms(2000));
        let line = log_line(s.config(), &snap, None, false);
        assert_eq!(line, "train: 25.0% (50/200) 25.0 it/s loss=0.3");

        let line = log_line(s.config(), &snap, Some("2024-01-02 03:04:05"), true);
        assert_eq!(
            line,
            "2024-01-02 03:04:05 | train: 25.0% (50/200) 25.0 it/s loss=0.3 - done"
        );
        assert!(!line.contains('\x1b'));
    }

    /// Fallback Indeterminate Line
    #[test]
    fn test_log_line_indeterminate() {
        let (mut s, t0) = state(ProgressBuilder::new_indeterminate().desc("rows").unit("rows"));
        s.update(1234, t0 + ms(10));
        let line = log_line(s.config(), &s.snapshot(t0 + ms(10)), None, true);
        assert_eq!(line, "rows: 1234 rows processed - done");
    }

    /// Duration Format
    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(187)), "3m07s");
        assert_eq!(format_duration(Duration::from_secs(7500)), "2h05m");
    }
}
