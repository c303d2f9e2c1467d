//! Colouring of command output.

use docref::Severity;
use owo_colors::{colors::css, OwoColorize};

/// What a piece of output means, and so how it is coloured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// A check that passed.
    Success,
    /// A check with warnings.
    Warning,
    /// A fatal problem.
    Error,
    /// Secondary detail such as locations.
    Dim,
}

/// Whether output is coloured.
///
/// Rendering takes a palette rather than querying the terminal, so the same
/// code renders plain text in tests and when stdout is not a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    color: bool,
}

impl Palette {
    /// Colours output if stdout supports it.
    pub fn detect() -> Self {
        Self {
            color: supports_color::on(supports_color::Stream::Stdout).is_some(),
        }
    }

    /// Never colours output.
    #[cfg(test)]
    pub const fn plain() -> Self {
        Self { color: false }
    }

    /// Colours text in the given style.
    pub fn paint(self, style: Style, text: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        match style {
            Style::Success => text.fg::<css::Green>().to_string(),
            Style::Warning => text.fg::<css::Orange>().to_string(),
            Style::Error => text.fg::<css::Red>().bold().to_string(),
            Style::Dim => text.dimmed().to_string(),
        }
    }

    /// The `error` or `warning` prefix of a diagnostic line.
    pub fn severity(self, severity: Severity) -> String {
        match severity {
            Severity::Fatal => self.paint(Style::Error, "error"),
            Severity::Warning => self.paint(Style::Warning, "warning"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_palette_leaves_text_alone() {
        let palette = Palette::plain();
        assert_eq!(palette.paint(Style::Error, "broken"), "broken");
        assert_eq!(palette.severity(Severity::Fatal), "error");
        assert_eq!(palette.severity(Severity::Warning), "warning");
    }

    #[test]
    fn coloured_palette_wraps_text_in_escapes() {
        let palette = Palette { color: true };
        let painted = palette.paint(Style::Success, "ok");
        assert!(painted.contains("ok"));
        assert!(painted.starts_with('\u{1b}'));
    }
}
