//! Styled cell model
//!
//! Colors, text attributes and hyperlink scopes for terminal cells, plus
//! the minimal-diff encoding that moves a terminal from rendering one
//! style to rendering another.

use bitflags::bitflags;

/// A terminal color in any of the ANSI representations.
///
/// Equality requires the same representation: `Ansi256(1)` and `Ansi(1)`
/// address the same palette slot but do not compare equal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Color {
    /// The terminal's own default foreground or background
    #[default]
    Default,
    /// Basic 16-color palette, 0-15. 8-15 are the bright variants.
    Ansi(u8),
    /// 256-color palette index
    Ansi256(u8),
    /// 24 bit RGB
    Rgb(u8, u8, u8),
}

impl Color {
    /// The SGR sequence selecting this color as the foreground.
    pub fn foreground_sequence(self) -> String {
        match self {
            Color::Default => "\x1b[39m".to_string(),
            Color::Ansi(index) if index < 8 => format!("\x1b[{}m", 30 + u16::from(index)),
            Color::Ansi(index) => format!("\x1b[{}m", 90 + u16::from(index) - 8),
            Color::Ansi256(index) => format!("\x1b[38;5;{}m", index),
            Color::Rgb(r, g, b) => format!("\x1b[38;2;{};{};{}m", r, g, b),
        }
    }

    /// The SGR sequence selecting this color as the background.
    pub fn background_sequence(self) -> String {
        match self {
            Color::Default => "\x1b[49m".to_string(),
            Color::Ansi(index) if index < 8 => format!("\x1b[{}m", 40 + u16::from(index)),
            Color::Ansi(index) => format!("\x1b[{}m", 100 + u16::from(index) - 8),
            Color::Ansi256(index) => format!("\x1b[48;5;{}m", index),
            Color::Rgb(r, g, b) => format!("\x1b[48;2;{};{};{}m", r, g, b),
        }
    }
}

bitflags! {
    /// Text attributes
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AttrFlags: u8 {
        const BOLD      = 0b0001;
        const DIM       = 0b0010;
        const UNDERLINE = 0b0100;
        const REVERSE   = 0b1000;
    }
}

/// How a cell should be drawn.
///
/// Immutable value type; the `with_*` methods return modified copies.
/// Hyperlinks compare by target string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Style {
    fg: Color,
    bg: Color,
    attrs: AttrFlags,
    hyperlink: Option<String>,
}

impl Style {
    pub const DEFAULT: Style = Style {
        fg: Color::Default,
        bg: Color::Default,
        attrs: AttrFlags::empty(),
        hyperlink: None,
    };

    pub fn with_foreground(&self, fg: Color) -> Style {
        Style { fg, ..self.clone() }
    }

    pub fn with_background(&self, bg: Color) -> Style {
        Style { bg, ..self.clone() }
    }

    pub fn with_attr(&self, attr: AttrFlags) -> Style {
        Style {
            attrs: self.attrs | attr,
            ..self.clone()
        }
    }

    pub fn without_attr(&self, attr: AttrFlags) -> Style {
        Style {
            attrs: self.attrs - attr,
            ..self.clone()
        }
    }

    /// `Some(uri)` opens a hyperlink scope, `None` closes it.
    pub fn with_hyperlink(&self, hyperlink: Option<String>) -> Style {
        Style {
            hyperlink,
            ..self.clone()
        }
    }

    pub fn hyperlink(&self) -> Option<&str> {
        self.hyperlink.as_deref()
    }

    /// The minimal control sequence taking a terminal from rendering in
    /// `previous` to rendering in `self`. Equal styles yield "".
    pub fn render_update_from(&self, previous: &Style) -> String {
        if self == previous {
            return String::new();
        }

        let mut rendered = String::new();

        if self.hyperlink != previous.hyperlink {
            match &self.hyperlink {
                Some(url) => {
                    rendered.push_str("\x1b]8;;");
                    rendered.push_str(url);
                    rendered.push_str("\x1b\\");
                }
                None => rendered.push_str("\x1b]8;;\x1b\\"),
            }
        }

        if self.fg == previous.fg && self.bg == previous.bg && self.attrs == previous.attrs {
            // Only the hyperlink scope changed
            return rendered;
        }

        if self.fg == Color::Default && self.bg == Color::Default && self.attrs.is_empty() {
            rendered.push_str("\x1b[m");
            return rendered;
        }

        if self.fg != previous.fg {
            rendered.push_str(&self.fg.foreground_sequence());
        }
        if self.bg != previous.bg {
            rendered.push_str(&self.bg.background_sequence());
        }

        let turn_on = self.attrs - previous.attrs;
        if turn_on.contains(AttrFlags::BOLD) {
            rendered.push_str("\x1b[1m");
        }
        if turn_on.contains(AttrFlags::DIM) {
            rendered.push_str("\x1b[2m");
        }
        if turn_on.contains(AttrFlags::UNDERLINE) {
            rendered.push_str("\x1b[4m");
        }
        if turn_on.contains(AttrFlags::REVERSE) {
            rendered.push_str("\x1b[7m");
        }

        let turn_off = previous.attrs - self.attrs;
        if turn_off.intersects(AttrFlags::BOLD | AttrFlags::DIM) {
            // SGR 22 clears both bold and dim, re-assert the survivor
            rendered.push_str("\x1b[22m");
            if self.attrs.contains(AttrFlags::BOLD) {
                rendered.push_str("\x1b[1m");
            }
            if self.attrs.contains(AttrFlags::DIM) {
                rendered.push_str("\x1b[2m");
            }
        }
        if turn_off.contains(AttrFlags::UNDERLINE) {
            rendered.push_str("\x1b[24m");
        }
        if turn_off.contains(AttrFlags::REVERSE) {
            rendered.push_str("\x1b[27m");
        }

        rendered
    }
}

/// One terminal character position and how to draw it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: Style,
}

impl Cell {
    pub fn new(ch: char, style: Style) -> Self {
        Self { ch, style }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::new(' ', Style::DEFAULT)
    }
}

/// Whether a character can be sent to a terminal as-is. Control
/// characters cannot; the renderer substitutes a marker glyph for them.
pub fn printable(ch: char) -> bool {
    !ch.is_control()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_update_for_equal_styles() {
        let style = Style::DEFAULT
            .with_foreground(Color::Ansi(2))
            .with_attr(AttrFlags::BOLD);
        assert_eq!(style.render_update_from(&style), "");
        assert_eq!(Style::DEFAULT.render_update_from(&Style::DEFAULT), "");
    }

    #[test]
    fn test_attribute_on() {
        let reversed = Style::DEFAULT.with_attr(AttrFlags::REVERSE);
        assert_eq!(reversed.render_update_from(&Style::DEFAULT), "\x1b[7m");
    }

    #[test]
    fn test_attribute_handover() {
        // Dim goes on before reverse goes off
        let reversed = Style::DEFAULT.with_attr(AttrFlags::REVERSE);
        let dimmed = Style::DEFAULT.with_attr(AttrFlags::DIM);
        assert_eq!(dimmed.render_update_from(&reversed), "\x1b[2m\x1b[27m");
    }

    #[test]
    fn test_back_to_default_is_a_full_reset() {
        let styled = Style::DEFAULT
            .with_foreground(Color::Ansi256(74))
            .with_attr(AttrFlags::UNDERLINE);
        assert_eq!(Style::DEFAULT.render_update_from(&styled), "\x1b[m");
    }

    #[test]
    fn test_bold_off_keeps_dim() {
        let bold_and_dim = Style::DEFAULT.with_attr(AttrFlags::BOLD | AttrFlags::DIM);
        let dim_only = Style::DEFAULT.with_attr(AttrFlags::DIM);

        // SGR 22 clears both, so dim must be re-asserted
        assert_eq!(dim_only.render_update_from(&bold_and_dim), "\x1b[22m\x1b[2m");
    }

    #[test]
    fn test_color_sequences() {
        assert_eq!(Color::Ansi(3).foreground_sequence(), "\x1b[33m");
        assert_eq!(Color::Ansi(11).foreground_sequence(), "\x1b[93m");
        assert_eq!(Color::Ansi(1).background_sequence(), "\x1b[41m");
        assert_eq!(Color::Ansi(9).background_sequence(), "\x1b[101m");
        assert_eq!(Color::Ansi256(74).foreground_sequence(), "\x1b[38;5;74m");
        assert_eq!(Color::Ansi256(74).background_sequence(), "\x1b[48;5;74m");
        assert_eq!(Color::Rgb(10, 20, 30).foreground_sequence(), "\x1b[38;2;10;20;30m");
        assert_eq!(Color::Rgb(10, 20, 30).background_sequence(), "\x1b[48;2;10;20;30m");
        assert_eq!(Color::Default.foreground_sequence(), "\x1b[39m");
        assert_eq!(Color::Default.background_sequence(), "\x1b[49m");
    }

    #[test]
    fn test_hyperlink_open_and_close() {
        let url = "http://example.com".to_string();
        let linked = Style::DEFAULT.with_hyperlink(Some(url.clone()));

        assert_eq!(
            linked.render_update_from(&Style::DEFAULT),
            "\x1b]8;;http://example.com\x1b\\"
        );
        assert_eq!(Style::DEFAULT.render_update_from(&linked), "\x1b]8;;\x1b\\");
    }

    #[test]
    fn test_hyperlink_retarget() {
        let first = Style::DEFAULT.with_hyperlink(Some("http://a.example".to_string()));
        let second = Style::DEFAULT.with_hyperlink(Some("http://b.example".to_string()));

        // A single open sequence moves the scope to the new target
        assert_eq!(
            second.render_update_from(&first),
            "\x1b]8;;http://b.example\x1b\\"
        );
    }

    #[test]
    fn test_hyperlink_equality_is_by_target() {
        let a = Style::DEFAULT.with_hyperlink(Some("http://example.com".to_string()));
        let b = Style::DEFAULT.with_hyperlink(Some("http://example.com".to_string()));
        assert_eq!(a, b);
    }

    #[test]
    fn test_color_and_attribute_combination() {
        let styled = Style::DEFAULT
            .with_foreground(Color::Ansi(7))
            .with_background(Color::Ansi(1))
            .with_attr(AttrFlags::BOLD);
        assert_eq!(
            styled.render_update_from(&Style::DEFAULT),
            "\x1b[37m\x1b[41m\x1b[1m"
        );
    }

    #[test]
    fn test_printable() {
        assert!(printable('a'));
        assert!(printable('•'));
        assert!(!printable('\x1b'));
        assert!(!printable('\x08'));
        assert!(!printable('\x7f'));
    }
}
