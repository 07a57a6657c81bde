//! Input event decoder
//!
//! Decodes the raw byte stream a terminal sends on its input side into
//! discrete events. Pure and synchronous; the read loop in [`crate::screen`]
//! drives it and deals with buffering and blocking.

use crate::keys::{KeyCode, ESCAPE_SEQUENCE_TO_KEY_CODE};

/// A mouse button as reported by the SGR mouse protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    WheelUp,
    WheelDown,
}

/// One discrete thing that happened on the terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A named key
    Key(KeyCode),
    /// A printable character
    Rune(char),
    /// A mouse wheel movement
    Mouse(MouseButton),
    /// The window changed size; re-query it and repaint
    Resize,
    /// The input side is gone. The last event a session ever delivers.
    Exit,
}

enum MouseReport<'a> {
    Event(MouseButton, &'a str),
    Unsupported,
    NeedMore,
    NoMatch,
}

/// Consume the initial event from a buffer of encoded input.
///
/// Returns at most one event, plus the unconsumed remainder. The
/// remainder is empty when everything was consumed, and the untouched
/// input when it is a strict prefix of some known multi-byte sequence
/// and more bytes have to arrive first.
pub fn consume_encoded_event(input: &str) -> (Option<Event>, &str) {
    if input.is_empty() {
        return (None, input);
    }

    // Longest matching key code sequence wins
    let mut best_match: Option<(&str, KeyCode)> = None;
    for &(sequence, key_code) in ESCAPE_SEQUENCE_TO_KEY_CODE {
        if !input.starts_with(sequence) {
            continue;
        }
        match best_match {
            Some((best, _)) if best.len() >= sequence.len() => {}
            _ => best_match = Some((sequence, key_code)),
        }
    }
    if let Some((sequence, key_code)) = best_match {
        return (Some(Event::Key(key_code)), &input[sequence.len()..]);
    }

    // A lone ESC at the end of the buffer is the Escape key itself
    if input == "\x1b" {
        return (Some(Event::Key(KeyCode::Escape)), "");
    }

    match consume_mouse_report(input) {
        MouseReport::Event(button, remainder) => {
            return (Some(Event::Mouse(button)), remainder);
        }
        MouseReport::Unsupported => {
            tracing::debug!(
                "Unhandled mouse escape sequence(s), dropping: {{{}}}",
                humanize_low_ascii(input)
            );
            return (None, "");
        }
        MouseReport::NeedMore => return (None, input),
        MouseReport::NoMatch => {}
    }

    // A strict prefix of a known key sequence: wait for the rest
    if ESCAPE_SEQUENCE_TO_KEY_CODE
        .iter()
        .any(|(sequence, _)| sequence.starts_with(input) && *sequence != input)
    {
        return (None, input);
    }

    let mut runes = input.chars();
    let first = match runes.next() {
        Some(first) => first,
        None => return (None, input),
    };
    let remainder = runes.as_str();

    if first == '\x1b' {
        // An escape sequence we have no table entry for. Partial matches
        // cannot be un-consumed, so drop the whole buffer.
        tracing::debug!(
            "Unhandled terminal escape sequence(s), dropping: {{{}}}",
            humanize_low_ascii(input)
        );
        return (None, "");
    }

    if first == '\r' {
        return (Some(Event::Key(KeyCode::Enter)), remainder);
    }

    (Some(Event::Rune(first)), remainder)
}

/// SGR mouse protocol: `ESC [ < button ; column ; row M`.
fn consume_mouse_report(input: &str) -> MouseReport<'_> {
    const INTRO: &str = "\x1b[<";
    if !input.starts_with(INTRO) {
        return if INTRO.starts_with(input) {
            MouseReport::NeedMore
        } else {
            MouseReport::NoMatch
        };
    }

    let body = &input[INTRO.len()..];
    let mut fields = [0u32; 3];
    let mut field = 0;

    for (offset, ch) in body.char_indices() {
        match ch {
            '0'..='9' => {
                let digit = u32::from(ch) - u32::from('0');
                fields[field] = fields[field].saturating_mul(10).saturating_add(digit);
            }
            ';' => {
                field += 1;
                if field > 2 {
                    return MouseReport::NoMatch;
                }
            }
            'M' => {
                if field != 2 {
                    return MouseReport::NoMatch;
                }
                let remainder = &body[offset + 1..];
                return match fields[0] {
                    64 => MouseReport::Event(MouseButton::WheelUp, remainder),
                    65 => MouseReport::Event(MouseButton::WheelDown, remainder),
                    _ => MouseReport::Unsupported,
                };
            }
            _ => return MouseReport::NoMatch,
        }
    }

    // Ran out of bytes while everything still looked like a mouse report
    MouseReport::NeedMore
}

/// `<0x1b>` and friends instead of raw control bytes, for logging.
fn humanize_low_ascii(input: &str) -> String {
    let mut humanized = String::new();
    for ch in input.chars() {
        if ch < ' ' {
            humanized.push_str(&format!("<0x{:02x}>", u32::from(ch)));
        } else {
            humanized.push(ch);
        }
    }
    humanized
}
