//! Line tokenizer
//!
//! Turns one raw line of pager input into styled cells. Lines may carry
//! inline SGR styling, OSC 8 hyperlinks and the legacy overstrike
//! (char-backspace-char) bolding that man pages still use.
//!
//! The tokenizer never gives up on a line: anything it cannot decode is
//! logged and rendered literally with the style left unchanged, and
//! decoding resumes at the very next character.

use thiserror::Error;

use crate::style::{AttrFlags, Cell, Color, Style};

/// Failure modes of composite (38/48-prefixed) SGR color decoding.
///
/// This is the one tokenizer error with a taxonomy; callers leave the
/// style unchanged and log. The `<CSI …m>` tail renders the unconsumed
/// parameters of the offending sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorSequenceError {
    #[error("unknown start of color sequence <{prefix}>, expected 38 (foreground) or 48 (background): <CSI {sequence}m>")]
    UnknownPrefix { prefix: u16, sequence: String },

    #[error("incomplete color sequence: <CSI {sequence}m>")]
    MissingType { sequence: String },

    #[error("unknown color type <{color_type}>, expected 5 (8 bit color) or 2 (24 bit color): <CSI {sequence}m>")]
    UnknownType { color_type: u16, sequence: String },

    #[error("incomplete 8 bit color sequence: <CSI {sequence}m>")]
    Incomplete8Bit { sequence: String },

    #[error("incomplete 24 bit color sequence, expected N8;2;R;G;Bm: <CSI {sequence}m>")]
    Incomplete24Bit { sequence: String },
}

/// An ANSI sequence that has been decoded: where scanning should resume
/// and the style in force from there on.
struct ConsumedSequence {
    next_index: usize,
    style: Style,
}

/// Tokenize `raw` into one cell per visible character.
///
/// `line_number` is 1-based and only used for diagnostics; pass `None`
/// when there is no meaningful line number.
pub fn cells_from_string(raw: &str, line_number: Option<usize>) -> Vec<Cell> {
    let chars: Vec<char> = raw.chars().collect();
    let mut cells: Vec<Cell> = Vec::with_capacity(chars.len());
    let mut style = Style::DEFAULT;
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        match ch {
            '\x1b' => match consume_ansi_sequence(&chars, index, &style, line_number) {
                Some(consumed) => {
                    index = consumed.next_index;
                    style = consumed.style;
                }
                None => {
                    log_anomaly(line_number, "unparsable escape sequence, rendering it literally");
                    cells.push(Cell::new(ch, style.clone()));
                    index += 1;
                }
            },

            '\x08' => {
                let followup = chars.get(index + 1).copied();
                let combined = match (cells.last(), followup) {
                    (Some(previous), Some(next)) => overstruck(previous, next),
                    _ => None,
                };
                if let (Some(cell), Some(slot)) = (combined, cells.last_mut()) {
                    *slot = cell;
                    index += 2;
                } else {
                    log_anomaly(line_number, "stray backspace, rendering it literally");
                    cells.push(Cell::new(ch, style.clone()));
                    index += 1;
                }
            }

            _ => {
                cells.push(Cell::new(ch, style.clone()));
                index += 1;
            }
        }
    }

    cells
}

/// Man page overstrike: what does striking `previous` with `next` leave
/// in the cell? `None` means the combination is not a known convention.
fn overstruck(previous: &Cell, next: char) -> Option<Cell> {
    // Both historical bullet encodings end up as '+' or '•' struck by 'o'
    if (previous.ch == '+' || previous.ch == '•') && next == 'o' {
        return Some(Cell::new('•', Style::DEFAULT));
    }
    if previous.ch == next {
        return Some(Cell::new(next, previous.style.with_attr(AttrFlags::BOLD)));
    }
    if previous.ch == '_' {
        return Some(Cell::new(next, previous.style.with_attr(AttrFlags::UNDERLINE)));
    }
    if next == '_' {
        return Some(Cell::new(
            previous.ch,
            previous.style.with_attr(AttrFlags::UNDERLINE),
        ));
    }
    None
}

fn consume_ansi_sequence(
    chars: &[char],
    start: usize,
    style: &Style,
    line_number: Option<usize>,
) -> Option<ConsumedSequence> {
    match chars.get(start + 1) {
        Some('[') => consume_sgr(chars, start, style, line_number),
        Some(']') => consume_hyperlink(chars, start, style),
        _ => None,
    }
}

/// `ESC [ params m`. Other CSI final bytes are not meaningful inside a
/// pager line and make the whole sequence unparsable.
fn consume_sgr(
    chars: &[char],
    start: usize,
    style: &Style,
    line_number: Option<usize>,
) -> Option<ConsumedSequence> {
    let mut end = start + 2;
    while end < chars.len() && (chars[end].is_ascii_digit() || chars[end] == ';') {
        end += 1;
    }
    if chars.get(end) != Some(&'m') {
        return None;
    }

    let param_text: String = chars[start + 2..end].iter().collect();
    let params: Vec<u16> = if param_text.is_empty() {
        Vec::new()
    } else {
        param_text
            .split(';')
            .map(|param| {
                param
                    .parse::<u32>()
                    .map(|value| value.min(u32::from(u16::MAX)) as u16)
                    .unwrap_or(0)
            })
            .collect()
    };

    let style = match raw_update_style(style.clone(), &params) {
        Ok(updated) => updated,
        Err(err) => {
            // Fall back to the style we had before the sequence
            log_anomaly(line_number, &err.to_string());
            style.clone()
        }
    };

    Some(ConsumedSequence {
        next_index: end + 1,
        style,
    })
}

/// `OSC 8 ; ; URI TERMINATOR` where the terminator is `ESC \` or BEL.
/// An empty URI closes the hyperlink scope. Anything unexpected, a lone
/// ESC included, aborts so the whole candidate renders as plain text.
fn consume_hyperlink(chars: &[char], start: usize, style: &Style) -> Option<ConsumedSequence> {
    if chars.get(start + 2) != Some(&'8')
        || chars.get(start + 3) != Some(&';')
        || chars.get(start + 4) != Some(&';')
    {
        return None;
    }

    let mut index = start + 5;
    let mut uri = String::new();
    loop {
        let ch = *chars.get(index)?;
        match ch {
            '\x07' => {
                index += 1;
                break;
            }
            '\x1b' => {
                if chars.get(index + 1) == Some(&'\\') {
                    index += 2;
                    break;
                }
                return None;
            }
            ch if ch.is_control() => return None,
            ch => {
                uri.push(ch);
                index += 1;
            }
        }
    }

    let hyperlink = if uri.is_empty() { None } else { Some(uri) };
    Some(ConsumedSequence {
        next_index: index,
        style: style.with_hyperlink(hyperlink),
    })
}

/// Apply a parsed SGR parameter list to `style`.
///
/// An open hyperlink scope survives SGR resets; OSC scopes are closed by
/// their own close sequence, not by color changes.
pub fn raw_update_style(style: Style, params: &[u16]) -> Result<Style, ColorSequenceError> {
    let hyperlink = style.hyperlink().map(str::to_string);

    if params.is_empty() {
        return Ok(Style::DEFAULT.with_hyperlink(hyperlink));
    }

    let mut style = style;
    let mut index = 0;
    while index < params.len() {
        let param = params[index];
        index += 1;
        match param {
            0 => style = Style::DEFAULT.with_hyperlink(hyperlink.clone()),
            1 => style = style.with_attr(AttrFlags::BOLD),
            2 => style = style.with_attr(AttrFlags::DIM),
            4 => style = style.with_attr(AttrFlags::UNDERLINE),
            7 => style = style.with_attr(AttrFlags::REVERSE),
            22 => style = style.without_attr(AttrFlags::BOLD | AttrFlags::DIM),
            24 => style = style.without_attr(AttrFlags::UNDERLINE),
            27 => style = style.without_attr(AttrFlags::REVERSE),

            30..=37 => style = style.with_foreground(Color::Ansi((param - 30) as u8)),
            39 => style = style.with_foreground(Color::Default),
            40..=47 => style = style.with_background(Color::Ansi((param - 40) as u8)),
            49 => style = style.with_background(Color::Default),
            90..=97 => style = style.with_foreground(Color::Ansi((param - 90 + 8) as u8)),
            100..=107 => style = style.with_background(Color::Ansi((param - 100 + 8) as u8)),

            38 | 48 => {
                let (next_index, color) = consume_composite_color(params, index - 1)?;
                index = next_index;
                if param == 38 {
                    style = style.with_foreground(color);
                } else {
                    style = style.with_background(color);
                }
            }

            _ => tracing::debug!("Unsupported SGR code <{}>, ignoring", param),
        }
    }

    Ok(style)
}

/// Decode one composite color starting at `params[index]`, which must be
/// 38 (foreground) or 48 (background). Returns the index of the first
/// unconsumed parameter and the decoded color.
///
/// `{38, 5, n}` consumes three parameters, `{38, 2, r, g, b}` five.
pub fn consume_composite_color(
    params: &[u16],
    index: usize,
) -> Result<(usize, Color), ColorSequenceError> {
    let remaining = &params[index..];
    let sequence = || format_params(remaining);

    match remaining.first() {
        Some(&38) | Some(&48) => {}
        Some(&prefix) => {
            return Err(ColorSequenceError::UnknownPrefix {
                prefix,
                sequence: sequence(),
            })
        }
        None => {
            return Err(ColorSequenceError::MissingType {
                sequence: sequence(),
            })
        }
    }

    match remaining.get(1) {
        None => Err(ColorSequenceError::MissingType {
            sequence: sequence(),
        }),
        Some(&5) => match remaining.get(2) {
            Some(&color_index) => Ok((index + 3, Color::Ansi256(color_index.min(255) as u8))),
            None => Err(ColorSequenceError::Incomplete8Bit {
                sequence: sequence(),
            }),
        },
        Some(&2) => {
            if remaining.len() < 5 {
                return Err(ColorSequenceError::Incomplete24Bit {
                    sequence: sequence(),
                });
            }
            let r = remaining[2].min(255) as u8;
            let g = remaining[3].min(255) as u8;
            let b = remaining[4].min(255) as u8;
            Ok((index + 5, Color::Rgb(r, g, b)))
        }
        Some(&color_type) => Err(ColorSequenceError::UnknownType {
            color_type,
            sequence: sequence(),
        }),
    }
}

fn format_params(params: &[u16]) -> String {
    params
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(";")
}

fn log_anomaly(line_number: Option<usize>, what: &str) {
    match line_number {
        Some(line) => tracing::debug!("Line {}: {}", line, what),
        None => tracing::debug!("{}", what),
    }
}
