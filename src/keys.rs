//! Logical key codes and the escape sequences that produce them.

/// A named key, as opposed to a printable character.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyCode {
    Escape,
    Enter,
    Backspace,
    Delete,
    Up,
    Down,
    Right,
    Left,
    AltRight,
    AltLeft,
    Home,
    End,
    PgUp,
    PgDown,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
}

/// Input byte sequences mapped to logical keys. Arrows and Home/End come
/// in both CSI and SS3 flavors depending on the terminal's cursor key
/// mode. Matching is longest-prefix, never table order.
pub(crate) const ESCAPE_SEQUENCE_TO_KEY_CODE: &[(&str, KeyCode)] = &[
    ("\x1b[A", KeyCode::Up),
    ("\x1b[B", KeyCode::Down),
    ("\x1b[C", KeyCode::Right),
    ("\x1b[D", KeyCode::Left),
    ("\x1bOA", KeyCode::Up),
    ("\x1bOB", KeyCode::Down),
    ("\x1bOC", KeyCode::Right),
    ("\x1bOD", KeyCode::Left),
    ("\x1b[1;3C", KeyCode::AltRight),
    ("\x1b[1;3D", KeyCode::AltLeft),
    ("\x1b[H", KeyCode::Home),
    ("\x1b[F", KeyCode::End),
    ("\x1bOH", KeyCode::Home),
    ("\x1bOF", KeyCode::End),
    ("\x1b[1~", KeyCode::Home),
    ("\x1b[4~", KeyCode::End),
    ("\x1b[3~", KeyCode::Delete),
    ("\x1b[5~", KeyCode::PgUp),
    ("\x1b[6~", KeyCode::PgDown),
    ("\x7f", KeyCode::Backspace),
    ("\x08", KeyCode::Backspace),
    ("\x1bOP", KeyCode::F1),
    ("\x1bOQ", KeyCode::F2),
    ("\x1bOR", KeyCode::F3),
    ("\x1bOS", KeyCode::F4),
    ("\x1b[11~", KeyCode::F1),
    ("\x1b[12~", KeyCode::F2),
    ("\x1b[13~", KeyCode::F3),
    ("\x1b[14~", KeyCode::F4),
    ("\x1b[15~", KeyCode::F5),
    ("\x1b[17~", KeyCode::F6),
    ("\x1b[18~", KeyCode::F7),
    ("\x1b[19~", KeyCode::F8),
    ("\x1b[20~", KeyCode::F9),
    ("\x1b[21~", KeyCode::F10),
    ("\x1b[23~", KeyCode::F11),
    ("\x1b[24~", KeyCode::F12),
];
