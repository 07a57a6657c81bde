//! vellum - the terminal windowing layer of an interactive pager.
//!
//! Everything a pager needs for talking to a terminal, and nothing it
//! needs for talking to files:
//!
//! - [`style`]: styled cell model with minimal-diff ANSI transitions
//! - [`tokenizer`]: raw text lines (inline SGR styling, OSC 8 hyperlinks,
//!   man page overstrike) into styled cells
//! - [`keys`] / [`input`]: raw terminal input bytes into discrete events
//! - [`screen`]: the cell grid, its renderer, and the raw-mode/alternate
//!   screen session lifecycle
//!
//! The pager's own concerns (navigation, search, file loading, syntax
//! highlighting) live upstream: they feed this crate plain strings and
//! drain its event channel.
//!
//! # Usage
//!
//! ```no_run
//! use vellum::{cells_from_string, Event, Screen};
//!
//! let mut screen = Screen::new()?;
//! let (_width, _height) = screen.size();
//!
//! for (row, line) in ["some", "text"].iter().enumerate() {
//!     for (column, cell) in cells_from_string(line, Some(row + 1)).into_iter().enumerate() {
//!         screen.set_cell(column, row, cell);
//!     }
//! }
//! screen.show();
//!
//! loop {
//!     let event = screen.events().recv();
//!     match event {
//!         Ok(Event::Exit) | Err(_) => break,
//!         Ok(Event::Resize) => screen.show(),
//!         Ok(_event) => { /* scroll, search, ... */ }
//!     }
//! }
//! screen.close();
//! # Ok::<(), vellum::ScreenSetupError>(())
//! ```

pub mod input;
pub mod keys;
pub mod screen;
pub mod style;
pub mod tokenizer;

pub use input::{Event, MouseButton};
pub use keys::KeyCode;
pub use screen::{MouseMode, Screen, ScreenSetupError};
pub use style::{printable, AttrFlags, Cell, Color, Style};
pub use tokenizer::{cells_from_string, consume_composite_color, raw_update_style, ColorSequenceError};
