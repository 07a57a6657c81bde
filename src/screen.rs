//! Screen and terminal session management
//!
//! The [`Screen`] owns a cell grid sized to the terminal window, renders
//! it with minimal styling updates, and manages the session lifecycle:
//! raw input mode, the alternate screen buffer, mouse tracking and the
//! blocking read loop that turns terminal input into [`Event`]s.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;

use crossterm::terminal;
use crossterm::tty::IsTty;
use thiserror::Error;

use crate::input::{consume_encoded_event, Event};
use crate::style::{printable, AttrFlags, Cell, Color, Style};

const ALT_SCREEN_ON: &str = "\x1b[?1049h";
const ALT_SCREEN_OFF: &str = "\x1b[?1049l";
const CURSOR_HIDE: &str = "\x1b[?25l";
const CURSOR_SHOW: &str = "\x1b[?25h";
const MOUSE_TRACKING_ON: &str = "\x1b[?1006;1000h";
const MOUSE_TRACKING_OFF: &str = "\x1b[?1006;1000l";
const CURSOR_TO_TOP_LEFT: &str = "\x1b[1;1H";
const CLEAR_TO_EOL: &str = "\x1b[K";

/// Sized for trackpad momentum scrolling, which can deliver long bursts
/// of wheel events between two drains of the queue.
const EVENT_QUEUE_SIZE: usize = 160;

/// Largest observed input bursts are fling scrolls at several hundred
/// bytes; double that.
const INPUT_BUFFER_SIZE: usize = 1400;

/// What to do about terminal mouse events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MouseMode {
    /// Capture mouse events unless the surrounding terminal is known to
    /// translate wheel events into arrow keys itself.
    #[default]
    Auto,
    /// Never capture. Marking text with the mouse keeps working; wheel
    /// scrolling only works in terminals with arrow key emulation.
    Mark,
    /// Always capture so wheel scrolling works everywhere. Marking text
    /// requires terminal specific gymnastics.
    Scroll,
}

#[derive(Error, Debug)]
pub enum ScreenSetupError {
    #[error("stdout must be a terminal for paging to work")]
    NotATerminal,

    #[error("failed to enter raw mode: {0}")]
    RawMode(#[source] io::Error),

    #[error("failed to write to the terminal: {0}")]
    Write(#[source] io::Error),
}

/// A terminal window: cell grid, event source and session lifecycle.
///
/// Dropping the screen (or calling [`Screen::close`]) restores the
/// terminal; [`Screen::show_n_lines`] can then leave transcript style
/// output behind in the normal screen buffer.
pub struct Screen {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    resize_pending: Arc<AtomicBool>,
    events: Receiver<Event>,
    closed: bool,
}

impl Screen {
    pub fn new() -> Result<Screen, ScreenSetupError> {
        Self::with_mouse_mode(MouseMode::Auto)
    }

    pub fn with_mouse_mode(mouse_mode: MouseMode) -> Result<Screen, ScreenSetupError> {
        if !io::stdout().is_tty() {
            return Err(ScreenSetupError::NotATerminal);
        }

        terminal::enable_raw_mode().map_err(ScreenSetupError::RawMode)?;

        let capture_mouse = match mouse_mode {
            MouseMode::Auto => !terminal_has_arrow_keys_emulation(),
            MouseMode::Mark => false,
            MouseMode::Scroll => true,
        };

        // The first size() call queries the real terminal size
        let resize_pending = Arc::new(AtomicBool::new(true));
        let (sender, receiver) = mpsc::sync_channel(EVENT_QUEUE_SIZE);

        let screen = Screen {
            width: 0,
            height: 0,
            cells: Vec::new(),
            resize_pending: Arc::clone(&resize_pending),
            events: receiver,
            closed: false,
        };

        let mut setup = String::from(ALT_SCREEN_ON);
        if capture_mouse {
            setup.push_str(MOUSE_TRACKING_ON);
        }
        setup.push_str(CURSOR_HIDE);
        if let Err(err) = screen.write_tty(&setup) {
            let _ = terminal::disable_raw_mode();
            return Err(ScreenSetupError::Write(err));
        }

        spawn_resize_watcher(resize_pending, sender.clone());
        thread::spawn(move || read_loop(sender));

        Ok(screen)
    }

    /// The channel the main loop should drain. [`Event::Exit`] is the
    /// only shutdown signal; it arrives exactly once, when the input
    /// side is gone.
    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    /// Current screen size as (width, height).
    ///
    /// Never cache this: after an [`Event::Resize`] it starts returning
    /// the new size, and the grid contents are discarded.
    pub fn size(&mut self) -> (usize, usize) {
        if !self.resize_pending.swap(false, Ordering::AcqRel) {
            return (self.width, self.height);
        }

        let (width, height) = match terminal::size() {
            Ok((width, height)) => (usize::from(width), usize::from(height)),
            Err(err) => {
                tracing::debug!("Terminal size query failed: {}", err);
                return (self.width, self.height);
            }
        };

        if width == self.width && height == self.height {
            // Notified but nothing changed; not really a resize
            return (self.width, self.height);
        }

        // A resize implies a full repaint, old contents are not worth
        // migrating into the new grid
        self.width = width;
        self.height = height;
        self.cells = vec![Cell::default(); width * height];

        (width, height)
    }

    /// Writes outside the current bounds are silently ignored.
    pub fn set_cell(&mut self, column: usize, row: usize, cell: Cell) {
        let (width, height) = self.size();
        if column >= width || row >= height {
            return;
        }
        self.cells[row * width + column] = cell;
    }

    pub fn clear(&mut self) {
        let (width, height) = self.size();
        self.cells = vec![Cell::default(); width * height];
    }

    /// Render the whole grid into the terminal window.
    pub fn show(&mut self) {
        let (width, height) = self.size();
        let frame = render_frame(&self.cells, width, height, true);
        if let Err(err) = self.write_tty(&frame) {
            tracing::debug!("Terminal write failed: {}", err);
        }
    }

    /// Render only the first `line_count` rows, without repositioning
    /// the cursor. Callable after [`Screen::close`] to fake retaining
    /// output in the normal screen buffer.
    pub fn show_n_lines(&mut self, line_count: usize) {
        let (width, height) = self.size();
        let frame = render_frame(&self.cells, width, line_count.min(height), false);
        if let Err(err) = self.write_tty(&frame) {
            tracing::debug!("Terminal write failed: {}", err);
        }
    }

    /// Move the cursor to the given 0-based position and make it
    /// visible. Positions outside the screen hide the cursor instead.
    pub fn show_cursor_at(&mut self, column: isize, row: isize) {
        let (width, height) = self.size();
        let on_screen = column >= 0
            && row >= 0
            && (column as usize) < width
            && (row as usize) < height;

        let sequence = if on_screen {
            format!("\x1b[{};{}H{}", row + 1, column + 1, CURSOR_SHOW)
        } else {
            CURSOR_HIDE.to_string()
        };
        if let Err(err) = self.write_tty(&sequence) {
            tracing::debug!("Terminal write failed: {}", err);
        }
    }

    /// Restore the terminal to its normal state. Always completes;
    /// failures are logged and otherwise ignored.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut teardown = String::from(CURSOR_SHOW);
        teardown.push_str(MOUSE_TRACKING_OFF);
        teardown.push_str(ALT_SCREEN_OFF);
        if let Err(err) = self.write_tty(&teardown) {
            tracing::debug!("Problem restoring terminal contents: {}", err);
        }

        if let Err(err) = terminal::disable_raw_mode() {
            // Expected to fail when the tty has already gone away
            tracing::debug!("Problem restoring terminal mode: {}", err);
        }
    }

    /// One buffered write per call, so a full repaint hits the terminal
    /// atomically with respect to interleaved input reads.
    fn write_tty(&self, output: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        stdout.write_all(output.as_bytes())?;
        stdout.flush()
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        self.close();
    }
}

/// Render one row into an ANSI string. Trailing default-styled spaces
/// are trimmed; returns the rendered string and the number of
/// information carrying cells that went into it.
fn render_line(row: &[Cell]) -> (String, usize) {
    let mut last_significant = row.len();
    while last_significant > 0 {
        let cell = &row[last_significant - 1];
        if cell.ch != ' ' || cell.style != Style::DEFAULT {
            break;
        }
        last_significant -= 1;
    }
    let row = &row[..last_significant];

    // Every line stands on its own; start from a known style
    let mut rendered = String::from("\x1b[m");
    let mut last_style = Style::DEFAULT;

    for cell in row {
        let mut style = cell.style.clone();
        let mut ch = cell.ch;
        if !printable(ch) {
            // Make mangled input stand out
            style = Style::DEFAULT
                .with_foreground(Color::Ansi(7))
                .with_background(Color::Ansi(1))
                .with_attr(AttrFlags::BOLD);
            ch = '?';
        }

        if style != last_style {
            rendered.push_str(&style.render_update_from(&last_style));
            last_style = style;
        }
        rendered.push(ch);
    }

    rendered.push_str(&Style::DEFAULT.render_update_from(&last_style));
    rendered.push_str(CLEAR_TO_EOL);

    (rendered, row.len())
}

fn render_frame(cells: &[Cell], width: usize, row_count: usize, reposition: bool) -> String {
    let mut frame = String::new();
    if reposition {
        frame.push_str(CURSOR_TO_TOP_LEFT);
    }

    for row in 0..row_count {
        let (rendered, line_length) = render_line(&cells[row * width..(row + 1) * width]);
        frame.push_str(&rendered);

        let was_last_line = row + 1 == row_count;

        // No line break after a last row that exactly fills the width:
        // the terminal's own wrapping would turn it into a blank line.
        if !(was_last_line && line_length == width) {
            frame.push_str("\r\n");
        }
    }

    frame
}

/// Some terminal programs translate wheel events into arrow key presses
/// themselves. With those we are better off leaving the mouse alone, so
/// marking text keeps working.
fn terminal_has_arrow_keys_emulation() -> bool {
    use std::env;

    // Hyper and Warp
    match env::var("TERM_PROGRAM").as_deref() {
        Ok("Hyper") | Ok("WarpTerminal") => return true,
        _ => {}
    }

    // Kitty, Alacritty, GNOME Terminal, Tilix, Konsole, Terminator
    for variable in [
        "KITTY_WINDOW_ID",
        "ALACRITTY_WINDOW_ID",
        "GNOME_TERMINAL_SCREEN",
        "TILIX_ID",
        "KONSOLE_VERSION",
        "TERMINATOR_UUID",
    ] {
        if env::var(variable).map_or(false, |value| !value.is_empty()) {
            return true;
        }
    }

    // Foot
    match env::var("TERM") {
        Ok(term) => term == "foot" || term.starts_with("foot-"),
        Err(_) => false,
    }
}

#[cfg(unix)]
fn spawn_resize_watcher(resize_pending: Arc<AtomicBool>, events: SyncSender<Event>) {
    use signal_hook::consts::SIGWINCH;
    use signal_hook::iterator::Signals;

    let mut signals = match Signals::new([SIGWINCH]) {
        Ok(signals) => signals,
        Err(err) => {
            tracing::debug!("Cannot listen for window resizes: {}", err);
            return;
        }
    };

    thread::spawn(move || {
        for _ in signals.forever() {
            resize_pending.store(true, Ordering::Release);
            match events.try_send(Event::Resize) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    // The pending flag still makes the next size() call
                    // pick the change up
                    tracing::debug!("Events buffer full, dropping resize event");
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_resize_watcher(_resize_pending: Arc<AtomicBool>, _events: SyncSender<Event>) {}

/// Blocking read loop: terminal input bytes in, events out. Runs on its
/// own thread until the input side goes away, then posts exactly one
/// [`Event::Exit`] and terminates.
fn read_loop(events: SyncSender<Event>) {
    let mut buffer = [0u8; INPUT_BUFFER_SIZE];
    let mut pending = String::new();
    let mut max_bytes_read = 0;
    let mut stdin = io::stdin();

    loop {
        let count = match stdin.read(&mut buffer) {
            Ok(0) => {
                tracing::debug!("Input closed, read loop giving up");
                let _ = events.send(Event::Exit);
                return;
            }
            Ok(count) => count,
            Err(err) => {
                tracing::debug!("Input read error, read loop giving up: {}", err);
                let _ = events.send(Event::Exit);
                return;
            }
        };

        if count > max_bytes_read {
            max_bytes_read = count;
            tracing::trace!("Input high watermark bumped to {} bytes", max_bytes_read);
        }

        match std::str::from_utf8(&buffer[..count]) {
            Ok(chunk) => pending.push_str(chunk),
            Err(_) => {
                tracing::warn!("Got invalid UTF-8 sequence on input, dropping {} bytes", count);
                continue;
            }
        }

        loop {
            let (event, remainder) = consume_encoded_event(&pending);
            let keep = remainder.len();
            let consumed = pending.len() - keep;
            if consumed > 0 {
                pending.drain(..consumed);
            }

            let event = match event {
                Some(event) => event,
                // Need more bytes, go wait for them
                None => break,
            };

            match events.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(
                        "Events buffer (size {}) full, events are being dropped",
                        EVENT_QUEUE_SIZE
                    );
                }
                Err(TrySendError::Disconnected(_)) => return,
            }

            if pending.is_empty() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Screen {
        /// A screen with a fixed size and no terminal behind it.
        fn new_detached(width: usize, height: usize) -> Screen {
            let (_sender, receiver) = mpsc::sync_channel(1);
            Screen {
                width,
                height,
                cells: vec![Cell::default(); width * height],
                resize_pending: Arc::new(AtomicBool::new(false)),
                events: receiver,
                closed: true,
            }
        }
    }

    fn visible(rendered: &str) -> String {
        rendered.replace('\x1b', "ESC")
    }

    #[test]
    fn test_render_line() {
        let row = [
            Cell::new('<', Style::DEFAULT.with_attr(AttrFlags::REVERSE)),
            Cell::new('f', Style::DEFAULT.with_attr(AttrFlags::DIM)),
        ];

        let (rendered, count) = render_line(&row);
        assert_eq!(count, 2);
        assert_eq!(
            visible(&rendered),
            visible("\x1b[m\x1b[7m<\x1b[2m\x1b[27mf\x1b[m\x1b[K")
        );
    }

    #[test]
    fn test_render_line_empty() {
        let (rendered, count) = render_line(&[]);
        assert_eq!(count, 0);

        // Every line stands on its own, so clear to EOL even when empty
        assert_eq!(rendered, "\x1b[m\x1b[K");
    }

    #[test]
    fn test_render_line_last_reversed() {
        let row = [Cell::new('<', Style::DEFAULT.with_attr(AttrFlags::REVERSE))];

        let (rendered, count) = render_line(&row);
        assert_eq!(count, 1);
        assert_eq!(visible(&rendered), visible("\x1b[m\x1b[7m<\x1b[m\x1b[K"));
    }

    #[test]
    fn test_render_line_last_non_space() {
        let row = [Cell::new('X', Style::DEFAULT)];

        let (rendered, count) = render_line(&row);
        assert_eq!(count, 1);
        assert_eq!(visible(&rendered), visible("\x1b[mX\x1b[K"));
    }

    #[test]
    fn test_render_line_trailing_default_space_trimmed() {
        let row = [
            Cell::new('<', Style::DEFAULT.with_attr(AttrFlags::REVERSE)),
            Cell::new(' ', Style::DEFAULT),
        ];

        let (rendered, count) = render_line(&row);
        assert_eq!(count, 1);
        assert_eq!(visible(&rendered), visible("\x1b[m\x1b[7m<\x1b[m\x1b[K"));
    }

    #[test]
    fn test_render_line_only_trailing_spaces() {
        let row = [Cell::new(' ', Style::DEFAULT), Cell::new(' ', Style::DEFAULT)];

        let (rendered, count) = render_line(&row);
        assert_eq!(count, 0);
        assert_eq!(rendered, "\x1b[m\x1b[K");
    }

    #[test]
    fn test_render_line_styled_trailing_space_retained() {
        let row = [Cell::new(' ', Style::DEFAULT.with_attr(AttrFlags::REVERSE))];

        let (rendered, count) = render_line(&row);
        assert_eq!(count, 1);
        assert_eq!(visible(&rendered), visible("\x1b[m\x1b[7m \x1b[m\x1b[K"));
    }

    #[test]
    fn test_render_line_non_printable() {
        let row = [Cell::new('\x1b', Style::DEFAULT)];

        let (rendered, count) = render_line(&row);
        assert_eq!(count, 1);
        assert_eq!(
            visible(&rendered),
            visible("\x1b[m\x1b[37m\x1b[41m\x1b[1m?\x1b[m\x1b[K")
        );
    }

    #[test]
    fn test_render_hyperlink_at_end_of_line() {
        let url = "https://example.com/";
        let row = [Cell::new(
            '*',
            Style::DEFAULT.with_hyperlink(Some(url.to_string())),
        )];

        let (rendered, count) = render_line(&row);
        assert_eq!(count, 1);
        assert_eq!(
            visible(&rendered),
            format!("ESC[mESC]8;;{url}ESC\\*ESC]8;;ESC\\ESC[K")
        );
    }

    #[test]
    fn test_render_multi_cell_hyperlink() {
        let url = "https://example.com/";
        let linked = Style::DEFAULT.with_hyperlink(Some(url.to_string()));
        let row = [
            Cell::new('-', linked.clone()),
            Cell::new('X', linked.clone()),
            Cell::new('-', linked),
        ];

        let (rendered, count) = render_line(&row);
        assert_eq!(count, 3);
        assert_eq!(
            visible(&rendered),
            format!("ESC[mESC]8;;{url}ESC\\-X-ESC]8;;ESC\\ESC[K")
        );
    }

    #[test]
    fn test_frame_breaks_between_rows() {
        let mut cells = vec![Cell::default(); 4];
        cells[0] = Cell::new('a', Style::DEFAULT);
        cells[2] = Cell::new('b', Style::DEFAULT);

        let frame = render_frame(&cells, 2, 2, true);
        assert_eq!(
            visible(&frame),
            visible("\x1b[1;1H\x1b[ma\x1b[K\r\n\x1b[mb\x1b[K\r\n")
        );
    }

    #[test]
    fn test_frame_skips_break_after_full_width_last_row() {
        let cells = vec![
            Cell::new('a', Style::DEFAULT),
            Cell::new('b', Style::DEFAULT),
        ];

        let frame = render_frame(&cells, 2, 1, false);
        assert_eq!(visible(&frame), visible("\x1b[mab\x1b[K"));
    }

    #[test]
    fn test_frame_keeps_break_after_full_width_inner_row() {
        // A full width row before an empty last row: the empty row must
        // still get a line of its own.
        let mut cells = vec![Cell::default(); 4];
        cells[0] = Cell::new('a', Style::DEFAULT);
        cells[1] = Cell::new('b', Style::DEFAULT);

        let frame = render_frame(&cells, 2, 2, false);
        assert_eq!(visible(&frame), visible("\x1b[mab\x1b[K\r\n\x1b[m\x1b[K\r\n"));
    }

    #[test]
    fn test_set_cell_out_of_bounds_is_ignored() {
        let mut screen = Screen::new_detached(2, 2);
        screen.set_cell(5, 0, Cell::new('x', Style::DEFAULT));
        screen.set_cell(0, 5, Cell::new('x', Style::DEFAULT));
        assert!(screen.cells.iter().all(|cell| cell.ch == ' '));

        screen.set_cell(1, 1, Cell::new('x', Style::DEFAULT));
        assert_eq!(screen.cells[3].ch, 'x');
    }

    #[test]
    fn test_clear() {
        let mut screen = Screen::new_detached(2, 1);
        screen.set_cell(0, 0, Cell::new('x', Style::DEFAULT));
        screen.clear();
        assert!(screen.cells.iter().all(|cell| *cell == Cell::default()));
    }
}
