//! Events flowing from the input poller to the TUI loop.

use crossterm::event::KeyEvent;

#[derive(Debug)]
pub enum TuiEvent {
    /// User keyboard input
    Key(KeyEvent),
    /// Bracketed paste content
    Paste(String),
    /// Terminal resized
    Resize(u16, u16),
    /// Request to quit the application
    Quit,
}
