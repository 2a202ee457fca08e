//! Async event loop for the interactive document view.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{app::App, events::TuiEvent, ui::render_ui};
use crate::editor::TextArea;
use crate::eval::Evaluator;
use crate::widget::Page;

/// Show `page` full-screen until the user quits.
pub async fn run_tui(path: PathBuf, page: Page<TextArea>, evaluator: Box<dyn Evaluator>) -> Result<()> {
    // Check if we're in a proper terminal environment
    if !io::IsTerminal::is_terminal(&io::stdout()) {
        bail!("interactive mode requires a terminal; use --run-all");
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(EnableBracketedPaste)?;
    // Without enhancement most terminals report Ctrl-Enter as plain Enter.
    let enhanced = supports_keyboard_enhancement().unwrap_or(false);
    if enhanced {
        stdout.execute(PushKeyboardEnhancementFlags(
            KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES | KeyboardEnhancementFlags::REPORT_ALTERNATE_KEYS,
        ))?;
    } else {
        warn!("terminal does not report keyboard enhancements; modified Enter may not reach the editor");
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(path, page, evaluator);
    info!(widgets = app.page.len(), "interactive session started");

    let (event_tx, event_rx) = mpsc::unbounded_channel::<TuiEvent>();
    let result = run_app(&mut terminal, &mut app, event_tx, event_rx).await;

    // Restore terminal
    if enhanced {
        terminal.backend_mut().execute(PopKeyboardEnhancementFlags)?;
    }
    terminal.backend_mut().execute(DisableBracketedPaste)?;
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// Main application loop
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    event_tx: mpsc::UnboundedSender<TuiEvent>,
    mut event_rx: mpsc::UnboundedReceiver<TuiEvent>,
) -> Result<()> {
    // Spawn input handler
    let input_tx = event_tx.clone();
    tokio::task::spawn_blocking(move || loop {
        // The runtime waits for blocking tasks on shutdown.
        if input_tx.is_closed() {
            break;
        }
        if event::poll(Duration::from_millis(100)).unwrap_or(false) {
            let tui_event = match event::read() {
                Ok(Event::Key(key)) => TuiEvent::Key(key),
                Ok(Event::Paste(text)) => TuiEvent::Paste(text),
                Ok(Event::Resize(w, h)) => TuiEvent::Resize(w, h),
                Ok(_) => continue,
                Err(_) => TuiEvent::Quit,
            };
            if input_tx.send(tui_event).is_err() {
                break; // Channel closed
            }
        }
    });

    terminal.draw(|frame| render_ui(frame, app))?;
    app.ensure_focus_visible();

    while let Some(tui_event) = event_rx.recv().await {
        match tui_event {
            TuiEvent::Key(key) => {
                if handle_key_event(app, key) {
                    break; // Quit requested
                }
            }
            TuiEvent::Paste(text) => app.paste(&text),
            TuiEvent::Resize(w, h) => {
                debug!(width = w, height = h, "terminal resized");
                terminal.autoresize()?;
            }
            TuiEvent::Quit => break,
        }
        terminal.draw(|frame| render_ui(frame, app))?;
    }

    Ok(())
}

/// Handle keyboard events. Returns true when the user asked to quit.
fn handle_key_event(app: &mut App, key: KeyEvent) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }

    // Any key closes the help overlay
    if app.show_help {
        app.toggle_help();
        return false;
    }

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
        KeyCode::Esc => return true,
        KeyCode::F(1) => app.toggle_help(),
        KeyCode::Tab if key.modifiers.is_empty() => app.focus_next(),
        KeyCode::BackTab => app.focus_previous(),
        KeyCode::Tab if key.modifiers.contains(KeyModifiers::SHIFT) => app.focus_previous(),
        KeyCode::PageUp => app.scroll_up(),
        KeyCode::PageDown => app.scroll_down(),
        _ => app.handle_key(&key),
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Editor;
    use crate::eval::script::ScriptEvaluator;
    use crate::widget::{enable_interact_for_all, WidgetSettings};

    fn app() -> App {
        let source = "```interact\nreturn 1\n```\n\n```interact\nreturn 2\n```\n";
        let page = enable_interact_for_all(source, &"interact".parse().unwrap(), &WidgetSettings::default(), TextArea::new);
        App::new(PathBuf::from("doc.md"), page, Box::new(ScriptEvaluator::new()))
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_quit_keys() {
        let mut app = app();
        assert!(handle_key_event(&mut app, key(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(handle_key_event(&mut app, key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!handle_key_event(&mut app, key(KeyCode::Char('c'), KeyModifiers::NONE)));
    }

    #[test]
    fn test_tab_moves_focus() {
        let mut app = app();
        handle_key_event(&mut app, key(KeyCode::Tab, KeyModifiers::NONE));
        assert_eq!(app.page.focused(), Some(1));
        handle_key_event(&mut app, key(KeyCode::BackTab, KeyModifiers::SHIFT));
        assert_eq!(app.page.focused(), Some(0));
    }

    #[test]
    fn test_help_swallows_next_key() {
        let mut app = app();
        handle_key_event(&mut app, key(KeyCode::F(1), KeyModifiers::NONE));
        assert!(app.show_help);
        assert!(!handle_key_event(&mut app, key(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(!app.show_help);
    }

    #[test]
    fn test_other_keys_reach_editor() {
        let mut app = app();
        handle_key_event(&mut app, key(KeyCode::Char('x'), KeyModifiers::NONE));
        assert_eq!(app.page.widget(0).unwrap().editor().value(), "xreturn 1");
    }
}
