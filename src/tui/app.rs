//! TUI application state management.

use std::path::PathBuf;

use crossterm::event::KeyEvent;

use crate::document::Block;
use crate::editor::{Editor, TextArea};
use crate::eval::Evaluator;
use crate::widget::{KeyOutcome, Page, RunOutcome, WidgetId};

/// One vertical item of the rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Item<'a> {
    Text(&'a str),
    Widget(WidgetId),
}

/// Application state for the TUI
pub struct App {
    /// Document being shown
    pub path: PathBuf,
    pub page: Page<TextArea>,
    pub evaluator: Box<dyn Evaluator>,
    /// First document row in view
    pub scroll: u16,
    /// Rows available for the document, updated on every draw
    pub viewport_height: u16,
    /// Whether to show help
    pub show_help: bool,
    /// Status message to display
    pub status_message: String,
}

impl App {
    pub fn new(path: PathBuf, mut page: Page<TextArea>, evaluator: Box<dyn Evaluator>) -> Self {
        page.focus_next();
        let status_message = if page.is_empty() {
            "No runnable snippets | F1 help | Esc quit".to_string()
        } else {
            ready_status(&page, evaluator.as_ref())
        };
        Self {
            path,
            page,
            evaluator,
            scroll: 0,
            viewport_height: 0,
            show_help: false,
            status_message,
        }
    }

    pub fn items(&self) -> Vec<Item<'_>> {
        self.page
            .document()
            .blocks()
            .iter()
            .map(|b| match b {
                Block::Text(text) => Item::Text(text.trim_end_matches('\n')),
                Block::Slot(id) => Item::Widget(*id),
            })
            .collect()
    }

    /// Rows an item takes on screen.
    pub fn item_height(&self, item: &Item<'_>) -> u16 {
        match item {
            Item::Text(text) => rows(text.lines().count()),
            Item::Widget(id) => self.widget_height(*id),
        }
    }

    /// Editor box plus output box, borders included.
    pub fn widget_height(&self, id: WidgetId) -> u16 {
        let Some(widget) = self.page.widget(id) else {
            return 0;
        };
        let editor = rows(widget.editor().visible_height()).saturating_add(2);
        let output = match widget.output().text().lines().count() {
            0 => 0,
            n => rows(n).saturating_add(2),
        };
        editor.saturating_add(output)
    }

    /// Top row of every item, in document rows.
    pub fn item_offsets(&self) -> Vec<(Item<'_>, u16, u16)> {
        let mut top = 0u16;
        self.items()
            .into_iter()
            .map(|item| {
                let height = self.item_height(&item);
                let entry = (item, top, height);
                top = top.saturating_add(height);
                entry
            })
            .collect()
    }

    pub fn content_height(&self) -> u16 {
        self.item_offsets().last().map(|(_, top, h)| top.saturating_add(*h)).unwrap_or(0)
    }

    /// Scroll so the focused widget is fully in view, if it fits.
    pub fn ensure_focus_visible(&mut self) {
        let Some(focused) = self.page.focused() else {
            return;
        };
        let Some((top, height)) = self
            .item_offsets()
            .into_iter()
            .find(|(item, _, _)| *item == Item::Widget(focused))
            .map(|(_, top, height)| (top, height))
        else {
            return;
        };
        let view = self.viewport_height.max(1);
        if top < self.scroll {
            self.scroll = top;
        } else if top.saturating_add(height) > self.scroll.saturating_add(view) {
            self.scroll = top.saturating_add(height).saturating_sub(view).min(top);
        }
    }

    pub fn handle_key(&mut self, key: &KeyEvent) {
        match self.page.handle_key(key, self.evaluator.as_ref()) {
            KeyOutcome::Ran(id, outcome) => self.report_run(id, &outcome),
            KeyOutcome::Edited(_) | KeyOutcome::Moved(_) | KeyOutcome::Ignored => {}
        }
        self.ensure_focus_visible();
    }

    pub fn paste(&mut self, text: &str) {
        if let Some(id) = self.page.focused() {
            if let Some(widget) = self.page.widget_mut(id) {
                widget.editor_mut().insert_str(&text.replace("\r\n", "\n"));
            }
        }
        self.ensure_focus_visible();
    }

    fn report_run(&mut self, id: WidgetId, outcome: &RunOutcome) {
        self.status_message = match outcome {
            RunOutcome::Completed(_) => format!("Snippet {} ran", id + 1),
            RunOutcome::Failed(_) => format!("Snippet {} failed", id + 1),
        };
    }

    pub fn focus_next(&mut self) {
        self.page.focus_next();
        self.ensure_focus_visible();
    }

    pub fn focus_previous(&mut self) {
        self.page.focus_previous();
        self.ensure_focus_visible();
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(self.viewport_height.max(1));
    }

    pub fn scroll_down(&mut self) {
        let max = self.content_height().saturating_sub(self.viewport_height);
        self.scroll = self.scroll.saturating_add(self.viewport_height.max(1)).min(max);
    }
}

/// Screen rows for a line count, clamped to what a terminal can address.
pub(crate) fn rows(count: usize) -> u16 {
    u16::try_from(count).unwrap_or(u16::MAX)
}

fn ready_status(page: &Page<TextArea>, evaluator: &dyn Evaluator) -> String {
    let run_key = page
        .widget(0)
        .and_then(|w| w.editor().commands().first().map(|c| c.binding.to_string()))
        .unwrap_or_default();
    format!("{} snippets | {run_key} run | Tab next | F1 help | evaluator: {}", page.len(), evaluator.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::script::ScriptEvaluator;
    use crate::widget::{enable_interact_for_all, WidgetSettings};
    use crossterm::event::{KeyCode, KeyModifiers};

    const SOURCE: &str = "# T\n\none\ntwo\n\n```interact\nreturn 1\n```\n\n```interact\nthrow 'x'\n```\n";

    fn app() -> App {
        let page = enable_interact_for_all(SOURCE, &"interact".parse().unwrap(), &WidgetSettings::default(), TextArea::new);
        App::new(PathBuf::from("doc.md"), page, Box::new(ScriptEvaluator::new()))
    }

    #[test]
    fn test_first_widget_focused_on_start() {
        let app = app();
        assert_eq!(app.page.focused(), Some(0));
        assert!(app.status_message.contains("Ctrl-Enter"));
    }

    #[test]
    fn test_run_key_runs_and_advances() {
        let mut app = app();
        app.handle_key(&KeyEvent::new(KeyCode::Enter, KeyModifiers::CONTROL));
        assert_eq!(app.page.focused(), Some(1));
        assert_eq!(app.status_message, "Snippet 1 ran");

        app.handle_key(&KeyEvent::new(KeyCode::Enter, KeyModifiers::CONTROL));
        assert_eq!(app.page.focused(), Some(1));
        assert_eq!(app.status_message, "Snippet 2 failed");
    }

    #[test]
    fn test_layout_heights() {
        let mut app = app();
        let offsets = app.item_offsets();
        assert_eq!(offsets[0], (Item::Text("# T\n\none\ntwo"), 0, 4));
        assert_eq!(offsets[1], (Item::Widget(0), 4, 3));

        app.page.run(0, app.evaluator.as_ref());
        assert_eq!(app.widget_height(0), 6);
    }

    #[test]
    fn test_focus_kept_in_view() {
        let mut app = app();
        app.viewport_height = 4;
        app.focus_next();
        let (_, top, height) = app.item_offsets().into_iter().find(|(i, _, _)| *i == Item::Widget(1)).unwrap();
        assert!(app.scroll <= top);
        assert!(top + height <= app.scroll + app.viewport_height);
    }

    #[test]
    fn test_paste_edits_focused_editor() {
        let mut app = app();
        app.paste("x\r\ny");
        assert_eq!(app.page.widget(0).unwrap().editor().value(), "x\nyreturn 1");
    }

    #[test]
    fn test_heights_saturate_for_huge_outputs() {
        let source = format!("{}\n```interact\nfor (let i = 0; i < 70000; i++) console.log(i)\n```\n", "line\n".repeat(70_000));
        let page = enable_interact_for_all(&source, &"interact".parse().unwrap(), &WidgetSettings::default(), TextArea::new);
        let mut app = App::new(PathBuf::from("doc.md"), page, Box::new(ScriptEvaluator::new()));
        assert_eq!(app.item_height(&app.items()[0]), u16::MAX);

        app.page.run(0, app.evaluator.as_ref());
        assert_eq!(app.page.widget(0).unwrap().output().text().lines().count(), 70_000);
        assert_eq!(app.widget_height(0), u16::MAX);
        assert_eq!(app.content_height(), u16::MAX);
        app.ensure_focus_visible();
        app.scroll_down();
    }
}
