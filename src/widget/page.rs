//! A document with its widgets, linked in document order.

use crossterm::event::KeyEvent;
use tracing::{debug, info};

use super::{RunOutcome, Widget, WidgetId, WidgetSettings, RUN_COMMAND};
use crate::document::{find_regions, Document, Selector};
use crate::editor::{Editor, EditorAction};
use crate::eval::Evaluator;

/// Result of routing a key to the focused widget.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    Ran(WidgetId, RunOutcome),
    Edited(WidgetId),
    Moved(WidgetId),
    Ignored,
}

pub struct Page<E> {
    document: Document,
    widgets: Vec<Widget<E>>,
    focused: Option<WidgetId>,
}

/// Build one widget per region matching `selector`, in document order, and
/// link each to the one built after it.
///
/// Calling this twice on the same source builds two independent pages.
pub fn enable_interact_for_all<E, F>(source: &str, selector: &Selector, settings: &WidgetSettings, mut make_editor: F) -> Page<E>
where
    E: Editor,
    F: FnMut() -> E,
{
    let regions = find_regions(source, selector);
    let document = Document::with_slots(source, &regions);

    let widgets: Vec<Widget<E>> = regions
        .iter()
        .map(|region| Widget::new(region, make_editor(), settings))
        .collect();
    for pair in widgets.windows(2) {
        pair[0].link(pair[1].id());
    }

    info!(selector = %selector, widgets = widgets.len(), "interactive regions enabled");
    Page { document, widgets, focused: None }
}

impl<E: Editor> Page<E> {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn widgets(&self) -> &[Widget<E>] {
        &self.widgets
    }

    pub fn widget(&self, id: WidgetId) -> Option<&Widget<E>> {
        self.widgets.get(id)
    }

    pub fn widget_mut(&mut self, id: WidgetId) -> Option<&mut Widget<E>> {
        self.widgets.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn focused(&self) -> Option<WidgetId> {
        self.focused
    }

    /// Move input focus to `id`. Only one editor holds focus at a time.
    pub fn focus(&mut self, id: WidgetId) -> bool {
        if id >= self.widgets.len() {
            return false;
        }
        if let Some(previous) = self.focused.take() {
            self.widgets[previous].editor_mut().blur();
        }
        self.widgets[id].editor_mut().focus();
        self.focused = Some(id);
        true
    }

    pub fn focus_next(&mut self) -> bool {
        match self.focused {
            Some(id) if id + 1 < self.widgets.len() => self.focus(id + 1),
            None if !self.widgets.is_empty() => self.focus(0),
            _ => false,
        }
    }

    pub fn focus_previous(&mut self) -> bool {
        match self.focused {
            Some(id) if id > 0 => self.focus(id - 1),
            None if !self.widgets.is_empty() => self.focus(self.widgets.len() - 1),
            _ => false,
        }
    }

    /// Run widget `id`. A successful run hands focus to the widget's forward
    /// link; a failed run leaves focus where it is.
    pub fn run(&mut self, id: WidgetId, evaluator: &dyn Evaluator) -> Option<RunOutcome> {
        let widget = self.widgets.get_mut(id)?;
        let outcome = widget.run(evaluator);
        if outcome.is_success() {
            if let Some(next) = widget.next() {
                debug!(from = id, to = next, "advancing focus");
                self.focus(next);
            }
        }
        Some(outcome)
    }

    /// Route a key to the focused widget's editor, dispatching any command it
    /// triggers.
    pub fn handle_key(&mut self, key: &KeyEvent, evaluator: &dyn Evaluator) -> KeyOutcome {
        let Some(id) = self.focused else {
            return KeyOutcome::Ignored;
        };
        match self.widgets[id].editor_mut().handle_key(key) {
            EditorAction::Command(name) if name == RUN_COMMAND => match self.run(id, evaluator) {
                Some(outcome) => KeyOutcome::Ran(id, outcome),
                None => KeyOutcome::Ignored,
            },
            EditorAction::Command(name) => {
                debug!(widget = id, command = %name, "no handler for command");
                KeyOutcome::Ignored
            }
            EditorAction::Edited => KeyOutcome::Edited(id),
            EditorAction::Moved => KeyOutcome::Moved(id),
            EditorAction::Ignored => KeyOutcome::Ignored,
        }
    }

    /// Run every widget once, in order, without moving focus. Failures do
    /// not stop later widgets.
    pub fn run_all(&mut self, evaluator: &dyn Evaluator) -> Vec<RunOutcome> {
        self.widgets.iter_mut().map(|w| w.run(evaluator)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::TextArea;
    use crate::eval::script::ScriptEvaluator;
    use crossterm::event::{KeyCode, KeyModifiers};

    const SOURCE: &str = "\
# Demo

```interact
return 1
```

Some prose.

```interact
throw new Error('nope')
```

```interact
console.log('last')
```
";

    fn page() -> Page<TextArea> {
        enable_interact_for_all(SOURCE, &"interact".parse().unwrap(), &WidgetSettings::default(), TextArea::new)
    }

    #[test]
    fn test_widgets_linked_in_document_order() {
        let page = page();
        assert_eq!(page.len(), 3);
        assert_eq!(page.widget(0).unwrap().next(), Some(1));
        assert_eq!(page.widget(1).unwrap().next(), Some(2));
        assert_eq!(page.widget(2).unwrap().next(), None);
        assert_eq!(page.document().slot_count(), 3);
        assert_eq!(page.widget(1).unwrap().editor().value(), "throw new Error('nope')");
    }

    #[test]
    fn test_successful_run_advances_focus() {
        let mut page = page();
        page.focus(0);
        let outcome = page.run(0, &ScriptEvaluator::new()).unwrap();
        assert!(outcome.is_success());
        assert_eq!(page.focused(), Some(1));
        assert!(!page.widget(0).unwrap().editor().is_focused());
        assert!(page.widget(1).unwrap().editor().is_focused());
    }

    #[test]
    fn test_failed_run_keeps_focus() {
        let mut page = page();
        page.focus(1);
        let outcome = page.run(1, &ScriptEvaluator::new()).unwrap();
        assert!(!outcome.is_success());
        assert_eq!(page.focused(), Some(1));
        assert!(page.widget(1).unwrap().output().is_error());
    }

    #[test]
    fn test_last_widget_run_keeps_focus() {
        let mut page = page();
        page.focus(2);
        page.run(2, &ScriptEvaluator::new());
        assert_eq!(page.focused(), Some(2));
        assert_eq!(page.widget(2).unwrap().output().text(), "last\n");
    }

    #[test]
    fn test_run_key_dispatches_to_focused_widget() {
        let mut page = page();
        let evaluator = ScriptEvaluator::new();
        let run = KeyEvent::new(KeyCode::Enter, KeyModifiers::CONTROL);
        assert_eq!(page.handle_key(&run, &evaluator), KeyOutcome::Ignored);

        page.focus(0);
        let typed = page.handle_key(&KeyEvent::new(KeyCode::End, KeyModifiers::NONE), &evaluator);
        assert_eq!(typed, KeyOutcome::Moved(0));
        page.handle_key(&KeyEvent::new(KeyCode::Char('0'), KeyModifiers::NONE), &evaluator);

        let outcome = page.handle_key(&run, &evaluator);
        assert!(matches!(outcome, KeyOutcome::Ran(0, RunOutcome::Completed(_))));
        assert_eq!(page.widget(0).unwrap().output().text(), "10");
        assert_eq!(page.focused(), Some(1));
    }

    #[test]
    fn test_run_all_continues_past_failures() {
        let mut page = page();
        let outcomes = page.run_all(&ScriptEvaluator::new());
        let successes: Vec<bool> = outcomes.iter().map(RunOutcome::is_success).collect();
        assert_eq!(successes, vec![true, false, true]);
        assert_eq!(page.focused(), None);
    }

    #[test]
    fn test_focus_navigation() {
        let mut page = page();
        assert!(page.focus_next());
        assert_eq!(page.focused(), Some(0));
        assert!(!page.focus_previous());
        assert!(page.focus_next() && page.focus_next());
        assert!(!page.focus_next());
        assert_eq!(page.focused(), Some(2));
        assert!(!page.focus(9));
    }

    #[test]
    fn test_initializing_twice_builds_independent_pages() {
        let mut first = page();
        let second = page();
        first.run(0, &ScriptEvaluator::new());
        assert_eq!(first.widget(0).unwrap().output().text(), "1");
        assert_eq!(second.widget(0).unwrap().output().text(), "");
    }
}
