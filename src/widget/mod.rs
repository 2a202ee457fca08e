//! Runnable widgets: one editor plus one output pane per region.

use std::cell::OnceCell;

use tracing::{debug, info};

use crate::document::Region;
use crate::editor::{Command, CursorPlacement, Editor, EditorOptions, KeyBinding};
use crate::eval::{join_args, Capabilities, Console, EvalError, Evaluator, Value};

mod page;

pub use page::{enable_interact_for_all, KeyOutcome, Page};

pub type WidgetId = usize;

/// Name of the command that runs a widget.
pub const RUN_COMMAND: &str = "run";

/// Construction settings shared by every widget on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetSettings {
    pub options: EditorOptions,
    pub run_key: KeyBinding,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            options: EditorOptions::default(),
            run_key: KeyBinding::new(crossterm::event::KeyCode::Enter, crossterm::event::KeyModifiers::CONTROL),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WidgetState {
    /// Showing the last output, or nothing.
    #[default]
    Idle,
    /// Showing the last error; the error marker is set.
    Error,
}

/// What a widget shows under its editor. Fully reset at the start of every
/// run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputPane {
    text: String,
    state: WidgetState,
}

impl OutputPane {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> WidgetState {
        self.state
    }

    pub fn is_error(&self) -> bool {
        self.state == WidgetState::Error
    }

    fn reset(&mut self) {
        self.text.clear();
        self.state = WidgetState::Idle;
    }

    fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn fail(&mut self, error: &EvalError) {
        self.state = WidgetState::Error;
        self.text.push_str(&format!("Error: {error}\n"));
    }
}

/// `console` handed to evaluated code: each call becomes one output line and
/// one diagnostic event.
struct PaneConsole<'a> {
    widget: WidgetId,
    pane: &'a mut OutputPane,
}

impl Console for PaneConsole<'_> {
    fn log(&mut self, args: &[Value]) {
        let line = join_args(args);
        info!(target: "interact::console", widget = self.widget, "{line}");
        self.pane.append(&line);
        self.pane.append("\n");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(Value),
    Failed(EvalError),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

pub struct Widget<E> {
    id: WidgetId,
    editor: E,
    output: OutputPane,
    next: OnceCell<WidgetId>,
    line: usize,
    info: String,
}

impl<E: Editor> Widget<E> {
    /// Bind `editor` to the region's seed code and register the run command.
    pub fn new(region: &Region, mut editor: E, settings: &WidgetSettings) -> Self {
        editor.set_options(settings.options.clone());
        editor.set_value(&region.text, CursorPlacement::Start);
        editor.add_command(Command::new(RUN_COMMAND, settings.run_key));
        debug!(widget = region.index, line = region.line, info = %region.info, "widget created");
        Self {
            id: region.index,
            editor,
            output: OutputPane::default(),
            next: OnceCell::new(),
            line: region.line,
            info: region.info.clone(),
        }
    }

    pub fn id(&self) -> WidgetId {
        self.id
    }

    pub fn editor(&self) -> &E {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut E {
        &mut self.editor
    }

    pub fn output(&self) -> &OutputPane {
        &self.output
    }

    pub fn state(&self) -> WidgetState {
        self.output.state
    }

    /// Source line of the region this widget replaced.
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn info(&self) -> &str {
        &self.info
    }

    /// The widget built right after this one, if any.
    pub fn next(&self) -> Option<WidgetId> {
        self.next.get().copied()
    }

    /// Set the forward link. A link, once set, is kept; returns whether this
    /// call set it.
    pub(crate) fn link(&self, next: WidgetId) -> bool {
        self.next.set(next).is_ok()
    }

    /// Evaluate the editor's current text and render the outcome into the
    /// output pane. Errors never escape: they end up in the pane.
    pub fn run(&mut self, evaluator: &dyn Evaluator) -> RunOutcome {
        self.output.reset();
        let code = self.editor.value();

        let result = {
            let mut console = PaneConsole { widget: self.id, pane: &mut self.output };
            let mut caps = Capabilities::new(&mut console);
            evaluator.evaluate(&code, &mut caps)
        };

        match result {
            Ok(value) => {
                if !value.is_undefined() {
                    self.output.append(&value.to_string());
                }
                debug!(widget = self.id, evaluator = evaluator.name(), "run completed");
                RunOutcome::Completed(value)
            }
            Err(error) => {
                self.output.fail(&error);
                debug!(widget = self.id, evaluator = evaluator.name(), %error, "run failed");
                RunOutcome::Failed(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::TextArea;
    use crate::eval::script::ScriptEvaluator;

    fn widget(code: &str) -> Widget<TextArea> {
        let region = Region { index: 0, range: 0..0, line: 1, info: "interact".into(), text: code.into() };
        Widget::new(&region, TextArea::new(), &WidgetSettings::default())
    }

    #[test]
    fn test_construction_binds_editor() {
        let w = widget("return 1");
        assert_eq!(w.editor().value(), "return 1");
        assert_eq!(w.editor().commands()[0].name, RUN_COMMAND);
        assert_eq!(w.editor().commands()[0].binding.to_string(), "Ctrl-Enter");
        assert_eq!(w.state(), WidgetState::Idle);
        assert_eq!(w.output().text(), "");
        assert_eq!(w.next(), None);
    }

    #[test]
    fn test_run_renders_value() {
        let mut w = widget("return 2+2");
        let outcome = w.run(&ScriptEvaluator::new());
        assert!(outcome.is_success());
        assert_eq!(w.output().text(), "4");
        assert!(!w.output().is_error());
    }

    #[test]
    fn test_run_renders_error() {
        let mut w = widget("throw new Error('x')");
        let outcome = w.run(&ScriptEvaluator::new());
        assert!(!outcome.is_success());
        assert!(w.output().text().starts_with("Error: "));
        assert_eq!(w.output().text(), "Error: Error: x\n");
        assert_eq!(w.state(), WidgetState::Error);
    }

    #[test]
    fn test_logs_accumulate_before_value() {
        let mut w = widget("console.log('a', 1)\nconsole.log('b')\nreturn 'done'");
        w.run(&ScriptEvaluator::new());
        assert_eq!(w.output().text(), "a,1\nb\ndone");
    }

    #[test]
    fn test_undefined_result_adds_nothing() {
        let mut w = widget("console.log('only')");
        w.run(&ScriptEvaluator::new());
        assert_eq!(w.output().text(), "only\n");
    }

    #[test]
    fn test_rerun_clears_previous_output_and_marker() {
        let mut w = widget("throw 'first'");
        w.run(&ScriptEvaluator::new());
        assert!(w.output().is_error());

        w.editor_mut().set_value("return 'second'", CursorPlacement::End);
        w.run(&ScriptEvaluator::new());
        assert_eq!(w.output().text(), "second");
        assert_eq!(w.state(), WidgetState::Idle);

        w.run(&ScriptEvaluator::new());
        assert_eq!(w.output().text(), "second");
    }

    #[test]
    fn test_link_is_set_once() {
        let w = widget("1");
        assert!(w.link(3));
        assert!(!w.link(4));
        assert_eq!(w.next(), Some(3));
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_console_lines_are_logged_as_events() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_env_filter("interact::console=info")
            .finish();

        let mut w = widget("console.log('a', 1)\nreturn 2");
        tracing::subscriber::with_default(subscriber, || w.run(&ScriptEvaluator::new()));

        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = logged.lines().collect();
        assert_eq!(lines.len(), 1, "got {logged:?}");
        assert!(lines[0].contains("INFO"));
        assert!(lines[0].contains("interact::console"));
        assert!(lines[0].contains("a,1"));
        assert!(lines[0].contains("widget=0"));
        assert_eq!(w.output().text(), "a,1\n2");
    }
}
