use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::Path;

use interact::document::{self, Block};
use interact::eval::script::ScriptEvaluator;
use interact::printer::render_plain;
use interact::widget::KeyOutcome;
use interact::{enable_interact_for_all, Editor, RunOutcome, Selector, TextArea, Value, WidgetSettings, WidgetState};

fn demo() -> Result<String> {
    document::load(Path::new("tests/demo.md"))
}

#[test]
fn test_demo_document_builds_linked_widgets() -> Result<()> {
    let source = demo()?;
    let selector: Selector = "interact".parse()?;
    let page = enable_interact_for_all(&source, &selector, &WidgetSettings::default(), TextArea::new);

    assert_eq!(page.len(), 3);
    let links: Vec<Option<usize>> = page.widgets().iter().map(|w| w.next()).collect();
    assert_eq!(links, vec![Some(1), Some(2), None]);
    assert!(page.widgets().iter().all(|w| w.state() == WidgetState::Idle));

    let rust_block_kept = page
        .document()
        .blocks()
        .iter()
        .any(|b| matches!(b, Block::Text(t) if t.contains("fn main() {}")));
    assert!(rust_block_kept);
    Ok(())
}

#[test]
fn test_run_all_renders_values_logs_and_errors() -> Result<()> {
    let source = demo()?;
    let mut page = enable_interact_for_all(&source, &"interact".parse()?, &WidgetSettings::default(), TextArea::new);
    let outcomes = page.run_all(&ScriptEvaluator::new());

    assert_eq!(outcomes[0], RunOutcome::Completed(Value::Number(42.0)));
    assert_eq!(page.widgets()[0].output().text(), "42");
    assert_eq!(page.widgets()[1].output().text(), "row,1,1\nrow,2,4\nrow,3,9\n");
    assert!(page.widgets()[2].output().is_error());
    assert_eq!(page.widgets()[2].output().text(), "Error: TypeError: not a function\n");

    let plain = render_plain(&page);
    assert!(plain.contains("= 42\n"));
    assert!(plain.contains("! Error: TypeError: not a function\n"));
    Ok(())
}

#[test]
fn test_keyboard_walkthrough() -> Result<()> {
    let source = demo()?;
    let mut page = enable_interact_for_all(&source, &"interact".parse()?, &WidgetSettings::default(), TextArea::new);
    let evaluator = ScriptEvaluator::new();
    let run = KeyEvent::new(KeyCode::Enter, KeyModifiers::CONTROL);

    page.focus(0);
    assert!(matches!(page.handle_key(&run, &evaluator), KeyOutcome::Ran(0, RunOutcome::Completed(_))));
    assert_eq!(page.focused(), Some(1));
    assert!(matches!(page.handle_key(&run, &evaluator), KeyOutcome::Ran(1, RunOutcome::Completed(_))));
    assert_eq!(page.focused(), Some(2));
    assert!(matches!(page.handle_key(&run, &evaluator), KeyOutcome::Ran(2, RunOutcome::Failed(_))));
    assert_eq!(page.focused(), Some(2));

    // Fix the failing snippet in place and run it again.
    let widget = page.widget_mut(2).expect("third widget");
    widget.editor_mut().set_value("return 'fixed'", interact::editor::CursorPlacement::End);
    assert!(matches!(page.handle_key(&run, &evaluator), KeyOutcome::Ran(2, RunOutcome::Completed(_))));
    let widget = page.widget(2).expect("third widget");
    assert_eq!(widget.output().text(), "fixed");
    assert!(!widget.output().is_error());
    assert!(widget.editor().is_focused());
    Ok(())
}

#[test]
fn test_custom_run_key() -> Result<()> {
    let settings = WidgetSettings { run_key: "F5".parse()?, ..WidgetSettings::default() };
    let mut page = enable_interact_for_all("```interact\nreturn 1\n```\n", &"interact".parse()?, &settings, TextArea::new);
    let evaluator = ScriptEvaluator::new();
    page.focus(0);

    let ctrl_enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::CONTROL);
    assert!(!matches!(page.handle_key(&ctrl_enter, &evaluator), KeyOutcome::Ran(..)));
    let f5 = KeyEvent::new(KeyCode::F(5), KeyModifiers::NONE);
    assert!(matches!(page.handle_key(&f5, &evaluator), KeyOutcome::Ran(0, _)));
    Ok(())
}
