//! Runnable, editable code snippets embedded in Markdown documents.
//!
//! Fenced code blocks matching a selector become widgets: an editor holding
//! the snippet and an output pane. Running a widget evaluates its text through
//! a pluggable [`eval::Evaluator`], writes the result (or the error) into the
//! output pane, and on success hands focus to the next widget.

pub mod cli;
pub mod config;
pub mod document;
pub mod editor;
pub mod eval;
pub mod logging;
pub mod printer;
pub mod tui;
pub mod utils;
pub mod widget;

pub use document::{Document, Region, Selector};
pub use editor::{Editor, EditorOptions, KeyBinding, TextArea};
pub use eval::{Capabilities, Console, EvalError, Evaluator, Value};
pub use widget::{enable_interact_for_all, Page, RunOutcome, Widget, WidgetId, WidgetSettings, WidgetState};
