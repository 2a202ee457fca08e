//! Printers for batch mode: plain text and colored terminal output.

use std::fmt::Write as _;

use owo_colors::OwoColorize;
use serde::Serialize;
use termimad::MadSkin;

use crate::document::Block;
use crate::editor::Editor;
use crate::widget::{Page, Widget};

/// Render the document with every widget in place: its code as a fenced
/// block, followed by its output pane.
pub fn render_plain<E: Editor>(page: &Page<E>) -> String {
    let mut out = String::new();
    for block in page.document().blocks() {
        match block {
            Block::Text(text) => out.push_str(text),
            Block::Slot(id) => {
                if let Some(widget) = page.widget(*id) {
                    render_widget(&mut out, widget);
                }
            }
        }
    }
    out
}

fn render_widget<E: Editor>(out: &mut String, widget: &Widget<E>) {
    let _ = writeln!(out, "```{}", widget.info());
    let _ = writeln!(out, "{}", widget.editor().value());
    out.push_str("```\n");

    let text = widget.output().text();
    if !text.is_empty() {
        let marker = if widget.output().is_error() { "!" } else { "=" };
        for line in text.lines() {
            let _ = writeln!(out, "{marker} {line}");
        }
    }
}

/// One snippet in the machine-readable batch report.
#[derive(Debug, Serialize)]
pub struct SnippetReport<'a> {
    pub index: usize,
    pub line: usize,
    pub info: &'a str,
    pub code: String,
    pub output: &'a str,
    pub error: bool,
}

pub fn report<E: Editor>(page: &Page<E>) -> Vec<SnippetReport<'_>> {
    page.widgets()
        .iter()
        .map(|w| SnippetReport {
            index: w.id(),
            line: w.line(),
            info: w.info(),
            code: w.editor().value(),
            output: w.output().text(),
            error: w.output().is_error(),
        })
        .collect()
}

pub fn render_json<E: Editor>(page: &Page<E>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&report(page))
}

pub struct TextPrinter {
    pub color: bool,
}

impl TextPrinter {
    pub fn print<E: Editor>(&self, page: &Page<E>) {
        if !self.color {
            print!("{}", render_plain(page));
            return;
        }

        let markdown = MarkdownPrinter::default();
        for block in page.document().blocks() {
            match block {
                Block::Text(text) => markdown.print(text),
                Block::Slot(id) => {
                    if let Some(widget) = page.widget(*id) {
                        self.print_widget(widget);
                    }
                }
            }
        }
    }

    fn print_widget<E: Editor>(&self, widget: &Widget<E>) {
        println!("{}", format!("── [{}] line {} ──", widget.id() + 1, widget.line()).dimmed());
        for line in widget.editor().value().lines() {
            println!("{}", line.cyan());
        }
        let text = widget.output().text();
        if text.is_empty() {
            println!();
            return;
        }
        for line in text.lines() {
            if widget.output().is_error() {
                println!("{}", line.red());
            } else {
                println!("{}", line.green());
            }
        }
        println!();
    }
}

pub struct MarkdownPrinter {
    pub skin: MadSkin,
    pub width: usize,
}

impl Default for MarkdownPrinter {
    fn default() -> Self {
        Self { skin: MadSkin::default(), width: 100 }
    }
}

impl MarkdownPrinter {
    /// Styled text wrapped to `width` columns.
    pub fn render(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }
        self.skin.text(text, Some(self.width)).to_string()
    }

    pub fn print(&self, text: &str) {
        print!("{}", self.render(text));
    }
}
