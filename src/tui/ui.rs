//! UI layout and rendering logic for the TUI.

use ratatui::{
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::app::{rows, App, Item};
use crate::editor::{Editor, TextArea};
use crate::widget::{Widget, WidgetState};

/// Render the main UI
pub fn render_ui(frame: &mut Frame, app: &mut App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Document area
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    app.viewport_height = main_layout[0].height;
    render_document(frame, app, main_layout[0]);
    render_status_bar(frame, app, main_layout[1]);

    if app.show_help {
        render_help_overlay(frame, app);
    }
}

/// Render text blocks and widgets, shifted by the scroll offset
fn render_document(frame: &mut Frame, app: &App, area: Rect) {
    let mut cursor = None;

    for (item, top, height) in app.item_offsets() {
        let bottom = top.saturating_add(height);
        if height == 0 || bottom <= app.scroll || top >= app.scroll.saturating_add(area.height) {
            continue;
        }

        match item {
            Item::Text(text) => {
                let hidden = app.scroll.saturating_sub(top);
                let y = area.y + top.saturating_sub(app.scroll);
                let rows = (height - hidden).min(area.bottom().saturating_sub(y));
                let rect = Rect::new(area.x, y, area.width, rows);
                let paragraph = Paragraph::new(text).scroll((hidden, 0));
                frame.render_widget(paragraph, rect);
            }
            Item::Widget(id) => {
                // Widgets are drawn only when their top edge is in view.
                if top < app.scroll {
                    continue;
                }
                let Some(widget) = app.page.widget(id) else {
                    continue;
                };
                let y = area.y + (top - app.scroll);
                let rows = height.min(area.bottom().saturating_sub(y));
                let rect = Rect::new(area.x, y, area.width, rows);
                if let Some(pos) = render_widget(frame, widget, rect) {
                    cursor = Some(pos);
                }
            }
        }
    }

    if let Some(pos) = cursor {
        frame.set_cursor_position(pos);
    }
}

/// Render one editor box and its output pane. Returns the cursor position
/// when the editor is focused and the cursor is on screen.
fn render_widget(frame: &mut Frame, widget: &Widget<TextArea>, area: Rect) -> Option<Position> {
    let editor = widget.editor();
    let options = editor.options();
    let focused = editor.is_focused();
    let editor_height = rows(editor.visible_height()).saturating_add(2).min(area.height);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(editor_height), Constraint::Min(0)])
        .split(area);

    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let title = format!(" [{}] {} ", widget.id() + 1, widget.info());

    let (cursor_row, _) = editor.cursor();
    let number_width = editor.lines().len().to_string().len();
    let mut gutter_width = if options.show_line_numbers {
        number_width + 1
    } else if options.show_gutter {
        1
    } else {
        0
    };
    if options.show_fold_widgets {
        gutter_width += 1;
    }

    let mut lines = Vec::new();
    for (i, text) in editor.visible_lines() {
        let mut spans = Vec::new();
        if options.show_line_numbers {
            spans.push(Span::styled(
                format!("{:>width$} ", i + 1, width = number_width),
                Style::default().fg(Color::DarkGray),
            ));
        } else if options.show_gutter {
            spans.push(Span::raw(" "));
        }
        if options.show_fold_widgets {
            // Marks lines that open a block.
            let marker = if text.trim_end().ends_with('{') { "▾" } else { " " };
            spans.push(Span::styled(marker, Style::default().fg(Color::DarkGray)));
        }
        spans.push(Span::raw(text.to_string()));

        let mut line = Line::from(spans);
        if focused && options.highlight_active_line && i == cursor_row {
            line = line.style(Style::default().bg(Color::Rgb(40, 40, 40)));
        }
        lines.push(line);
    }

    let block = Block::default().borders(Borders::ALL).border_style(border_style).title(title);
    frame.render_widget(Paragraph::new(Text::from(lines)).block(block), chunks[0]);

    let output = widget.output();
    if !output.text().is_empty() && chunks[1].height > 0 {
        let (style, title) = match output.state() {
            WidgetState::Error => (Style::default().fg(Color::Red), " error "),
            WidgetState::Idle => (Style::default().fg(Color::Green), " output "),
        };
        let paragraph = Paragraph::new(output.text().trim_end_matches('\n'))
            .style(style)
            .block(Block::default().borders(Borders::ALL).border_style(style).title(title));
        frame.render_widget(paragraph, chunks[1]);
    }

    if !focused {
        return None;
    }
    let row = rows(cursor_row.checked_sub(editor.scroll())?);
    let x = chunks[0].x.saturating_add(1).saturating_add(rows(gutter_width)).saturating_add(rows(editor.cursor_display_col()));
    let y = chunks[0].y.saturating_add(1).saturating_add(row);
    if y + 1 < chunks[0].bottom() && x + 1 < chunks[0].right() {
        Some(Position::new(x, y))
    } else {
        None
    }
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let position = match app.page.focused() {
        Some(id) => format!(" [{}/{}]", id + 1, app.page.len()),
        None => String::new(),
    };
    let status_text = format!("{} | {}{}", app.path.display(), app.status_message, position);
    let status_paragraph =
        Paragraph::new(status_text).style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(status_paragraph, area);
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame, app: &App) {
    let popup_area = centered_rect(60, 60, frame.area());
    frame.render_widget(Clear, popup_area);

    let run_key = app
        .page
        .widget(0)
        .and_then(|w| w.editor().commands().first().map(|c| c.binding.to_string()))
        .unwrap_or_else(|| "Ctrl-Enter".to_string());

    let help_lines = vec![
        Line::from(Span::styled("Keys", Style::default().add_modifier(Modifier::BOLD))),
        Line::from(""),
        Line::from(format!("  {run_key:<14} - Run the focused snippet")),
        Line::from("  Tab            - Next snippet"),
        Line::from("  Shift+Tab      - Previous snippet"),
        Line::from("  PgUp/PgDn      - Scroll the document"),
        Line::from("  F1             - Toggle this help"),
        Line::from("  Esc / Ctrl+C   - Quit"),
        Line::from(""),
        Line::from(format!("  Evaluator: {}", app.evaluator.name())),
    ];

    let help = Paragraph::new(help_lines)
        .block(Block::default().borders(Borders::ALL).title("Help"))
        .style(Style::default().fg(Color::White));
    frame.render_widget(help, popup_area);
}

/// Helper function to create a centered rect using up certain percentage of the available rect
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
