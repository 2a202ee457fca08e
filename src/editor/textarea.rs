//! Multi-line text area for the terminal UI.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::{Command, CursorPlacement, Editor, EditorAction, EditorOptions};
use crate::utils::unicode::{char_to_byte_index, display_width};

const INDENT: &str = "  ";

#[derive(Debug, Clone)]
pub struct TextArea {
    lines: Vec<String>,
    /// Cursor row.
    row: usize,
    /// Cursor column, in characters.
    col: usize,
    /// First visible row.
    scroll: usize,
    options: EditorOptions,
    commands: Vec<Command>,
    focused: bool,
}

impl Default for TextArea {
    fn default() -> Self {
        Self::new()
    }
}

impl TextArea {
    pub fn new() -> Self {
        Self {
            lines: vec![String::new()],
            row: 0,
            col: 0,
            scroll: 0,
            options: EditorOptions::default(),
            commands: Vec::new(),
            focused: false,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Cursor as (row, column in characters).
    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// Cursor column in terminal cells.
    pub fn cursor_display_col(&self) -> usize {
        display_width(&self.lines[self.row], self.col)
    }

    /// Number of rows the editor occupies: its content, capped at
    /// `max_lines`.
    pub fn visible_height(&self) -> usize {
        self.lines.len().clamp(1, self.options.max_lines.max(1))
    }

    /// Rows currently in view with their line indices.
    pub fn visible_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .skip(self.scroll)
            .take(self.visible_height())
            .map(|(i, line)| (i, line.as_str()))
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    fn line_chars(&self) -> usize {
        self.lines[self.row].chars().count()
    }

    fn byte_col(&self) -> usize {
        char_to_byte_index(&self.lines[self.row], self.col)
    }

    fn clamp_col(&mut self) {
        self.col = self.col.min(self.line_chars());
    }

    fn follow_cursor(&mut self) {
        let height = self.visible_height();
        if self.row < self.scroll {
            self.scroll = self.row;
        } else if self.row >= self.scroll + height {
            self.scroll = self.row + 1 - height;
        }
    }

    pub fn insert_str(&mut self, text: &str) {
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                self.newline();
            }
            for c in part.chars().filter(|c| *c != '\r') {
                self.insert_char(c);
            }
        }
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_col();
        self.lines[self.row].insert(at, c);
        self.col += 1;
    }

    pub fn newline(&mut self) {
        let at = self.byte_col();
        let rest = self.lines[self.row].split_off(at);
        self.row += 1;
        self.lines.insert(self.row, rest);
        self.col = 0;
    }

    pub fn backspace(&mut self) -> bool {
        if self.col > 0 {
            self.col -= 1;
            let at = self.byte_col();
            self.lines[self.row].remove(at);
            true
        } else if self.row > 0 {
            let current = self.lines.remove(self.row);
            self.row -= 1;
            self.col = self.line_chars();
            self.lines[self.row].push_str(&current);
            true
        } else {
            false
        }
    }

    pub fn delete(&mut self) -> bool {
        if self.col < self.line_chars() {
            let at = self.byte_col();
            self.lines[self.row].remove(at);
            true
        } else if self.row + 1 < self.lines.len() {
            let next = self.lines.remove(self.row + 1);
            self.lines[self.row].push_str(&next);
            true
        } else {
            false
        }
    }

    fn move_cursor(&mut self, code: KeyCode) -> bool {
        let before = (self.row, self.col);
        match code {
            KeyCode::Left if self.col > 0 => self.col -= 1,
            KeyCode::Left if self.row > 0 => {
                self.row -= 1;
                self.col = self.line_chars();
            }
            KeyCode::Right if self.col < self.line_chars() => self.col += 1,
            KeyCode::Right if self.row + 1 < self.lines.len() => {
                self.row += 1;
                self.col = 0;
            }
            KeyCode::Up if self.row > 0 => {
                self.row -= 1;
                self.clamp_col();
            }
            KeyCode::Down if self.row + 1 < self.lines.len() => {
                self.row += 1;
                self.clamp_col();
            }
            KeyCode::Home => self.col = 0,
            KeyCode::End => self.col = self.line_chars(),
            _ => {}
        }
        before != (self.row, self.col)
    }
}

impl Editor for TextArea {
    fn set_value(&mut self, text: &str, cursor: CursorPlacement) {
        self.lines = text.lines().map(str::to_string).collect();
        if text.ends_with('\n') || self.lines.is_empty() {
            self.lines.push(String::new());
        }
        match cursor {
            CursorPlacement::Start => {
                self.row = 0;
                self.col = 0;
            }
            CursorPlacement::End => {
                self.row = self.lines.len() - 1;
                self.col = self.line_chars();
            }
        }
        self.scroll = 0;
        self.follow_cursor();
    }

    fn value(&self) -> String {
        self.lines.join("\n")
    }

    fn set_options(&mut self, options: EditorOptions) {
        self.options = options;
        self.follow_cursor();
    }

    fn options(&self) -> &EditorOptions {
        &self.options
    }

    fn add_command(&mut self, command: Command) {
        self.commands.retain(|c| c.name != command.name);
        self.commands.push(command);
    }

    fn commands(&self) -> &[Command] {
        &self.commands
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn blur(&mut self) {
        self.focused = false;
    }

    fn is_focused(&self) -> bool {
        self.focused
    }

    fn handle_key(&mut self, key: &KeyEvent) -> EditorAction {
        if key.kind == KeyEventKind::Release {
            return EditorAction::Ignored;
        }
        if let Some(command) = self.commands.iter().find(|c| c.binding.matches(key)) {
            return EditorAction::Command(command.name.clone());
        }

        let control = key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER);
        let action = match key.code {
            KeyCode::Char(c) if !control => {
                self.insert_char(c);
                EditorAction::Edited
            }
            KeyCode::Enter if !control => {
                self.newline();
                EditorAction::Edited
            }
            KeyCode::Tab if !control => {
                self.insert_str(INDENT);
                EditorAction::Edited
            }
            KeyCode::Backspace if self.backspace() => EditorAction::Edited,
            KeyCode::Delete if self.delete() => EditorAction::Edited,
            code @ (KeyCode::Left | KeyCode::Right | KeyCode::Up | KeyCode::Down | KeyCode::Home | KeyCode::End)
                if self.move_cursor(code) =>
            {
                EditorAction::Moved
            }
            _ => EditorAction::Ignored,
        };
        self.follow_cursor();
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::KeyBinding;

    fn press(area: &mut TextArea, code: KeyCode) -> EditorAction {
        area.handle_key(&KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(area: &mut TextArea, text: &str) {
        for c in text.chars() {
            press(area, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_set_value_places_cursor() {
        let mut area = TextArea::new();
        area.set_value("a\nbc", CursorPlacement::Start);
        assert_eq!(area.cursor(), (0, 0));
        area.set_value("a\nbc", CursorPlacement::End);
        assert_eq!(area.cursor(), (1, 2));
        assert_eq!(area.value(), "a\nbc");
        area.set_value("", CursorPlacement::Start);
        assert_eq!(area.lines(), &[String::new()]);
    }

    #[test]
    fn test_typing_and_newlines() {
        let mut area = TextArea::new();
        type_str(&mut area, "return 1");
        press(&mut area, KeyCode::Home);
        press(&mut area, KeyCode::Enter);
        press(&mut area, KeyCode::Up);
        type_str(&mut area, "// é");
        assert_eq!(area.value(), "// é\nreturn 1");
        assert_eq!(area.cursor(), (0, 4));
    }

    #[test]
    fn test_backspace_joins_lines() {
        let mut area = TextArea::new();
        area.set_value("ab\ncd", CursorPlacement::Start);
        press(&mut area, KeyCode::Down);
        assert_eq!(press(&mut area, KeyCode::Backspace), EditorAction::Edited);
        assert_eq!(area.value(), "abcd");
        assert_eq!(area.cursor(), (0, 2));
        press(&mut area, KeyCode::Home);
        assert_eq!(press(&mut area, KeyCode::Backspace), EditorAction::Ignored);
        assert_eq!(press(&mut area, KeyCode::Delete), EditorAction::Edited);
        assert_eq!(area.value(), "bcd");
    }

    #[test]
    fn test_vertical_movement_clamps_column() {
        let mut area = TextArea::new();
        area.set_value("long line\nab", CursorPlacement::Start);
        press(&mut area, KeyCode::End);
        assert_eq!(press(&mut area, KeyCode::Down), EditorAction::Moved);
        assert_eq!(area.cursor(), (1, 2));
        assert_eq!(press(&mut area, KeyCode::Down), EditorAction::Ignored);
    }

    #[test]
    fn test_commands_take_precedence() {
        let mut area = TextArea::new();
        area.add_command(Command::new("run", "Ctrl-Enter".parse::<KeyBinding>().unwrap()));
        area.add_command(Command::new("run", "F5".parse::<KeyBinding>().unwrap()));
        assert_eq!(area.commands().len(), 1);
        let action = area.handle_key(&KeyEvent::new(KeyCode::F(5), KeyModifiers::NONE));
        assert_eq!(action, EditorAction::Command("run".to_string()));
        assert_eq!(area.value(), "");
        // Unbound control chords do not insert text.
        let action = area.handle_key(&KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL));
        assert_eq!(action, EditorAction::Ignored);
    }

    #[test]
    fn test_scroll_follows_cursor() {
        let mut area = TextArea::new();
        area.set_options(EditorOptions { max_lines: 3, ..EditorOptions::default() });
        area.set_value("1\n2\n3\n4\n5", CursorPlacement::Start);
        assert_eq!(area.visible_height(), 3);
        for _ in 0..4 {
            press(&mut area, KeyCode::Down);
        }
        assert_eq!(area.scroll(), 2);
        let rows: Vec<usize> = area.visible_lines().map(|(i, _)| i).collect();
        assert_eq!(rows, vec![2, 3, 4]);
    }
}
