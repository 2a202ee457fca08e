//! Editing surface for a widget.
//!
//! Widgets only talk to the [`Editor`] trait: set and read the text, apply
//! display options, register key-bound commands, and take or drop focus.
//! [`TextArea`] is the terminal implementation.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, bail};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

mod textarea;

pub use textarea::TextArea;

/// Display options applied to an editor at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorOptions {
    /// The editor grows with its content up to this many visible lines.
    pub max_lines: usize,
    pub highlight_active_line: bool,
    pub show_fold_widgets: bool,
    pub show_line_numbers: bool,
    pub show_gutter: bool,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            max_lines: 20,
            highlight_active_line: false,
            show_fold_widgets: false,
            show_line_numbers: false,
            show_gutter: true,
        }
    }
}

/// Where the cursor lands after [`Editor::set_value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorPlacement {
    Start,
    End,
}

/// A key combination such as `Ctrl-Enter` or `F5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    pub fn matches(&self, key: &KeyEvent) -> bool {
        if key.kind == KeyEventKind::Release {
            return false;
        }
        let relevant = KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER;
        let code_matches = match (self.code, key.code) {
            (KeyCode::Char(a), KeyCode::Char(b)) => a.eq_ignore_ascii_case(&b),
            (a, b) => a == b,
        };
        code_matches
            && key.modifiers & relevant == self.modifiers & relevant
            && (!self.modifiers.contains(KeyModifiers::SHIFT) || key.modifiers.contains(KeyModifiers::SHIFT))
    }
}

impl FromStr for KeyBinding {
    type Err = anyhow::Error;

    /// Parses `Ctrl-Enter`, `Ctrl+Shift+R`, `Alt-r`, `F5`.
    fn from_str(s: &str) -> anyhow::Result<Self> {
        let parts: Vec<&str> = s.split(['-', '+']).map(str::trim).filter(|p| !p.is_empty()).collect();
        let Some((key, mods)) = parts.split_last() else {
            bail!("empty key binding");
        };

        let mut modifiers = KeyModifiers::NONE;
        for m in mods {
            modifiers |= match m.to_ascii_lowercase().as_str() {
                "ctrl" | "control" | "c" => KeyModifiers::CONTROL,
                "alt" | "option" | "opt" | "m" => KeyModifiers::ALT,
                "shift" | "s" => KeyModifiers::SHIFT,
                "cmd" | "super" | "meta" => KeyModifiers::SUPER,
                other => bail!("unknown modifier '{other}' in key binding '{s}'"),
            };
        }

        let lower = key.to_ascii_lowercase();
        let code = match lower.as_str() {
            "enter" | "return" => KeyCode::Enter,
            "tab" => KeyCode::Tab,
            "space" => KeyCode::Char(' '),
            "esc" | "escape" => KeyCode::Esc,
            "backspace" => KeyCode::Backspace,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            f if f.len() > 1 && f.starts_with('f') => {
                let n = f[1..].parse::<u8>().map_err(|_| anyhow!("unknown key '{key}' in key binding '{s}'"))?;
                KeyCode::F(n)
            }
            _ => {
                let mut chars = lower.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => KeyCode::Char(c),
                    _ => bail!("unknown key '{key}' in key binding '{s}'"),
                }
            }
        };
        Ok(Self { code, modifiers })
    }
}

impl fmt::Display for KeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [
            (KeyModifiers::CONTROL, "Ctrl"),
            (KeyModifiers::ALT, "Alt"),
            (KeyModifiers::SHIFT, "Shift"),
            (KeyModifiers::SUPER, "Cmd"),
        ] {
            if self.modifiers.contains(flag) {
                write!(f, "{name}-")?;
            }
        }
        match self.code {
            KeyCode::Enter => f.write_str("Enter"),
            KeyCode::Tab => f.write_str("Tab"),
            KeyCode::Esc => f.write_str("Esc"),
            KeyCode::Backspace => f.write_str("Backspace"),
            KeyCode::Up => f.write_str("Up"),
            KeyCode::Down => f.write_str("Down"),
            KeyCode::Left => f.write_str("Left"),
            KeyCode::Right => f.write_str("Right"),
            KeyCode::Char(' ') => f.write_str("Space"),
            KeyCode::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            KeyCode::F(n) => write!(f, "F{n}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// A named, key-bound editor command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub binding: KeyBinding,
}

impl Command {
    pub fn new(name: impl Into<String>, binding: KeyBinding) -> Self {
        Self { name: name.into(), binding }
    }
}

/// What an editor did with a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    /// The key triggered the named command.
    Command(String),
    /// The text changed.
    Edited,
    /// Only the cursor moved.
    Moved,
    Ignored,
}

pub trait Editor {
    fn set_value(&mut self, text: &str, cursor: CursorPlacement);

    fn value(&self) -> String;

    fn set_options(&mut self, options: EditorOptions);

    fn options(&self) -> &EditorOptions;

    fn add_command(&mut self, command: Command);

    fn commands(&self) -> &[Command];

    fn focus(&mut self);

    fn blur(&mut self);

    fn is_focused(&self) -> bool;

    /// Feed a key press. Registered commands take precedence over editing.
    fn handle_key(&mut self, key: &KeyEvent) -> EditorAction;
}
