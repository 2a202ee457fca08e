use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use directories::BaseDirs;

use crate::cli::Cli;
use crate::document::Selector;
use crate::editor::{EditorOptions, KeyBinding};
use crate::eval::EvaluatorKind;
use crate::widget::WidgetSettings;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    /// Defaults, overlaid by `.interactrc`, overlaid by the environment.
    pub fn load() -> Self {
        Self::load_from(&default_config_path())
    }

    pub fn load_from(config_path: &Path) -> Self {
        let mut map = default_map();

        if config_path.exists() {
            if let Ok(file) = fs::File::open(config_path) {
                let reader = BufReader::new(file);
                for line in reader.lines().map_while(Result::ok) {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    if let Some((k, v)) = line.split_once('=') {
                        map.insert(k.trim().to_string(), v.trim().to_string());
                    }
                }
            }
        }

        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path: config_path.to_path_buf() }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.inner.insert(key.to_string(), value.into());
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse::<usize>().ok())
    }

    pub fn selector(&self) -> String {
        self.get("INTERACT_SELECTOR").unwrap_or_else(|| "interact".to_string())
    }

    pub fn editor_options(&self) -> EditorOptions {
        let defaults = EditorOptions::default();
        EditorOptions {
            max_lines: self.get_usize("MAX_LINES").unwrap_or(defaults.max_lines),
            highlight_active_line: self.get_bool("HIGHLIGHT_ACTIVE_LINE"),
            show_fold_widgets: self.get_bool("SHOW_FOLD_WIDGETS"),
            show_line_numbers: self.get_bool("SHOW_LINE_NUMBERS"),
            show_gutter: self.get_bool("SHOW_GUTTER"),
        }
    }

    pub fn run_key(&self) -> Result<KeyBinding> {
        let raw = self.get("RUN_KEY").unwrap_or_else(|| "Ctrl-Enter".to_string());
        raw.parse().with_context(|| format!("invalid RUN_KEY in {}", self.config_path.display()))
    }

    pub fn widget_settings(&self) -> Result<WidgetSettings> {
        Ok(WidgetSettings { options: self.editor_options(), run_key: self.run_key()? })
    }

    pub fn evaluator(&self) -> Result<EvaluatorKind> {
        self.get("EVALUATOR")
            .unwrap_or_else(|| "script".to_string())
            .parse()
            .with_context(|| format!("invalid EVALUATOR in {}", self.config_path.display()))
    }

    pub fn interpreter(&self) -> String {
        self.get("INTERPRETER").unwrap_or_else(|| "node".to_string())
    }

    pub fn step_limit(&self) -> u64 {
        self.get("STEP_LIMIT")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(crate::eval::script::DEFAULT_STEP_LIMIT)
    }

    pub fn log_file(&self) -> PathBuf {
        self.get("LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("interact").join("interact.log"))
    }
}

/// Effective settings: CLI flags override config, config overrides defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub selector: Selector,
    pub widget: WidgetSettings,
    pub evaluator: EvaluatorKind,
    pub interpreter: String,
    pub step_limit: u64,
    pub log_file: PathBuf,
}

impl Settings {
    pub fn resolve(cli: &Cli, cfg: &Config) -> Result<Self> {
        let selector = cli.selector.clone().unwrap_or_else(|| cfg.selector());
        let selector: Selector = selector.parse()?;

        let mut options = cfg.editor_options();
        if let Some(n) = cli.max_lines {
            options.max_lines = n;
        }
        let run_key = match cli.run_key.as_deref() {
            Some(raw) => raw.parse().context("invalid --run-key")?,
            None => cfg.run_key()?,
        };

        let evaluator = match cli.evaluator {
            Some(kind) => kind,
            None => cfg.evaluator()?,
        };

        Ok(Self {
            selector,
            widget: WidgetSettings { options, run_key },
            evaluator,
            interpreter: cli.interpreter.clone().unwrap_or_else(|| cfg.interpreter()),
            step_limit: cli.step_limit.unwrap_or_else(|| cfg.step_limit()),
            log_file: cli.log_file.clone().unwrap_or_else(|| cfg.log_file()),
        })
    }
}

fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &[
        "MAX_LINES",
        "HIGHLIGHT_ACTIVE_LINE",
        "SHOW_FOLD_WIDGETS",
        "SHOW_LINE_NUMBERS",
        "SHOW_GUTTER",
        "RUN_KEY",
        "EVALUATOR",
        "INTERPRETER",
        "STEP_LIMIT",
        "LOG_FILE",
    ];

    KEYS.contains(&k) || k.starts_with("INTERACT_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("interact").join(".interactrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    // Strings
    m.insert("INTERACT_SELECTOR".into(), "interact".into());
    m.insert("RUN_KEY".into(), "Ctrl-Enter".into());
    m.insert("EVALUATOR".into(), "script".into());
    m.insert("INTERPRETER".into(), "node".into());
    m.insert(
        "LOG_FILE".into(),
        env::temp_dir().join("interact").join("interact.log").to_string_lossy().into_owned(),
    );

    // Numbers
    m.insert("MAX_LINES".into(), "20".into());
    m.insert("STEP_LIMIT".into(), crate::eval::script::DEFAULT_STEP_LIMIT.to_string());

    // Bools as strings
    m.insert("HIGHLIGHT_ACTIVE_LINE".into(), "false".into());
    m.insert("SHOW_FOLD_WIDGETS".into(), "false".into());
    m.insert("SHOW_LINE_NUMBERS".into(), "false".into());
    m.insert("SHOW_GUTTER".into(), "true".into());

    m
}
