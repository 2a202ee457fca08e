//! Diagnostic channel setup.
//!
//! Interactive mode owns the terminal, so diagnostics go to a log file there.
//! Batch mode writes them to stderr next to the printed document.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

pub enum Sink<'a> {
    Stderr,
    File(&'a Path),
}

/// Default filter directive for a `-v` count. `RUST_LOG` wins when set.
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn,interact::console=info",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn filter(verbose: u8) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_directive(verbose)).context("invalid log filter"),
    }
}

pub fn init(sink: Sink<'_>, verbose: u8) -> Result<()> {
    let filter = filter(verbose)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match sink {
        Sink::Stderr => builder
            .with_writer(std::io::stderr)
            .without_time()
            .with_target(false)
            .try_init(),
        Sink::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory '{}'", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file '{}'", path.display()))?;
            builder.with_writer(Mutex::new(file)).with_ansi(false).try_init()
        }
    }
    .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_parses() {
        for v in 0..4 {
            assert!(EnvFilter::try_new(default_directive(v)).is_ok());
        }
        assert_eq!(default_directive(9), "trace");
    }
}
