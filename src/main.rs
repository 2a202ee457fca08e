use std::io;
use std::process::ExitCode;

use anyhow::Result;
use is_terminal::IsTerminal;
use tracing::{info, warn};

use interact::cli::Cli;
use interact::config::{Config, Settings};
use interact::editor::TextArea;
use interact::logging::{self, Sink};
use interact::printer::{self, TextPrinter};
use interact::{document, eval, tui, widget};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    // CLI overrides config; config overrides defaults
    let cfg = Config::load();
    let settings = Settings::resolve(&args, &cfg)?;

    let stdout_is_tty = io::stdout().is_terminal();
    let batch = args.run_all || args.json || !stdout_is_tty;
    if batch {
        logging::init(Sink::Stderr, args.verbose)?;
    } else {
        logging::init(Sink::File(&settings.log_file), args.verbose)?;
    }

    let source = document::load(&args.file)?;
    let evaluator = eval::build(settings.evaluator, &settings.interpreter, settings.step_limit);
    let mut page = widget::enable_interact_for_all(&source, &settings.selector, &settings.widget, TextArea::new);
    if page.is_empty() {
        warn!(selector = %settings.selector, file = %args.file.display(), "no runnable snippets found");
    }

    if !batch {
        tui::run_tui(args.file.clone(), page, evaluator).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let outcomes = page.run_all(evaluator.as_ref());
    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    if args.json {
        println!("{}", printer::render_json(&page)?);
    } else {
        TextPrinter { color: stdout_is_tty }.print(&page);
    }
    info!(snippets = outcomes.len(), failed, "batch run finished");

    Ok(if failed > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}
