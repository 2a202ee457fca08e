use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::eval::EvaluatorKind;

#[derive(Parser, Debug, Clone)]
#[command(name = "interact", about = "Run the code snippets of a Markdown document in place", version)]
pub struct Cli {
    /// Markdown document to open.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Fence info word that marks runnable snippets, or "*" for every fenced block.
    #[arg(long)]
    pub selector: Option<String>,

    /// Run every snippet once, in order, and print the document with outputs.
    ///
    /// This is also the behavior when stdout is not a terminal.
    #[arg(long = "run-all")]
    pub run_all: bool,

    /// Print a JSON report of every snippet instead of the document; implies --run-all.
    #[arg(long)]
    pub json: bool,

    /// Evaluator used to run snippets.
    #[arg(long, value_enum)]
    pub evaluator: Option<EvaluatorKind>,

    /// Interpreter command for the process evaluator (e.g. "node" or "deno run").
    #[arg(long)]
    pub interpreter: Option<String>,

    /// Maximum visible lines per editor before it scrolls.
    #[arg(long = "max-lines")]
    pub max_lines: Option<usize>,

    /// Key that runs the focused snippet (e.g. "Ctrl-Enter", "Alt-R", "F5").
    #[arg(long = "run-key")]
    pub run_key: Option<String>,

    /// Evaluation step budget for the built-in evaluator; 0 disables it.
    #[arg(long = "step-limit")]
    pub step_limit: Option<u64>,

    /// Where diagnostics go in interactive mode.
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// More diagnostics; repeat for more (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = <Cli as Parser>::try_parse_from([
            "interact",
            "doc.md",
            "--selector",
            "js",
            "--evaluator",
            "process",
            "--run-key",
            "F5",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.file, PathBuf::from("doc.md"));
        assert_eq!(cli.selector.as_deref(), Some("js"));
        assert_eq!(cli.evaluator, Some(EvaluatorKind::Process));
        assert_eq!(cli.run_key.as_deref(), Some("F5"));
        assert_eq!(cli.verbose, 2);
        assert!(!cli.run_all);
    }

    #[test]
    fn test_file_is_required() {
        assert!(<Cli as Parser>::try_parse_from(["interact"]).is_err());
    }
}
