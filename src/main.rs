use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use psil::corpus::{self, CorpusReport};
use psil::parser::strip_shebang;
use psil::{read, EvalConfig, HostValue, Interpreter, Namespace, DEFAULT_MAX_DEPTH};

const HISTORY_FILE: &str = ".psil-history";

#[derive(Parser)]
#[command(name = "psil")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Psil, an embeddable S-expression Lisp", long_about = None)]
struct Cli {
    /// Script to run; starts the REPL when omitted
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Arguments exposed to the script as the list `argv`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Run a regression corpus (the bundled one when no FILE is given)
    #[arg(long)]
    test: bool,

    /// Maximum nesting of non-tail evaluations
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "psil=debug" } else { "psil=warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = EvalConfig {
        max_depth: cli.max_depth,
        ..EvalConfig::default()
    };

    let outcome = if cli.test {
        run_corpus(cli.script.as_deref(), config)
    } else if let Some(script) = &cli.script {
        run_script(script, &cli.args, config)
    } else {
        repl(config).map(|()| true)
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run_script(path: &Path, args: &[String], config: EvalConfig) -> Result<bool> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let source = strip_shebang(&source);

    let namespace = Namespace::new();
    namespace.set(
        "argv",
        args.iter().cloned().map(HostValue::from).collect::<Vec<_>>(),
    );
    let mut interp = Interpreter::with_namespace_and_config(namespace, config);

    tracing::info!(script = %path.display(), "running script");
    match interp.eval_str(source) {
        Ok(_) => Ok(true),
        Err(err) => {
            eprintln!("{}: {}", path.display(), err);
            Ok(false)
        }
    }
}

fn run_corpus(path: Option<&Path>, config: EvalConfig) -> Result<bool> {
    let mut interp = Interpreter::with_config(config);
    let report = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            corpus::run_corpus_with(&mut interp, &text)
        }
        None => corpus::run_corpus_with(&mut interp, corpus::BUNDLED),
    };
    print_report(&report);
    Ok(report.is_success())
}

fn print_report(report: &CorpusReport) {
    for failure in &report.failures {
        println!("FAIL line {}: {}", failure.example.line, failure.example.source);
        println!("  expected: {}", failure.example.expected);
        println!("  actual:   {}", failure.actual);
    }
    println!("{}/{} examples passed", report.passed, report.total());
}

fn repl(config: EvalConfig) -> Result<()> {
    let mut rl = DefaultEditor::new().context("failed to start line editor")?;
    if rl.load_history(HISTORY_FILE).is_err() {
        tracing::debug!("no history file");
    }

    println!("Psil v{} - (quit) or Ctrl-D to exit", psil::VERSION);
    let mut interp = Interpreter::with_config(config);
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "psil> " } else { "....> " };
        match rl.readline(prompt) {
            Ok(line) => {
                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(&line);

                let forms = match read(&buffer) {
                    Ok(forms) => forms,
                    Err(err) if err.is_incomplete() => continue,
                    Err(err) => {
                        println!("error: {}", err);
                        buffer.clear();
                        continue;
                    }
                };

                if forms.is_empty() {
                    buffer.clear();
                    continue;
                }
                if let Err(err) = rl.add_history_entry(buffer.as_str()) {
                    tracing::debug!(%err, "failed to add history entry");
                }
                buffer.clear();

                for form in forms {
                    if is_quit(&form) {
                        return save_history(&mut rl);
                    }
                    match interp.eval_form(&form) {
                        Ok(value) => println!("{}", value),
                        Err(err) => {
                            println!("error: {}", err);
                            break;
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => buffer.clear(),
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err).context("failed to read line"),
        }
    }

    save_history(&mut rl)
}

fn is_quit(form: &psil::Value) -> bool {
    form.list_items()
        .map_or(false, |items| items.len() == 1 && items[0].as_symbol() == Some("quit"))
}

fn save_history(rl: &mut DefaultEditor) -> Result<()> {
    if let Err(err) = rl.save_history(HISTORY_FILE) {
        tracing::debug!(%err, "failed to save history");
    }
    Ok(())
}
