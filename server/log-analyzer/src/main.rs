//! Binary entrypoint: analyze logs, write one JSON line per input to stdout.
//!
//! Inputs are log files, job directories (`<n>_<step>.txt` files), or stdin
//! when neither is given. Output lines are either:
//! - A Run (always produced for readable input)
//! - An ErrorOutput (when an input cannot be read)
//!
//! Diagnostics go to stderr through tracing; stdout stays machine-readable.

use clap::Parser;
use log_analyzer::job;
use log_analyzer::types::ErrorOutput;
use log_analyzer::{analyze_all, AnalyzeError, Analyzer, Config, LogInput};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "log-analyzer", version, about = "Rule-based CI run-log analyzer")]
struct Cli {
  /// Log files to analyze. Reads stdin when no files or job directories are given.
  files: Vec<PathBuf>,

  /// Job directory holding one `<n>_<step name>.txt` file per step (repeatable).
  #[arg(long = "job-dir", value_name = "DIR")]
  job_dirs: Vec<PathBuf>,

  /// TOML file overriding marker syntax and rule tables.
  #[arg(long, value_name = "PATH")]
  config: Option<PathBuf>,

  /// Abandon a single log's analysis after this many milliseconds.
  #[arg(long, value_name = "MS")]
  timeout_ms: Option<u64>,

  /// Print rendered summaries instead of JSON lines.
  #[arg(long)]
  text: bool,
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  if let Err(e) = run_binary() {
    tracing::error!("log-analyzer: {}", e);
    std::process::exit(1);
  }
}

fn run_binary() -> Result<(), AnalyzeError> {
  let cli = Cli::parse();

  let mut config = match &cli.config {
    Some(path) => Config::load(path)?,
    None => Config::default(),
  };
  if cli.timeout_ms.is_some() {
    config.timeout_ms = cli.timeout_ms;
  }
  let analyzer = Analyzer::new(config)?;
  let markers = job::Markers::from_config(analyzer.config());

  let mut inputs: Vec<LogInput> = Vec::new();
  let mut failures: Vec<ErrorOutput> = Vec::new();

  for path in &cli.files {
    match std::fs::read(path) {
      Ok(bytes) => inputs.push(LogInput::new(
        Some(path.display().to_string()),
        String::from_utf8_lossy(&bytes).into_owned(),
      )),
      Err(e) => {
        tracing::warn!(path = %path.display(), error = %e, "cannot read log file");
        failures.push(ErrorOutput::new(format!("read: {}", e)).with_input(path.display().to_string()));
      }
    }
  }

  for dir in &cli.job_dirs {
    let name = dir
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| dir.display().to_string());
    match job::load(dir) {
      Ok(steps) if steps.is_empty() => {
        failures.push(ErrorOutput::new("no step logs found").with_input(dir.display().to_string()));
      }
      Ok(steps) => inputs.push(LogInput::new(Some(name), job::assemble(steps, &markers))),
      Err(e) => {
        tracing::warn!(dir = %dir.display(), error = %e, "cannot read job directory");
        failures.push(ErrorOutput::new(e.to_string()).with_input(dir.display().to_string()));
      }
    }
  }

  if cli.files.is_empty() && cli.job_dirs.is_empty() {
    let mut raw = Vec::new();
    io::stdin().lock().read_to_end(&mut raw)?;
    inputs.push(LogInput::new(None, String::from_utf8_lossy(&raw).into_owned()));
  }

  tracing::info!(inputs = inputs.len(), unreadable = failures.len(), "analyzing");
  let runs = analyze_all(&analyzer, &inputs);

  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());

  for failure in &failures {
    if cli.text {
      let input = failure.input.as_deref().unwrap_or("input");
      writeln!(out, "{}: {}\n", input, failure.message)?;
    } else {
      serde_json::to_writer(&mut out, failure)?;
      writeln!(out)?;
    }
  }

  for run in &runs {
    if cli.text {
      writeln!(out, "{}\n", run.summary)?;
    } else {
      serde_json::to_writer(&mut out, run)?;
      writeln!(out)?;
    }
  }

  out.flush()?;
  Ok(())
}
