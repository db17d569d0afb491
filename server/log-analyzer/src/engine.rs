//! Core engine: owns the compiled rules and runs the pipeline per log.
//!
//! raw text → tokens → structure → findings → status → root cause → summary.

use std::time::Instant;

use crate::budget::Budget;
use crate::config::{Config, Rules};
use crate::error::AnalyzeError;
use crate::metadata;
use crate::rank;
use crate::render;
use crate::signals;
use crate::status;
use crate::structure;
use crate::tokenize;
use crate::types::*;

/// The log analyzer. Holds no per-run state; shareable across threads.
#[derive(Debug, Clone)]
pub struct Analyzer {
  config: Config,
  rules: Rules,
}

impl Analyzer {
  pub fn new(config: Config) -> Result<Self, AnalyzeError> {
    let rules = Rules::compile(&config)?;
    Ok(Self { config, rules })
  }

  pub fn with_defaults() -> Self {
    Self {
      config: Config::default(),
      rules: Rules::default(),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Analyze one log. Always returns a run; cancellation yields a degraded one.
  pub fn analyze(&self, text: &str) -> Run {
    self.analyze_with(None, text, Budget::with_timeout(self.config.timeout()))
  }

  /// Analyze one job's log; the job name appears in the run and its summary.
  pub fn analyze_job(&self, job: &str, text: &str) -> Run {
    self.analyze_with(Some(job), text, Budget::with_timeout(self.config.timeout()))
  }

  /// Analyze with an explicit deadline instead of the configured timeout.
  pub fn analyze_until(&self, job: Option<&str>, text: &str, deadline: Instant) -> Run {
    self.analyze_with(job, text, Budget::until(deadline))
  }

  fn analyze_with(&self, job: Option<&str>, text: &str, budget: Budget) -> Run {
    let run_id = run_id(job, text);
    match self.pipeline(&run_id, job, text, &budget) {
      Ok(run) => {
        tracing::debug!(
          run_id = %run.run_id,
          status = %run.status,
          groups = run.counts.groups,
          steps = run.counts.steps,
          findings = run.counts.findings,
          "analyzed log"
        );
        run
      }
      Err(e) => {
        tracing::warn!(run_id = %run_id, error = %e, "analysis abandoned");
        degraded_run(run_id, job, &e)
      }
    }
  }

  fn pipeline(
    &self,
    run_id: &str,
    job: Option<&str>,
    text: &str,
    budget: &Budget,
  ) -> Result<Run, AnalyzeError> {
    let tokens = tokenize::tokenize(text, &self.rules, budget)?;
    if tokens.iter().all(Token::is_blank) {
      return Ok(empty_run(run_id.to_string(), job));
    }

    let structure::Structure {
      mut groups,
      mut steps,
      diagnostics,
    } = structure::build(&tokens, self.rules.max_group_depth, budget)?;

    signals::extract(&mut steps, &self.rules, budget)?;
    budget.check("status")?;
    let inference = status::infer(&mut groups, &mut steps);

    let root_cause = inference
      .primary
      .and_then(|id| steps.get(id.0))
      .map(|step| rank::select_root_cause(step, self.rules.context_lines));

    let metadata = metadata::extract(&tokens, &groups, &steps);
    let counts = RunCounts {
      groups: groups.iter().map(Group::count_groups).sum(),
      steps: steps.len(),
      findings: steps.iter().map(|s| s.findings.len()).sum::<usize>() + diagnostics.len(),
      diagnostics: diagnostics.len(),
    };

    let mut run = Run {
      run_id: run_id.to_string(),
      job: job.map(str::to_string),
      status: inference.status,
      primary_failing_step: inference.primary,
      failing_steps: inference.failing_steps,
      root_cause,
      summary: String::new(),
      diagnostics,
      metadata,
      counts,
      groups,
      steps,
    };
    run.summary = render::render(&run);
    Ok(run)
  }
}

/// Stable run id: hash of job name + input text.
pub fn run_id(job: Option<&str>, text: &str) -> String {
  let mut hasher = blake3::Hasher::new();
  hasher.update(job.unwrap_or_default().as_bytes());
  hasher.update(b"|");
  hasher.update(text.as_bytes());
  let hex = hasher.finalize().to_hex();
  format!("run-{}", &hex[..16])
}

fn empty_run(run_id: String, job: Option<&str>) -> Run {
  let mut run = Run {
    run_id,
    job: job.map(str::to_string),
    status: Status::Unknown,
    primary_failing_step: None,
    failing_steps: Vec::new(),
    root_cause: None,
    summary: String::new(),
    diagnostics: Vec::new(),
    metadata: RunMetadata::default(),
    counts: RunCounts::default(),
    groups: Vec::new(),
    steps: Vec::new(),
  };
  run.summary = render::render(&run);
  run
}

fn degraded_run(run_id: String, job: Option<&str>, error: &AnalyzeError) -> Run {
  let reason = error.to_string();
  Run {
    run_id,
    job: job.map(str::to_string),
    status: Status::Unknown,
    primary_failing_step: None,
    failing_steps: Vec::new(),
    root_cause: None,
    summary: render::render_aborted(job, &reason),
    diagnostics: vec![Finding::diagnostic(reason)],
    metadata: RunMetadata::default(),
    counts: RunCounts {
      findings: 1,
      diagnostics: 1,
      ..RunCounts::default()
    },
    groups: Vec::new(),
    steps: Vec::new(),
  }
}
