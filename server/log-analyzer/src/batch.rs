//! Analyze many independent logs in parallel. Runs share nothing but the
//! read-only analyzer; output order matches input order.

use rayon::prelude::*;

use crate::engine::Analyzer;
use crate::types::Run;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogInput {
  /// Job name reported in the run, if known.
  pub job: Option<String>,
  pub text: String,
}

impl LogInput {
  pub fn new(job: Option<String>, text: impl Into<String>) -> Self {
    Self {
      job,
      text: text.into(),
    }
  }
}

pub fn analyze_all(analyzer: &Analyzer, inputs: &[LogInput]) -> Vec<Run> {
  inputs
    .par_iter()
    .map(|input| match &input.job {
      Some(job) => analyzer.analyze_job(job, &input.text),
      None => analyzer.analyze(&input.text),
    })
    .collect()
}
