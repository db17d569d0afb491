//! Ground-truth facts of a run, and a deterministic check of how well any
//! produced summary (rule-based or model-written) covers them.

use serde::Serialize;

use crate::types::{Run, Status};

/// Words shorter than this are ignored when matching root-cause text.
const MIN_WORD_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunFacts {
  pub status: Status,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub failing_step: Option<String>,
  pub failing_steps: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub root_cause: Option<String>,
}

impl RunFacts {
  pub fn from_run(run: &Run) -> Self {
    Self {
      status: run.status,
      failing_step: run.primary_step_name().map(str::to_string),
      failing_steps: run.failing_step_names().into_iter().map(str::to_string).collect(),
      root_cause: run.root_cause.as_ref().map(|rc| rc.finding.text.clone()),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactCoverage {
  pub mentions_status: bool,
  /// `None` when the run has no failing step to mention.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mentions_failing_step: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub mentions_root_cause: Option<bool>,
  pub sentence_count: usize,
  /// 1 (nothing covered) to 5 (every applicable fact covered).
  pub score: u8,
}

/// Check `summary` against `facts`. Matching is case-insensitive.
pub fn coverage(facts: &RunFacts, summary: &str) -> FactCoverage {
  let lower = summary.to_lowercase();

  let mentions_status = status_words(facts.status).iter().any(|w| lower.contains(w));
  let mentions_failing_step = facts
    .failing_step
    .as_ref()
    .map(|name| lower.contains(&name.to_lowercase()));
  let mentions_root_cause = facts
    .root_cause
    .as_ref()
    .map(|text| covers_words(&lower, text));

  let checks: Vec<bool> = std::iter::once(mentions_status)
    .chain(mentions_failing_step)
    .chain(mentions_root_cause)
    .collect();
  let covered = checks.iter().filter(|c| **c).count();
  let score = 1 + ((4 * covered) as f64 / checks.len() as f64).round() as u8;

  FactCoverage {
    mentions_status,
    mentions_failing_step,
    mentions_root_cause,
    sentence_count: sentence_count(summary),
    score,
  }
}

/// Rough sentence count using `.`, `!`, `?` as delimiters.
pub fn sentence_count(text: &str) -> usize {
  text
    .split(['.', '!', '?'])
    .filter(|s| !s.trim().is_empty())
    .count()
}

fn status_words(status: Status) -> &'static [&'static str] {
  match status {
    Status::Failed => &["fail"],
    Status::Passed => &["pass", "succeed", "success"],
    Status::Unknown => &["unknown", "unclear", "ambiguous"],
  }
}

/// At least half of the significant words of `text` appear in `haystack`.
fn covers_words(haystack: &str, text: &str) -> bool {
  let words: Vec<String> = text
    .split(|c: char| !c.is_alphanumeric())
    .filter(|w| w.chars().count() >= MIN_WORD_LEN)
    .map(str::to_lowercase)
    .collect();
  if words.is_empty() {
    return haystack.contains(&text.trim().to_lowercase());
  }
  let hits = words.iter().filter(|w| haystack.contains(w.as_str())).count();
  hits * 2 >= words.len()
}
