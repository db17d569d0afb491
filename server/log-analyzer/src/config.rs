//! Analyzer configuration with sane defaults, and its compiled form.
//!
//! The marker syntax and keyword table are plain data so a deployment can
//! retarget another CI convention from a TOML file without code changes.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use crate::error::AnalyzeError;
use crate::types::PatternKind;

pub const DEFAULT_EXIT_CODE_PATTERN: &str =
  r"(?i)(?:process completed with exit code|exit(?:ed)?(?: with)? (?:code|status))[:=]?\s*(-?\d+)\.?\s*$";

pub const DEFAULT_BENIGN_PATTERN: &str =
  r"(?i)\b(?:0|no) (?:failed|failures?|errors?|warnings?)\b|\b(?:failed|failures?|errors?|warnings?)[:=] ?0\b";

static DEFAULT_EXIT_CODE_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(DEFAULT_EXIT_CODE_PATTERN).unwrap());

static DEFAULT_BENIGN_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(DEFAULT_BENIGN_PATTERN).unwrap());

/// One row of the keyword table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
  pub kind: PatternKind,
  /// Case-insensitive substrings; the earliest occurrence in a line is reported.
  pub needles: Vec<String>,
}

impl PatternRule {
  pub fn default_for(kind: PatternKind) -> Self {
    Self {
      kind,
      needles: kind.default_needles().iter().map(|n| n.to_string()).collect(),
    }
  }
}

/// Tunable marker syntax, rule tables, and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Line prefixes that open a group; the rest of the line is the group name.
  pub group_open_prefixes: Vec<String>,
  pub group_close_prefixes: Vec<String>,
  /// Line prefixes that start a step; the rest of the line is the step name.
  pub step_prefixes: Vec<String>,
  /// Regex whose first capture group is the exit code.
  pub exit_code_pattern: String,
  /// Spans matching this regex are masked before keyword matching.
  pub benign_pattern: Option<String>,
  /// Keyword table in match order. First matching kind per line wins.
  pub patterns: Vec<PatternRule>,
  /// Lines of supporting context carried with the root cause.
  pub root_cause_context_lines: usize,
  /// Group opens nested deeper than this are flattened into their parent.
  pub max_group_depth: usize,
  /// Per-log analysis deadline. `None` disables cancellation.
  pub timeout_ms: Option<u64>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      group_open_prefixes: vec!["##[group]".into(), "::group::".into()],
      group_close_prefixes: vec!["##[endgroup]".into(), "::endgroup::".into()],
      step_prefixes: vec!["##[step]".into()],
      exit_code_pattern: DEFAULT_EXIT_CODE_PATTERN.into(),
      benign_pattern: Some(DEFAULT_BENIGN_PATTERN.into()),
      patterns: PatternKind::KEYWORD_TABLE
        .iter()
        .map(|k| PatternRule::default_for(*k))
        .collect(),
      root_cause_context_lines: 5,
      max_group_depth: 64,
      timeout_ms: None,
    }
  }
}

impl Config {
  /// Parse a (possibly partial) TOML document; missing keys keep their defaults.
  pub fn from_toml_str(s: &str) -> Result<Self, AnalyzeError> {
    Ok(toml::from_str(s)?)
  }

  pub fn load(path: &Path) -> Result<Self, AnalyzeError> {
    let contents = std::fs::read_to_string(path)?;
    Self::from_toml_str(&contents)
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout_ms.map(Duration::from_millis)
  }
}

/// Validated, compiled form of a [`Config`], shared read-only across runs.
#[derive(Debug, Clone)]
pub struct Rules {
  pub group_open: Vec<String>,
  pub group_close: Vec<String>,
  pub step: Vec<String>,
  pub exit_code: Regex,
  pub benign: Option<Regex>,
  /// (kind, lowercase needles) in match order.
  pub patterns: Vec<(PatternKind, Vec<String>)>,
  pub context_lines: usize,
  pub max_group_depth: usize,
}

impl Rules {
  pub fn compile(config: &Config) -> Result<Self, AnalyzeError> {
    let group_open = non_empty_prefixes("group_open_prefixes", &config.group_open_prefixes)?;
    let group_close = non_empty_prefixes("group_close_prefixes", &config.group_close_prefixes)?;
    let step = non_empty_prefixes("step_prefixes", &config.step_prefixes)?;

    let exit_code = Regex::new(&config.exit_code_pattern)
      .map_err(|e| AnalyzeError::pattern("exit_code_pattern", e))?;
    if exit_code.captures_len() < 2 {
      return Err(AnalyzeError::config(
        "exit_code_pattern",
        "must contain a capture group for the code",
      ));
    }

    let benign = match &config.benign_pattern {
      Some(p) => Some(Regex::new(p).map_err(|e| AnalyzeError::pattern("benign_pattern", e))?),
      None => None,
    };

    let mut patterns = Vec::with_capacity(config.patterns.len());
    for rule in &config.patterns {
      if !rule.kind.is_keyword() {
        return Err(AnalyzeError::config(
          "patterns",
          &format!("kind '{}' cannot be matched against lines", rule.kind),
        ));
      }
      let needles: Vec<String> = rule
        .needles
        .iter()
        .map(|n| n.to_ascii_lowercase())
        .filter(|n| !n.trim().is_empty())
        .collect();
      if needles.is_empty() {
        return Err(AnalyzeError::config(
          "patterns",
          &format!("kind '{}' has no non-empty needles", rule.kind),
        ));
      }
      patterns.push((rule.kind, needles));
    }

    if config.max_group_depth == 0 {
      return Err(AnalyzeError::config("max_group_depth", "must be at least 1"));
    }

    Ok(Self {
      group_open,
      group_close,
      step,
      exit_code,
      benign,
      patterns,
      context_lines: config.root_cause_context_lines,
      max_group_depth: config.max_group_depth,
    })
  }
}

impl Default for Rules {
  fn default() -> Self {
    let config = Config::default();
    Self {
      group_open: config.group_open_prefixes,
      group_close: config.group_close_prefixes,
      step: config.step_prefixes,
      exit_code: DEFAULT_EXIT_CODE_RE.clone(),
      benign: Some(DEFAULT_BENIGN_RE.clone()),
      patterns: config
        .patterns
        .into_iter()
        .map(|r| (r.kind, r.needles))
        .collect(),
      context_lines: config.root_cause_context_lines,
      max_group_depth: config.max_group_depth,
    }
  }
}

fn non_empty_prefixes(field: &str, prefixes: &[String]) -> Result<Vec<String>, AnalyzeError> {
  if prefixes.iter().any(|p| p.trim().is_empty()) {
    return Err(AnalyzeError::config(field, "prefixes must not be empty"));
  }
  Ok(prefixes.to_vec())
}
