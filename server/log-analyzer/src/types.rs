//! Core types for the log analyzer (pipeline models + JSON output contract).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Tokens (tokenizer output)
// ---------------------------------------------------------------------------

/// Line classification with the parsed payload, when the kind carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
  GroupOpen { name: String },
  GroupClose,
  StepMarker { name: String },
  ExitCode { code: i32 },
  Text,
}

/// One classified log line. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  /// The line exactly as it appeared in the input.
  pub raw: String,
  /// 1-based line number in the input.
  pub line_number: usize,
  /// The line with any leading runner timestamp removed.
  pub content: String,
  pub timestamp: Option<DateTime<Utc>>,
}

impl Token {
  pub fn is_blank(&self) -> bool {
    self.content.trim().is_empty()
  }
}

// ---------------------------------------------------------------------------
// Severity / status (totally ordered; aggregation is a max-fold)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Info,
  Warning,
  Error,
  Fatal,
}

impl Severity {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Info => "info",
      Self::Warning => "warning",
      Self::Error => "error",
      Self::Fatal => "fatal",
    }
  }

  /// Error and Fatal fail the step they belong to.
  pub fn is_failing(self) -> bool {
    self >= Self::Error
  }
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Step, group, and run status. Declaration order is the "worst wins" order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
  Passed,
  Unknown,
  Failed,
}

impl Status {
  /// Worst status in `statuses`, or `Unknown` when there is nothing to aggregate.
  pub fn worst<I: IntoIterator<Item = Status>>(statuses: I) -> Status {
    statuses.into_iter().max().unwrap_or(Status::Unknown)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Passed => "passed",
      Self::Unknown => "unknown",
      Self::Failed => "failed",
    }
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ---------------------------------------------------------------------------
// Pattern kinds (closed rule table)
// ---------------------------------------------------------------------------

/// What produced a finding. Line-matchable kinds form the keyword table; the
/// rest are emitted by the extractor, builder, or engine directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternKind {
  Fatal,
  StackTrace,
  Exception,
  ErrorAnnotation,
  ErrorKeyword,
  FailureKeyword,
  NonzeroExit,
  Warning,
  Structural,
  Diagnostic,
}

impl PatternKind {
  /// Default keyword table, in match order (first matching kind per line wins).
  pub const KEYWORD_TABLE: [PatternKind; 7] = [
    Self::Fatal,
    Self::StackTrace,
    Self::Exception,
    Self::ErrorAnnotation,
    Self::ErrorKeyword,
    Self::FailureKeyword,
    Self::Warning,
  ];

  pub fn severity(self) -> Severity {
    match self {
      Self::Fatal => Severity::Fatal,
      Self::StackTrace
      | Self::Exception
      | Self::ErrorAnnotation
      | Self::ErrorKeyword
      | Self::FailureKeyword
      | Self::NonzeroExit => Severity::Error,
      Self::Warning | Self::Structural => Severity::Warning,
      Self::Diagnostic => Severity::Info,
    }
  }

  /// Hand-ordered specificity; unique per kind, higher is more specific.
  pub fn specificity(self) -> u8 {
    match self {
      Self::StackTrace => 9,
      Self::Exception => 8,
      Self::Fatal => 7,
      Self::ErrorAnnotation => 6,
      Self::ErrorKeyword => 5,
      Self::FailureKeyword => 4,
      Self::NonzeroExit => 3,
      Self::Warning => 2,
      Self::Structural => 1,
      Self::Diagnostic => 0,
    }
  }

  /// Whether the kind can appear in the keyword table.
  pub fn is_keyword(self) -> bool {
    Self::KEYWORD_TABLE.contains(&self)
  }

  /// Lowercase needles used when the configuration does not override them.
  pub fn default_needles(self) -> &'static [&'static str] {
    match self {
      Self::Fatal => &["fatal", "segmentation fault", "core dumped", "out of memory"],
      Self::StackTrace => &[
        "traceback (most recent call last)",
        "stack backtrace",
        "stack trace",
        "panicked at",
      ],
      Self::Exception => &["exception", "assertionerror"],
      Self::ErrorAnnotation => &["##[error]", "::error"],
      Self::ErrorKeyword => &["error"],
      Self::FailureKeyword => &["fail"],
      Self::Warning => &["##[warning]", "::warning", "warning"],
      Self::NonzeroExit | Self::Structural | Self::Diagnostic => &[],
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Fatal => "fatal",
      Self::StackTrace => "stack-trace",
      Self::Exception => "exception",
      Self::ErrorAnnotation => "error-annotation",
      Self::ErrorKeyword => "error-keyword",
      Self::FailureKeyword => "failure-keyword",
      Self::NonzeroExit => "nonzero-exit",
      Self::Warning => "warning",
      Self::Structural => "structural",
      Self::Diagnostic => "diagnostic",
    }
  }
}

impl fmt::Display for PatternKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// Stable index of a step in the run's step arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct StepId(pub usize);

/// A detected signal. References its step by id, never by ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub step: Option<StepId>,
  /// Index into the step's output lines, when the finding sits on one.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub line_index: Option<usize>,
  /// 1-based input line number (0 for run-level diagnostics).
  pub line_number: usize,
  pub severity: Severity,
  pub kind: PatternKind,
  /// The substring that triggered the match.
  pub matched: String,
  /// The full (trimmed) line, or a description for synthetic findings.
  pub text: String,
}

impl Finding {
  pub fn structural(step: Option<StepId>, line_number: usize, marker: &str, text: String) -> Self {
    Self {
      step,
      line_index: None,
      line_number,
      severity: PatternKind::Structural.severity(),
      kind: PatternKind::Structural,
      matched: marker.trim().to_string(),
      text,
    }
  }

  pub fn diagnostic(text: impl Into<String>) -> Self {
    Self {
      step: None,
      line_index: None,
      line_number: 0,
      severity: PatternKind::Diagnostic.severity(),
      kind: PatternKind::Diagnostic,
      matched: String::new(),
      text: text.into(),
    }
  }
}

// ---------------------------------------------------------------------------
// Structure tree
// ---------------------------------------------------------------------------

/// One output line owned by a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLine {
  pub line_number: usize,
  pub text: String,
  /// Set when the line was an exit-code marker.
  pub exit_code: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
  pub id: StepId,
  pub name: String,
  /// Line of the step marker, or of the first line for preamble steps.
  pub line_number: usize,
  /// True for the implicit preamble step of a group.
  pub synthetic: bool,
  #[serde(skip)]
  pub lines: Vec<StepLine>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exit_code: Option<i32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub started_at: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub finished_at: Option<DateTime<Utc>>,
  pub findings: Vec<Finding>,
  pub status: Status,
}

impl Step {
  pub fn new(id: StepId, name: impl Into<String>, line_number: usize, synthetic: bool) -> Self {
    Self {
      id,
      name: name.into(),
      line_number,
      synthetic,
      lines: Vec::new(),
      exit_code: None,
      started_at: None,
      finished_at: None,
      findings: Vec::new(),
      status: Status::Unknown,
    }
  }

  /// True when at least one owned line has visible content.
  pub fn has_output(&self) -> bool {
    self.lines.iter().any(|l| !l.text.trim().is_empty())
  }

  /// Wall-clock span between the first and last timestamped lines.
  pub fn duration_ms(&self) -> Option<i64> {
    match (self.started_at, self.finished_at) {
      (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroupChild {
  Step { id: StepId },
  Group(Group),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
  pub name: String,
  pub depth: usize,
  pub line_number: usize,
  /// Created by the builder for content outside any explicit group.
  pub implicit: bool,
  /// False when force-closed at end of input.
  pub closed: bool,
  pub children: Vec<GroupChild>,
  pub status: Status,
}

impl Group {
  pub fn new(name: impl Into<String>, depth: usize, line_number: usize, implicit: bool) -> Self {
    Self {
      name: name.into(),
      depth,
      line_number,
      implicit,
      closed: false,
      children: Vec::new(),
      status: Status::Unknown,
    }
  }

  /// Ids of the steps directly owned by this group, in order.
  pub fn step_ids(&self) -> impl Iterator<Item = StepId> + '_ {
    self.children.iter().filter_map(|c| match c {
      GroupChild::Step { id } => Some(*id),
      GroupChild::Group(_) => None,
    })
  }

  pub fn subgroups(&self) -> impl Iterator<Item = &Group> + '_ {
    self.children.iter().filter_map(|c| match c {
      GroupChild::Group(g) => Some(g),
      GroupChild::Step { .. } => None,
    })
  }

  /// Number of groups in this subtree, including `self`.
  pub fn count_groups(&self) -> usize {
    1 + self.subgroups().map(Group::count_groups).sum::<usize>()
  }
}

// ---------------------------------------------------------------------------
// Run (output contract)
// ---------------------------------------------------------------------------

/// Context pulled from the log body (runner banner, checkout output, group names).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunMetadata {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub repo: Option<String>,
  #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
  pub git_ref: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub os_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub runner_image: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub test_commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootCause {
  pub step: StepId,
  pub step_name: String,
  pub finding: Finding,
  /// One line: severity, kind, line number, and matched text.
  pub description: String,
  /// Lines following the finding, up to the first blank line.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub context: Vec<String>,
  /// True when no finding existed and the cause was synthesized.
  pub synthetic: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
  pub groups: usize,
  pub steps: usize,
  pub findings: usize,
  pub diagnostics: usize,
}

/// The full analysis result for one log input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Run {
  pub run_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub job: Option<String>,
  pub status: Status,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub primary_failing_step: Option<StepId>,
  pub failing_steps: Vec<StepId>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub root_cause: Option<RootCause>,
  pub summary: String,
  /// Structural and run-level findings (unmatched markers, aborted analysis).
  pub diagnostics: Vec<Finding>,
  pub metadata: RunMetadata,
  pub counts: RunCounts,
  pub groups: Vec<Group>,
  pub steps: Vec<Step>,
}

impl Run {
  pub fn step(&self, id: StepId) -> Option<&Step> {
    self.steps.get(id.0)
  }

  pub fn primary_step(&self) -> Option<&Step> {
    self.primary_failing_step.and_then(|id| self.step(id))
  }

  pub fn primary_step_name(&self) -> Option<&str> {
    self.primary_step().map(|s| s.name.as_str())
  }

  pub fn failing_step_names(&self) -> Vec<&str> {
    self
      .failing_steps
      .iter()
      .filter_map(|id| self.step(*id))
      .map(|s| s.name.as_str())
      .collect()
  }

  /// Step findings followed by run-level diagnostics.
  pub fn all_findings(&self) -> impl Iterator<Item = &Finding> + '_ {
    self
      .steps
      .iter()
      .flat_map(|s| s.findings.iter())
      .chain(self.diagnostics.iter())
  }
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for inputs that could not be read.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub input: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      input: None,
    }
  }

  pub fn with_input(mut self, input: impl Into<String>) -> Self {
    self.input = Some(input.into());
    self
  }
}
