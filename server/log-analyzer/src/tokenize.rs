//! Split raw log text into classified tokens.
//!
//! Recognition order per line (after the runner timestamp is stripped):
//! group open/close marker, step marker, exit-code clause, plain text.
//! Never fails on content; unrecognized lines become `Text`.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::budget::Budget;
use crate::config::Rules;
use crate::error::AnalyzeError;
use crate::types::{Token, TokenKind};

/// Leading runner timestamp, e.g. `2023-09-15T23:08:24.3318468Z `.
static TIMESTAMP_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2}T[0-9:.]+Z)(?:\s+|$)").unwrap());

pub const UNNAMED_GROUP: &str = "(unnamed group)";
pub const UNNAMED_STEP: &str = "(unnamed step)";

pub fn tokenize(text: &str, rules: &Rules, budget: &Budget) -> Result<Vec<Token>, AnalyzeError> {
  let mut tokens = Vec::new();
  for (idx, raw) in text.lines().enumerate() {
    budget.tick(idx, "tokenize")?;
    tokens.push(classify_line(raw, idx + 1, rules));
  }
  tracing::trace!(tokens = tokens.len(), "tokenized");
  Ok(tokens)
}

/// Classify a single line. `line_number` is 1-based.
pub fn classify_line(raw: &str, line_number: usize, rules: &Rules) -> Token {
  let (timestamp, content) = strip_timestamp(raw);
  let marker = content.trim_start();

  let kind = if let Some(name) = strip_any_prefix(marker, &rules.group_open) {
    TokenKind::GroupOpen {
      name: marker_name(name, UNNAMED_GROUP),
    }
  } else if strip_any_prefix(marker, &rules.group_close).is_some() {
    TokenKind::GroupClose
  } else if let Some(name) = strip_any_prefix(marker, &rules.step) {
    TokenKind::StepMarker {
      name: marker_name(name, UNNAMED_STEP),
    }
  } else if let Some(code) = parse_exit_code(content, &rules.exit_code) {
    TokenKind::ExitCode { code }
  } else {
    TokenKind::Text
  };

  Token {
    kind,
    raw: raw.to_string(),
    line_number,
    content: content.to_string(),
    timestamp,
  }
}

/// Remove a leading ISO-8601 runner timestamp. The timestamp is parsed when it
/// is valid RFC 3339; a malformed one is still stripped.
pub fn strip_timestamp(line: &str) -> (Option<DateTime<Utc>>, &str) {
  match TIMESTAMP_RE.captures(line) {
    Some(caps) => {
      let ts = caps
        .get(1)
        .and_then(|m| DateTime::parse_from_rfc3339(m.as_str()).ok())
        .map(|dt| dt.with_timezone(&Utc));
      let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
      (ts, &line[end..])
    }
    None => (None, line),
  }
}

fn strip_any_prefix<'a>(line: &'a str, prefixes: &[String]) -> Option<&'a str> {
  prefixes.iter().find_map(|p| line.strip_prefix(p.as_str()))
}

fn marker_name(rest: &str, fallback: &str) -> String {
  let name = rest.trim();
  if name.is_empty() {
    fallback.to_string()
  } else {
    name.to_string()
  }
}

fn parse_exit_code(content: &str, re: &Regex) -> Option<i32> {
  re.captures(content)?.get(1)?.as_str().parse().ok()
}
