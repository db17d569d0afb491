//! Scan step output for error signals and attach findings.

use regex::Captures;
use std::borrow::Cow;
use std::ops::Range;

use crate::budget::Budget;
use crate::config::Rules;
use crate::error::AnalyzeError;
use crate::types::{Finding, PatternKind, Step};

/// Attach findings to every step, in line order.
pub fn extract(steps: &mut [Step], rules: &Rules, budget: &Budget) -> Result<(), AnalyzeError> {
  let mut scanned = 0usize;
  for step in steps.iter_mut() {
    budget.tick(scanned, "signals")?;
    scanned += step.lines.len().max(1);
    step.findings = scan_step(step, rules);
  }
  Ok(())
}

/// Findings for one step, at most one per line. Exit-code lines are
/// keyword-scanned with their error annotation masked; a failing keyword match
/// wins, otherwise a nonzero code yields `nonzero-exit`.
pub fn scan_step(step: &Step, rules: &Rules) -> Vec<Finding> {
  let mut findings = Vec::new();
  for (idx, line) in step.lines.iter().enumerate() {
    let finding = match line.exit_code {
      Some(code) => exit_line_finding(&line.text, code, rules),
      None => match_line(&line.text, rules)
        .map(|(kind, range)| (kind, line.text.get(range).unwrap_or_default().to_string())),
    };
    if let Some((kind, matched)) = finding {
      findings.push(Finding {
        step: Some(step.id),
        line_index: Some(idx),
        line_number: line.line_number,
        severity: kind.severity(),
        kind,
        matched,
        text: line.text.trim().to_string(),
      });
    }
  }
  findings
}

fn exit_line_finding(text: &str, code: i32, rules: &Rules) -> Option<(PatternKind, String)> {
  let masked = mask_annotations(text, rules);
  let keyword = match_line(&masked, rules)
    .map(|(kind, range)| (kind, text.get(range).unwrap_or_default().to_string()));
  match keyword {
    Some((kind, matched)) if kind.severity().is_failing() || code == 0 => Some((kind, matched)),
    _ if code != 0 => Some((PatternKind::NonzeroExit, text.trim().to_string())),
    _ => None,
  }
}

/// Blank out error-annotation needles (`##[error]`, `::error`) so the runner's
/// own exit report does not read as a keyword hit.
fn mask_annotations(text: &str, rules: &Rules) -> String {
  let lower = text.to_ascii_lowercase();
  let mut out = text.to_string();
  let needles = rules
    .patterns
    .iter()
    .filter(|(kind, _)| *kind == PatternKind::ErrorAnnotation)
    .flat_map(|(_, needles)| needles.iter());
  for needle in needles {
    for (start, _) in lower.match_indices(needle.as_str()) {
      out.replace_range(start..start + needle.len(), &" ".repeat(needle.len()));
    }
  }
  out
}

/// First keyword kind (in table order) with a needle in `line`, and the byte
/// range of that kind's earliest needle occurrence.
pub fn match_line(line: &str, rules: &Rules) -> Option<(PatternKind, Range<usize>)> {
  let masked = mask_benign(line, rules);
  // ASCII lowercasing keeps byte offsets aligned with `line`.
  let lower = masked.to_ascii_lowercase();

  rules.patterns.iter().find_map(|(kind, needles)| {
    needles
      .iter()
      .filter_map(|n| lower.find(n.as_str()).map(|start| start..start + n.len()))
      .min_by_key(|r| r.start)
      .map(|range| (*kind, range))
  })
}

/// Blank out benign spans ("0 failed", "errors: 0") with same-length padding.
fn mask_benign<'a>(line: &'a str, rules: &Rules) -> Cow<'a, str> {
  match &rules.benign {
    Some(re) => re.replace_all(line, |caps: &Captures| " ".repeat(caps[0].len())),
    None => Cow::Borrowed(line),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{Severity, StepId, StepLine};

  fn step_with(lines: &[(&str, Option<i32>)]) -> Step {
    let mut step = Step::new(StepId(0), "s", 1, false);
    for (i, (text, exit_code)) in lines.iter().enumerate() {
      step.lines.push(StepLine {
        line_number: i + 2,
        text: text.to_string(),
        exit_code: *exit_code,
      });
    }
    step
  }

  fn kind_of(line: &str) -> Option<PatternKind> {
    match_line(line, &Rules::default()).map(|(k, _)| k)
  }

  #[test]
  fn table_order_first_kind_wins() {
    assert_eq!(kind_of("FATAL ERROR: heap out of memory"), Some(PatternKind::Fatal));
    assert_eq!(
      kind_of("Traceback (most recent call last):"),
      Some(PatternKind::StackTrace)
    );
    assert_eq!(
      kind_of("java.lang.IllegalStateException: error state"),
      Some(PatternKind::Exception)
    );
    assert_eq!(kind_of("##[error]Tests failed"), Some(PatternKind::ErrorAnnotation));
    assert_eq!(kind_of("Error: build failed"), Some(PatternKind::ErrorKeyword));
    assert_eq!(kind_of("BUILD FAILED in 3s"), Some(PatternKind::FailureKeyword));
    assert_eq!(kind_of("warning: unused variable"), Some(PatternKind::Warning));
    assert_eq!(kind_of("Compiling foo v0.1.0"), None);
  }

  #[test]
  fn matching_is_case_insensitive_and_reports_original_text() {
    let line = "npm ERR! Test FAILED";
    let (kind, range) = match_line(line, &Rules::default()).unwrap();
    assert_eq!(kind, PatternKind::FailureKeyword);
    assert_eq!(&line[range], "FAIL");
  }

  #[test]
  fn earliest_needle_of_winning_kind() {
    let line = "::error file=a.rs::##[error] twice";
    let (kind, range) = match_line(line, &Rules::default()).unwrap();
    assert_eq!(kind, PatternKind::ErrorAnnotation);
    assert_eq!(range.start, 0);
  }

  #[test]
  fn benign_counts_are_masked() {
    assert_eq!(kind_of("test result: ok. 12 passed; 0 failed; 0 ignored"), None);
    assert_eq!(kind_of("Errors: 0, Warnings: 0"), None);
    assert_eq!(kind_of("no errors found"), None);
    assert_eq!(
      kind_of("test result: FAILED. 3 passed; 1 failed; 0 errors"),
      Some(PatternKind::FailureKeyword)
    );
  }

  #[test]
  fn benign_masking_can_be_disabled() {
    let rules = Rules {
      benign: None,
      ..Rules::default()
    };
    assert_eq!(
      match_line("12 passed; 0 failed", &rules).map(|(k, _)| k),
      Some(PatternKind::FailureKeyword)
    );
  }

  #[test]
  fn nonzero_exit_finding() {
    let step = step_with(&[("building", None), ("Process completed with exit code 2.", Some(2))]);
    let findings = scan_step(&step, &Rules::default());
    assert_eq!(findings.len(), 1);
    let f = &findings[0];
    assert_eq!(f.kind, PatternKind::NonzeroExit);
    assert_eq!(f.severity, Severity::Error);
    assert_eq!(f.line_index, Some(1));
    assert_eq!(f.line_number, 3);
    assert_eq!(f.step, Some(StepId(0)));
  }

  #[test]
  fn annotated_zero_exit_line_yields_nothing() {
    let step = step_with(&[("##[error]Process completed with exit code 0.", Some(0))]);
    assert!(scan_step(&step, &Rules::default()).is_empty());
  }

  #[test]
  fn annotated_nonzero_exit_stays_nonzero_exit() {
    let step = step_with(&[("##[error]Process completed with exit code 1.", Some(1))]);
    let findings = scan_step(&step, &Rules::default());
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].kind, PatternKind::NonzeroExit);
  }

  #[test]
  fn keyword_on_exit_line_wins() {
    let step = step_with(&[("FATAL: out of memory, process exited with code 137", Some(137))]);
    let findings = scan_step(&step, &Rules::default());
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].kind, PatternKind::Fatal);
    assert_eq!(findings[0].severity, Severity::Fatal);
    assert_eq!(findings[0].matched, "FATAL");
  }

  #[test]
  fn warning_on_nonzero_exit_line_reports_the_exit() {
    let step = step_with(&[("warning: retry budget spent, exit code 3", Some(3))]);
    let findings = scan_step(&step, &Rules::default());
    assert_eq!(findings[0].kind, PatternKind::NonzeroExit);
  }

  #[test]
  fn findings_in_line_order_without_dedup() {
    let step = step_with(&[
      ("error: a", None),
      ("fine", None),
      ("error: a", None),
      ("warning: b", None),
    ]);
    let findings = scan_step(&step, &Rules::default());
    let lines: Vec<usize> = findings.iter().map(|f| f.line_number).collect();
    assert_eq!(lines, vec![2, 4, 5]);
    assert_eq!(findings[0].matched, "error");
    assert_eq!(findings[0].text, "error: a");
  }

  #[test]
  fn extract_fills_every_step() {
    let mut steps = vec![step_with(&[("error: x", None)]), step_with(&[("ok", None)])];
    steps[1].id = StepId(1);
    extract(&mut steps, &Rules::default(), &Budget::unlimited()).unwrap();
    assert_eq!(steps[0].findings.len(), 1);
    assert!(steps[1].findings.is_empty());
  }
}
