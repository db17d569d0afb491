//! Rank root-cause candidates within the primary failing step.
//!
//! Ordering: severity desc, then pattern specificity desc, then line number
//! asc. Every key is a total order over a closed set, so the result is
//! deterministic.

use std::cmp::Ordering;

use crate::types::{Finding, PatternKind, RootCause, Severity, Step};

pub const NO_MATCHED_TEXT: &str = "non-zero exit code without matched error text";

/// Ranking comparator: `Less` means `a` is the better root cause.
pub fn compare(a: &Finding, b: &Finding) -> Ordering {
  b.severity
    .cmp(&a.severity)
    .then_with(|| b.kind.specificity().cmp(&a.kind.specificity()))
    .then_with(|| a.line_number.cmp(&b.line_number))
}

/// Candidates ordered best first.
pub fn rank_candidates(findings: &[Finding]) -> Vec<&Finding> {
  let mut ranked: Vec<&Finding> = findings.iter().collect();
  ranked.sort_by(|a, b| compare(a, b));
  ranked
}

/// Select the root cause for `step`. When nothing outranks a bare nonzero
/// exit, the cause is synthesized and keeps the exit line's position.
pub fn select_root_cause(step: &Step, context_lines: usize) -> RootCause {
  match rank_candidates(&step.findings).first() {
    Some(top) if top.kind != PatternKind::NonzeroExit => {
      let finding = (*top).clone();
      let context = following_context(step, finding.line_index, context_lines);
      RootCause {
        step: step.id,
        step_name: step.name.clone(),
        description: describe(&finding),
        finding,
        context,
        synthetic: false,
      }
    }
    exit => {
      let line_index = exit.and_then(|f| f.line_index);
      let code = line_index
        .and_then(|i| step.lines.get(i))
        .and_then(|l| l.exit_code)
        .or(step.exit_code);
      let text = match code {
        Some(code) => format!("{} (exit code {})", NO_MATCHED_TEXT, code),
        None => NO_MATCHED_TEXT.to_string(),
      };
      let finding = Finding {
        step: Some(step.id),
        line_index,
        line_number: exit.map_or(step.line_number, |f| f.line_number),
        severity: Severity::Error,
        kind: PatternKind::NonzeroExit,
        matched: exit.map(|f| f.matched.clone()).unwrap_or_default(),
        text,
      };
      RootCause {
        step: step.id,
        step_name: step.name.clone(),
        description: describe(&finding),
        finding,
        context: Vec::new(),
        synthetic: true,
      }
    }
  }
}

/// `error (error-keyword) at line 12: Error: build failed`
pub fn describe(finding: &Finding) -> String {
  format!(
    "{} ({}) at line {}: {}",
    finding.severity, finding.kind, finding.line_number, finding.text
  )
}

/// Up to `limit` lines after the finding, stopping at the first blank line.
fn following_context(step: &Step, line_index: Option<usize>, limit: usize) -> Vec<String> {
  let Some(idx) = line_index else {
    return Vec::new();
  };
  step
    .lines
    .iter()
    .skip(idx + 1)
    .take(limit)
    .map(|l| l.text.trim())
    .take_while(|t| !t.is_empty())
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{StepId, StepLine};

  fn finding(kind: PatternKind, line_number: usize) -> Finding {
    Finding {
      step: Some(StepId(0)),
      line_index: Some(line_number - 2),
      line_number,
      severity: kind.severity(),
      kind,
      matched: kind.as_str().to_string(),
      text: format!("{} line {}", kind, line_number),
    }
  }

  fn step_with_lines(texts: &[&str]) -> Step {
    let mut step = Step::new(StepId(0), "test", 1, false);
    for (i, t) in texts.iter().enumerate() {
      step.lines.push(StepLine {
        line_number: i + 2,
        text: t.to_string(),
        exit_code: None,
      });
    }
    step
  }

  #[test]
  fn severity_dominates_specificity() {
    let fatal = finding(PatternKind::Fatal, 9);
    let trace = finding(PatternKind::StackTrace, 2);
    assert_eq!(compare(&fatal, &trace), Ordering::Less);
  }

  #[test]
  fn specificity_breaks_severity_ties() {
    let findings = vec![
      finding(PatternKind::NonzeroExit, 2),
      finding(PatternKind::ErrorKeyword, 3),
      finding(PatternKind::StackTrace, 4),
      finding(PatternKind::Exception, 5),
    ];
    let kinds: Vec<PatternKind> = rank_candidates(&findings).iter().map(|f| f.kind).collect();
    assert_eq!(
      kinds,
      vec![
        PatternKind::StackTrace,
        PatternKind::Exception,
        PatternKind::ErrorKeyword,
        PatternKind::NonzeroExit
      ]
    );
  }

  #[test]
  fn earliest_line_breaks_full_ties() {
    let findings = vec![finding(PatternKind::ErrorKeyword, 7), finding(PatternKind::ErrorKeyword, 3)];
    assert_eq!(rank_candidates(&findings)[0].line_number, 3);
  }

  #[test]
  fn specificity_table_is_a_total_order() {
    let all = [
      PatternKind::Fatal,
      PatternKind::StackTrace,
      PatternKind::Exception,
      PatternKind::ErrorAnnotation,
      PatternKind::ErrorKeyword,
      PatternKind::FailureKeyword,
      PatternKind::NonzeroExit,
      PatternKind::Warning,
      PatternKind::Structural,
      PatternKind::Diagnostic,
    ];
    let mut ranks: Vec<u8> = all.iter().map(|k| k.specificity()).collect();
    ranks.sort_unstable();
    ranks.dedup();
    assert_eq!(ranks.len(), all.len());
  }

  #[test]
  fn root_cause_carries_context_until_blank() {
    let mut step = step_with_lines(&["Error: build failed", "  at foo.c:3", "  at bar.c:9", "", "later"]);
    step.findings.push(Finding {
      line_index: Some(0),
      ..finding(PatternKind::ErrorKeyword, 2)
    });
    let rc = select_root_cause(&step, 5);
    assert!(!rc.synthetic);
    assert_eq!(rc.context, vec!["at foo.c:3", "at bar.c:9"]);
    assert_eq!(rc.step_name, "test");
    assert!(rc.description.starts_with("error (error-keyword) at line 2:"));
  }

  #[test]
  fn context_respects_limit() {
    let mut step = step_with_lines(&["boom", "a", "b", "c"]);
    step.findings.push(Finding {
      line_index: Some(0),
      ..finding(PatternKind::ErrorKeyword, 2)
    });
    assert_eq!(select_root_cause(&step, 2).context, vec!["a", "b"]);
    assert!(select_root_cause(&step, 0).context.is_empty());
  }

  #[test]
  fn synthetic_root_cause_without_findings() {
    let mut step = step_with_lines(&["compiling"]);
    step.exit_code = Some(2);
    let rc = select_root_cause(&step, 5);
    assert!(rc.synthetic);
    assert_eq!(rc.finding.kind, PatternKind::NonzeroExit);
    assert!(rc.finding.text.contains(NO_MATCHED_TEXT));
    assert!(rc.finding.text.contains("exit code 2"));
    assert_eq!(rc.finding.line_number, 1);
  }

  #[test]
  fn bare_nonzero_exit_is_synthesized_at_exit_line() {
    let mut step = step_with_lines(&["compiling", "Process completed with exit code 1."]);
    step.lines[1].exit_code = Some(1);
    step.exit_code = Some(1);
    step.findings.push(Finding {
      line_index: Some(1),
      matched: "Process completed with exit code 1.".into(),
      ..finding(PatternKind::NonzeroExit, 3)
    });
    let rc = select_root_cause(&step, 5);
    assert!(rc.synthetic);
    assert_eq!(rc.finding.line_number, 3);
    assert_eq!(rc.finding.line_index, Some(1));
    assert!(rc.finding.text.starts_with(NO_MATCHED_TEXT));
    assert!(rc.finding.text.ends_with("(exit code 1)"));
    assert!(rc.context.is_empty());
  }
}
