//! Property tests over generated GitHub-Actions-style logs.

use log_analyzer::types::{Group, GroupChild, Run};
use log_analyzer::{Analyzer, PatternKind, Severity, Status};
use proptest::prelude::*;

fn body_line() -> impl Strategy<Value = String> {
  prop_oneof![
    3 => "[a-z]{1,8}( [a-z0-9]{1,8}){0,4}",
    1 => Just(String::new()),
    1 => Just("Error: build failed".to_string()),
    1 => Just("FAILED tests/test_api.py::test_login".to_string()),
    1 => Just("warning: unused variable `x`".to_string()),
    1 => Just("Traceback (most recent call last):".to_string()),
    1 => Just("fatal: unable to access repository".to_string()),
    1 => Just("test result: ok. 4 passed; 0 failed".to_string()),
    1 => (0i32..3).prop_map(|c| format!("Process completed with exit code {}.", c)),
  ]
}

fn any_line() -> impl Strategy<Value = String> {
  prop_oneof![
    6 => body_line(),
    1 => "[a-z]{1,6}".prop_map(|n| format!("##[group]{}", n)),
    1 => Just("##[endgroup]".to_string()),
    1 => "[a-z]{1,6}".prop_map(|n| format!("##[step]{}", n)),
  ]
}

fn log_text() -> impl Strategy<Value = String> {
  prop::collection::vec(any_line(), 0..60).prop_map(|lines| lines.join("\n"))
}

fn check_group(group: &Group, run: &Run) -> Result<(), TestCaseError> {
  let children = group.children.iter().map(|child| match child {
    GroupChild::Step { id } => run.step(*id).map(|s| s.status).unwrap_or(Status::Unknown),
    GroupChild::Group(g) => g.status,
  });
  prop_assert_eq!(group.status, Status::worst(children));
  for sub in group.subgroups() {
    check_group(sub, run)?;
  }
  Ok(())
}

proptest! {
  #[test]
  fn one_run_with_consistent_status(text in log_text()) {
    let run = Analyzer::with_defaults().analyze(&text);

    prop_assert_eq!(run.status, Status::worst(run.groups.iter().map(|g| g.status)));
    for group in &run.groups {
      check_group(group, &run)?;
    }

    let any_failed = run.steps.iter().any(|s| s.status == Status::Failed);
    prop_assert_eq!(run.status == Status::Failed, any_failed);
    prop_assert_eq!(run.root_cause.is_some(), any_failed);
    prop_assert_eq!(run.primary_failing_step.is_some(), any_failed);
  }

  #[test]
  fn primary_step_is_earliest_failure(text in log_text()) {
    let run = Analyzer::with_defaults().analyze(&text);
    if let Some(primary) = run.primary_step() {
      prop_assert_eq!(primary.status, Status::Failed);
      for step in run.steps.iter().filter(|s| s.status == Status::Failed) {
        prop_assert!(primary.line_number <= step.line_number);
      }
      let rc = run.root_cause.as_ref().unwrap();
      prop_assert_eq!(rc.step, primary.id);
    }
  }

  #[test]
  fn analysis_is_idempotent(text in log_text()) {
    let analyzer = Analyzer::with_defaults();
    let a = serde_json::to_string(&analyzer.analyze(&text)).unwrap();
    let b = serde_json::to_string(&analyzer.analyze(&text)).unwrap();
    prop_assert_eq!(a, b);
  }

  #[test]
  fn findings_are_in_line_order(text in log_text()) {
    let run = Analyzer::with_defaults().analyze(&text);
    let line_count = text.lines().count();

    for step in &run.steps {
      let numbers: Vec<usize> = step.findings.iter().map(|f| f.line_number).collect();
      prop_assert!(numbers.windows(2).all(|w| w[0] < w[1]), "step findings out of order: {:?}", numbers);
      prop_assert!(numbers.iter().all(|n| (1..=line_count).contains(n)));
    }
    let diag: Vec<usize> = run.diagnostics.iter().map(|f| f.line_number).collect();
    prop_assert!(diag.windows(2).all(|w| w[0] <= w[1]));

    let ids: Vec<usize> = run.failing_steps.iter().map(|id| id.0).collect();
    prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
  }

  #[test]
  fn counts_match_contents(text in log_text()) {
    let run = Analyzer::with_defaults().analyze(&text);
    prop_assert_eq!(run.counts.steps, run.steps.len());
    prop_assert_eq!(run.counts.findings, run.all_findings().count());
    prop_assert_eq!(run.counts.diagnostics, run.diagnostics.len());
    prop_assert_eq!(run.counts.groups, run.groups.iter().map(Group::count_groups).sum::<usize>());
  }

  #[test]
  fn each_unclosed_group_warns_once(
    sections in prop::collection::vec(prop::collection::vec(body_line(), 0..5), 1..12),
  ) {
    let mut lines = Vec::new();
    for (i, body) in sections.iter().enumerate() {
      lines.push(format!("##[group]g{}", i));
      lines.extend(body.iter().cloned());
    }
    let run = Analyzer::with_defaults().analyze(&lines.join("\n"));

    prop_assert_eq!(run.diagnostics.len(), sections.len());
    for d in &run.diagnostics {
      prop_assert_eq!(d.kind, PatternKind::Structural);
      prop_assert_eq!(d.severity, Severity::Warning);
    }
  }

  #[test]
  fn blank_input_is_unknown(blanks in prop::collection::vec("[ \t]{0,4}", 0..20)) {
    let run = Analyzer::with_defaults().analyze(&blanks.join("\n"));
    prop_assert_eq!(run.status, Status::Unknown);
    prop_assert!(run.groups.is_empty());
    prop_assert_eq!(run.all_findings().count(), 0);
  }
}
