//! Reduce findings and exit codes into step, group, and run status.

use crate::types::{Group, GroupChild, Status, Step, StepId};

/// Run-level verdict from the status pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inference {
  pub status: Status,
  /// Every failing step, in id (chronological) order.
  pub failing_steps: Vec<StepId>,
  /// The failing step with the lowest line number.
  pub primary: Option<StepId>,
}

/// Failed on an Error/Fatal finding or nonzero exit; Unknown with no output
/// and no exit code; otherwise Passed.
pub fn step_status(step: &Step) -> Status {
  let failing_finding = step.findings.iter().any(|f| f.severity.is_failing());
  let nonzero_exit = step.exit_code.is_some_and(|c| c != 0);
  if failing_finding || nonzero_exit {
    Status::Failed
  } else if !step.has_output() && step.exit_code.is_none() {
    Status::Unknown
  } else {
    Status::Passed
  }
}

/// Set every step and group status, then derive the run verdict.
pub fn infer(groups: &mut [Group], steps: &mut [Step]) -> Inference {
  for step in steps.iter_mut() {
    step.status = step_status(step);
  }

  let steps: &[Step] = steps;
  let status = Status::worst(groups.iter_mut().map(|g| aggregate(g, steps)));

  let failing_steps: Vec<StepId> = steps
    .iter()
    .filter(|s| s.status == Status::Failed)
    .map(|s| s.id)
    .collect();

  let primary = steps
    .iter()
    .filter(|s| s.status == Status::Failed)
    .min_by_key(|s| (s.line_number, s.id))
    .map(|s| s.id);

  Inference {
    status,
    failing_steps,
    primary,
  }
}

/// Worst status among children, stored on the group. Depth is bounded by the
/// builder's `max_group_depth`.
fn aggregate(group: &mut Group, steps: &[Step]) -> Status {
  let mut worst: Option<Status> = None;
  for child in group.children.iter_mut() {
    let status = match child {
      GroupChild::Step { id } => steps.get(id.0).map(|s| s.status).unwrap_or(Status::Unknown),
      GroupChild::Group(g) => aggregate(g, steps),
    };
    worst = Some(worst.map_or(status, |w| w.max(status)));
  }
  group.status = worst.unwrap_or(Status::Unknown);
  group.status
}
