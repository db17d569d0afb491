//! Fixed-template summary text. Formatting only; no inference happens here.

use crate::types::{Run, RunCounts, RunMetadata, Status};

pub const NO_CONTENT: &str = "Result: no content to analyze.";

/// Render the summary for a fully analyzed run.
pub fn render(run: &Run) -> String {
  let mut out: Vec<String> = Vec::new();

  if let Some(ctx) = context_line(run.job.as_deref(), &run.metadata) {
    out.push(ctx);
  }

  match run.metadata.test_commands.as_slice() {
    [] => {}
    [one] => out.push(format!("Test command: {}", one)),
    many => {
      out.push("Test commands:".into());
      out.extend(many.iter().map(|c| format!("  - {}", c)));
    }
  }

  match (run.status, run.primary_step()) {
    (Status::Failed, Some(step)) => out.push(format!(
      "Result: run failed in step '{}' (line {}).",
      step.name, step.line_number
    )),
    (Status::Failed, None) => out.push("Result: run failed.".into()),
    (Status::Passed, _) => out.push("Result: run passed.".into()),
    (Status::Unknown, _) if run.groups.is_empty() => out.push(NO_CONTENT.into()),
    (Status::Unknown, _) => {
      out.push("Result: run status unknown (no clear success/failure markers).".into())
    }
  }

  if let Some(rc) = &run.root_cause {
    out.push("Likely root cause:".into());
    out.push(format!("  [{}] {}", rc.finding.severity, rc.finding.text));
    out.extend(rc.context.iter().map(|c| format!("  {}", c)));
  }

  let failing = run.failing_step_names();
  if failing.len() > 1 {
    out.push(format!("Failing steps: {}", failing.join(", ")));
  }

  out.push(overview(&run.counts));
  out.join("\n")
}

/// Summary for a run whose analysis was abandoned.
pub fn render_aborted(job: Option<&str>, reason: &str) -> String {
  let mut out: Vec<String> = Vec::new();
  if let Some(ctx) = context_line(job, &RunMetadata::default()) {
    out.push(ctx);
  }
  out.push(format!("Result: analysis aborted ({}).", reason));
  out.push(overview(&RunCounts::default()));
  out.join("\n")
}

fn context_line(job: Option<&str>, meta: &RunMetadata) -> Option<String> {
  let mut extra: Vec<String> = Vec::new();
  if let Some(image) = &meta.runner_image {
    extra.push(format!("image {}", image));
  } else if let Some(os) = &meta.os_name {
    extra.push(os.clone());
  }
  if let Some(repo) = &meta.repo {
    extra.push(format!("repo {}", repo));
  }
  if let Some(r) = &meta.git_ref {
    extra.push(format!("ref {}", r));
  }

  let head = match job {
    Some(name) => format!("Context: Job '{}'", name),
    None if extra.is_empty() => return None,
    None => "Context: Run".to_string(),
  };
  if extra.is_empty() {
    Some(head)
  } else {
    Some(format!("{} ({})", head, extra.join(", ")))
  }
}

fn overview(counts: &RunCounts) -> String {
  format!(
    "Overview: {} groups, {} steps, {} findings, {} structural diagnostics.",
    counts.groups, counts.steps, counts.findings, counts.diagnostics
  )
}
