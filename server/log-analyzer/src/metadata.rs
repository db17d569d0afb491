//! Run context pulled from the log body: repository, ref, runner OS/image,
//! and the test commands the run executed.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::{Group, RunMetadata, Step, Token};

static IMAGE_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)image[: ]+([A-Za-z0-9_.:-]+)").unwrap());

static RUN_COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bRun\b(.*)$").unwrap());

/// Substrings that mark a `Run ...` group as a test invocation.
pub const TEST_KEYWORDS: &[&str] = &[
  "pytest",
  "nose",
  "unittest",
  "py.test",
  "mvn test",
  "mvn verify",
  "gradlew",
  "gradle test",
  "npm test",
  "yarn test",
  "pnpm test",
  "go test",
  "cargo test",
  "cargo nextest",
  "phpunit",
  "rspec",
  "ctest",
  "jest ",
  " karma",
];

pub fn extract(tokens: &[Token], groups: &[Group], steps: &[Step]) -> RunMetadata {
  let mut meta = RunMetadata::default();
  scan_lines(tokens, &mut meta);
  let mut commands = Vec::new();
  for group in groups {
    collect_test_commands(group, steps, &mut commands);
  }
  meta.test_commands = commands;
  meta
}

fn scan_lines(tokens: &[Token], meta: &mut RunMetadata) {
  for (i, token) in tokens.iter().enumerate() {
    let line = token.content.trim();

    if meta.repo.is_none() {
      if let Some(raw) = after(line, "Job defined at:") {
        let (path, git_ref) = match raw.split_once('@') {
          Some((path, r)) => (path, Some(r)),
          None => (raw, None),
        };
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        if parts.len() >= 2 {
          meta.repo = Some(parts[..2].join("/"));
        }
        if meta.git_ref.is_none() {
          meta.git_ref = git_ref.filter(|r| !r.is_empty()).map(str::to_string);
        }
      }
    }

    if meta.repo.is_none() {
      if let Some(repo) = after(line, "repository:") {
        meta.repo = Some(repo.to_string());
      }
    }

    if meta.git_ref.is_none() {
      if let Some(r) = after(line, "ref:").filter(|r| r.starts_with("refs/")) {
        meta.git_ref = Some(r.to_string());
      }
    }

    if meta.os_name.is_none() && line == "Operating System" {
      meta.os_name = tokens
        .get(i + 1)
        .map(|t| t.content.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    }

    if meta.runner_image.is_none() && line.to_ascii_lowercase().contains("image:") {
      meta.runner_image = IMAGE_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    }
  }
}

/// Trimmed, non-empty text after the first `marker` in `line`.
fn after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
  line
    .split_once(marker)
    .map(|(_, rest)| rest.trim())
    .filter(|rest| !rest.is_empty())
}

fn collect_test_commands(group: &Group, steps: &[Step], out: &mut Vec<String>) {
  if let Some(cmd) = test_command(group, steps) {
    if !out.contains(&cmd) {
      out.push(cmd);
    }
  }
  for sub in group.subgroups() {
    collect_test_commands(sub, steps, out);
  }
}

/// `Run <cmd>` group headers whose header or first body line names a test runner.
fn test_command(group: &Group, steps: &[Step]) -> Option<String> {
  if group.implicit {
    return None;
  }
  let header = group.name.to_ascii_lowercase();
  if !header.contains("run ") {
    return None;
  }
  let first_line = group
    .step_ids()
    .filter_map(|id| steps.get(id.0))
    .flat_map(|s| s.lines.iter())
    .map(|l| l.text.trim())
    .find(|t| !t.is_empty())
    .unwrap_or_default()
    .to_ascii_lowercase();
  let combined = format!("{} {}", header, first_line);
  if !TEST_KEYWORDS.iter().any(|kw| combined.contains(kw)) {
    return None;
  }
  let cmd = RUN_COMMAND_RE
    .captures(&group.name)
    .and_then(|c| c.get(1))
    .map(|m| m.as_str().trim().to_string())
    .unwrap_or_else(|| group.name.trim().to_string());
  Some(cmd).filter(|c| !c.is_empty())
}
