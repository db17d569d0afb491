//! Job directories: one log file per step, named `<n>_<step name>.txt`.
//!
//! The files are stitched into a single log stream. Each file is wrapped in a
//! group of its own with a step marker at the top, so every file becomes one
//! step and any groups the runner wrote inside it nest under that step.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::AnalyzeError;

/// Marker lines written around each step file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
  pub group_open: String,
  pub group_close: String,
  pub step: String,
}

impl Markers {
  /// First configured prefix of each kind, falling back to the defaults.
  pub fn from_config(config: &Config) -> Self {
    let defaults = Self::default();
    let first = |prefixes: &[String], fallback: String| prefixes.first().cloned().unwrap_or(fallback);
    Self {
      group_open: first(&config.group_open_prefixes, defaults.group_open),
      group_close: first(&config.group_close_prefixes, defaults.group_close),
      step: first(&config.step_prefixes, defaults.step),
    }
  }
}

impl Default for Markers {
  fn default() -> Self {
    Self {
      group_open: "##[group]".into(),
      group_close: "##[endgroup]".into(),
      step: "##[step]".into(),
    }
  }
}

/// One step's log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLog {
  pub number: Option<u32>,
  pub name: String,
  pub text: String,
}

/// `"2_Check out repo.txt"` → `(Some(2), "Check out repo")`. Underscores in the
/// name become spaces. Returns `None` for non-`.txt` files.
pub fn parse_step_file_name(file_name: &str) -> Option<(Option<u32>, String)> {
  let stem = file_name.strip_suffix(".txt")?;
  let parsed = stem
    .split_once('_')
    .and_then(|(num, rest)| Some((num.parse::<u32>().ok()?, rest)));
  Some(match parsed {
    Some((number, rest)) if !rest.trim().is_empty() => {
      (Some(number), rest.replace('_', " ").trim().to_string())
    }
    _ => (None, stem.to_string()),
  })
}

/// Numbered steps first in ascending order, unnumbered ones last; ties by name.
fn step_order(a: &StepLog, b: &StepLog) -> Ordering {
  match (a.number, b.number) {
    (Some(x), Some(y)) => x.cmp(&y),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  }
  .then_with(|| a.name.cmp(&b.name))
}

/// Concatenate step logs into one stream, one wrapping group and step per file.
pub fn assemble(mut steps: Vec<StepLog>, markers: &Markers) -> String {
  steps.sort_by(step_order);
  let mut out = String::new();
  for step in &steps {
    for marker in [&markers.group_open, &markers.step] {
      out.push_str(marker);
      out.push_str(&step.name);
      out.push('\n');
    }
    out.push_str(&step.text);
    if !step.text.is_empty() && !step.text.ends_with('\n') {
      out.push('\n');
    }
    out.push_str(&markers.group_close);
    out.push('\n');
  }
  out
}

/// Read every `.txt` step log in `dir`. Invalid UTF-8 is replaced, not rejected.
pub fn load(dir: &Path) -> Result<Vec<StepLog>, AnalyzeError> {
  let mut steps = Vec::new();
  for entry in fs::read_dir(dir)? {
    let entry = entry?;
    if !entry.file_type()?.is_file() {
      continue;
    }
    let file_name = entry.file_name();
    let Some((number, name)) = parse_step_file_name(&file_name.to_string_lossy()) else {
      continue;
    };
    let bytes = fs::read(entry.path())?;
    steps.push(StepLog {
      number,
      name,
      text: String::from_utf8_lossy(&bytes).into_owned(),
    });
  }
  tracing::debug!(dir = %dir.display(), steps = steps.len(), "loaded job directory");
  Ok(steps)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn log(number: Option<u32>, name: &str, text: &str) -> StepLog {
    StepLog {
      number,
      name: name.into(),
      text: text.into(),
    }
  }

  #[test]
  fn step_file_names() {
    assert_eq!(
      parse_step_file_name("2_Check out repo.txt"),
      Some((Some(2), "Check out repo".to_string()))
    );
    assert_eq!(
      parse_step_file_name("10_Run_tests.txt"),
      Some((Some(10), "Run tests".to_string()))
    );
    assert_eq!(parse_step_file_name("notes.txt"), Some((None, "notes".to_string())));
    assert_eq!(parse_step_file_name("x_y.txt"), Some((None, "x_y".to_string())));
    assert_eq!(parse_step_file_name("3_.txt"), Some((None, "3_".to_string())));
    assert_eq!(parse_step_file_name("1_build.log"), None);
  }

  #[test]
  fn assemble_orders_numerically_then_unnumbered() {
    let text = assemble(
      vec![
        log(None, "extra", "e"),
        log(Some(10), "ten", "t\n"),
        log(Some(2), "two", "w"),
      ],
      &Markers::default(),
    );
    assert_eq!(
      text,
      "##[group]two\n##[step]two\nw\n##[endgroup]\n\
       ##[group]ten\n##[step]ten\nt\n##[endgroup]\n\
       ##[group]extra\n##[step]extra\ne\n##[endgroup]\n"
    );
  }

  #[test]
  fn assemble_keeps_empty_steps() {
    let text = assemble(vec![log(Some(1), "empty", "")], &Markers::default());
    assert_eq!(text, "##[group]empty\n##[step]empty\n##[endgroup]\n");
  }

  #[test]
  fn markers_follow_config() {
    let config = Config {
      group_open_prefixes: vec!["::group::".into()],
      group_close_prefixes: vec!["::endgroup::".into()],
      step_prefixes: vec!["==> ".into(), "##[step]".into()],
      ..Config::default()
    };
    let markers = Markers::from_config(&config);
    assert_eq!(markers.group_open, "::group::");
    assert_eq!(markers.group_close, "::endgroup::");
    assert_eq!(markers.step, "==> ");
  }
}
