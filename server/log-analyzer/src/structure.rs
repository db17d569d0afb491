//! Assemble tokens into a group/step tree using an explicit stack.
//!
//! Groups own their children; steps live in a flat arena indexed by
//! [`StepId`] so findings can reference them without ownership.

use crate::budget::Budget;
use crate::error::AnalyzeError;
use crate::types::{Finding, Group, GroupChild, Step, StepId, StepLine, Token, TokenKind};

pub const UNGROUPED: &str = "(ungrouped)";
pub const PREAMBLE: &str = "(preamble)";

/// Builder output: the tree, the step arena, and structural findings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Structure {
  pub groups: Vec<Group>,
  pub steps: Vec<Step>,
  /// Sorted by line number.
  pub diagnostics: Vec<Finding>,
}

impl Structure {
  pub fn group_count(&self) -> usize {
    self.groups.iter().map(Group::count_groups).sum()
  }
}

pub fn build(tokens: &[Token], max_depth: usize, budget: &Budget) -> Result<Structure, AnalyzeError> {
  let mut builder = Builder::new(max_depth);
  for (idx, token) in tokens.iter().enumerate() {
    budget.tick(idx, "structure")?;
    builder.push(token);
  }
  Ok(builder.finish())
}

struct OpenGroup {
  group: Group,
  /// Marker text, reported if the group is never closed.
  marker: String,
  open_step: Option<StepId>,
}

struct Builder {
  /// Either empty, a single implicit group, or explicit groups only.
  stack: Vec<OpenGroup>,
  top_level: Vec<Group>,
  steps: Vec<Step>,
  diagnostics: Vec<Finding>,
  max_depth: usize,
  /// Opens beyond `max_depth` still waiting for their close.
  flattened_opens: usize,
}

impl Builder {
  fn new(max_depth: usize) -> Self {
    Self {
      stack: Vec::new(),
      top_level: Vec::new(),
      steps: Vec::new(),
      diagnostics: Vec::new(),
      max_depth,
      flattened_opens: 0,
    }
  }

  fn push(&mut self, token: &Token) {
    match &token.kind {
      TokenKind::GroupOpen { name } => self.open_group(name, token),
      TokenKind::GroupClose => self.close_group(token),
      TokenKind::StepMarker { name } => self.open_step(name, token),
      TokenKind::ExitCode { code } => self.attach(token, Some(*code)),
      TokenKind::Text => {
        // Blank lines carry no signal and never create groups or steps.
        if token.is_blank() {
          if let Some(id) = self.current_step() {
            self.append_line(id, token, None);
          }
        } else {
          self.attach(token, None);
        }
      }
    }
  }

  fn open_group(&mut self, name: &str, token: &Token) {
    if self.stack.last().is_some_and(|g| g.group.implicit) {
      self.pop_group(true);
    }

    if self.stack.len() >= self.max_depth {
      self.flattened_opens += 1;
      let step = self.current_step();
      self.diagnostics.push(Finding::structural(
        step,
        token.line_number,
        &token.content,
        format!(
          "group '{}' nested deeper than {} levels; flattened into its parent",
          name, self.max_depth
        ),
      ));
      return;
    }

    let depth = self.stack.len();
    self.stack.push(OpenGroup {
      group: Group::new(name, depth, token.line_number, false),
      marker: token.content.trim().to_string(),
      open_step: None,
    });
  }

  fn close_group(&mut self, token: &Token) {
    if self.flattened_opens > 0 {
      self.flattened_opens -= 1;
      return;
    }

    match self.stack.last() {
      Some(open) if !open.group.implicit => self.pop_group(true),
      _ => {
        let step = self.current_step();
        self.diagnostics.push(Finding::structural(
          step,
          token.line_number,
          &token.content,
          "group close without a matching open".to_string(),
        ));
      }
    }
  }

  fn open_step(&mut self, name: &str, token: &Token) {
    self.ensure_group(token);
    let id = self.new_step(name, token.line_number, false);
    self.touch(id, token);
  }

  /// Attach an output line to the open step, creating a preamble step (and an
  /// implicit group) when needed.
  fn attach(&mut self, token: &Token, exit_code: Option<i32>) {
    self.ensure_group(token);
    let id = match self.current_step() {
      Some(id) => id,
      None => self.new_step(PREAMBLE, token.line_number, true),
    };
    self.append_line(id, token, exit_code);
  }

  fn append_line(&mut self, id: StepId, token: &Token, exit_code: Option<i32>) {
    let step = &mut self.steps[id.0];
    step.lines.push(StepLine {
      line_number: token.line_number,
      text: token.content.clone(),
      exit_code,
    });
    if exit_code.is_some() {
      step.exit_code = exit_code;
    }
    self.touch(id, token);
  }

  fn touch(&mut self, id: StepId, token: &Token) {
    if let Some(ts) = token.timestamp {
      let step = &mut self.steps[id.0];
      if step.started_at.is_none() {
        step.started_at = Some(ts);
      }
      step.finished_at = Some(ts);
    }
  }

  fn ensure_group(&mut self, token: &Token) {
    if self.stack.is_empty() {
      self.stack.push(OpenGroup {
        group: Group::new(UNGROUPED, 0, token.line_number, true),
        marker: String::new(),
        open_step: None,
      });
    }
  }

  fn current_step(&self) -> Option<StepId> {
    self.stack.last().and_then(|g| g.open_step)
  }

  /// Finalize the open step of the current group and open a new one.
  fn new_step(&mut self, name: &str, line_number: usize, synthetic: bool) -> StepId {
    let id = StepId(self.steps.len());
    self.steps.push(Step::new(id, name, line_number, synthetic));
    if let Some(open) = self.stack.last_mut() {
      open.group.children.push(GroupChild::Step { id });
      open.open_step = Some(id);
    }
    id
  }

  fn pop_group(&mut self, closed: bool) {
    if let Some(mut open) = self.stack.pop() {
      open.group.closed = closed;
      match self.stack.last_mut() {
        Some(parent) => parent.group.children.push(GroupChild::Group(open.group)),
        None => self.top_level.push(open.group),
      }
    }
  }

  fn finish(mut self) -> Structure {
    while let Some(open) = self.stack.last() {
      if open.group.implicit {
        self.pop_group(true);
        continue;
      }
      let finding = Finding::structural(
        open.open_step,
        open.group.line_number,
        &open.marker,
        format!(
          "group '{}' opened at line {} was never closed",
          open.group.name, open.group.line_number
        ),
      );
      self.diagnostics.push(finding);
      self.pop_group(false);
    }

    self.diagnostics.sort_by_key(|f| f.line_number);
    Structure {
      groups: self.top_level,
      steps: self.steps,
      diagnostics: self.diagnostics,
    }
  }
}
