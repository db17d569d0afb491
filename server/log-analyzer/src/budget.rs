//! Coarse-grained cancellation: a deadline polled by every pipeline stage.

use std::time::{Duration, Instant};

use crate::error::AnalyzeError;

/// Stages poll the budget once per this many lines.
pub const CHECK_EVERY: usize = 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct Budget {
  deadline: Option<Instant>,
}

impl Budget {
  pub fn unlimited() -> Self {
    Self { deadline: None }
  }

  pub fn until(deadline: Instant) -> Self {
    Self {
      deadline: Some(deadline),
    }
  }

  /// Deadline `timeout` from now; an overflowing timeout means no deadline.
  pub fn with_timeout(timeout: Option<Duration>) -> Self {
    Self {
      deadline: timeout.and_then(|t| Instant::now().checked_add(t)),
    }
  }

  pub fn check(&self, stage: &'static str) -> Result<(), AnalyzeError> {
    match self.deadline {
      Some(deadline) if Instant::now() >= deadline => Err(AnalyzeError::Cancelled { stage }),
      _ => Ok(()),
    }
  }

  /// Poll only on every [`CHECK_EVERY`]th item, starting with the first.
  pub fn tick(&self, index: usize, stage: &'static str) -> Result<(), AnalyzeError> {
    if index % CHECK_EVERY == 0 {
      self.check(stage)
    } else {
      Ok(())
    }
  }
}
