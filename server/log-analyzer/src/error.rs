//! Structured error types for the log analyzer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzeError {
  #[error("config: {field}: {reason}")]
  Config { field: String, reason: String },

  #[error("config toml: {0}")]
  Toml(#[from] toml::de::Error),

  #[error("pattern: {field}: {source}")]
  Pattern {
    field: String,
    #[source]
    source: regex::Error,
  },

  #[error("analysis cancelled during {stage}: deadline exceeded")]
  Cancelled { stage: &'static str },

  #[error("io: {0}")]
  Io(#[from] std::io::Error),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl AnalyzeError {
  pub fn config(field: &str, reason: &str) -> Self {
    Self::Config {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn pattern(field: &str, source: regex::Error) -> Self {
    Self::Pattern {
      field: field.to_string(),
      source,
    }
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self, Self::Cancelled { .. })
  }
}
