//! CI Log Analyzer — deterministic, rule-based.
//!
//! Tokenizes GitHub-Actions-style run logs, builds a group/step tree, extracts
//! error signals, infers step/group/run status, ranks root-cause candidates in
//! the earliest failing step, and renders a fixed-template summary.
//!
//! No AI, no DB, no network; pure computation per log.

pub mod batch;
pub mod budget;
pub mod config;
pub mod engine;
pub mod error;
pub mod facts;
pub mod job;
pub mod metadata;
pub mod rank;
pub mod render;
pub mod signals;
pub mod status;
pub mod structure;
pub mod tokenize;
pub mod types;

pub use batch::{analyze_all, LogInput};
pub use config::{Config, Rules};
pub use engine::Analyzer;
pub use error::AnalyzeError;
pub use facts::{coverage, FactCoverage, RunFacts};
pub use types::{Finding, PatternKind, Run, Severity, Status};
