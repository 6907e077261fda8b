//! usagemon-core — usage telemetry for AI coding agent CLIs.
//!
//! Spawns the agent CLIs, captures their output under a timeout, and parses
//! the human-oriented usage panels into [`usage::UsageRecord`]s.

pub mod error;
pub mod process;
pub mod usage;

pub use error::{CollectError, ErrorKind, RunError};
pub use usage::{collect_all, Collector, CollectorOutcome, Service, UsageRecord};
