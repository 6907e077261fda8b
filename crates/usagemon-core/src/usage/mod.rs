//! Usage collection — run an agent CLI, capture its transcript, and parse it.
//!
//! Claude Code and Codex CLI only report usage through their interactive
//! panels, so each collector invokes the CLI with a usage command, waits a
//! bounded time, and extracts a [`UsageRecord`] from whatever was printed.

pub mod collector;
pub mod parser;
pub mod types;

pub use collector::{collect_all, CliCollector, Collector, UnsupportedCollector};
pub use parser::OutputParser;
pub use types::{CollectorOutcome, Service, UsageRecord};
