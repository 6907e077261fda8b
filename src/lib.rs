//! usagemon — check Claude Code and Codex CLI usage from one command.

pub mod config;
pub mod report;
