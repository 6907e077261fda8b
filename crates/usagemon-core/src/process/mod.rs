//! Subprocess execution with a hard wall-clock budget.

mod runner;

pub use runner::{ProcessRunner, RunOutput, Termination, DEFAULT_TIMEOUT};
