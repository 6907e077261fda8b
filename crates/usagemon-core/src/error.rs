//! Error types for process execution and usage collection.

use std::io;

use thiserror::Error;

use crate::usage::Service;

/// Fallback message when a failed child left nothing on stderr
pub const COMMAND_FAILED_MESSAGE: &str = "Command failed";

/// Failure of a single [`ProcessRunner::run`](crate::process::ProcessRunner::run) call.
///
/// A timeout is not an error: it resolves as a successful run with partial output.
#[derive(Debug, Clone, Error)]
pub enum RunError {
    /// The executable could not be started
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        program: String,
        kind: io::ErrorKind,
        message: String,
    },

    /// The child exited non-zero without printing anything to stdout
    #[error("{stderr}")]
    Exited { code: Option<i32>, stderr: String },
}

impl RunError {
    pub(crate) fn spawn(program: &str, err: &io::Error) -> Self {
        RunError::Spawn {
            program: program.to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Whether the executable was missing from the environment
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RunError::Spawn {
                kind: io::ErrorKind::NotFound,
                ..
            }
        )
    }
}

/// Category of a failed collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SpawnNotFound,
    SpawnFailed,
    ProcessFailed,
    ParseFailed,
    Unsupported,
}

/// Classified failure returned inside a [`CollectorOutcome`](crate::usage::CollectorOutcome)
#[derive(Debug, Clone, Error)]
pub enum CollectError {
    /// CLI binary is not installed
    #[error("{service} CLI not found. Install from: {install_url}")]
    CliNotFound {
        service: Service,
        install_url: &'static str,
    },

    /// Spawn failed for another reason (permissions, resource limits, ...)
    #[error("{message}")]
    SpawnFailed {
        service: Service,
        kind: io::ErrorKind,
        message: String,
    },

    /// Child exited non-zero with no usable output
    #[error("{message}")]
    ProcessFailed { service: Service, message: String },

    /// Transcript contained no recognizable usage pattern
    #[error("Could not parse {service} usage data")]
    Unparseable { service: Service },

    /// Service has no CLI-accessible usage data
    #[error("{reason}")]
    Unsupported { service: Service, reason: String },
}

impl CollectError {
    /// Category of this error, for branching without inspecting messages
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollectError::CliNotFound { .. } => ErrorKind::SpawnNotFound,
            CollectError::SpawnFailed { .. } => ErrorKind::SpawnFailed,
            CollectError::ProcessFailed { .. } => ErrorKind::ProcessFailed,
            CollectError::Unparseable { .. } => ErrorKind::ParseFailed,
            CollectError::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }

    /// Service the failed collection was for
    pub fn service(&self) -> Service {
        match self {
            CollectError::CliNotFound { service, .. }
            | CollectError::SpawnFailed { service, .. }
            | CollectError::ProcessFailed { service, .. }
            | CollectError::Unparseable { service }
            | CollectError::Unsupported { service, .. } => *service,
        }
    }

    /// Translate a runner failure for `service`
    pub fn from_run_error(service: Service, err: RunError) -> Self {
        if err.is_not_found() {
            if let Some(install_url) = service.install_url() {
                return CollectError::CliNotFound {
                    service,
                    install_url,
                };
            }
        }

        match err {
            RunError::Spawn { kind, message, .. } => CollectError::SpawnFailed {
                service,
                kind,
                message: non_empty_or_fallback(message, service),
            },
            RunError::Exited { stderr, .. } => CollectError::ProcessFailed {
                service,
                message: non_empty_or_fallback(stderr, service),
            },
        }
    }
}

fn non_empty_or_fallback(message: String, service: Service) -> String {
    if message.trim().is_empty() {
        format!("Failed to collect {} usage", service)
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_install_hint() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "No such file or directory");
        let err = CollectError::from_run_error(Service::Codex, RunError::spawn("codex", &io_err));
        assert_eq!(err.kind(), ErrorKind::SpawnNotFound);
        assert_eq!(
            err.to_string(),
            "Codex CLI not found. Install from: https://www.openai.com/codex"
        );
    }

    #[test]
    fn test_permission_denied_is_generic_spawn_failure() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied");
        let err = CollectError::from_run_error(Service::Claude, RunError::spawn("claude", &io_err));
        assert_eq!(err.kind(), ErrorKind::SpawnFailed);
        assert_eq!(err.service(), Service::Claude);
        assert!(err.to_string().contains("Permission denied"));
    }

    #[test]
    fn test_empty_stderr_falls_back() {
        let err = CollectError::from_run_error(
            Service::Claude,
            RunError::Exited {
                code: Some(2),
                stderr: "  \n".to_string(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::ProcessFailed);
        assert_eq!(err.to_string(), "Failed to collect Claude usage");
    }

    #[test]
    fn test_unparseable_message_is_fixed() {
        let err = CollectError::Unparseable {
            service: Service::Codex,
        };
        assert_eq!(err.to_string(), "Could not parse Codex usage data");
    }
}
