//! Per-service collectors: run the CLI, parse its transcript, classify failures.

use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use super::parser::OutputParser;
use super::types::{CollectorOutcome, Service};
use crate::error::CollectError;
use crate::process::ProcessRunner;

/// Explanation returned by the Gemini collector
pub const GEMINI_UNSUPPORTED_REASON: &str =
    "Gemini CLI does not provide usage information via command line";

/// Collector that shells out to a usage-printing CLI
#[derive(Debug, Clone)]
pub struct CliCollector {
    service: Service,
    program: String,
    args: Vec<String>,
    stdin_line: Option<String>,
    parser: OutputParser,
    runner: ProcessRunner,
}

impl CliCollector {
    /// `claude -p /usage`, with `/usage` also written to stdin
    pub fn claude() -> Self {
        Self {
            service: Service::Claude,
            program: "claude".to_string(),
            args: vec!["-p".to_string(), "/usage".to_string()],
            stdin_line: Some("/usage".to_string()),
            parser: OutputParser::Claude,
            runner: ProcessRunner::default(),
        }
    }

    /// `codex exec /status`
    pub fn codex() -> Self {
        Self {
            service: Service::Codex,
            program: "codex".to_string(),
            args: vec!["exec".to_string(), "/status".to_string()],
            stdin_line: None,
            parser: OutputParser::Codex,
            runner: ProcessRunner::default(),
        }
    }

    /// Replace the executable (e.g. an absolute path to a non-PATH install)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Replace the argument vector
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Replace the line written to stdin
    pub fn with_stdin_line(mut self, line: Option<String>) -> Self {
        self.stdin_line = line;
        self
    }

    /// Change the wall-clock budget for the CLI invocation
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.runner = ProcessRunner::new(timeout);
        self
    }

    /// Executable this collector runs
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the CLI once and turn its transcript into an outcome
    pub async fn collect(&self) -> CollectorOutcome {
        let started = Instant::now();
        let run = self
            .runner
            .run(&self.program, &self.args, self.stdin_line.as_deref())
            .await;

        let output = match run {
            Ok(output) => output,
            Err(e) => {
                warn!("{} collection failed: {}", self.service, e);
                return CollectorOutcome::Failure(CollectError::from_run_error(self.service, e));
            }
        };

        if output.timed_out() {
            debug!(
                "{} timed out, parsing {} bytes of partial output",
                self.service,
                output.stdout.len()
            );
        }

        match self.parser.parse(&output.stdout) {
            Some(record) => {
                info!(
                    "{} usage: {}% ({}/{} {}) in {:.1}s",
                    self.service,
                    record.percentage,
                    record.current,
                    record.limit,
                    record.unit,
                    started.elapsed().as_secs_f32()
                );
                CollectorOutcome::Success(record)
            }
            None => {
                debug!("{} output had no usage pattern", self.service);
                CollectorOutcome::Failure(CollectError::Unparseable {
                    service: self.service,
                })
            }
        }
    }
}

/// Collector for a service whose CLI has no usage surface
#[derive(Debug, Clone)]
pub struct UnsupportedCollector {
    service: Service,
    reason: String,
}

impl UnsupportedCollector {
    /// Gemini CLI prints no usage information
    pub fn gemini() -> Self {
        Self {
            service: Service::Gemini,
            reason: GEMINI_UNSUPPORTED_REASON.to_string(),
        }
    }

    /// Always fails; no process is spawned
    pub fn collect(&self) -> CollectorOutcome {
        CollectorOutcome::Failure(CollectError::Unsupported {
            service: self.service,
            reason: self.reason.clone(),
        })
    }
}

/// A collector for one service
#[derive(Debug, Clone)]
pub enum Collector {
    Cli(CliCollector),
    Unsupported(UnsupportedCollector),
}

impl Collector {
    /// Default collector for `service`
    pub fn for_service(service: Service) -> Self {
        match service {
            Service::Claude => Collector::Cli(CliCollector::claude()),
            Service::Codex => Collector::Cli(CliCollector::codex()),
            Service::Gemini => Collector::Unsupported(UnsupportedCollector::gemini()),
        }
    }

    /// Service this collector reports on
    pub fn service(&self) -> Service {
        match self {
            Collector::Cli(c) => c.service,
            Collector::Unsupported(c) => c.service,
        }
    }

    /// Apply a timeout (no-op for unsupported services)
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match self {
            Collector::Cli(c) => Collector::Cli(c.with_timeout(timeout)),
            other => other,
        }
    }

    /// Override the executable (no-op for unsupported services)
    pub fn with_program(self, program: impl Into<String>) -> Self {
        match self {
            Collector::Cli(c) => Collector::Cli(c.with_program(program)),
            other => other,
        }
    }

    /// Collect usage once
    pub async fn collect(&self) -> CollectorOutcome {
        match self {
            Collector::Cli(c) => c.collect().await,
            Collector::Unsupported(c) => c.collect(),
        }
    }
}

/// Run several collectors concurrently.
///
/// Results come back in input order, paired with their service.
pub async fn collect_all(collectors: &[Collector]) -> Vec<(Service, CollectorOutcome)> {
    let futures = collectors.iter().map(|collector| async move {
        (collector.service(), collector.collect().await)
    });
    join_all(futures).await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    /// Collector for `service` that runs a shell script instead of the real CLI
    fn scripted(service: Service, script: &str, timeout_ms: u64) -> Collector {
        let base = match service {
            Service::Claude => CliCollector::claude(),
            _ => CliCollector::codex(),
        };
        Collector::Cli(
            base.with_program("sh")
                .with_args(vec!["-c".to_string(), script.to_string()])
                .with_timeout(Duration::from_millis(timeout_ms)),
        )
    }

    fn assert_exclusive(outcome: &CollectorOutcome) {
        assert!(outcome.data().is_some() != outcome.error().is_some());
        assert_eq!(outcome.is_success(), outcome.data().is_some());
    }

    #[test]
    fn test_for_service() {
        assert!(matches!(
            Collector::for_service(Service::Claude),
            Collector::Cli(ref c) if c.program() == "claude"
        ));
        assert!(matches!(
            Collector::for_service(Service::Codex),
            Collector::Cli(ref c) if c.program() == "codex"
        ));
        assert!(matches!(
            Collector::for_service(Service::Gemini),
            Collector::Unsupported(_)
        ));
    }

    #[tokio::test]
    async fn test_claude_success() {
        let collector = scripted(
            Service::Claude,
            "printf 'Current session\\n[bar] 54%% used\\nResets 9pm (Asia/Seoul)\\n'",
            5_000,
        );
        let outcome = collector.collect().await;
        assert_exclusive(&outcome);
        let record = outcome.data().unwrap();
        assert_eq!(record.percentage, 54);
        assert_eq!(record.current, 24);
    }

    #[tokio::test]
    async fn test_claude_reads_command_from_stdin() {
        // Echo stdin back inside a fake panel: proves `/usage` was written
        let collector = scripted(
            Service::Claude,
            "read cmd; [ \"$cmd\" = /usage ] && printf 'Current session\\n 7%% used\\n'",
            5_000,
        );
        let outcome = collector.collect().await;
        assert_eq!(outcome.data().map(|r| r.percentage), Some(7));
    }

    #[tokio::test]
    async fn test_codex_success_with_nonzero_exit() {
        let collector = scripted(Service::Codex, "echo '40/80 messages'; exit 2", 5_000);
        let outcome = collector.collect().await;
        assert_exclusive(&outcome);
        assert_eq!(outcome.data().map(|r| r.current), Some(40));
    }

    #[tokio::test]
    async fn test_timeout_with_partial_data_succeeds() {
        let collector = scripted(Service::Codex, "echo '80% used'; exec sleep 30", 300);
        let started = Instant::now();
        let outcome = collector.collect().await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_exclusive(&outcome);
        let record = outcome.data().unwrap();
        assert_eq!(record.current, 64);
        assert_eq!(record.limit, 80);
    }

    #[tokio::test]
    async fn test_timeout_without_data_is_parse_failure() {
        let collector = scripted(Service::Claude, "exec sleep 30", 200);
        let started = Instant::now();
        let outcome = collector.collect().await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_exclusive(&outcome);
        assert_eq!(outcome.error().map(|e| e.kind()), Some(ErrorKind::ParseFailed));
    }

    #[tokio::test]
    async fn test_unparseable_output() {
        let collector = scripted(Service::Claude, "echo 'Welcome to Claude Code'", 5_000);
        let outcome = collector.collect().await;
        let err = outcome.error().unwrap();
        assert_eq!(err.kind(), ErrorKind::ParseFailed);
        // The transcript is never echoed back
        assert!(!err.to_string().contains("Welcome"));
    }

    #[tokio::test]
    async fn test_process_failure_surfaces_stderr() {
        let collector = scripted(Service::Codex, "echo 'auth required' >&2; exit 1", 5_000);
        let outcome = collector.collect().await;
        let err = outcome.error().unwrap();
        assert_eq!(err.kind(), ErrorKind::ProcessFailed);
        assert_eq!(err.to_string(), "auth required");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_not_found() {
        let collector = Collector::for_service(Service::Claude)
            .with_program("usagemon-no-such-claude")
            .with_timeout(Duration::from_secs(2));
        let outcome = collector.collect().await;
        assert_exclusive(&outcome);
        let err = outcome.error().unwrap();
        assert_eq!(err.kind(), ErrorKind::SpawnNotFound);
        assert_ne!(err.kind(), ErrorKind::ParseFailed);
        assert_ne!(err.kind(), ErrorKind::ProcessFailed);
        assert!(err.to_string().contains("https://docs.claude.com"));
    }

    #[tokio::test]
    async fn test_gemini_always_unsupported() {
        let outcome = Collector::for_service(Service::Gemini).collect().await;
        assert_exclusive(&outcome);
        let err = outcome.error().unwrap();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(err.to_string(), GEMINI_UNSUPPORTED_REASON);
    }

    #[tokio::test]
    async fn test_collect_all_runs_concurrently_in_order() {
        let collectors = vec![
            scripted(Service::Codex, "sleep 0.5; echo '10% used'", 5_000),
            scripted(Service::Claude, "sleep 0.5; echo nothing", 5_000),
            Collector::for_service(Service::Gemini),
        ];
        let started = Instant::now();
        let results = collect_all(&collectors).await;
        // Sequential execution would take at least 1s
        assert!(started.elapsed() < Duration::from_millis(950));

        let services: Vec<Service> = results.iter().map(|(s, _)| *s).collect();
        assert_eq!(services, vec![Service::Codex, Service::Claude, Service::Gemini]);
        assert!(results[0].1.is_success());
        assert!(!results[1].1.is_success());
        assert!(!results[2].1.is_success());
        for (_, outcome) in &results {
            assert_exclusive(outcome);
        }
    }

    #[tokio::test]
    async fn test_outcomes_are_always_exclusive() {
        let scripts = [
            "echo '0% used'",
            "echo '100% remaining'",
            "echo '3/0 messages'",
            "echo '12/12 queries'",
            "printf '\\033[2J\\342\\224\\202 box \\342\\224\\202\\n'",
            "exit 0",
            "exit 7",
            "echo oops >&2; exit 7",
            "printf 'Current session\\n 33%% used\\n'",
        ];
        for script in scripts {
            for service in [Service::Claude, Service::Codex] {
                let outcome = scripted(service, script, 2_000).collect().await;
                assert_exclusive(&outcome);
            }
        }
    }
}
