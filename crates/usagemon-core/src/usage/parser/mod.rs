//! Transcript parsers, one per service that prints usage.
//!
//! Each parser is a pure function from captured text to an optional
//! [`UsageRecord`]; anything it does not recognize is ignored.

mod claude;
mod codex;

pub use claude::{parse_claude_usage, CLAUDE_SESSION_LIMIT, CLAUDE_SESSION_UNIT};
pub use codex::{parse_codex_usage, CODEX_COUNT_UNIT, CODEX_WINDOW_LIMIT, CODEX_WINDOW_UNIT};

use super::types::{Service, UsageRecord};

/// Parsing strategy for a service's transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputParser {
    /// Claude Code `/usage` panel
    Claude,
    /// Codex CLI `/status` output
    Codex,
}

impl OutputParser {
    /// Parser for `service`, if it prints usage at all
    pub fn for_service(service: Service) -> Option<Self> {
        match service {
            Service::Claude => Some(OutputParser::Claude),
            Service::Codex => Some(OutputParser::Codex),
            Service::Gemini => None,
        }
    }

    /// Service whose output this parser understands
    pub fn service(&self) -> Service {
        match self {
            OutputParser::Claude => Service::Claude,
            OutputParser::Codex => Service::Codex,
        }
    }

    /// Extract a usage record from `text`, or `None` if no pattern matched
    pub fn parse(&self, text: &str) -> Option<UsageRecord> {
        match self {
            OutputParser::Claude => parse_claude_usage(text),
            OutputParser::Codex => parse_codex_usage(text),
        }
    }
}

/// Parse a captured decimal as a percentage, clamped to 100
fn parse_percent(digits: &str) -> Option<u8> {
    digits.parse::<u32>().ok().map(|p| p.min(100) as u8)
}
