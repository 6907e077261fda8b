//! Usage data types produced by a collection run.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::CollectError;

/// Upstream tool a usage record was collected from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Claude,
    Codex,
    Gemini,
}

impl Service {
    /// All known services, in display order
    pub const ALL: [Service; 3] = [Service::Claude, Service::Codex, Service::Gemini];

    /// Lowercase identifier used in config files and on the command line
    pub fn id(&self) -> &'static str {
        match self {
            Service::Claude => "claude",
            Service::Codex => "codex",
            Service::Gemini => "gemini",
        }
    }

    /// Human-facing product name
    pub fn display_name(&self) -> &'static str {
        match self {
            Service::Claude => "Claude",
            Service::Codex => "Codex",
            Service::Gemini => "Gemini",
        }
    }

    /// Where to install the CLI from, for services that have one
    pub fn install_url(&self) -> Option<&'static str> {
        match self {
            Service::Claude => Some("https://docs.claude.com/en/docs/claude-code"),
            Service::Codex => Some("https://www.openai.com/codex"),
            Service::Gemini => None,
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Service::ALL
            .into_iter()
            .find(|service| service.id() == lower)
            .ok_or_else(|| format!("unknown service '{}' (expected claude, codex or gemini)", s))
    }
}

/// Normalized usage for one service at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    /// Which tool produced the transcript
    pub service: Service,
    /// Units consumed in the current window (exact or estimated)
    pub current: u32,
    /// Ceiling for the window (always > 0)
    pub limit: u32,
    /// Window label, e.g. "messages/5h"
    pub unit: String,
    /// Percentage used (0-100)
    pub percentage: u8,
    /// When the window resets, if the transcript phrase could be resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_date: Option<DateTime<Utc>>,
    /// When the record was produced
    pub timestamp: DateTime<Utc>,
    /// `current`/`limit` are derived from a percentage and an assumed limit
    pub estimated: bool,
}

impl UsageRecord {
    /// Build a record from a percentage read off the transcript.
    ///
    /// `current` is an estimate against `assumed_limit`.
    pub fn from_percentage(service: Service, percentage: u8, assumed_limit: u32, unit: &str) -> Self {
        let percentage = percentage.min(100);
        let current = (f64::from(percentage) / 100.0 * f64::from(assumed_limit)).round() as u32;
        Self {
            service,
            current,
            limit: assumed_limit,
            unit: unit.to_string(),
            percentage,
            reset_date: None,
            timestamp: Utc::now(),
            estimated: true,
        }
    }

    /// Build a record from an exact `current / limit` count.
    ///
    /// Returns `None` for a zero limit.
    pub fn from_counts(service: Service, current: u32, limit: u32, unit: &str) -> Option<Self> {
        if limit == 0 {
            return None;
        }
        let ratio = f64::from(current) / f64::from(limit) * 100.0;
        Some(Self {
            service,
            current,
            limit,
            unit: unit.to_string(),
            percentage: ratio.round().min(100.0) as u8,
            reset_date: None,
            timestamp: Utc::now(),
            estimated: false,
        })
    }

    /// Attach a resolved reset time
    pub fn with_reset_date(mut self, reset_date: Option<DateTime<Utc>>) -> Self {
        self.reset_date = reset_date;
        self
    }
}

/// Result of a single `collect()` call.
///
/// Holds either a record or a classified error, never both.
#[derive(Debug, Clone)]
pub enum CollectorOutcome {
    Success(UsageRecord),
    Failure(CollectError),
}

impl CollectorOutcome {
    /// Whether the collection produced a record
    pub fn is_success(&self) -> bool {
        matches!(self, CollectorOutcome::Success(_))
    }

    /// The record, present iff successful
    pub fn data(&self) -> Option<&UsageRecord> {
        match self {
            CollectorOutcome::Success(record) => Some(record),
            CollectorOutcome::Failure(_) => None,
        }
    }

    /// The error, present iff not successful
    pub fn error(&self) -> Option<&CollectError> {
        match self {
            CollectorOutcome::Success(_) => None,
            CollectorOutcome::Failure(err) => Some(err),
        }
    }
}

impl From<Result<UsageRecord, CollectError>> for CollectorOutcome {
    fn from(result: Result<UsageRecord, CollectError>) -> Self {
        match result {
            Ok(record) => CollectorOutcome::Success(record),
            Err(err) => CollectorOutcome::Failure(err),
        }
    }
}

// Wire shape: {"success": true, "data": {...}} or {"success": false, "error": "..."}
impl Serialize for CollectorOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("CollectorOutcome", 2)?;
        state.serialize_field("success", &self.is_success())?;
        match self {
            CollectorOutcome::Success(record) => state.serialize_field("data", record)?,
            CollectorOutcome::Failure(err) => state.serialize_field("error", &err.to_string())?,
        }
        state.end()
    }
}
