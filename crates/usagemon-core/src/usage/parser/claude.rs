//! Parse the Claude Code `/usage` panel.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::parse_percent;
use crate::usage::types::{Service, UsageRecord};

/// Assumed messages per session window.
///
/// Taken from the published Pro-tier limit, not from the transcript.
pub const CLAUDE_SESSION_LIMIT: u32 = 45;

/// Window label for Claude session records
pub const CLAUDE_SESSION_UNIT: &str = "messages/5h";

const SESSION_MARKER: &str = "Current session";

/// Lines after the marker that may hold the bar and reset line
const LOOKAHEAD_LINES: usize = 4;

static PERCENT_USED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(\d+)%\s*used").unwrap());

/// Parse `/usage` output into a session record.
///
/// Expected format (other meters after the session block are ignored):
/// ```text
///   Current session
///   ████████████████████████████████████               54% used
///   Resets 9pm (Asia/Seoul)
///
///   Current week (all models)
///   ███████████▌                                       51% used
///   Resets Oct 15, 8pm (Asia/Seoul)
/// ```
pub fn parse_claude_usage(text: &str) -> Option<UsageRecord> {
    let lines: Vec<&str> = text.lines().collect();
    let marker = lines.iter().position(|l| l.contains(SESSION_MARKER))?;

    let mut percentage = None;
    let mut reset_info = None;

    for line in lines.iter().skip(marker + 1).take(LOOKAHEAD_LINES) {
        if let Some(caps) = PERCENT_USED.captures(line) {
            if let Some(p) = parse_percent(&caps[1]) {
                percentage = Some(p);
            }
        }
        if line.contains("Resets") || line.contains("resets") {
            reset_info = Some(line.trim());
        }
    }

    let record = UsageRecord::from_percentage(
        Service::Claude,
        percentage?,
        CLAUDE_SESSION_LIMIT,
        CLAUDE_SESSION_UNIT,
    );
    Some(record.with_reset_date(resolve_reset_date(reset_info)))
}

/// Resolve a reset phrase like "Resets Oct 15, 8pm (Asia/Seoul)" to an instant.
///
/// Always `None` for now: the phrase mixes a wall-clock time with an IANA zone
/// name and omits the date for same-day resets, so there is no reliable anchor.
fn resolve_reset_date(_reset_info: Option<&str>) -> Option<DateTime<Utc>> {
    None
}
