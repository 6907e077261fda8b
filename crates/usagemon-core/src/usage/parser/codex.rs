//! Parse Codex CLI `/status` output.

use once_cell::sync::Lazy;
use regex::Regex;

use super::parse_percent;
use crate::usage::types::{Service, UsageRecord};

/// Assumed messages per window when only a percentage is printed.
///
/// Taken from the published Plus-tier limit, not from the transcript.
pub const CODEX_WINDOW_LIMIT: u32 = 80;

/// Window label for percentage-derived Codex records
pub const CODEX_WINDOW_UNIT: &str = "messages/3h";

/// Unit for exact `N/M messages` counts
pub const CODEX_COUNT_UNIT: &str = "messages";

static PERCENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)%\s*(?:used|remaining)").unwrap());
static COUNT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*/\s*(\d+)\s*(?:messages?|queries?)").unwrap());

/// Parse `/status` output.
///
/// Lines are scanned in order and the first line carrying either pattern
/// decides the result. On a single line the percentage pattern is tried first.
pub fn parse_codex_usage(text: &str) -> Option<UsageRecord> {
    text.lines().find_map(parse_line)
}

fn parse_line(line: &str) -> Option<UsageRecord> {
    if let Some(caps) = PERCENT_PATTERN.captures(line) {
        if let Some(percentage) = parse_percent(&caps[1]) {
            return Some(UsageRecord::from_percentage(
                Service::Codex,
                percentage,
                CODEX_WINDOW_LIMIT,
                CODEX_WINDOW_UNIT,
            ));
        }
    }

    let caps = COUNT_PATTERN.captures(line)?;
    let current = caps[1].parse::<u32>().ok()?;
    let limit = caps[2].parse::<u32>().ok()?;
    UsageRecord::from_counts(Service::Codex, current, limit, CODEX_COUNT_UNIT)
}
