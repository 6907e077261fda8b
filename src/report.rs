//! Render collection outcomes for the terminal.

use serde::Serialize;
use usagemon_core::{CollectorOutcome, Service, UsageRecord};

use crate::config::ServicesSettings;

/// One line of JSON output
#[derive(Debug, Serialize)]
struct ServiceReport<'a> {
    service: Service,
    #[serde(flatten)]
    outcome: &'a CollectorOutcome,
}

/// Render outcomes as a pretty-printed JSON array
pub fn render_json(results: &[(Service, CollectorOutcome)]) -> serde_json::Result<String> {
    let reports: Vec<ServiceReport<'_>> = results
        .iter()
        .map(|(service, outcome)| ServiceReport {
            service: *service,
            outcome,
        })
        .collect();
    serde_json::to_string_pretty(&reports)
}

/// Render outcomes as plain text, one block per service
pub fn render_text(results: &[(Service, CollectorOutcome)], services: &ServicesSettings) -> String {
    let mut out = String::new();
    for (service, outcome) in results {
        let settings = services.get(*service);
        let header = if settings.icon.is_empty() {
            settings.label(*service).to_string()
        } else {
            format!("{} {}", settings.icon, settings.label(*service))
        };
        out.push_str(&header);
        out.push('\n');

        match outcome {
            CollectorOutcome::Success(record) => out.push_str(&format_record(record)),
            CollectorOutcome::Failure(err) => out.push_str(&format!("  error: {}\n", err)),
        }
        out.push('\n');
    }
    out
}

fn format_record(record: &UsageRecord) -> String {
    let estimate = if record.estimated { " (estimated)" } else { "" };
    let mut text = format!(
        "  {}/{} {} ({}%){}\n",
        record.current, record.limit, record.unit, record.percentage, estimate
    );
    if let Some(reset) = record.reset_date {
        text.push_str(&format!(
            "  resets: {}\n",
            reset.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
        ));
    }
    text.push_str(&format!(
        "  checked: {}\n",
        record.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S")
    ));
    text
}
