use crate::application::week::ReportWindow;
use crate::domain::models::Anomaly;
use crate::domain::report::Report;
use chrono::Duration;
use serde::Serialize;
use std::fmt::Write;

const HEADER_DATE_FORMAT: &str = "%A, %B %-d";

/// Compact `5h30m` style. Seconds only appear when the duration has any.
pub fn format_duration(duration: Duration) -> String {
    let sign = if duration < Duration::zero() { "-" } else { "" };
    let total_seconds = duration.num_milliseconds().saturating_abs().saturating_add(500) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let mut out = String::from(sign);
    if hours > 0 {
        let _ = write!(out, "{hours}h");
    }
    if minutes > 0 || (hours == 0 && seconds == 0) {
        let _ = write!(out, "{minutes}m");
    }
    if seconds > 0 {
        let _ = write!(out, "{seconds}s");
    }
    out
}

pub fn render_text(report: &Report, window: &ReportWindow) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Parsing events between {} and {}\n",
        window.first_day.format(HEADER_DATE_FORMAT),
        window.last_day.format(HEADER_DATE_FORMAT)
    );

    if report.no_categorized_time {
        let _ = writeln!(out, "No categorized time found.\n");
    }

    let _ = writeln!(out, "Total time: {}\n", format_duration(report.total));
    for (category, duration) in report.allocation.iter() {
        let _ = writeln!(out, "{category} at {}", format_duration(duration));
    }

    if !report.unmatched.is_empty() {
        let _ = writeln!(out, "\nUnmatched events:");
        for title in &report.unmatched {
            let _ = writeln!(out, "  {title}");
        }
    }

    if !report.anomalies.is_empty() {
        let _ = writeln!(out, "\nWarnings:");
        for anomaly in &report.anomalies {
            let _ = writeln!(out, "  {}: {}", anomaly.title, anomaly.reason);
        }
    }

    let _ = writeln!(
        out,
        "\nBillable usage is at {:.0}%",
        report.billable_fraction * 100.0
    );
    if let Some(shortfall) = report.shortfall {
        let _ = writeln!(
            out,
            "{} more of your hours should be billable",
            format_duration(shortfall)
        );
    }

    if let Some(remaining) = report.remaining_week {
        let _ = writeln!(out, "\n{} left in the week", format_duration(remaining));
    }

    out
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryView {
    pub name: String,
    pub hours: f64,
}

/// Machine-readable form of [`Report`]. Durations are fractional hours.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub window_start: String,
    pub window_end: String,
    pub total_hours: f64,
    pub categories: Vec<CategoryView>,
    pub unmatched: Vec<String>,
    pub anomalies: Vec<Anomaly>,
    pub billable_fraction: f64,
    pub target_utilization: f64,
    pub no_categorized_time: bool,
    pub shortfall_hours: Option<f64>,
    pub remaining_hours: Option<f64>,
}

impl ReportView {
    pub fn new(report: &Report, window: &ReportWindow) -> Self {
        Self {
            window_start: window.start.to_rfc3339(),
            window_end: window.end.to_rfc3339(),
            total_hours: hours(report.total),
            categories: report
                .allocation
                .iter()
                .map(|(name, duration)| CategoryView {
                    name: name.to_string(),
                    hours: hours(duration),
                })
                .collect(),
            unmatched: report.unmatched.clone(),
            anomalies: report.anomalies.clone(),
            billable_fraction: report.billable_fraction,
            target_utilization: report.target_utilization,
            no_categorized_time: report.no_categorized_time,
            shortfall_hours: report.shortfall.map(hours),
            remaining_hours: report.remaining_week.map(hours),
        }
    }
}

pub fn render_json(report: &Report, window: &ReportWindow) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ReportView::new(report, window))
}

fn hours(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 3_600_000.0
}
