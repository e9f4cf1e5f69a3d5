use crate::domain::models::validate_fraction;
use crate::infrastructure::client_secrets::DEFAULT_CREDENTIALS_PATH;
use crate::infrastructure::config::DEFAULT_CONFIG_PATH;
use crate::infrastructure::credential_store::DEFAULT_TOKEN_PATH;
use chrono::{Duration, NaiveDate};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Calculate billable usage based on Google Calendar events.
///
/// Events of the current week are matched against the keywords in the config
/// file; the first category with a matching keyword gets the event's time.
#[derive(Debug, Clone, Parser)]
#[command(name = "cal-calc", version, about)]
pub struct Cli {
    /// Config file with the category keywords
    #[arg(long, env = "CALCALC_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Trace every keyword comparison
    #[arg(long)]
    pub debug: bool,

    /// Fraction of the week that should be billable (defaults to the config file, then 0.7)
    #[arg(
        long = "targetUtilization",
        alias = "target-utilization",
        env = "CALCALC_TARGET_UTILIZATION",
        value_parser = parse_fraction
    )]
    pub target_utilization: Option<f64>,

    /// OAuth client secret file downloaded from the Google Cloud console
    #[arg(long, default_value = DEFAULT_CREDENTIALS_PATH)]
    pub credentials: PathBuf,

    /// Where the OAuth token is cached between runs
    #[arg(long, default_value = DEFAULT_TOKEN_PATH)]
    pub token: PathBuf,

    /// Report on the week containing this date (YYYY-MM-DD) instead of today
    #[arg(long, value_parser = parse_week_date)]
    pub week: Option<NaiveDate>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

fn parse_fraction(value: &str) -> Result<f64, String> {
    let parsed = value
        .trim()
        .parse::<f64>()
        .map_err(|error| format!("'{value}' is not a number: {error}"))?;
    validate_fraction(parsed, "target utilization")?;
    Ok(parsed)
}

fn parse_week_date(value: &str) -> Result<NaiveDate, String> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|error| format!("'{value}' is not a YYYY-MM-DD date: {error}"))?;
    // Any start day must leave a whole week on either side.
    let margin = Duration::days(14);
    if date.checked_sub_signed(margin).is_none() || date.checked_add_signed(margin).is_none() {
        return Err(format!("'{value}' is too close to the edge of the supported date range"));
    }
    Ok(date)
}
