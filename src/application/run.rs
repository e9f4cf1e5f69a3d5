use crate::application::oauth::{OAuthConfig, OAuthManager, TerminalPrompt, authorize};
use crate::application::render::{render_json, render_text};
use crate::application::week::{ReportWindow, today_in, week_window};
use crate::application::weekly_report::WeeklyReportService;
use crate::cli::{Cli, OutputFormat};
use crate::domain::models::ReportSettings;
use crate::infrastructure::client_secrets::load_client_secrets;
use crate::infrastructure::config::{AppConfig, CredentialStoreKind, WeekStart, load_config};
use crate::infrastructure::credential_store::{
    AnyCredentialStore, FileCredentialStore, KeyringCredentialStore,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_calendar_client::ReqwestGoogleCalendarClient;
use crate::infrastructure::oauth_client::ReqwestOAuthClient;
use chrono::{Local, NaiveDate, TimeZone, Utc};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Configuration(InfraError),
    #[error("authentication error: {0}")]
    Authentication(InfraError),
    #[error("unable to retrieve events: {0}")]
    Retrieval(InfraError),
    #[error("unable to render report: {0}")]
    Output(String),
}

/// Logs go to stderr so the report on stdout stays pipeable. `RUST_LOG` wins over `--debug`.
pub fn init_logging(debug: bool) {
    let default_directive = if debug { "cal_calc=debug" } else { "cal_calc=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub async fn run(cli: Cli) -> Result<(), RunError> {
    init_logging(cli.debug);

    let config = load_config(&cli.config).map_err(RunError::Configuration)?;
    debug!(
        path = %cli.config.display(),
        categories = config.rules.categories().len(),
        "loaded config"
    );
    let settings = report_settings(&cli, &config)?;
    let window = report_window(cli.week, &config)?;
    info!(
        start = %window.start.to_rfc3339(),
        end = %window.end.to_rfc3339(),
        target_utilization = settings.target_utilization,
        "building weekly report"
    );

    let secrets = load_client_secrets(&cli.credentials).map_err(RunError::Authentication)?;
    let store = credential_store(config.credential_store, &cli.token);
    let manager = OAuthManager::new(
        OAuthConfig::from_client_secrets(secrets),
        Arc::new(store),
        Arc::new(ReqwestOAuthClient::new()),
    );
    let access_token = authorize(&manager, &TerminalPrompt)
        .await
        .map_err(RunError::Authentication)?;

    let service = WeeklyReportService::new(
        Arc::new(ReqwestGoogleCalendarClient::new()),
        config.rules,
        config.seed,
        settings,
    );
    let report = service
        .build_report(&access_token, &window)
        .await
        .map_err(RunError::Retrieval)?;

    let rendered = match cli.format {
        OutputFormat::Text => render_text(&report, &window),
        OutputFormat::Json => {
            let json = render_json(&report, &window)
                .map_err(|error| RunError::Output(error.to_string()))?;
            format!("{json}\n")
        }
    };
    print!("{rendered}");
    Ok(())
}

/// The flag (or its env var) wins over the config file, which wins over the built-in default.
fn report_settings(cli: &Cli, config: &AppConfig) -> Result<ReportSettings, RunError> {
    let defaults = ReportSettings::default();
    let settings = ReportSettings {
        target_utilization: cli
            .target_utilization
            .or(config.target_utilization)
            .unwrap_or(defaults.target_utilization),
        count_out_of_office: config.count_out_of_office,
        debug: cli.debug,
    };
    settings
        .validate()
        .map_err(|message| RunError::Configuration(InfraError::InvalidConfig(message)))?;
    Ok(settings)
}

fn report_window(week: Option<NaiveDate>, config: &AppConfig) -> Result<ReportWindow, RunError> {
    match config.timezone {
        Some(zone) => window_in(week, config.week_start, &zone),
        None => window_in(week, config.week_start, &Local),
    }
}

fn window_in<Z: TimeZone>(
    week: Option<NaiveDate>,
    week_start: WeekStart,
    zone: &Z,
) -> Result<ReportWindow, RunError> {
    let day = week.unwrap_or_else(|| today_in(Utc::now(), zone));
    week_window(day, week_start.weekday(), zone)
        .map_err(|message| RunError::Configuration(InfraError::InvalidConfig(message)))
}

fn credential_store(kind: CredentialStoreKind, token_path: &Path) -> AnyCredentialStore {
    match kind {
        CredentialStoreKind::File => AnyCredentialStore::File(FileCredentialStore::new(token_path)),
        CredentialStoreKind::Keyring => {
            AnyCredentialStore::Keyring(KeyringCredentialStore::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::parse_config;
    use chrono::Duration;
    use clap::Parser;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["cal-calc"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("parse cli")
    }

    fn config(raw: &str) -> AppConfig {
        parse_config(raw).expect("config")
    }

    #[test]
    fn target_utilization_prefers_flag_then_config_then_default() {
        let with_target = config("targetUtilization: 0.6\nkeywords:\n  Billable: [Visby]\n");
        let without_target = config("keywords:\n  Billable: [Visby]\n");

        let from_flag = report_settings(&cli(&["--targetUtilization", "0.9"]), &with_target)
            .expect("settings");
        assert_eq!(from_flag.target_utilization, 0.9);

        let from_config = report_settings(&cli(&[]), &with_target).expect("settings");
        assert_eq!(from_config.target_utilization, 0.6);

        let from_default = report_settings(&cli(&["--debug"]), &without_target).expect("settings");
        assert_eq!(from_default.target_utilization, 0.7);
        assert!(from_default.debug);
        assert!(from_default.count_out_of_office);
    }

    #[test]
    fn explicit_week_uses_configured_zone_and_start_day() {
        let berlin = config("timezone: Europe/Berlin\nweekStart: sunday\nkeywords:\n  Billable: [Visby]\n");
        let window = report_window(NaiveDate::from_ymd_opt(2026, 2, 18), &berlin).expect("window");

        assert_eq!(window.first_day, NaiveDate::from_ymd_opt(2026, 2, 15).expect("date"));
        assert_eq!(window.start.to_rfc3339(), "2026-02-14T23:00:00+00:00");
        assert_eq!(window.end - window.start, Duration::days(7));
    }

    #[test]
    fn unrepresentable_week_is_a_configuration_error() {
        let utc = config("timezone: UTC\nkeywords:\n  Billable: [Visby]\n");
        let result = report_window(Some(NaiveDate::MAX), &utc);
        assert!(matches!(result, Err(RunError::Configuration(InfraError::InvalidConfig(_)))));
    }

    #[test]
    fn file_store_uses_token_flag_path() {
        match credential_store(CredentialStoreKind::File, Path::new("custom-token.json")) {
            AnyCredentialStore::File(store) => {
                assert_eq!(store.path(), Path::new("custom-token.json"))
            }
            AnyCredentialStore::Keyring(_) => panic!("expected file store"),
        }
        assert!(matches!(
            credential_store(CredentialStoreKind::Keyring, Path::new("ignored")),
            AnyCredentialStore::Keyring(_)
        ));
    }

    #[tokio::test]
    async fn missing_config_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.yaml");
        let path_arg = path.to_string_lossy().to_string();

        let result = run(cli(&["--config", &path_arg])).await;

        match result {
            Err(RunError::Configuration(error)) => {
                assert!(error.to_string().contains("missing.yaml"))
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_config_stops_before_authentication() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "keywords:\n  Billable: ['  ']").expect("write config");
        let path_arg = file.path().to_string_lossy().to_string();

        let result = run(cli(&["--config", &path_arg, "--credentials", "/nonexistent/credentials.json"])).await;

        assert!(matches!(result, Err(RunError::Configuration(_))));
    }
}
