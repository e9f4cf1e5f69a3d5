use crate::infrastructure::error::InfraError;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/oauth2/callback";

/// OAuth client registration, as downloaded from the Google Cloud console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorization_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecretsSection>,
    web: Option<ClientSecretsSection>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsSection {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

/// Reads `path`; when the file does not exist, falls back to environment variables.
pub fn load_client_secrets(path: &Path) -> Result<ClientSecrets, InfraError> {
    load_client_secrets_with_lookup(path, |key| std::env::var(key).ok())
}

pub fn load_client_secrets_with_lookup<F>(path: &Path, lookup: F) -> Result<ClientSecrets, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    match fs::read_to_string(path) {
        Ok(raw) => {
            let mut secrets = parse_client_secrets(&raw).map_err(|error| {
                InfraError::InvalidConfig(format!(
                    "unable to parse client secret file {}: {error}",
                    path.display()
                ))
            })?;
            if let Some(redirect_uri) = optional_lookup_value(
                &lookup,
                &["CALCALC_GOOGLE_REDIRECT_URI", "GOOGLE_REDIRECT_URI"],
            ) {
                secrets.redirect_uri = redirect_uri;
            }
            Ok(secrets)
        }
        Err(error) if error.kind() == ErrorKind::NotFound => client_secrets_from_lookup(&lookup)
            .map_err(|lookup_error| {
                InfraError::InvalidConfig(format!(
                    "unable to read client secret file {}: {error}; {lookup_error}",
                    path.display()
                ))
            }),
        Err(error) => Err(InfraError::InvalidConfig(format!(
            "unable to read client secret file {}: {error}",
            path.display()
        ))),
    }
}

pub fn parse_client_secrets(raw: &str) -> Result<ClientSecrets, InfraError> {
    let parsed: ClientSecretsFile = serde_json::from_str(raw)?;
    let section = parsed.installed.or(parsed.web).ok_or_else(|| {
        InfraError::InvalidConfig("expected an \"installed\" or \"web\" client section".to_string())
    })?;

    if section.client_id.trim().is_empty() {
        return Err(InfraError::InvalidConfig("client_id must not be empty".to_string()));
    }

    let redirect_uri = section
        .redirect_uris
        .iter()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

    Ok(ClientSecrets {
        client_id: section.client_id.trim().to_string(),
        client_secret: section.client_secret.trim().to_string(),
        redirect_uri,
        authorization_endpoint: non_empty(section.auth_uri),
        token_endpoint: non_empty(section.token_uri),
    })
}

fn client_secrets_from_lookup<F>(lookup: &F) -> Result<ClientSecrets, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let client_id = required_lookup_value(
        lookup,
        &["CALCALC_GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_ID"],
        "google client id",
    )?;
    let client_secret = required_lookup_value(
        lookup,
        &["CALCALC_GOOGLE_CLIENT_SECRET", "GOOGLE_CLIENT_SECRET"],
        "google client secret",
    )?;
    let redirect_uri = optional_lookup_value(
        lookup,
        &["CALCALC_GOOGLE_REDIRECT_URI", "GOOGLE_REDIRECT_URI"],
    )
    .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

    Ok(ClientSecrets {
        client_id,
        client_secret,
        redirect_uri,
        authorization_endpoint: None,
        token_endpoint: None,
    })
}

fn required_lookup_value<F>(lookup: &F, keys: &[&str], field_name: &str) -> Result<String, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    optional_lookup_value(lookup, keys).ok_or_else(|| {
        InfraError::InvalidConfig(format!(
            "missing {} (set one of: {})",
            field_name,
            keys.join(", ")
        ))
    })
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
