use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("OAuth error: {0}")]
    OAuth(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Credential store error: {0}")]
    Credential(String),
    #[error("Calendar API error: {0}")]
    CalendarApi(String),
}
