use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OAuthCodeExchangeRequest {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorization_code: String,
}

#[derive(Debug, Clone)]
pub struct OAuthRefreshRequest {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

#[async_trait]
pub trait OAuthHttpClient: Send + Sync {
    async fn exchange_authorization_code(
        &self,
        request: OAuthCodeExchangeRequest,
    ) -> Result<OAuthTokenResponse, InfraError>;

    async fn refresh_access_token(
        &self,
        request: OAuthRefreshRequest,
    ) -> Result<OAuthTokenResponse, InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestOAuthClient {
    client: Client,
}

#[derive(Debug, serde::Deserialize)]
struct TokenEndpointPayload {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl ReqwestOAuthClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    async fn request_token(
        &self,
        grant: &str,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<OAuthTokenResponse, InfraError> {
        debug!(grant, endpoint, "requesting oauth token");
        let response = self
            .client
            .post(endpoint)
            .form(params)
            .send()
            .await
            .map_err(|error| InfraError::Network(format!("{grant} request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Network(format!("failed reading token response: {error}")))?;

        // A 5xx is an outage, not a verdict on the grant.
        let payload = serde_json::from_str::<TokenEndpointPayload>(&body).map_err(|error| {
            let message = format!("invalid token response payload (http {}): {error}", status.as_u16());
            if status.is_server_error() {
                InfraError::Network(message)
            } else {
                InfraError::OAuth(message)
            }
        })?;

        if let Some(code) = payload.error {
            let detail = payload.error_description.unwrap_or_default();
            return Err(InfraError::OAuth(format!("token endpoint error: {code}; {detail}")));
        }
        if status.is_server_error() {
            return Err(InfraError::Network(format!(
                "token endpoint unavailable: http {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(InfraError::OAuth(format!(
                "token endpoint error: http {}",
                status.as_u16()
            )));
        }

        let access_token = payload
            .access_token
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| InfraError::OAuth("token response did not include access_token".to_string()))?;

        Ok(OAuthTokenResponse {
            access_token,
            refresh_token: payload.refresh_token,
            expires_in: payload.expires_in.unwrap_or(0).max(0),
            token_type: payload.token_type,
            scope: payload.scope,
        })
    }
}

#[async_trait]
impl OAuthHttpClient for ReqwestOAuthClient {
    async fn exchange_authorization_code(
        &self,
        request: OAuthCodeExchangeRequest,
    ) -> Result<OAuthTokenResponse, InfraError> {
        self.request_token(
            "authorization_code",
            &request.token_endpoint,
            &[
                ("grant_type", "authorization_code"),
                ("client_id", &request.client_id),
                ("client_secret", &request.client_secret),
                ("redirect_uri", &request.redirect_uri),
                ("code", &request.authorization_code),
            ],
        )
        .await
    }

    async fn refresh_access_token(
        &self,
        request: OAuthRefreshRequest,
    ) -> Result<OAuthTokenResponse, InfraError> {
        self.request_token(
            "refresh_token",
            &request.token_endpoint,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", &request.client_id),
                ("client_secret", &request.client_secret),
                ("refresh_token", &request.refresh_token),
            ],
        )
        .await
    }
}
