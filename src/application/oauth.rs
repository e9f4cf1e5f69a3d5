use crate::domain::models::OAuthToken;
use crate::infrastructure::client_secrets::ClientSecrets;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::oauth_client::{
    OAuthCodeExchangeRequest, OAuthHttpClient, OAuthRefreshRequest, OAuthTokenResponse,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";
const TOKEN_LEEWAY_SECONDS: i64 = 60;

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub token_endpoint: String,
    pub authorization_endpoint: String,
}

impl OAuthConfig {
    pub fn from_client_secrets(secrets: ClientSecrets) -> Self {
        Self {
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
            redirect_uri: secrets.redirect_uri,
            scopes: vec![CALENDAR_READONLY_SCOPE.to_string()],
            token_endpoint: secrets
                .token_endpoint
                .unwrap_or_else(|| DEFAULT_TOKEN_ENDPOINT.to_string()),
            authorization_endpoint: secrets
                .authorization_endpoint
                .unwrap_or_else(|| DEFAULT_AUTHORIZATION_ENDPOINT.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    Stored(OAuthToken),
    Refreshed(OAuthToken),
    AuthorizationRequired,
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    config: OAuthConfig,
    credential_store: Arc<S>,
    oauth_client: Arc<C>,
    now_provider: NowProvider,
}

impl<S, C> OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    pub fn new(config: OAuthConfig, credential_store: Arc<S>, oauth_client: Arc<C>) -> Self {
        Self {
            config,
            credential_store,
            oauth_client,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn build_authorization_url(&self, state: &str) -> Result<String, InfraError> {
        if state.trim().is_empty() {
            return Err(InfraError::OAuth("state must not be empty".to_string()));
        }
        if self.config.scopes.is_empty() {
            return Err(InfraError::OAuth("at least one scope is required".to_string()));
        }

        let mut url = Url::parse(&self.config.authorization_endpoint)
            .map_err(|error| InfraError::OAuth(format!("invalid authorization endpoint: {error}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);

        Ok(url.to_string())
    }

    pub async fn authenticate_with_code(&self, authorization_code: &str) -> Result<OAuthToken, InfraError> {
        let authorization_code = authorization_code.trim();
        if authorization_code.is_empty() {
            return Err(InfraError::OAuth("authorization code must not be empty".to_string()));
        }

        let request = OAuthCodeExchangeRequest {
            token_endpoint: self.config.token_endpoint.clone(),
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            redirect_uri: self.config.redirect_uri.clone(),
            authorization_code: authorization_code.to_string(),
        };
        let response = self.oauth_client.exchange_authorization_code(request).await?;
        self.persist(response, None)
    }

    pub async fn current_token(&self) -> Result<TokenState, InfraError> {
        let Some(stored_token) = self.credential_store.load_token()? else {
            debug!("no stored oauth token");
            return Ok(TokenState::AuthorizationRequired);
        };

        if stored_token.is_valid_at((self.now_provider)(), TOKEN_LEEWAY_SECONDS) {
            return Ok(TokenState::Stored(stored_token));
        }

        let Some(refresh_token) = stored_token.refresh_token.clone() else {
            debug!("stored oauth token expired and has no refresh token");
            return Ok(TokenState::AuthorizationRequired);
        };

        let request = OAuthRefreshRequest {
            token_endpoint: self.config.token_endpoint.clone(),
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            refresh_token: refresh_token.clone(),
        };
        match self.oauth_client.refresh_access_token(request).await {
            Ok(response) => self
                .persist(response, Some(refresh_token))
                .map(TokenState::Refreshed),
            Err(InfraError::OAuth(message)) => {
                warn!(%message, "refreshing oauth token failed; authorization required");
                Ok(TokenState::AuthorizationRequired)
            }
            Err(error) => Err(error),
        }
    }

    // Google omits the refresh token on refresh responses; the previous one stays valid.
    fn persist(
        &self,
        response: OAuthTokenResponse,
        previous_refresh_token: Option<String>,
    ) -> Result<OAuthToken, InfraError> {
        let token = OAuthToken {
            expires_at: (self.now_provider)() + Duration::seconds(response.expires_in.max(0)),
            refresh_token: response.refresh_token.or(previous_refresh_token),
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            access_token: response.access_token,
            scope: response.scope,
        };
        self.credential_store.save_token(&token)?;
        Ok(token)
    }

    fn next_state(&self) -> String {
        format!("cal-calc-{}", (self.now_provider)().timestamp_micros())
    }
}

/// Shows the consent URL and returns whatever the user pasted back.
pub trait AuthorizationPrompt {
    fn request_authorization_code(&self, authorization_url: &str) -> Result<String, InfraError>;
}

#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl AuthorizationPrompt for TerminalPrompt {
    fn request_authorization_code(&self, authorization_url: &str) -> Result<String, InfraError> {
        eprintln!(
            "Go to the following link in your browser, approve access, then paste the \
             authorization code or the full redirected URL:\n{authorization_url}\n"
        );
        inquire::Text::new("Authorization code:")
            .prompt()
            .map_err(|error| InfraError::OAuth(format!("unable to read authorization code: {error}")))
    }
}

/// Accepts either the bare code or the URL the browser was redirected to.
pub fn extract_authorization_code(input: &str, expected_state: &str) -> Result<String, InfraError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(InfraError::OAuth("authorization code must not be empty".to_string()));
    }

    let Ok(url) = Url::parse(input) else {
        return Ok(input.to_string());
    };
    if !matches!(url.scheme(), "http" | "https") {
        return Ok(input.to_string());
    }

    let lookup = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };

    if let Some(error) = lookup("error") {
        return Err(InfraError::OAuth(format!("authorization was denied: {error}")));
    }
    if let Some(state) = lookup("state") {
        if state != expected_state {
            return Err(InfraError::OAuth(
                "authorization response state does not match this request".to_string(),
            ));
        }
    }
    lookup("code")
        .filter(|code| !code.trim().is_empty())
        .ok_or_else(|| InfraError::OAuth("redirected URL does not contain a code".to_string()))
}

/// Returns a usable access token, running the interactive consent flow when nothing valid is stored.
pub async fn authorize<S, C, P>(manager: &OAuthManager<S, C>, prompt: &P) -> Result<String, InfraError>
where
    S: CredentialStore,
    C: OAuthHttpClient,
    P: AuthorizationPrompt,
{
    match manager.current_token().await? {
        TokenState::Stored(token) => Ok(token.access_token),
        TokenState::Refreshed(token) => {
            info!(expires_at = %token.expires_at.to_rfc3339(), "refreshed oauth token");
            Ok(token.access_token)
        }
        TokenState::AuthorizationRequired => {
            let state = manager.next_state();
            let authorization_url = manager.build_authorization_url(&state)?;
            let input = prompt.request_authorization_code(&authorization_url)?;
            let code = extract_authorization_code(&input, &state)?;
            let token = manager.authenticate_with_code(&code).await?;
            info!("stored new oauth token");
            Ok(token.access_token)
        }
    }
}
