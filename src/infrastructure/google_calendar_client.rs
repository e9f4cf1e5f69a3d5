use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::GoogleCalendarEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::debug;
use url::Url;

pub const PRIMARY_CALENDAR_ID: &str = "primary";
const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";
const MAX_RESULTS_PER_PAGE: &str = "250";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEventsRequest {
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
}

#[async_trait]
pub trait GoogleCalendarClient: Send + Sync {
    /// Single instances in `[time_min, time_max)`, deleted events excluded, ordered by start time.
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: ListEventsRequest,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestGoogleCalendarClient {
    client: Client,
    base_url: String,
}

impl Default for ReqwestGoogleCalendarClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestGoogleCalendarClient {
    pub fn new() -> Self {
        Self::with_base_url(CALENDAR_API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            client: Client::new(),
            base_url,
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::CalendarApi(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("google calendar api error: http {}", status.as_u16())
        } else {
            format!("google calendar api error: http {}; body={body}", status.as_u16())
        };
        InfraError::CalendarApi(message)
    }

    fn events_endpoint(&self, calendar_id: &str) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.base_url).map_err(|error| {
            InfraError::CalendarApi(format!("invalid calendar api base url: {error}"))
        })?;
        url.path_segments_mut()
            .map_err(|_| InfraError::CalendarApi("calendar api base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("calendars")
            .push(calendar_id)
            .push("events");
        Ok(url)
    }
}

#[derive(Debug, serde::Deserialize)]
struct EventsPageResponse {
    items: Option<Vec<GoogleCalendarEvent>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[async_trait]
impl GoogleCalendarClient for ReqwestGoogleCalendarClient {
    async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: ListEventsRequest,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError> {
        Self::ensure_non_empty(access_token, "access token")?;
        Self::ensure_non_empty(calendar_id, "calendar id")?;

        let endpoint = self.events_endpoint(calendar_id)?;
        let time_min = request.time_min.to_rfc3339();
        let time_max = request.time_max.to_rfc3339();
        let mut page_token: Option<String> = None;
        let mut events = Vec::new();

        loop {
            let mut req = self
                .client
                .get(endpoint.clone())
                .bearer_auth(access_token)
                .query(&[
                    ("showDeleted", "false"),
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                    ("maxResults", MAX_RESULTS_PER_PAGE),
                    ("timeMin", time_min.as_str()),
                    ("timeMax", time_max.as_str()),
                ]);
            if let Some(page_token) = page_token.as_deref() {
                req = req.query(&[("pageToken", page_token)]);
            }

            let response = req.send().await.map_err(|error| {
                InfraError::Network(format!("listing calendar events failed: {error}"))
            })?;

            let status = response.status();
            let body = response.text().await.map_err(|error| {
                InfraError::Network(format!("failed reading events list response: {error}"))
            })?;

            if !status.is_success() {
                return Err(Self::http_error(status, &body));
            }

            let mut parsed: EventsPageResponse = serde_json::from_str(&body).map_err(|error| {
                InfraError::CalendarApi(format!("invalid events list payload: {error}"))
            })?;

            let page = parsed.items.take().unwrap_or_default();
            debug!(calendar_id, count = page.len(), "fetched events page");
            events.extend(page);

            match parsed.next_page_token.take() {
                Some(next_page_token) => page_token = Some(next_page_token),
                None => break,
            }
        }

        Ok(events)
    }
}
