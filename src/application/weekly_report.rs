use crate::application::week::ReportWindow;
use crate::domain::classifier::classify;
use crate::domain::models::{Allocation, CategoryRules, ReportSettings};
use crate::domain::report::{Report, summarize};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::to_calendar_event;
use crate::infrastructure::google_calendar_client::{
    GoogleCalendarClient, ListEventsRequest, PRIMARY_CALENDAR_ID,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct WeeklyReportService<C>
where
    C: GoogleCalendarClient,
{
    calendar_client: Arc<C>,
    rules: CategoryRules,
    seed: Allocation,
    settings: ReportSettings,
}

impl<C> WeeklyReportService<C>
where
    C: GoogleCalendarClient,
{
    pub fn new(
        calendar_client: Arc<C>,
        rules: CategoryRules,
        seed: Allocation,
        settings: ReportSettings,
    ) -> Self {
        Self {
            calendar_client,
            rules,
            seed,
            settings,
        }
    }

    /// Fetches the window once and reduces it to a report. Retrieval failures are returned as-is.
    pub async fn build_report(&self, access_token: &str, window: &ReportWindow) -> Result<Report, InfraError> {
        let wire_events = self
            .calendar_client
            .list_events(
                access_token,
                PRIMARY_CALENDAR_ID,
                ListEventsRequest {
                    time_min: window.start,
                    time_max: window.end,
                },
            )
            .await?;
        info!(
            calendar_id = PRIMARY_CALENDAR_ID,
            count = wire_events.len(),
            "retrieved calendar events"
        );

        let mut events = Vec::with_capacity(wire_events.len());
        let mut mapping_anomalies = Vec::new();
        for wire_event in &wire_events {
            if wire_event.is_cancelled() {
                debug!(title = wire_event.title(), "skipping cancelled event");
                continue;
            }
            match to_calendar_event(wire_event) {
                Ok(event) => events.push(event),
                Err(anomaly) => {
                    warn!(title = %anomaly.title, reason = %anomaly.reason, "skipping malformed event");
                    mapping_anomalies.push(anomaly);
                }
            }
        }

        let mut classification = classify(&events, &self.rules, &self.seed, &self.settings);
        mapping_anomalies.append(&mut classification.anomalies);
        classification.anomalies = mapping_anomalies;

        Ok(summarize(classification, self.settings.target_utilization))
    }
}
