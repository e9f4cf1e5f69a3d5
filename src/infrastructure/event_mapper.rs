use crate::domain::models::{Anomaly, Attendance, CalendarEvent};
use chrono::{DateTime, Utc};

const OUT_OF_OFFICE_EVENT_TYPE: &str = "outOfOffice";
const UNTITLED_EVENT: &str = "(no title)";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct CalendarEventDateTime {
    #[serde(rename = "dateTime", skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct EventAttendee {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "self", default)]
    pub is_self: bool,
    #[serde(rename = "responseStatus", skip_serializing_if = "Option::is_none")]
    pub response_status: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct GoogleCalendarEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "eventType", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub start: CalendarEventDateTime,
    #[serde(default)]
    pub end: CalendarEventDateTime,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<EventAttendee>,
}

impl GoogleCalendarEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status
            .as_deref()
            .map(|status| status.eq_ignore_ascii_case("cancelled"))
            .unwrap_or(false)
    }

    pub fn title(&self) -> &str {
        self.summary
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(UNTITLED_EVENT)
    }
}

pub fn to_calendar_event(event: &GoogleCalendarEvent) -> Result<CalendarEvent, Anomaly> {
    let title = event.title();

    let attendance = event
        .attendees
        .iter()
        .find(|attendee| attendee.is_self)
        .map(|attendee| {
            attendee
                .response_status
                .as_deref()
                .map(Attendance::from_response_status)
                .unwrap_or(Attendance::NeedsAction)
        })
        .unwrap_or(Attendance::Accepted);

    let start = parse_optional_rfc3339(title, event.start.date_time.as_deref(), "start.dateTime")?;
    let end = match start {
        Some(_) => parse_optional_rfc3339(title, event.end.date_time.as_deref(), "end.dateTime")?,
        None => None,
    };

    Ok(CalendarEvent {
        title: title.to_string(),
        start,
        end,
        is_out_of_office: event.event_type.as_deref() == Some(OUT_OF_OFFICE_EVENT_TYPE),
        attendance,
    })
}

fn parse_optional_rfc3339(
    title: &str,
    value: Option<&str>,
    field_name: &str,
) -> Result<Option<DateTime<Utc>>, Anomaly> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| Some(parsed.with_timezone(&Utc)))
        .map_err(|error| Anomaly::new(title, format!("invalid {field_name} '{value}': {error}")))
}
