use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const BILLABLE_CATEGORY: &str = "Billable";
pub const OOO_CATEGORY: &str = "OOO";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Attendance {
    Accepted,
    Declined,
    Tentative,
    NeedsAction,
}

impl Attendance {
    pub fn from_response_status(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "accepted" => Self::Accepted,
            "declined" => Self::Declined,
            "tentative" => Self::Tentative,
            _ => Self::NeedsAction,
        }
    }

    pub fn is_attended(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// A single instance from the user's primary calendar. `start == None` marks an all-day event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub title: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub is_out_of_office: bool,
    pub attendance: Attendance,
}

impl CalendarEvent {
    pub fn is_all_day(&self) -> bool {
        self.start.is_none()
    }

    pub fn duration(&self) -> Result<Duration, Anomaly> {
        let (Some(start), Some(end)) = (self.start, self.end) else {
            return Err(Anomaly::new(&self.title, "event has a start time but no end time"));
        };
        if end < start {
            return Err(Anomaly::new(
                &self.title,
                format!(
                    "end time {} precedes start time {}",
                    end.to_rfc3339(),
                    start.to_rfc3339()
                ),
            ));
        }
        Ok(end - start)
    }
}

/// Data problem on a single event. Reported as a warning, never fatal.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Anomaly {
    pub title: String,
    pub reason: String,
}

impl Anomaly {
    pub fn new(title: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub keywords: Vec<String>,
}

impl Category {
    pub fn new(name: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            name: name.into(),
            keywords,
        }
    }


}

/// Categories in the order they were declared. Matching is first-match-wins, so order is significant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryRules {
    categories: Vec<Category>,
}

impl CategoryRules {
    pub fn new(categories: Vec<Category>) -> Result<Self, String> {
        let mut seen = HashSet::new();
        for category in &categories {
            validate_non_empty(&category.name, "category name")?;
            if !seen.insert(category.name.as_str()) {
                return Err(format!("duplicate category '{}'", category.name));
            }
            for keyword in &category.keywords {
                validate_non_empty(keyword, &format!("keyword in category '{}'", category.name))?;
            }
        }
        Ok(Self { categories })
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn first_match(&self, title: &str) -> Option<(&Category, &str)> {
        self.first_match_with(title, |_, _| {})
    }

    /// Like [`first_match`](Self::first_match), calling `inspect` for each comparison made.
    /// Comparisons stop at the first hit.
    pub fn first_match_with<F>(&self, title: &str, mut inspect: F) -> Option<(&Category, &str)>
    where
        F: FnMut(&Category, &str),
    {
        let lowered = title.to_lowercase();
        for category in &self.categories {
            for keyword in &category.keywords {
                inspect(category, keyword);
                if lowered.contains(&keyword.to_lowercase()) {
                    return Some((category, keyword.as_str()));
                }
            }
        }
        None
    }
}

/// Accumulated duration per category, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    entries: Vec<(String, Duration)>,
}

impl Allocation {
    pub fn for_rules(rules: &CategoryRules) -> Self {
        Self {
            entries: rules
                .categories()
                .iter()
                .map(|category| (category.name.clone(), Duration::zero()))
                .collect(),
        }
    }

    /// Leaves the allocation untouched when the category total would overflow.
    pub fn add(&mut self, category: &str, duration: Duration) -> Result<(), String> {
        match self.entries.iter_mut().find(|(name, _)| name == category) {
            Some((_, total)) => {
                *total = total
                    .checked_add(&duration)
                    .ok_or_else(|| format!("time allocated to '{category}' overflows"))?;
            }
            None => self.entries.push((category.to_string(), duration)),
        }
        Ok(())
    }

    pub fn get(&self, category: &str) -> Duration {
        self.entries
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, total)| *total)
            .unwrap_or_else(Duration::zero)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Duration)> {
        self.entries.iter().map(|(name, total)| (name.as_str(), *total))
    }

    pub fn sum(&self) -> Duration {
        self.entries
            .iter()
            .fold(Duration::zero(), |acc, (_, total)| {
                acc.checked_add(total).unwrap_or(Duration::MAX)
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSettings {
    pub target_utilization: f64,
    pub count_out_of_office: bool,
    pub debug: bool,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            target_utilization: 0.7,
            count_out_of_office: true,
            debug: false,
        }
    }
}

impl ReportSettings {
    pub fn validate(&self) -> Result<(), String> {
        validate_fraction(self.target_utilization, "target utilization")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    // `expiry` is the field name golang.org/x/oauth2 writes to token.json.
    #[serde(alias = "expiry")]
    pub expires_at: DateTime<Utc>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl OAuthToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

pub fn validate_fraction(value: f64, field_name: &str) -> Result<(), String> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(format!("{field_name} must be between 0 and 1, got {value}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_rules() -> CategoryRules {
        CategoryRules::new(vec![
            Category::new("Billable", vec!["Visby".to_string(), "client".to_string()]),
            Category::new("Internal", vec!["sync".to_string()]),
            Category::new(OOO_CATEGORY, vec![]),
        ])
        .expect("valid rules")
    }

    #[test]
    fn attendance_maps_google_response_statuses() {
        assert_eq!(Attendance::from_response_status("accepted"), Attendance::Accepted);
        assert_eq!(Attendance::from_response_status("declined"), Attendance::Declined);
        assert_eq!(Attendance::from_response_status("tentative"), Attendance::Tentative);
        assert_eq!(Attendance::from_response_status("needsAction"), Attendance::NeedsAction);
        assert_eq!(Attendance::from_response_status("something-new"), Attendance::NeedsAction);
        assert!(Attendance::Accepted.is_attended());
        assert!(!Attendance::Tentative.is_attended());
    }

    #[test]
    fn duration_rejects_end_before_start() {
        let event = CalendarEvent {
            title: "Backwards".to_string(),
            start: Some(fixed_time("2026-02-16T10:00:00Z")),
            end: Some(fixed_time("2026-02-16T09:00:00Z")),
            is_out_of_office: false,
            attendance: Attendance::Accepted,
        };
        let anomaly = event.duration().expect_err("negative duration");
        assert_eq!(anomaly.title, "Backwards");
        assert!(anomaly.reason.contains("precedes"));
    }

    #[test]
    fn duration_of_timed_event_is_end_minus_start() {
        let event = CalendarEvent {
            title: "Standup".to_string(),
            start: Some(fixed_time("2026-02-16T09:00:00Z")),
            end: Some(fixed_time("2026-02-16T09:15:00Z")),
            is_out_of_office: false,
            attendance: Attendance::Accepted,
        };
        assert_eq!(event.duration().expect("duration"), Duration::minutes(15));
    }

    #[test]
    fn category_rules_reject_duplicates_and_blank_keywords() {
        let duplicate = CategoryRules::new(vec![
            Category::new("Billable", vec![]),
            Category::new("Billable", vec![]),
        ]);
        assert!(duplicate.expect_err("duplicate").contains("duplicate category"));

        let blank = CategoryRules::new(vec![Category::new("Billable", vec!["  ".to_string()])]);
        assert!(blank.is_err());

        let unnamed = CategoryRules::new(vec![Category::new("", vec![])]);
        assert!(unnamed.is_err());
    }

    #[test]
    fn first_match_is_case_insensitive_and_ordered() {
        let rules = sample_rules();
        let (category, keyword) = rules
            .first_match("Weekly SYNC w/ visby")
            .expect("match");
        assert_eq!(category.name, "Billable");
        assert_eq!(keyword, "Visby");
        assert!(rules.first_match("Lunch").is_none());
    }

    #[test]
    fn allocation_starts_at_zero_and_appends_new_categories() {
        let mut allocation = Allocation::for_rules(&sample_rules());
        assert_eq!(allocation.len(), 3);
        assert_eq!(allocation.get("Billable"), Duration::zero());

        allocation.add("Billable", Duration::hours(1)).expect("add");
        allocation.add("Billable", Duration::minutes(30)).expect("add");
        allocation.add("Training", Duration::hours(2)).expect("add");

        assert_eq!(allocation.get("Billable"), Duration::minutes(90));
        assert_eq!(allocation.get("Unknown"), Duration::zero());
        let names: Vec<&str> = allocation.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Billable", "Internal", OOO_CATEGORY, "Training"]);
        assert_eq!(allocation.sum(), Duration::minutes(210));
    }

    #[test]
    fn allocation_rejects_overflowing_add() {
        let mut allocation = Allocation::default();
        allocation.add("Billable", Duration::MAX).expect("first add fits");
        let error = allocation
            .add("Billable", Duration::hours(1))
            .expect_err("overflow");
        assert!(error.contains("Billable"));
        assert_eq!(allocation.get("Billable"), Duration::MAX);
    }

    #[test]
    fn keyword_search_stops_at_first_hit() {
        let rules = sample_rules();
        let mut compared = Vec::new();
        let hit = rules.first_match_with("Client call", |category, keyword| {
            compared.push(format!("{}:{keyword}", category.name));
        });

        assert_eq!(hit.map(|(category, _)| category.name.as_str()), Some("Billable"));
        assert_eq!(compared, vec!["Billable:Visby", "Billable:client"]);
    }

    #[test]
    fn report_settings_reject_out_of_range_targets() {
        let mut settings = ReportSettings::default();
        assert!(settings.validate().is_ok());
        settings.target_utilization = 1.2;
        assert!(settings.validate().is_err());
        settings.target_utilization = f64::NAN;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn oauth_token_validity_respects_leeway() {
        let now = fixed_time("2026-02-16T10:00:00Z");
        let token = OAuthToken {
            access_token: "access".to_string(),
            refresh_token: None,
            expires_at: now + Duration::seconds(30),
            token_type: "Bearer".to_string(),
            scope: None,
        };
        assert!(token.is_valid_at(now, 0));
        assert!(!token.is_valid_at(now, 60));
    }

    proptest! {
        // Reordering categories changes which one wins when a title matches both.
        #[test]
        fn first_declared_category_wins_overlapping_keywords(
            keyword in "[a-z]{3,10}",
            prefix in "[A-Za-z ]{0,10}",
        ) {
            let title = format!("{prefix}{}", keyword.to_uppercase());
            let forward = CategoryRules::new(vec![
                Category::new("First", vec![keyword.clone()]),
                Category::new("Second", vec![keyword.clone()]),
            ]).expect("rules");
            let reversed = CategoryRules::new(vec![
                Category::new("Second", vec![keyword.clone()]),
                Category::new("First", vec![keyword.clone()]),
            ]).expect("rules");

            prop_assert_eq!(&forward.first_match(&title).expect("match").0.name, "First");
            prop_assert_eq!(&reversed.first_match(&title).expect("match").0.name, "Second");
        }
    }
}
