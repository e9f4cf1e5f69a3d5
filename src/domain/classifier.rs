use crate::domain::models::{
    Allocation, Anomaly, CalendarEvent, CategoryRules, OOO_CATEGORY, ReportSettings,
};
use chrono::Duration;
use tracing::{debug, warn};

pub fn out_of_office_credit() -> Duration {
    Duration::hours(8)
}

/// What happened to one event. Every event ends up in exactly one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    NotAttended,
    AllDay,
    OutOfOffice,
    Matched { category: String, keyword: String },
    Unmatched,
    Anomalous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub allocation: Allocation,
    pub unmatched: Vec<String>,
    pub anomalies: Vec<Anomaly>,
    pub total: Duration,
    pub outcomes: Vec<EventOutcome>,
}

impl Classification {
    fn seeded(rules: &CategoryRules, seed: &Allocation) -> Self {
        let mut classification = Self {
            allocation: Allocation::for_rules(rules),
            unmatched: Vec::new(),
            anomalies: Vec::new(),
            total: Duration::zero(),
            outcomes: Vec::new(),
        };
        for (category, duration) in seed.iter() {
            if let Err(reason) = classification.credit(category, duration) {
                warn!(%category, %reason, "ignoring seed allocation");
                classification
                    .anomalies
                    .push(Anomaly::new(category, format!("seed allocation ignored: {reason}")));
            }
        }
        classification
    }

    // Category and total move together or not at all.
    fn credit(&mut self, category: &str, duration: Duration) -> Result<(), String> {
        let total = self
            .total
            .checked_add(&duration)
            .ok_or_else(|| "weekly total overflows".to_string())?;
        self.allocation.add(category, duration)?;
        self.total = total;
        Ok(())
    }

    pub fn count(&self, predicate: impl Fn(&EventOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|outcome| predicate(outcome)).count()
    }
}

pub fn classify(
    events: &[CalendarEvent],
    rules: &CategoryRules,
    seed: &Allocation,
    settings: &ReportSettings,
) -> Classification {
    let mut classification = Classification::seeded(rules, seed);
    for event in events {
        let outcome = classify_event(event, rules, settings, &mut classification);
        classification.outcomes.push(outcome);
    }
    classification
}

fn classify_event(
    event: &CalendarEvent,
    rules: &CategoryRules,
    settings: &ReportSettings,
    classification: &mut Classification,
) -> EventOutcome {
    if !event.attendance.is_attended() {
        debug!(title = %event.title, attendance = ?event.attendance, "skipping event not accepted");
        return EventOutcome::NotAttended;
    }

    let out_of_office = settings.count_out_of_office && event.is_out_of_office;
    if event.is_all_day() && !out_of_office {
        debug!(title = %event.title, "skipping all-day event");
        return EventOutcome::AllDay;
    }

    if out_of_office {
        if let Err(reason) = classification.credit(OOO_CATEGORY, out_of_office_credit()) {
            return record_anomaly(classification, Anomaly::new(&event.title, reason));
        }
        debug!(title = %event.title, "credited out-of-office event as a full workday");
        return EventOutcome::OutOfOffice;
    }

    let duration = match event.duration() {
        Ok(duration) => duration,
        Err(anomaly) => return record_anomaly(classification, anomaly),
    };

    let matched = rules.first_match_with(&event.title, |category, keyword| {
        if settings.debug {
            debug!(title = %event.title, category = %category.name, %keyword, "checking keyword");
        }
    });

    match matched {
        Some((category, keyword)) => {
            if let Err(reason) = classification.credit(&category.name, duration) {
                return record_anomaly(classification, Anomaly::new(&event.title, reason));
            }
            debug!(
                title = %event.title,
                category = %category.name,
                keyword = %keyword,
                minutes = duration.num_minutes(),
                "assigned event"
            );
            EventOutcome::Matched {
                category: category.name.clone(),
                keyword: keyword.to_string(),
            }
        }
        None => {
            debug!(title = %event.title, minutes = duration.num_minutes(), "no category matched");
            classification.unmatched.push(event.title.clone());
            EventOutcome::Unmatched
        }
    }
}

fn record_anomaly(classification: &mut Classification, anomaly: Anomaly) -> EventOutcome {
    warn!(title = %anomaly.title, reason = %anomaly.reason, "ignoring event");
    classification.anomalies.push(anomaly);
    EventOutcome::Anomalous
}
