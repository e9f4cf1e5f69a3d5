use crate::domain::classifier::Classification;
use crate::domain::models::{Allocation, Anomaly, BILLABLE_CATEGORY};
use chrono::Duration;

pub fn nominal_work_week() -> Duration {
    Duration::hours(40)
}

/// Snapshot of one run. Built once by [`summarize`] and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub total: Duration,
    pub allocation: Allocation,
    pub unmatched: Vec<String>,
    pub anomalies: Vec<Anomaly>,
    pub billable_fraction: f64,
    pub no_categorized_time: bool,
    pub target_utilization: f64,
    pub shortfall: Option<Duration>,
    pub remaining_week: Option<Duration>,
}

pub fn summarize(classification: Classification, target_utilization: f64) -> Report {
    let Classification {
        allocation,
        unmatched,
        anomalies,
        total,
        ..
    } = classification;

    let no_categorized_time = total <= Duration::zero();
    let billable_fraction = if no_categorized_time {
        0.0
    } else {
        fraction_of(allocation.get(BILLABLE_CATEGORY), total)
    };

    let shortfall = if !no_categorized_time && billable_fraction < target_utilization {
        Some(scale(total, target_utilization - billable_fraction))
            .filter(|value| *value > Duration::zero())
    } else {
        None
    };

    let remaining = nominal_work_week() - total;
    let remaining_week = (remaining > Duration::zero()).then_some(remaining);

    Report {
        total,
        allocation,
        unmatched,
        anomalies,
        billable_fraction,
        no_categorized_time,
        target_utilization,
        shortfall,
        remaining_week,
    }
}

fn fraction_of(part: Duration, whole: Duration) -> f64 {
    part.num_milliseconds() as f64 / whole.num_milliseconds() as f64
}

fn scale(duration: Duration, factor: f64) -> Duration {
    Duration::milliseconds((duration.num_milliseconds() as f64 * factor).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Category, CategoryRules};

    fn classification(entries: &[(&str, Duration)], unmatched: &[&str]) -> Classification {
        let rules = CategoryRules::new(vec![
            Category::new("Billable", vec![]),
            Category::new("Internal", vec![]),
        ])
        .expect("rules");
        let mut allocation = Allocation::for_rules(&rules);
        let mut total = Duration::zero();
        for (name, duration) in entries {
            allocation.add(name, *duration).expect("add");
            total += *duration;
        }
        Classification {
            allocation,
            unmatched: unmatched.iter().map(|title| title.to_string()).collect(),
            anomalies: Vec::new(),
            total,
            outcomes: Vec::new(),
        }
    }

    #[test]
    fn half_billable_week_reports_two_hour_shortfall() {
        let report = summarize(
            classification(
                &[("Billable", Duration::hours(5)), ("Internal", Duration::hours(5))],
                &[],
            ),
            0.7,
        );

        assert_eq!(report.total, Duration::hours(10));
        assert!((report.billable_fraction - 0.5).abs() < f64::EPSILON);
        assert_eq!(report.shortfall, Some(Duration::hours(2)));
        assert_eq!(report.remaining_week, Some(Duration::hours(30)));
        assert!(!report.no_categorized_time);
    }

    #[test]
    fn empty_week_reports_zero_fraction_without_dividing() {
        let report = summarize(classification(&[], &["Random Chat"]), 0.7);

        assert!(report.no_categorized_time);
        assert_eq!(report.billable_fraction, 0.0);
        assert_eq!(report.shortfall, None);
        assert_eq!(report.remaining_week, Some(nominal_work_week()));
        assert_eq!(report.unmatched, vec!["Random Chat".to_string()]);
    }

    #[test]
    fn meeting_target_has_no_shortfall() {
        let report = summarize(
            classification(
                &[("Billable", Duration::hours(8)), ("Internal", Duration::hours(2))],
                &[],
            ),
            0.7,
        );
        assert!((report.billable_fraction - 0.8).abs() < 1e-9);
        assert_eq!(report.shortfall, None);
    }

    #[test]
    fn full_week_has_no_remaining_time() {
        let report = summarize(
            classification(
                &[("Billable", Duration::hours(38)), ("Internal", Duration::hours(4))],
                &[],
            ),
            0.7,
        );
        assert_eq!(report.remaining_week, None);
    }

    #[test]
    fn summarize_is_deterministic() {
        let input = classification(
            &[("Billable", Duration::minutes(95)), ("Internal", Duration::minutes(40))],
            &["Lunch"],
        );
        assert_eq!(summarize(input.clone(), 0.7), summarize(input, 0.7));
    }
}
