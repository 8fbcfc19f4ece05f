use crate::alerts::thresholds::{Alert, AlertDirection, AlertThresholds};
use crate::models::{CurrentSnapshots, ResourceKind, Snapshot};
use crate::storage::HistorySeries;
use chrono::NaiveDate;
use tracing::debug;

/// Compares today's counts with yesterday's stored counts
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    thresholds: AlertThresholds,
}

impl ThresholdEvaluator {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Alerts for every kind that has both a current snapshot and a stored
    /// snapshot for `yesterday`. Pages alerts come before Workers alerts.
    pub fn evaluate(
        &self,
        current: &CurrentSnapshots,
        history: &HistorySeries,
        yesterday: NaiveDate,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for (kind, snapshot) in current.iter() {
            let Some(snapshot) = snapshot else {
                continue;
            };
            match history.on(kind, yesterday) {
                Some(baseline) => alerts.extend(self.evaluate_kind(kind, snapshot, baseline)),
                None => debug!("No {kind} history for {yesterday}, skipping threshold check"),
            }
        }

        alerts
    }

    /// Alerts for one kind, in lexical order of resource name
    pub fn evaluate_kind(
        &self,
        kind: ResourceKind,
        current: &Snapshot,
        yesterday: &Snapshot,
    ) -> Vec<Alert> {
        let limits = self.thresholds.get(kind);
        let mut alerts = Vec::new();

        // Snapshot is a BTreeMap, so iteration is already sorted by name
        for (name, &today) in current {
            let Some(&previous) = yesterday.get(name) else {
                continue;
            };
            let Some(change_pct) = percent_change(previous, today) else {
                continue;
            };

            if change_pct >= limits.increase_pct {
                alerts.push(Alert {
                    direction: AlertDirection::Increase,
                    kind,
                    resource: name.clone(),
                    yesterday: previous,
                    today,
                    change_pct,
                });
            }

            if change_pct <= -limits.decrease_pct {
                alerts.push(Alert {
                    direction: AlertDirection::Decrease,
                    kind,
                    resource: name.clone(),
                    yesterday: previous,
                    today,
                    change_pct: change_pct.abs(),
                });
            }
        }

        alerts
    }
}

/// Day-over-day change in percent; undefined for a zero baseline
pub fn percent_change(yesterday: u64, today: u64) -> Option<f64> {
    if yesterday == 0 {
        return None;
    }
    let yesterday = yesterday as f64;
    Some((today as f64 - yesterday) / yesterday * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::thresholds::KindThresholds;
    use crate::models::PerKind;

    fn snapshot(entries: &[(&str, u64)]) -> Snapshot {
        entries.iter().map(|(n, c)| (n.to_string(), *c)).collect()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn evaluator(increase: f64, decrease: f64) -> ThresholdEvaluator {
        let limits = KindThresholds::new(increase, decrease);
        ThresholdEvaluator::new(PerKind::new(limits, limits))
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(0, 50), None);
        assert_eq!(percent_change(800, 500), Some(-37.5));
        assert_eq!(percent_change(100, 100), Some(0.0));
        assert_eq!(percent_change(100, 0), Some(-100.0));
    }

    #[test]
    fn test_increase_alert_over_threshold() {
        let alerts = evaluator(30.0, 30.0).evaluate_kind(
            ResourceKind::PageProject,
            &snapshot(&[("proj1", 1000)]),
            &snapshot(&[("proj1", 700)]),
        );

        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.direction, AlertDirection::Increase);
        assert_eq!(alert.yesterday, 700);
        assert_eq!(alert.today, 1000);
        assert!((alert.change_pct - 42.857).abs() < 0.01);
        assert!(alert.message().contains("Yesterday: 700, Today: 1000"));
        assert!(alert.message().contains("42.9%"));
    }

    #[test]
    fn test_decrease_alert_reports_magnitude() {
        let alerts = evaluator(30.0, 30.0).evaluate_kind(
            ResourceKind::WorkerService,
            &snapshot(&[("svc1", 500)]),
            &snapshot(&[("svc1", 800)]),
        );

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].direction, AlertDirection::Decrease);
        assert_eq!(alerts[0].change_pct, 37.5);
        assert!(alerts[0].message().contains("Decrease: 37.5%"));
    }

    #[test]
    fn test_zero_baseline_never_alerts() {
        for (increase, decrease) in [(0.0, 0.0), (30.0, 30.0), (1000.0, 0.0)] {
            let alerts = evaluator(increase, decrease).evaluate_kind(
                ResourceKind::PageProject,
                &snapshot(&[("proj1", 50)]),
                &snapshot(&[("proj1", 0)]),
            );
            assert!(alerts.is_empty());
        }
    }

    #[test]
    fn test_resource_without_baseline_skipped() {
        let alerts = evaluator(10.0, 10.0).evaluate_kind(
            ResourceKind::PageProject,
            &snapshot(&[("new-site", 5000)]),
            &snapshot(&[("old-site", 10)]),
        );
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let alerts = evaluator(50.0, 50.0).evaluate_kind(
            ResourceKind::PageProject,
            &snapshot(&[("grow", 150), ("shrink", 50)]),
            &snapshot(&[("grow", 100), ("shrink", 100)]),
        );
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].resource, "grow");
        assert_eq!(alerts[1].resource, "shrink");
    }

    #[test]
    fn test_no_double_alert_with_positive_thresholds() {
        let evaluator = evaluator(0.5, 0.5);
        for (previous, today) in [(100, 100), (100, 101), (100, 99), (1, 1000), (1000, 1)] {
            let alerts = evaluator.evaluate_kind(
                ResourceKind::WorkerService,
                &snapshot(&[("svc", today)]),
                &snapshot(&[("svc", previous)]),
            );
            assert!(alerts.len() <= 1, "{previous} -> {today} produced {alerts:?}");
        }
    }

    #[test]
    fn test_zero_thresholds_fire_both_on_flat_volume() {
        let alerts = evaluator(0.0, 0.0).evaluate_kind(
            ResourceKind::PageProject,
            &snapshot(&[("flat", 10)]),
            &snapshot(&[("flat", 10)]),
        );
        assert_eq!(alerts.len(), 2);
    }

    #[test]
    fn test_evaluate_orders_pages_before_workers() {
        let yesterday = date("2024-03-14");
        let mut history = HistorySeries::new();
        history.record(ResourceKind::PageProject, yesterday, snapshot(&[("b", 700), ("a", 2000)]));
        history.record(ResourceKind::WorkerService, yesterday, snapshot(&[("svc2", 1000)]));

        let current = CurrentSnapshots::new(
            Some(snapshot(&[("b", 1000), ("a", 2000)])),
            Some(snapshot(&[("svc2", 1500)])),
        );

        let thresholds =
            PerKind::new(KindThresholds::new(30.0, 25.0), KindThresholds::new(35.0, 30.0));
        let alerts = ThresholdEvaluator::new(thresholds).evaluate(&current, &history, yesterday);

        assert_eq!(alerts.len(), 2);
        assert_eq!((alerts[0].kind, alerts[0].resource.as_str()), (ResourceKind::PageProject, "b"));
        assert_eq!(
            (alerts[1].kind, alerts[1].resource.as_str()),
            (ResourceKind::WorkerService, "svc2")
        );
    }

    #[test]
    fn test_evaluate_without_history_is_empty() {
        let current = CurrentSnapshots::new(Some(snapshot(&[("proj1", 1000)])), None);
        let alerts =
            evaluator(1.0, 1.0).evaluate(&current, &HistorySeries::new(), date("2024-03-14"));
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_evaluate_ignores_older_days() {
        let mut history = HistorySeries::new();
        history.record(ResourceKind::PageProject, date("2024-03-13"), snapshot(&[("proj1", 1)]));
        let current = CurrentSnapshots::new(Some(snapshot(&[("proj1", 1000)])), None);

        let alerts = evaluator(1.0, 1.0).evaluate(&current, &history, date("2024-03-14"));
        assert!(alerts.is_empty());
    }
}
