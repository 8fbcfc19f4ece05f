use crate::alerts::Alert;
use crate::models::CurrentSnapshots;
use crate::output::format_number;
use crate::utils::TimezoneCalculator;
use chrono::{DateTime, Utc};

/// Composed report text, split so the alerts can travel as their own message
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub summary: String,
    pub alerts: Option<String>,
}

impl Report {
    /// Summary followed by the alerts section, when there is one
    pub fn text(&self) -> String {
        match &self.alerts {
            Some(alerts) => format!("{}\n{}", self.summary, alerts),
            None => self.summary.clone(),
        }
    }
}

/// Formats counts and alerts into chat-ready Markdown
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    timezone: TimezoneCalculator,
}

impl ReportBuilder {
    pub fn new(timezone: TimezoneCalculator) -> Self {
        Self { timezone }
    }

    pub fn build(
        &self,
        generated_at: DateTime<Utc>,
        current: &CurrentSnapshots,
        alerts: &[Alert],
    ) -> Report {
        let mut summary = format!(
            "📊 *Cloudflare Stats Report* - {}\n\n",
            self.timezone.format_timestamp(generated_at)
        );

        for (kind, snapshot) in current.iter() {
            let Some(snapshot) = snapshot.as_ref().filter(|s| !s.is_empty()) else {
                continue;
            };

            summary.push_str(&format!("### {}\n", kind.section_title()));
            for (name, count) in snapshot {
                summary.push_str(&format!("- {}: {} requests\n", name, format_number(*count)));
            }
            summary.push('\n');
        }

        Report {
            summary,
            alerts: alert_section(alerts),
        }
    }
}

fn alert_section(alerts: &[Alert]) -> Option<String> {
    if alerts.is_empty() {
        return None;
    }

    let lines: Vec<String> = alerts.iter().map(Alert::message).collect();
    Some(format!("⚠️ *Alerts*\n{}", lines.join("\n")))
}

/// The one message sent when a run fails
pub fn error_message(description: &str) -> String {
    format!("❗ *Cloudflare Stats Tracker Error*\n\nThe run failed:\n`{description}`")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertDirection;
    use crate::models::{ResourceKind, Snapshot};
    use chrono::TimeZone;

    fn snapshot(entries: &[(&str, u64)]) -> Snapshot {
        entries.iter().map(|(n, c)| (n.to_string(), *c)).collect()
    }

    fn builder() -> ReportBuilder {
        ReportBuilder::new(TimezoneCalculator::utc())
    }

    fn generated_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_report_lists_both_kinds_sorted() {
        let current = CurrentSnapshots::new(
            Some(snapshot(&[("project2", 2000), ("project1", 1000)])),
            Some(snapshot(&[("service2", 1500), ("service1", 500)])),
        );

        let report = builder().build(generated_at(), &current, &[]);

        assert_eq!(
            report.summary,
            "📊 *Cloudflare Stats Report* - 2024-03-15 09:00:00\n\n\
             ### 📄 Pages project requests\n\
             - project1: 1,000 requests\n\
             - project2: 2,000 requests\n\n\
             ### 💻 Workers service requests\n\
             - service1: 500 requests\n\
             - service2: 1,500 requests\n\n"
        );
        assert!(report.alerts.is_none());
        assert_eq!(report.text(), report.summary);
    }

    #[test]
    fn test_report_skips_empty_kinds() {
        let current = CurrentSnapshots::new(None, Some(snapshot(&[("api", 12)])));
        let report = builder().build(generated_at(), &current, &[]);

        assert!(!report.summary.contains("Pages"));
        assert!(report.summary.contains("- api: 12 requests"));
    }

    #[test]
    fn test_report_appends_alerts() {
        let current = CurrentSnapshots::new(Some(snapshot(&[("proj1", 1000)])), None);
        let alerts = vec![Alert {
            direction: AlertDirection::Increase,
            kind: ResourceKind::PageProject,
            resource: "proj1".to_string(),
            yesterday: 700,
            today: 1000,
            change_pct: 300.0 / 7.0,
        }];

        let report = builder().build(generated_at(), &current, &alerts);
        let section = report.alerts.clone().unwrap();
        assert!(section.starts_with("⚠️ *Alerts*\n📈 Warning: Pages project 'proj1'"));

        let text = report.text();
        assert!(text.starts_with(&report.summary));
        assert!(text.ends_with("Increase: 42.9%"));
    }

    #[test]
    fn test_error_message() {
        let message = error_message("Credentials rejected (HTTP 403)");
        assert!(message.starts_with("❗ *Cloudflare Stats Tracker Error*"));
        assert!(message.ends_with("`Credentials rejected (HTTP 403)`"));
    }
}
