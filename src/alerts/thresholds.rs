use crate::models::{PerKind, ResourceKind};
use serde::Serialize;

/// Percentage boundaries for one resource kind
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KindThresholds {
    /// Alert when volume grew by at least this many percent
    pub increase_pct: f64,
    /// Alert when volume fell by at least this many percent
    pub decrease_pct: f64,
}

impl KindThresholds {
    pub fn new(increase_pct: f64, decrease_pct: f64) -> Self {
        Self {
            increase_pct,
            decrease_pct,
        }
    }
}

pub type AlertThresholds = PerKind<KindThresholds>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    Increase,
    Decrease,
}

impl AlertDirection {
    pub fn icon(&self) -> &'static str {
        match self {
            AlertDirection::Increase => "📈",
            AlertDirection::Decrease => "📉",
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            AlertDirection::Increase => "rose",
            AlertDirection::Decrease => "fell",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AlertDirection::Increase => "Increase",
            AlertDirection::Decrease => "Decrease",
        }
    }
}

/// A day-over-day change that crossed a threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub direction: AlertDirection,
    pub kind: ResourceKind,
    pub resource: String,
    pub yesterday: u64,
    pub today: u64,
    /// Size of the change in percent; always positive for decreases
    pub change_pct: f64,
}

impl Alert {
    pub fn message(&self) -> String {
        format!(
            "{} Warning: {} '{}' request volume {} abnormally! Yesterday: {}, Today: {}, {}: {:.1}%",
            self.direction.icon(),
            self.kind.label(),
            self.resource,
            self.direction.verb(),
            self.yesterday,
            self.today,
            self.direction.label(),
            self.change_pct,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increase_message() {
        let alert = Alert {
            direction: AlertDirection::Increase,
            kind: ResourceKind::PageProject,
            resource: "proj1".to_string(),
            yesterday: 700,
            today: 1000,
            change_pct: 300.0 / 7.0,
        };
        assert_eq!(
            alert.message(),
            "📈 Warning: Pages project 'proj1' request volume rose abnormally! Yesterday: 700, Today: 1000, Increase: 42.9%"
        );
    }

    #[test]
    fn test_decrease_message_is_unsigned() {
        let alert = Alert {
            direction: AlertDirection::Decrease,
            kind: ResourceKind::WorkerService,
            resource: "svc1".to_string(),
            yesterday: 800,
            today: 500,
            change_pct: 37.5,
        };
        let message = alert.message();
        assert!(message.starts_with("📉 Warning: Workers service 'svc1'"));
        assert!(message.ends_with("Decrease: 37.5%"));
        assert!(!message.contains('-'));
    }
}
