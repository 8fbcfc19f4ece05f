use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Request counts per resource name for one kind. Absence means "not observed".
pub type Snapshot = BTreeMap<String, u64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "pages")]
    PageProject,
    #[serde(rename = "workers")]
    WorkerService,
}

impl ResourceKind {
    /// Both kinds in processing order
    pub const ALL: [ResourceKind; 2] = [ResourceKind::PageProject, ResourceKind::WorkerService];

    /// Key used in the history file, chart file names and the CLI
    pub fn key(&self) -> &'static str {
        match self {
            ResourceKind::PageProject => "pages",
            ResourceKind::WorkerService => "workers",
        }
    }

    /// Singular label used in alert lines ("Pages project 'blog'")
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::PageProject => "Pages project",
            ResourceKind::WorkerService => "Workers service",
        }
    }

    pub fn section_title(&self) -> &'static str {
        match self {
            ResourceKind::PageProject => "📄 Pages project requests",
            ResourceKind::WorkerService => "💻 Workers service requests",
        }
    }

    pub fn chart_title(&self) -> &'static str {
        match self {
            ResourceKind::PageProject => "Cloudflare Pages request trend",
            ResourceKind::WorkerService => "Cloudflare Workers request trend",
        }
    }

    pub fn chart_caption(&self) -> &'static str {
        match self {
            ResourceKind::PageProject => "📄 Pages request trend",
            ResourceKind::WorkerService => "💻 Workers request trend",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.to_lowercase().as_str() {
            "pages" | "page" => Some(ResourceKind::PageProject),
            "workers" | "worker" => Some(ResourceKind::WorkerService),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A value held once per resource kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerKind<T> {
    #[serde(default)]
    pub pages: T,
    #[serde(default)]
    pub workers: T,
}

impl<T> PerKind<T> {
    pub fn new(pages: T, workers: T) -> Self {
        Self { pages, workers }
    }

    pub fn get(&self, kind: ResourceKind) -> &T {
        match kind {
            ResourceKind::PageProject => &self.pages,
            ResourceKind::WorkerService => &self.workers,
        }
    }

    pub fn get_mut(&mut self, kind: ResourceKind) -> &mut T {
        match kind {
            ResourceKind::PageProject => &mut self.pages,
            ResourceKind::WorkerService => &mut self.workers,
        }
    }

    /// Iterate in processing order (pages first)
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, &T)> {
        ResourceKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }
}

/// Snapshots gathered during one run. `None` means the kind could not be listed.
pub type CurrentSnapshots = PerKind<Option<Snapshot>>;

impl CurrentSnapshots {
    /// True when neither kind produced a single count
    pub fn has_no_data(&self) -> bool {
        self.iter()
            .all(|(_, snapshot)| snapshot.as_ref().is_none_or(|s| s.is_empty()))
    }
}

/// A resource as listed by the metrics API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    pub id: Option<String>,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// The trailing window every count is fetched for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub const LOOKBACK_HOURS: i64 = 24;

    /// The 24 hours ending at `end`
    pub fn trailing_day(end: DateTime<Utc>) -> Self {
        Self {
            start: end - Duration::hours(Self::LOOKBACK_HOURS),
            end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_kind_keys_round_trip() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(ResourceKind::from_key("WORKERS"), Some(ResourceKind::WorkerService));
        assert_eq!(ResourceKind::from_key("zones"), None);
    }

    #[test]
    fn test_kind_serializes_as_history_key() {
        let json = serde_json::to_string(&ResourceKind::PageProject).unwrap();
        assert_eq!(json, "\"pages\"");
    }

    #[test]
    fn test_per_kind_iterates_pages_first() {
        let per_kind = PerKind::new(1, 2);
        let order: Vec<_> = per_kind.iter().map(|(kind, v)| (kind, *v)).collect();
        assert_eq!(
            order,
            vec![(ResourceKind::PageProject, 1), (ResourceKind::WorkerService, 2)]
        );
    }

    #[test]
    fn test_current_snapshots_no_data() {
        let mut current = CurrentSnapshots::default();
        assert!(current.has_no_data());

        current.pages = Some(Snapshot::new());
        assert!(current.has_no_data());

        current.workers = Some(Snapshot::from([("api".to_string(), 0)]));
        assert!(!current.has_no_data());
    }

    #[test]
    fn test_trailing_day_window() {
        let end = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let window = TimeWindow::trailing_day(end);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap());
        assert_eq!(window.end, end);
    }
}
