use crate::models::{PerKind, ResourceKind, Snapshot};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Snapshots of one kind keyed by the date they were taken
pub type DatedSnapshots = BTreeMap<NaiveDate, Snapshot>;

/// Per-resource series keyed by date, the layout charts consume
pub type ResourceSeries = BTreeMap<String, BTreeMap<NaiveDate, u64>>;

/// Durable multi-date record of snapshots for both kinds.
///
/// The canonical layout is date-major, which is also the on-disk layout:
/// `{"pages": {"2024-03-15": {"blog": 1000}}, "workers": {...}}`.
/// [`HistorySeries::by_resource`] derives the resource-major view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistorySeries {
    kinds: PerKind<DatedSnapshots>,
}

impl HistorySeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self, kind: ResourceKind) -> &DatedSnapshots {
        self.kinds.get(kind)
    }

    /// Snapshot recorded for `kind` on `date`, if any
    pub fn on(&self, kind: ResourceKind, date: NaiveDate) -> Option<&Snapshot> {
        self.kinds.get(kind).get(&date)
    }

    /// Insert or overwrite the snapshot for `(kind, date)`
    pub fn record(&mut self, kind: ResourceKind, date: NaiveDate, snapshot: Snapshot) {
        self.kinds.get_mut(kind).insert(date, snapshot);
    }

    /// Drop every entry older than `today - retention_days`.
    /// Today's entry always survives since the cutoff can never pass it.
    pub fn prune(&mut self, today: NaiveDate, retention_days: u32) -> usize {
        let cutoff = retention_cutoff(today, retention_days);
        let mut removed = 0;

        for kind in ResourceKind::ALL {
            let dated = self.kinds.get_mut(kind);
            let before = dated.len();
            dated.retain(|date, _| *date >= cutoff);
            removed += before - dated.len();
        }

        removed
    }

    /// Consuming form of [`HistorySeries::prune`]
    pub fn pruned(mut self, today: NaiveDate, retention_days: u32) -> Self {
        self.prune(today, retention_days);
        self
    }

    /// Transpose one kind into resource-major form in a single pass
    pub fn by_resource(&self, kind: ResourceKind) -> ResourceSeries {
        let mut series = ResourceSeries::new();
        for (date, snapshot) in self.kinds.get(kind) {
            for (name, count) in snapshot {
                series.entry(name.clone()).or_default().insert(*date, *count);
            }
        }
        series
    }

    /// Number of stored (kind, date) entries
    pub fn len(&self) -> usize {
        self.kinds.iter().map(|(_, dated)| dated.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Oldest date that survives pruning
pub fn retention_cutoff(today: NaiveDate, retention_days: u32) -> NaiveDate {
    today
        .checked_sub_signed(Duration::days(i64::from(retention_days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Prune a resource-major view, dropping resources left without dates
pub fn prune_resource_series(
    mut series: ResourceSeries,
    today: NaiveDate,
    retention_days: u32,
) -> ResourceSeries {
    let cutoff = retention_cutoff(today, retention_days);
    for points in series.values_mut() {
        points.retain(|date, _| *date >= cutoff);
    }
    series.retain(|_, points| !points.is_empty());
    series
}

/// Owns the history file on disk
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored history. A missing or corrupt file yields an empty
    /// history so a damaged file never stops the run.
    pub fn load(&self) -> HistorySeries {
        match self.read() {
            Ok(Some(series)) => {
                debug!(path = %self.path.display(), entries = series.len(), "Loaded history");
                series
            }
            Ok(None) => {
                info!(path = %self.path.display(), "No history file yet, starting fresh");
                HistorySeries::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to load history, starting fresh: {e:#}");
                HistorySeries::new()
            }
        }
    }

    /// Strict read; `Ok(None)` when the file does not exist
    pub fn read(&self) -> Result<Option<HistorySeries>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read history file: {}", self.path.display()))?;

        let series = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse history file: {}", self.path.display()))?;

        Ok(Some(series))
    }

    /// Write the full history through a temp file and rename it into place,
    /// so readers only ever see the old or the new document.
    pub fn save(&self, series: &HistorySeries) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create history directory: {}", parent.display())
                })?;
            }
        }

        let contents =
            serde_json::to_string_pretty(series).context("Failed to serialize history")?;

        let tmp_path = self.temp_path();
        {
            let mut file = fs::File::create(&tmp_path).with_context(|| {
                format!("Failed to create temp history file: {}", tmp_path.display())
            })?;
            file.write_all(contents.as_bytes())
                .and_then(|_| file.sync_all())
                .with_context(|| {
                    format!("Failed to write temp history file: {}", tmp_path.display())
                })?;
        }

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e).with_context(|| {
                format!("Failed to replace history file: {}", self.path.display())
            });
        }

        info!(path = %self.path.display(), entries = series.len(), "History saved");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "history.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
