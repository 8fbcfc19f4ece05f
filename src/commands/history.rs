use crate::cli::HistoryAction;
use crate::commands::print_status;
use crate::config::Config;
use crate::models::ResourceKind;
use crate::output::{history_rows, history_table};
use crate::storage::{retention_cutoff, HistorySeries, HistoryStore};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use std::path::Path;

pub fn handle_history_action(
    action: HistoryAction,
    config_path: Option<&Path>,
    json_output: bool,
) -> Result<()> {
    let config = Config::load(config_path).context("Failed to load config")?;
    let store = HistoryStore::new(config.history_path());
    let today = config.timezone_calculator()?.date_of(Utc::now());

    match action {
        HistoryAction::Show { kind, days } => {
            let kind = kind.as_deref().map(parse_kind).transpose()?;
            let since = days.map(|d| retention_cutoff(today, d));
            let series = store.read()?.unwrap_or_default();

            if json_output {
                let selected = select(&series, kind, since);
                let json = serde_json::to_string_pretty(&selected)
                    .context("Failed to serialize history to JSON")?;
                println!("{}", json);
            } else {
                println!("History ({})", store.path().display());
                println!("{}", history_table(&history_rows(&series, kind, since)));
            }
        }
        HistoryAction::Prune => {
            // Strict read: a corrupt file is reported, never overwritten
            let Some(mut series) = store.read()? else {
                print_status(json_output, "No history file yet, nothing to prune");
                return Ok(());
            };

            let days = config.history.storage_days;
            let removed = series.prune(today, days);
            if removed > 0 {
                store.save(&series)?;
            }
            print_status(
                json_output,
                &format!("Removed {} entries older than {} days", removed, days),
            );
        }
    }

    Ok(())
}

fn parse_kind(key: &str) -> Result<ResourceKind> {
    ResourceKind::from_key(key)
        .with_context(|| format!("Unknown resource kind: {}. Use 'pages' or 'workers'", key))
}

/// Copy of `series` restricted to one kind and to dates on or after `since`
fn select(
    series: &HistorySeries,
    kind: Option<ResourceKind>,
    since: Option<NaiveDate>,
) -> HistorySeries {
    let mut selected = HistorySeries::new();
    for k in ResourceKind::ALL {
        if kind.is_some_and(|only| only != k) {
            continue;
        }
        for (date, snapshot) in series.kind(k) {
            if since.is_none_or(|s| *date >= s) {
                selected.record(k, *date, snapshot.clone());
            }
        }
    }
    selected
}
