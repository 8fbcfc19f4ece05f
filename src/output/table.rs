use crate::models::ResourceKind;
use crate::storage::HistorySeries;
use chrono::NaiveDate;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Row of the `history show` table
#[derive(Tabled, Debug, PartialEq)]
pub struct HistoryRow {
    #[tabled(rename = "Date")]
    pub date: String,
    #[tabled(rename = "Kind")]
    pub kind: String,
    #[tabled(rename = "Resource")]
    pub resource: String,
    #[tabled(rename = "Requests")]
    pub requests: String,
}

/// Flatten the stored history into rows, newest date first. `since` limits
/// the rows to dates on or after it.
pub fn history_rows(
    history: &HistorySeries,
    kind_filter: Option<ResourceKind>,
    since: Option<NaiveDate>,
) -> Vec<HistoryRow> {
    let mut rows = Vec::new();

    for kind in ResourceKind::ALL {
        if kind_filter.is_some_and(|k| k != kind) {
            continue;
        }
        for (date, snapshot) in history.kind(kind).iter().rev() {
            if since.is_some_and(|s| *date < s) {
                continue;
            }
            for (name, count) in snapshot {
                rows.push(HistoryRow {
                    date: date.format("%Y-%m-%d").to_string(),
                    kind: kind.key().to_string(),
                    resource: name.clone(),
                    requests: format_number(*count),
                });
            }
        }
    }

    rows.sort_by(|a, b| b.date.cmp(&a.date));
    rows
}

pub fn history_table(rows: &[HistoryRow]) -> String {
    if rows.is_empty() {
        return "No history recorded yet.".to_string();
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

/// Thousands-separated integer, e.g. `1,234,567`
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let len = s.len();
    let mut result = String::with_capacity(len + len / 3);

    for (i, ch) in s.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }

    result
}
