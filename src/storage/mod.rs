// History persistence module
pub mod history;

pub use history::{
    prune_resource_series, retention_cutoff, DatedSnapshots, HistorySeries, HistoryStore,
    ResourceSeries,
};
