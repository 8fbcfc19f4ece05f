// Output module
pub mod report;
pub mod table;

pub use report::{error_message, Report, ReportBuilder};
pub use table::{format_number, history_rows, history_table, HistoryRow};
