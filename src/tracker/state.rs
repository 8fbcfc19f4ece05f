use crate::output::Report;
use serde::Serialize;
use std::fmt;

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Fetching,
    Evaluating,
    Persisting,
    Reporting,
    Notifying,
    Done,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Fetching => "fetching",
            RunState::Evaluating => "evaluating",
            RunState::Persisting => "persisting",
            RunState::Reporting => "reporting",
            RunState::Notifying => "notifying",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of one stage, telling the run whether to continue
#[derive(Debug)]
pub enum StageOutcome<T> {
    Success(T),
    /// Usable value, but some parts failed
    Partial(T, Vec<String>),
    Fatal(String),
}

impl<T> StageOutcome<T> {
    /// `Success` when nothing went wrong, `Partial` otherwise
    pub fn with_details(value: T, details: Vec<String>) -> Self {
        if details.is_empty() {
            StageOutcome::Success(value)
        } else {
            StageOutcome::Partial(value, details)
        }
    }
}

/// What a finished run did
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub final_state: RunState,
    pub alerts: usize,
    pub report_sent: bool,
    pub charts_delivered: usize,
    pub history_saved: bool,
    pub partial_failures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// Neither kind produced a count; nothing was recorded or sent
    NoData(RunSummary),
    /// Report built but not saved or delivered
    DryRun { report: Report, summary: RunSummary },
}

impl RunOutcome {
    pub fn summary(&self) -> &RunSummary {
        match self {
            RunOutcome::Completed(summary) | RunOutcome::NoData(summary) => summary,
            RunOutcome::DryRun { summary, .. } => summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_details_picks_variant() {
        assert!(matches!(StageOutcome::with_details(1, vec![]), StageOutcome::Success(1)));
        match StageOutcome::with_details(2, vec!["x".to_string()]) {
            StageOutcome::Partial(value, details) => {
                assert_eq!(value, 2);
                assert_eq!(details, vec!["x".to_string()]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_state_display_and_serialize() {
        assert_eq!(RunState::Persisting.to_string(), "persisting");
        assert_eq!(serde_json::to_string(&RunState::Done).unwrap(), "\"done\"");
    }
}
