// Run orchestration: fetch, evaluate, persist, report, notify
pub mod state;

use crate::alerts::ThresholdEvaluator;
use crate::charts::{has_drawable_series, ChartRenderer, PngChartRenderer};
use crate::clients::{ApiError, MetricsClient, NotificationSink};
use crate::models::{CurrentSnapshots, ResourceKind, Snapshot, TimeWindow};
use crate::output::{error_message, Report, ReportBuilder};
use crate::storage::{HistorySeries, HistoryStore};
use crate::utils::{RetryOperation, RetryPolicy, TimezoneCalculator};
use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

pub use state::{RunOutcome, RunState, RunSummary, StageOutcome};

/// A rendered chart waiting to be delivered
type ChartFile = (ResourceKind, PathBuf);

pub struct Tracker {
    metrics: Box<dyn MetricsClient>,
    sink: Box<dyn NotificationSink>,
    renderer: Box<dyn ChartRenderer>,
    store: HistoryStore,
    evaluator: ThresholdEvaluator,
    reports: ReportBuilder,
    timezone: TimezoneCalculator,
    retry: RetryPolicy,
    retention_days: u32,
    chart_dir: Option<PathBuf>,
    dry_run: bool,
    state: RunState,
}

impl Tracker {
    pub fn new(
        metrics: Box<dyn MetricsClient>,
        sink: Box<dyn NotificationSink>,
        store: HistoryStore,
        evaluator: ThresholdEvaluator,
    ) -> Self {
        let timezone = TimezoneCalculator::default();
        Self {
            metrics,
            sink,
            renderer: Box::new(PngChartRenderer::new()),
            store,
            evaluator,
            reports: ReportBuilder::new(timezone),
            timezone,
            retry: RetryPolicy::default(),
            retention_days: 30,
            chart_dir: None,
            dry_run: false,
            state: RunState::Idle,
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn ChartRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timezone(mut self, timezone: TimezoneCalculator) -> Self {
        self.timezone = timezone;
        self.reports = ReportBuilder::new(timezone);
        self
    }

    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Directory charts are written to; `None` disables charts
    pub fn with_chart_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.chart_dir = dir;
        self
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub async fn run(&mut self) -> Result<RunOutcome> {
        self.run_at(Utc::now()).await
    }

    /// Execute one run as of `now`. On a fatal error a single error
    /// notification is attempted and the error is returned.
    pub async fn run_at(&mut self, now: DateTime<Utc>) -> Result<RunOutcome> {
        match self.execute(now).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.transition(RunState::Failed);
                error!("Run failed: {e:#}");
                if !self.dry_run {
                    self.notify_failure(&format!("{e:#}")).await;
                }
                Err(e)
            }
        }
    }

    async fn execute(&mut self, now: DateTime<Utc>) -> Result<RunOutcome> {
        let mut summary = RunSummary::default();
        let today = self.timezone.date_of(now);
        let window = TimeWindow::trailing_day(now);

        self.transition(RunState::Fetching);
        let fetched = self.fetch(&window).await;
        let current = settle(fetched, &mut summary)?;

        if current.has_no_data() {
            error!("No request data could be fetched for any resource, nothing to report");
            self.finish(&mut summary);
            return Ok(RunOutcome::NoData(summary));
        }

        self.transition(RunState::Evaluating);
        let mut history = self.store.load();
        let yesterday = TimezoneCalculator::previous_day(today)?;
        let alerts = self.evaluator.evaluate(&current, &history, yesterday);
        for alert in &alerts {
            warn!("{}", alert.message());
        }
        summary.alerts = alerts.len();

        self.transition(RunState::Persisting);
        let persisted = self.persist(&mut history, &current, today);
        let saved = settle(persisted, &mut summary)?;
        summary.history_saved = saved;

        self.transition(RunState::Reporting);
        let report = self.reports.build(now, &current, &alerts);
        if self.dry_run {
            self.finish(&mut summary);
            return Ok(RunOutcome::DryRun { report, summary });
        }
        let rendered = self.render_charts(&history);
        let charts = settle(rendered, &mut summary)?;

        self.transition(RunState::Notifying);
        let delivered = self.notify(&report, &charts).await;
        let (report_sent, charts_delivered) = settle(delivered, &mut summary)?;
        summary.report_sent = report_sent;
        summary.charts_delivered = charts_delivered;

        self.finish(&mut summary);
        info!(
            alerts = summary.alerts,
            charts = summary.charts_delivered,
            partial_failures = summary.partial_failures.len(),
            "Run complete"
        );
        Ok(RunOutcome::Completed(summary))
    }

    fn transition(&mut self, next: RunState) {
        debug!("Run state {} -> {}", self.state, next);
        self.state = next;
    }

    fn finish(&mut self, summary: &mut RunSummary) {
        self.transition(RunState::Done);
        summary.final_state = RunState::Done;
    }

    async fn fetch(&self, window: &TimeWindow) -> StageOutcome<CurrentSnapshots> {
        let mut current = CurrentSnapshots::default();
        let mut details = Vec::new();
        let mut rejected = Vec::new();

        for kind in ResourceKind::ALL {
            match self.collect_snapshot(kind, window, &mut details).await {
                Ok(snapshot) => *current.get_mut(kind) = Some(snapshot),
                Err(e) => {
                    if matches!(e, ApiError::Unauthorized { .. }) {
                        rejected.push(format!("{kind}: {e}"));
                    }
                    warn!("Could not list {}: {}", kind, e);
                    details.push(format!("Could not list {kind}: {e}"));
                }
            }
        }

        // Credentials only count as bad when no kind could be listed with them.
        if rejected.len() == ResourceKind::ALL.len() {
            return StageOutcome::Fatal(format!(
                "Cloudflare rejected the credentials ({})",
                rejected.join("; ")
            ));
        }

        StageOutcome::with_details(current, details)
    }

    /// Counts for every listed resource of `kind`. Only a failed listing is an
    /// error; a resource whose count cannot be fetched is left out of the
    /// snapshot and noted in `details`.
    async fn collect_snapshot(
        &self,
        kind: ResourceKind,
        window: &TimeWindow,
        details: &mut Vec<String>,
    ) -> Result<Snapshot, ApiError> {
        let resources = self
            .retry
            .run(RetryOperation::ListResources(kind), || self.metrics.list_resources(kind))
            .await?;
        info!("Found {} {} resources", resources.len(), kind);

        let mut snapshot = Snapshot::new();
        for resource in &resources {
            let operation = RetryOperation::FetchCount {
                kind,
                resource: resource.name.clone(),
            };
            let counted = self
                .retry
                .run(operation, || self.metrics.fetch_count(kind, resource, window))
                .await;
            match counted {
                Ok(count) => {
                    debug!("{} '{}': {} requests", kind.label(), resource.name, count);
                    snapshot.insert(resource.name.clone(), count);
                }
                Err(e) => {
                    warn!("No count for {} '{}': {}", kind.label(), resource.name, e);
                    details.push(format!("No count for {} '{}': {e}", kind.label(), resource.name));
                }
            }
        }

        Ok(snapshot)
    }

    fn persist(
        &self,
        history: &mut HistorySeries,
        current: &CurrentSnapshots,
        today: NaiveDate,
    ) -> StageOutcome<bool> {
        for (kind, snapshot) in current.iter() {
            if let Some(snapshot) = snapshot {
                history.record(kind, today, snapshot.clone());
            }
        }

        let removed = history.prune(today, self.retention_days);
        if removed > 0 {
            info!("Pruned {} history entries older than {} days", removed, self.retention_days);
        }

        if self.dry_run {
            info!("Dry run, history not saved");
            return StageOutcome::Success(false);
        }

        match self.store.save(history) {
            Ok(()) => StageOutcome::Success(true),
            Err(e) => {
                error!("Failed to save history: {e:#}");
                StageOutcome::Partial(false, vec![format!("History not saved: {e:#}")])
            }
        }
    }

    fn render_charts(&self, history: &HistorySeries) -> StageOutcome<Vec<ChartFile>> {
        let Some(dir) = &self.chart_dir else {
            debug!("Charts disabled");
            return StageOutcome::Success(Vec::new());
        };

        let mut charts = Vec::new();
        let mut details = Vec::new();

        for kind in ResourceKind::ALL {
            let series = history.by_resource(kind);
            if !has_drawable_series(&series) {
                debug!("Not enough {kind} history for a chart yet");
                continue;
            }

            let path = dir.join(format!("{}_trend.{}", kind.key(), self.renderer.file_extension()));
            match self.renderer.render(kind, &series, &path) {
                Ok(true) => charts.push((kind, path)),
                Ok(false) => debug!("Nothing drawable for {kind}"),
                Err(e) => {
                    error!("Failed to render {kind} chart: {e:#}");
                    details.push(format!("{kind} chart not rendered: {e:#}"));
                }
            }
        }

        StageOutcome::with_details(charts, details)
    }

    /// Summary first, alerts only once the summary is through, then charts
    async fn notify(&self, report: &Report, charts: &[ChartFile]) -> StageOutcome<(bool, usize)> {
        let mut details = Vec::new();

        let report_sent = match self.send_text(&report.summary).await {
            Ok(()) => true,
            Err(e) => {
                details.push(format!("Report not delivered: {e}"));
                false
            }
        };

        if report_sent {
            if let Some(alerts) = &report.alerts {
                if let Err(e) = self.send_text(alerts).await {
                    details.push(format!("Alerts not delivered: {e}"));
                }
            }
        }

        let mut delivered = 0;
        for (kind, path) in charts {
            let caption = kind.chart_caption();
            let operation = RetryOperation::SendImage {
                caption: caption.to_string(),
            };
            match self.retry.run(operation, || self.sink.send_image(path, caption)).await {
                Ok(()) => delivered += 1,
                Err(e) => details.push(format!("{kind} chart not delivered: {e}")),
            }
        }

        StageOutcome::with_details((report_sent, delivered), details)
    }

    async fn send_text(&self, message: &str) -> Result<(), ApiError> {
        self.retry
            .run(RetryOperation::SendText, || self.sink.send_text(message))
            .await
    }

    async fn notify_failure(&self, description: &str) {
        match self.send_text(&error_message(description)).await {
            Ok(()) => info!("Error notification sent"),
            Err(e) => error!("Failed to send error notification: {e}"),
        }
    }
}

/// Unwrap a stage result, collecting partial failures and turning a fatal
/// outcome into an error
fn settle<T>(outcome: StageOutcome<T>, summary: &mut RunSummary) -> Result<T> {
    match outcome {
        StageOutcome::Success(value) => Ok(value),
        StageOutcome::Partial(value, details) => {
            summary.partial_failures.extend(details);
            Ok(value)
        }
        StageOutcome::Fatal(message) => Err(anyhow!(message)),
    }
}
