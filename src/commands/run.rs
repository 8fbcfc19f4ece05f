use crate::alerts::ThresholdEvaluator;
use crate::clients::{CloudflareClient, NotificationSink, TelegramSink};
use crate::config::{Config, TelegramConfig};
use crate::output::error_message;
use crate::storage::HistoryStore;
use crate::tracker::{RunOutcome, Tracker};
use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

pub async fn handle_run_command(
    config_path: Option<&Path>,
    dry_run: bool,
    json_output: bool,
) -> Result<()> {
    run_with_env(config_path, dry_run, json_output, |key| std::env::var(key).ok()).await
}

/// Load, validate and run, reading environment overrides through `lookup`.
/// Failures before the tracker exists are reported to Telegram when
/// credentials can be found.
pub async fn run_with_env<F>(
    config_path: Option<&Path>,
    dry_run: bool,
    json_output: bool,
    lookup: F,
) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let config = match Config::load_with_env(config_path, &lookup) {
        Ok(config) => config,
        Err(e) => {
            report_startup_failure(TelegramConfig::from_env(&lookup), &e, dry_run).await;
            return Err(e);
        }
    };

    if let Err(e) = config.validate() {
        let telegram = Some(config.telegram.clone())
            .filter(TelegramConfig::is_complete)
            .or_else(|| TelegramConfig::from_env(&lookup));
        report_startup_failure(telegram, &e, dry_run).await;
        return Err(e);
    }

    let mut tracker = match build_tracker(&config, dry_run) {
        Ok(tracker) => tracker,
        Err(e) => {
            report_startup_failure(Some(config.telegram.clone()), &e, dry_run).await;
            return Err(e);
        }
    };

    let outcome = tracker.run().await?;
    print_outcome(&outcome, json_output)
}

/// Wire the real Cloudflare and Telegram clients into a tracker
pub fn build_tracker(config: &Config, dry_run: bool) -> Result<Tracker> {
    let timeout = config.request_timeout();
    let metrics = CloudflareClient::with_base_url(
        &config.cloudflare.api_base_url,
        &config.cloudflare.account_id,
        &config.cloudflare.api_token,
        timeout,
    )?;
    let sink = TelegramSink::with_base_url(
        &config.telegram.api_base_url,
        &config.telegram.bot_token,
        &config.telegram.chat_id,
        timeout,
    )?;
    let chart_dir = config.charts.enabled.then(|| config.chart_dir());

    Ok(Tracker::new(
        Box::new(metrics),
        Box::new(sink),
        HistoryStore::new(config.history_path()),
        ThresholdEvaluator::new(config.alert_thresholds()),
    )
    .with_retry_policy(config.retry_policy())
    .with_timezone(config.timezone_calculator()?)
    .with_retention_days(config.history.storage_days)
    .with_chart_dir(chart_dir)
    .dry_run(dry_run))
}

/// Best-effort error notification for failures before the tracker exists
async fn report_startup_failure(
    telegram: Option<TelegramConfig>,
    error: &anyhow::Error,
    dry_run: bool,
) {
    if dry_run {
        return;
    }
    let Some(telegram) = telegram else {
        warn!("No Telegram credentials available, error notification skipped");
        return;
    };

    let sink = match TelegramSink::with_base_url(
        &telegram.api_base_url,
        &telegram.bot_token,
        &telegram.chat_id,
        Duration::from_secs(30),
    ) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Failed to create Telegram client for error notification: {e}");
            return;
        }
    };

    match sink.send_text(&error_message(&format!("{error:#}"))).await {
        Ok(()) => info!("Error notification sent"),
        Err(e) => error!("Failed to send error notification: {e}"),
    }
}

fn print_outcome(outcome: &RunOutcome, json_output: bool) -> Result<()> {
    if json_output {
        let json = match outcome {
            RunOutcome::Completed(summary) => {
                serde_json::json!({"outcome": "completed", "summary": summary})
            }
            RunOutcome::NoData(summary) => {
                serde_json::json!({"outcome": "no_data", "summary": summary})
            }
            RunOutcome::DryRun { report, summary } => {
                serde_json::json!({
                    "outcome": "dry_run",
                    "report": report.text(),
                    "summary": summary
                })
            }
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    match outcome {
        RunOutcome::Completed(summary) => {
            println!(
                "Run complete: {} alert(s), report {}, {} chart(s) delivered, history {}",
                summary.alerts,
                if summary.report_sent { "sent" } else { "not sent" },
                summary.charts_delivered,
                if summary.history_saved { "saved" } else { "not saved" },
            );
            for detail in &summary.partial_failures {
                println!("  - {}", detail);
            }
        }
        RunOutcome::NoData(_) => {
            println!("No request data could be fetched; nothing was recorded or sent");
        }
        RunOutcome::DryRun { report, .. } => {
            println!("{}", report.text());
        }
    }
    Ok(())
}
