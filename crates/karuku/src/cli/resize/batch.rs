//! Poll loops for the load and save sessions, progress bars and the final summary.

use indicatif::{ProgressBar, ProgressStyle};
use karuku_core::session::{exif_status_text, BatchEvent, LoadEvent, ProgressSnapshot};
use karuku_core::{
    BatchSaveSession, CancellationToken, Config, ImageJob, LoadSession, OperationSummary,
    SaveRecord,
};
use std::path::Path;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

use super::setup::ReportSink;

/// Failure details printed after the summary box.
const MAX_LISTED_FAILURES: usize = 10;

/// Result of the load phase.
pub(crate) struct LoadOutcome {
    pub jobs: Vec<ImageJob>,
    pub summary: OperationSummary,
    pub reached_limit: bool,
}

impl LoadOutcome {
    /// Fold a "retry failed only" run into this outcome.
    pub fn merge_retry(&mut self, retry: LoadOutcome) {
        self.jobs.extend(retry.jobs);
        fold_summary(&mut self.summary, retry.summary);
    }
}

/// Result of the save phase.
pub(crate) struct BatchOutcome {
    pub summary: OperationSummary,
    pub message: String,
    pub progress: ProgressSnapshot,
}

impl BatchOutcome {
    pub fn merge_retry(&mut self, retry: BatchOutcome) {
        self.message = format!("{}\n\n{}", self.message, retry.message);
        self.progress.succeeded += retry.progress.succeeded;
        self.progress.failed = retry.progress.failed;
        self.progress.elapsed += retry.progress.elapsed;
        fold_summary(&mut self.summary, retry.summary);
    }
}

fn fold_summary(first: &mut OperationSummary, retry: OperationSummary) {
    first.succeeded += retry.succeeded;
    first.failed = retry.failed;
    first.canceled |= retry.canceled;
    first.failed_details = retry.failed_details;
    first.retry_paths = retry.retry_paths;
}

fn poll_ticker(config: &Config) -> Interval {
    let mut ticker = interval(config.load.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Poll a load session to completion, collecting the decoded jobs.
pub(crate) async fn drive_load(
    mut session: LoadSession,
    config: &Config,
    interrupt: &CancellationToken,
) -> anyhow::Result<LoadOutcome> {
    let pb = create_spinner(session.label());
    let mut ticker = poll_ticker(config);
    let mut jobs = Vec::new();

    loop {
        ticker.tick().await;
        if interrupt.is_cancelled() {
            session.cancel();
        }

        for event in session.poll() {
            match event {
                LoadEvent::ScanProgress { detected, .. } => {
                    pb.set_message(format!("scanning... {} found", detected));
                }
                LoadEvent::ScanDone {
                    total,
                    reached_limit,
                } => {
                    tracing::debug!("Scan found {} files (limit hit: {})", total, reached_limit);
                    pb.set_style(bar_style());
                    pb.set_length(total as u64);
                    pb.set_message("decoding");
                }
                LoadEvent::Loaded { job, .. } => {
                    pb.inc(1);
                    jobs.push(job);
                }
                LoadEvent::Failed { path, detail, .. } => {
                    pb.inc(1);
                    let shown = session.display_path(&path);
                    pb.suspend(|| tracing::warn!("Failed to load {}: {}", shown, detail));
                }
                LoadEvent::Fatal(error) => {
                    pb.suspend(|| tracing::error!("Load worker stopped: {}", error));
                }
                LoadEvent::Finished(summary) => {
                    pb.finish_and_clear();
                    return Ok(LoadOutcome {
                        jobs,
                        summary,
                        reached_limit: session.reached_limit(),
                    });
                }
            }
        }
    }
}

/// Poll a batch save session to completion, updating `jobs` and the report.
pub(crate) async fn drive_batch(
    mut session: BatchSaveSession,
    jobs: &mut [ImageJob],
    config: &Config,
    interrupt: &CancellationToken,
    mut report: Option<&mut ReportSink>,
) -> anyhow::Result<BatchOutcome> {
    let pb = create_progress_bar(session.progress().total as u64);
    let mut ticker = poll_ticker(config);

    loop {
        ticker.tick().await;
        if interrupt.is_cancelled() {
            session.cancel();
        }

        for event in session.poll() {
            match event {
                BatchEvent::Item(item) => {
                    item.apply_to_matching(jobs);
                    pb.inc(1);
                    if item.success() {
                        tracing::debug!("{}", item.status_text());
                        if let Some(result) = &item.result {
                            if let Some(notice) = &result.name_notice {
                                pb.suspend(|| {
                                    tracing::warn!("{}: {}", result.output_path.display(), notice)
                                });
                            }
                        }
                    } else {
                        pb.suspend(|| tracing::warn!("{}", item.status_text()));
                    }

                    if let (Some(sink), Some(result)) = (report.as_deref_mut(), item.result) {
                        sink.push(SaveRecord {
                            source: item.path,
                            attempts: item.attempts,
                            exif_status: Some(exif_status_text(&result)),
                            result,
                        })?;
                    }
                }
                BatchEvent::Finished(summary) => {
                    pb.finish_and_clear();
                    return Ok(BatchOutcome {
                        summary,
                        message: session.completion_message(),
                        progress: session.progress(),
                    });
                }
            }
        }
        pb.set_message(session.progress().status_line());
    }
}

fn create_spinner(label: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {prefix}: {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(label.to_string());
    pb.set_message("scanning...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(bar_style());
    pb.set_message("starting...");
    pb
}

/// Print a formatted summary table after the batch.
pub(crate) fn print_summary(outcome: &BatchOutcome, output_dir: &Path) {
    let summary = &outcome.summary;
    let elapsed = outcome.progress.elapsed;
    let rate = outcome.progress.throughput().unwrap_or(0.0);

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {:>8}", summary.succeeded);
    if summary.failed > 0 {
        eprintln!("    Failed:       {:>8}", summary.failed);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", summary.total);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    eprintln!("  ====================================");
    eprintln!("    Output: {}", output_dir.display());
    if summary.canceled {
        eprintln!("    Canceled before all files were saved.");
    }

    for detail in summary.failed_details.iter().take(MAX_LISTED_FAILURES) {
        eprintln!("    - {}", detail.replace('\n', "\n      "));
    }
    if summary.failed_details.len() > MAX_LISTED_FAILURES {
        eprintln!(
            "    ... and {} more",
            summary.failed_details.len() - MAX_LISTED_FAILURES
        );
    }
    if summary.can_retry() {
        eprintln!("    Re-run with --retry-failed to retry only the failed files.");
    }
}
