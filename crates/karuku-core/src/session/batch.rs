//! Batch save coordinator.
//!
//! Same shape as a load session: one worker thread saves every item in
//! order and reports through a bounded queue. Per-item failures are
//! recorded and the batch moves on.

use serde::Serialize;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::config::Config;
use crate::error::Result;
use crate::load::worker::panic_message;
use crate::load::{queue_for, CancellationToken, MessageQueue, WorkerSender};
use crate::resize::ResizeSpec;
use crate::save::naming::build_unique_batch_base_path;
use crate::save::{
    resolve_output_format, save_with_retry, supported_output_formats, RetryPolicy, SaveOptions,
    SaveResult,
};
use crate::types::{file_stem, ImageJob, ProcessState, SourceImage};

use super::progress::ProgressSnapshot;
use super::summary::{exif_status_text, OperationSummary};

/// Running counters of one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub processed: usize,
    pub failed: usize,
    pub dry_run: usize,
    pub exif_applied: usize,
    pub exif_fallback: usize,
    pub gps_removed: usize,
    pub failed_details: Vec<String>,
    pub failed_paths: Vec<PathBuf>,
}

impl BatchStats {
    pub fn record_success(&mut self, result: &SaveResult) {
        self.processed += 1;
        if result.dry_run {
            self.dry_run += 1;
        }
        if result.exif_attached {
            self.exif_applied += 1;
        }
        if result.exif_fallback_without_metadata {
            self.exif_fallback += 1;
        }
        if result.gps_removed {
            self.gps_removed += 1;
        }
    }

    pub fn record_failure(&mut self, file_name: &str, detail: &str, path: Option<&Path>) {
        self.failed += 1;
        self.failed_details.push(format!("{}: {}", file_name, detail));
        if let Some(path) = path {
            self.failed_paths.push(path.to_path_buf());
        }
    }

    /// Multi-line completion report.
    pub fn completion_message(&self, total: usize, canceled: bool, dry_run: bool) -> String {
        if canceled {
            return format!("Batch canceled ({}/{} completed).", self.processed, total);
        }
        let verb = if dry_run { "dry-ran" } else { "saved" };
        let mut msg = format!(
            "Batch complete. {} {}/{} files.\nFailed: {} / EXIF attached: {} / EXIF fallback: {} / GPS removed: {}",
            verb,
            self.processed,
            total,
            self.failed,
            self.exif_applied,
            self.exif_fallback,
            self.gps_removed
        );
        if dry_run {
            msg.push_str(&format!(
                "\nDry-run items: {}\nDry run: no files were written.",
                self.dry_run
            ));
        }
        msg
    }
}

/// Settings shared by every item of a batch.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub output_dir: PathBuf,
    pub resize: ResizeSpec,
    /// `auto` resolves per item from its source; anything else is fixed
    pub format_selection: String,
    /// Template options; `output_format` is replaced per item
    pub options: SaveOptions,
    pub allow_retry: bool,
    pub retry: RetryPolicy,
}

impl BatchPlan {
    fn options_for(&self, source: &SourceImage) -> SaveOptions {
        let format = resolve_output_format(
            &self.format_selection,
            source.traits(),
            &supported_output_formats(),
        );
        self.options.for_format(format)
    }
}

/// What the worker needs of one job.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub path: PathBuf,
    pub source: Arc<SourceImage>,
}

/// Reset `jobs` to unprocessed and collect their batch items.
pub fn prepare_items<'a>(jobs: impl IntoIterator<Item = &'a mut ImageJob>) -> Vec<BatchItem> {
    jobs.into_iter()
        .map(|job| {
            job.state = ProcessState::Unprocessed;
            job.last_error_detail = None;
            BatchItem {
                path: job.path.clone(),
                source: Arc::clone(&job.source),
            }
        })
        .collect()
}

/// Worker -> coordinator message of a batch run.
#[derive(Debug)]
pub enum SaveMessage {
    Saved {
        index: usize,
        path: PathBuf,
        result: Box<SaveResult>,
        attempts: u32,
    },
    /// The item blew up outside the save pipeline
    Crashed {
        index: usize,
        path: PathBuf,
        error: String,
    },
    Done {
        canceled: bool,
    },
}

/// Outcome of one item, as seen by the UI layer.
#[derive(Debug, Clone)]
pub struct BatchItemReport {
    pub index: usize,
    pub path: PathBuf,
    pub result: Option<SaveResult>,
    pub attempts: u32,
    /// Failure text for display; `None` on success
    pub error_detail: Option<String>,
}

impl BatchItemReport {
    pub fn success(&self) -> bool {
        self.error_detail.is_none()
    }

    /// Record this outcome on the job it belongs to.
    pub fn apply_to(&self, job: &mut ImageJob) {
        match &self.error_detail {
            None => job.mark_success(),
            Some(detail) => job.mark_failed(detail.clone()),
        }
    }

    /// Apply to whichever of `jobs` has this report's path.
    pub fn apply_to_matching(&self, jobs: &mut [ImageJob]) {
        if let Some(job) = jobs.iter_mut().find(|job| job.path == self.path) {
            self.apply_to(job);
        }
    }

    /// Status line for logs and progress output.
    pub fn status_text(&self) -> String {
        match (&self.result, &self.error_detail) {
            (Some(result), None) => format!(
                "{} -> {} ({})",
                self.path.display(),
                result.output_path.display(),
                exif_status_text(result)
            ),
            (_, Some(detail)) => format!("{}: {}", self.path.display(), detail),
            (None, None) => self.path.display().to_string(),
        }
    }
}

#[derive(Debug)]
pub enum BatchEvent {
    Item(BatchItemReport),
    Finished(OperationSummary),
}

fn failure_detail(result: &SaveResult, attempts: u32) -> String {
    let mut detail = result
        .error
        .clone()
        .unwrap_or_else(|| "unknown save error".to_string());
    if let Some(guidance) = &result.error_guidance {
        detail.push('\n');
        detail.push_str(guidance);
    }
    if attempts > 1 {
        detail.push_str(" (failed after retry)");
    }
    detail
}

fn save_item(item: &BatchItem, plan: &BatchPlan) -> (SaveResult, u32) {
    let options = plan.options_for(&item.source);
    let resized = plan.resize.apply(&item.source.image);
    let base = build_unique_batch_base_path(
        &plan.output_dir,
        &file_stem(&item.path),
        options.output_format,
        options.dry_run,
    );
    save_with_retry(
        &item.source,
        &resized,
        &base,
        &options,
        plan.allow_retry,
        &plan.retry,
    )
}

fn run_batch(
    items: &[BatchItem],
    plan: &BatchPlan,
    cancel: &CancellationToken,
    sender: &WorkerSender<SaveMessage>,
) -> bool {
    for (i, item) in items.iter().enumerate() {
        if cancel.is_cancelled() {
            return true;
        }
        let index = i + 1;
        let message = match panic::catch_unwind(AssertUnwindSafe(|| save_item(item, plan))) {
            Ok((result, attempts)) => SaveMessage::Saved {
                index,
                path: item.path.clone(),
                result: Box::new(result),
                attempts,
            },
            Err(payload) => SaveMessage::Crashed {
                index,
                path: item.path.clone(),
                error: panic_message(payload.as_ref()),
            },
        };
        if !sender.send(message) {
            break;
        }
    }
    cancel.is_cancelled()
}

/// One in-flight batch save.
pub struct BatchSaveSession {
    label: String,
    dry_run: bool,
    cancel: CancellationToken,
    queue: MessageQueue<SaveMessage>,
    worker: Option<JoinHandle<()>>,
    poll_batch: usize,
    started: Instant,
    total: usize,
    stats: BatchStats,
    finished: Option<OperationSummary>,
}

impl BatchSaveSession {
    /// Spawn the save worker for `items`.
    pub fn start(
        label: impl Into<String>,
        items: Vec<BatchItem>,
        plan: BatchPlan,
        config: &Config,
    ) -> Result<Self> {
        let label = label.into();
        let total = items.len();
        let dry_run = plan.options.dry_run;
        let cancel = CancellationToken::new();
        let (sender, queue) = queue_for(&config.load);

        let worker_cancel = cancel.clone();
        let worker = thread::Builder::new()
            .name("karuku-batch".into())
            .spawn(move || {
                let canceled = run_batch(&items, &plan, &worker_cancel, &sender);
                sender.send(SaveMessage::Done { canceled });
            })?;
        tracing::info!("{}: saving {} files", label, total);

        Ok(Self {
            label,
            dry_run,
            cancel,
            queue,
            worker: Some(worker),
            poll_batch: config.load.poll_batch,
            started: Instant::now(),
            total,
            stats: BatchStats::default(),
            finished: None,
        })
    }

    /// Re-run only the jobs a finished batch reported as failed.
    pub fn retry_failed(
        previous: &OperationSummary,
        jobs: &mut [ImageJob],
        plan: BatchPlan,
        config: &Config,
    ) -> Option<Result<Self>> {
        if !previous.can_retry() {
            return None;
        }
        let failed: HashSet<&PathBuf> = previous.retry_paths.iter().collect();
        let items = prepare_items(jobs.iter_mut().filter(|job| failed.contains(&job.path)));
        if items.is_empty() {
            return None;
        }
        let label = format!("{} (retry failed)", previous.label);
        Some(Self::start(label, items, plan, config))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cancel(&self) {
        if self.finished.is_none() {
            tracing::info!("{}: cancel requested", self.label);
            self.cancel.cancel();
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    pub fn summary(&self) -> Option<&OperationSummary> {
        self.finished.as_ref()
    }

    pub fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            succeeded: self.stats.processed,
            failed: self.stats.failed,
            elapsed: self.started.elapsed(),
        }
    }

    /// Once finished, cancellation is whatever the worker reported.
    pub fn completion_message(&self) -> String {
        let canceled = self
            .finished
            .as_ref()
            .map(|summary| summary.canceled)
            .unwrap_or_else(|| self.cancel.is_cancelled());
        self.stats
            .completion_message(self.total, canceled, self.dry_run)
    }

    /// Handle up to `poll_batch` ready messages. Never blocks.
    pub fn poll(&mut self) -> Vec<BatchEvent> {
        if self.finished.is_some() {
            return Vec::new();
        }
        let mut events = Vec::new();
        for message in self.queue.drain(self.poll_batch) {
            events.push(self.handle(message));
            if self.finished.is_some() {
                return events;
            }
        }
        if self.queue.is_disconnected() {
            tracing::warn!("{}: worker exited without a done message", self.label);
            let canceled = self.cancel.is_cancelled();
            events.push(BatchEvent::Finished(self.finish(canceled)));
        }
        events
    }

    /// Wait for the next event. Returns `None` after `Finished`.
    pub async fn next_event(&mut self) -> Option<BatchEvent> {
        if self.finished.is_some() {
            return None;
        }
        match self.queue.recv().await {
            Some(message) => Some(self.handle(message)),
            None => {
                let canceled = self.cancel.is_cancelled();
                Some(BatchEvent::Finished(self.finish(canceled)))
            }
        }
    }

    fn handle(&mut self, message: SaveMessage) -> BatchEvent {
        match message {
            SaveMessage::Saved {
                index,
                path,
                result,
                attempts,
            } => {
                let error_detail = if result.success {
                    self.stats.record_success(&result);
                    None
                } else {
                    let detail = failure_detail(&result, attempts);
                    tracing::error!(
                        "Failed to save {}: {}",
                        result.output_path.display(),
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                    self.stats
                        .record_failure(&file_name(&path), &detail, Some(&path));
                    Some(detail)
                };
                BatchEvent::Item(BatchItemReport {
                    index,
                    path,
                    result: Some(*result),
                    attempts,
                    error_detail,
                })
            }
            SaveMessage::Crashed { index, path, error } => {
                let detail = format!("unexpected error: {}", error);
                tracing::error!("Unexpected error during batch save of {}: {}", path.display(), error);
                self.stats.record_failure(&file_name(&path), &detail, Some(&path));
                BatchEvent::Item(BatchItemReport {
                    index,
                    path,
                    result: None,
                    attempts: 1,
                    error_detail: Some(detail),
                })
            }
            SaveMessage::Done { canceled } => BatchEvent::Finished(self.finish(canceled)),
        }
    }

    fn finish(&mut self, canceled: bool) -> OperationSummary {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("{}: worker thread panicked", self.label);
            }
        }
        let summary = OperationSummary {
            label: self.label.clone(),
            canceled,
            total: self.total,
            succeeded: self.stats.processed,
            failed: self.stats.failed,
            failed_details: self.stats.failed_details.clone(),
            retry_paths: if canceled {
                Vec::new()
            } else {
                self.stats.failed_paths.clone()
            },
        };
        tracing::info!("{}", summary);
        self.finished = Some(summary.clone());
        summary
    }
}

impl Drop for BatchSaveSession {
    fn drop(&mut self) {
        if self.finished.is_none() {
            self.cancel.cancel();
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::OutputFormat;
    use image::DynamicImage;
    use std::time::Duration;

    fn job(path: &str, width: u32) -> ImageJob {
        let source = SourceImage::from_image(DynamicImage::new_rgb8(width, 10));
        ImageJob::new(path, Arc::new(source))
    }

    fn plan(dir: &Path, dry_run: bool) -> BatchPlan {
        BatchPlan {
            output_dir: dir.to_path_buf(),
            resize: ResizeSpec::Width { width: 8 },
            format_selection: "jpeg".into(),
            options: SaveOptions::new(OutputFormat::Jpeg).with_dry_run(dry_run),
            allow_retry: false,
            retry: RetryPolicy::once(),
        }
    }

    fn run_to_end(session: &mut BatchSaveSession) -> (Vec<BatchItemReport>, OperationSummary) {
        let mut reports = Vec::new();
        loop {
            for event in session.poll() {
                match event {
                    BatchEvent::Item(report) => reports.push(report),
                    BatchEvent::Finished(summary) => return (reports, summary),
                }
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_batch_saves_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut jobs = vec![job("/in/a/photo.jpg", 20), job("/in/b/photo.jpg", 30)];
        let items = prepare_items(jobs.iter_mut());

        let mut session =
            BatchSaveSession::start("Batch", items, plan(dir.path(), false), &Config::default())
                .unwrap();
        let (reports, summary) = run_to_end(&mut session);

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);
        assert!(dir.path().join("photo_resized.jpg").exists());
        assert!(dir.path().join("photo_resized_1.jpg").exists());

        for report in &reports {
            report.apply_to_matching(&mut jobs);
        }
        assert!(jobs.iter().all(|j| j.state == ProcessState::Success));
        assert!(session.completion_message().starts_with("Batch complete. saved 2/2"));
    }

    #[test]
    fn test_late_cancel_keeps_complete_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut jobs = vec![job("/in/late.jpg", 20)];
        let items = prepare_items(jobs.iter_mut());
        let mut session =
            BatchSaveSession::start("Batch", items, plan(dir.path(), false), &Config::default())
                .unwrap();
        let (_, summary) = run_to_end(&mut session);
        assert!(!summary.canceled);

        session.cancel_token().cancel();
        assert!(session.completion_message().starts_with("Batch complete. saved 1/1"));
    }

    #[test]
    fn test_dotted_sources_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"").unwrap();
        let mut jobs = vec![job("/in/a.v1.jpg", 20), job("/in/a.v2.jpg", 20)];
        let items = prepare_items(jobs.iter_mut());

        let mut session =
            BatchSaveSession::start("Batch", items, plan(dir.path(), false), &Config::default())
                .unwrap();
        let (reports, summary) = run_to_end(&mut session);

        assert_eq!(summary.succeeded, 2);
        assert!(dir.path().join("a.v1_resized.jpg").exists());
        assert!(dir.path().join("a.v2_resized.jpg").exists());
        assert_eq!(std::fs::read(dir.path().join("a.jpg")).unwrap(), b"");
        let outputs: HashSet<PathBuf> = reports
            .iter()
            .filter_map(|r| r.result.as_ref().map(|res| res.output_path.clone()))
            .collect();
        assert_eq!(outputs.len(), 2);
    }

    #[test]
    fn test_dry_run_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut jobs = vec![job("/in/x.png", 20)];
        let items = prepare_items(jobs.iter_mut());
        let mut session =
            BatchSaveSession::start("Batch", items, plan(dir.path(), true), &Config::default())
                .unwrap();
        let (_, summary) = run_to_end(&mut session);

        assert_eq!(summary.succeeded, 1);
        assert_eq!(session.stats().dry_run, 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(session.completion_message().contains("no files were written"));
    }

    #[test]
    fn test_cancel_before_start_saves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut jobs: Vec<ImageJob> = (0..5).map(|i| job(&format!("/in/{i}.jpg"), 20)).collect();
        let items = prepare_items(jobs.iter_mut());
        let mut session =
            BatchSaveSession::start("Batch", items, plan(dir.path(), false), &Config::default())
                .unwrap();
        session.cancel();
        let (reports, summary) = run_to_end(&mut session);
        if summary.canceled {
            assert!(reports.len() < 5);
            assert!(summary.retry_paths.is_empty());
        }
    }

    #[test]
    fn test_failure_detail_mentions_retry() {
        let result = SaveResult {
            success: false,
            output_path: PathBuf::from("x.jpg"),
            exif_mode: crate::save::ExifMode::Keep,
            dry_run: false,
            had_source_exif: false,
            exif_requested: false,
            exif_attached: false,
            exif_fallback_without_metadata: false,
            exif_skipped_reason: None,
            gps_removed: false,
            edited_fields: Vec::new(),
            skipped_reason: None,
            error: Some("locked".into()),
            error_code: Some(32),
            error_category: None,
            retryable: true,
            error_guidance: Some("Close the other program.".into()),
            name_notice: None,
        };
        assert_eq!(
            failure_detail(&result, 2),
            "locked\nClose the other program. (failed after retry)"
        );
        assert_eq!(failure_detail(&result, 1), "locked\nClose the other program.");
    }

    #[test]
    fn test_stats_counters() {
        let mut stats = BatchStats::default();
        stats.record_failure("a.jpg", "disk full", Some(Path::new("/in/a.jpg")));
        stats.record_failure("b.jpg", "boom", None);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.failed_paths, vec![PathBuf::from("/in/a.jpg")]);
        assert_eq!(stats.failed_details[0], "a.jpg: disk full");
    }
}
