//! Load session coordinator.
//!
//! Owns the cancellation token and queue of one background load, turns
//! worker messages into `LoadEvent`s and keeps the running counters. The
//! caller polls it from a timer (`poll`) or awaits it (`next_event`).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::Result;
use crate::load::{
    queue_for, CancellationToken, LoadMessage, LoadRequest, LoadWorker, MessageQueue,
};
use crate::types::ImageJob;

use super::progress::ProgressSnapshot;
use super::summary::OperationSummary;

/// What the UI layer should react to.
#[derive(Debug)]
pub enum LoadEvent {
    ScanProgress {
        detected: usize,
        elapsed: Duration,
    },
    ScanDone {
        total: usize,
        reached_limit: bool,
    },
    /// A decoded image; the receiver now owns the job
    Loaded { job: ImageJob, index: usize },
    Failed {
        path: PathBuf,
        detail: String,
        index: usize,
    },
    Fatal(String),
    Finished(OperationSummary),
}

/// One in-flight load operation.
pub struct LoadSession {
    label: String,
    root_dir: Option<PathBuf>,
    cancel: CancellationToken,
    queue: MessageQueue<LoadMessage>,
    worker: Option<JoinHandle<()>>,
    poll_batch: usize,
    scan_started: Instant,
    load_started: Option<Instant>,
    total: usize,
    reached_limit: bool,
    loaded: usize,
    failed_details: Vec<String>,
    failed_paths: Vec<PathBuf>,
    finished: Option<OperationSummary>,
}

impl LoadSession {
    /// Spawn the worker for `request` and return the coordinator.
    pub fn start(label: impl Into<String>, request: LoadRequest, config: &Config) -> Result<Self> {
        let label = label.into();
        let root_dir = match &request {
            LoadRequest::Directory(root) => Some(root.clone()),
            _ => None,
        };
        let cancel = CancellationToken::new();
        let (sender, queue) = queue_for(&config.load);
        let worker = LoadWorker::new(config.load.clone(), config.limits.clone())
            .spawn(request, cancel.clone(), sender)?;
        tracing::info!("{}: load session started", label);

        Ok(Self {
            label,
            root_dir,
            cancel,
            queue,
            worker: Some(worker),
            poll_batch: config.load.poll_batch,
            scan_started: Instant::now(),
            load_started: None,
            total: 0,
            reached_limit: false,
            loaded: 0,
            failed_details: Vec::new(),
            failed_paths: Vec::new(),
            finished: None,
        })
    }

    /// Start a path-list session covering only the failures of a finished
    /// session. `None` when there is nothing to retry.
    pub fn retry_failed(previous: &OperationSummary, config: &Config) -> Option<Result<Self>> {
        if !previous.can_retry() {
            return None;
        }
        let label = format!("{} (retry failed)", previous.label);
        Some(Self::start(
            label,
            LoadRequest::Paths(previous.retry_targets()),
            config,
        ))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Request cooperative cancellation. Keep polling until `Finished`.
    pub fn cancel(&self) {
        if self.finished.is_none() {
            tracing::info!("{}: cancel requested", self.label);
            self.cancel.cancel();
        }
    }

    /// Handle for cancelling from elsewhere (e.g. a Ctrl-C handler).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    pub fn summary(&self) -> Option<&OperationSummary> {
        self.finished.as_ref()
    }

    pub fn reached_limit(&self) -> bool {
        self.reached_limit
    }

    /// Handle whatever the worker has produced so far, at most
    /// `poll_batch` messages. Never blocks.
    pub fn poll(&mut self) -> Vec<LoadEvent> {
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
            events.push(self.finish_without_done());
        }
        events
    }

    /// Wait for the next event. Returns `None` after `Finished`.
    pub async fn next_event(&mut self) -> Option<LoadEvent> {
        if self.finished.is_some() {
            return None;
        }
        match self.queue.recv().await {
            Some(message) => Some(self.handle(message)),
            None => Some(self.finish_without_done()),
        }
    }

    /// Progress of the decode phase.
    pub fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            succeeded: self.loaded,
            failed: self.failed_details.len(),
            elapsed: self.load_started.map(|t| t.elapsed()).unwrap_or_default(),
        }
    }

    /// Path relative to the scanned root when possible.
    pub fn display_path(&self, path: &Path) -> String {
        self.root_dir
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .map(|rel| rel.display().to_string())
            .unwrap_or_else(|| path.display().to_string())
    }

    fn handle(&mut self, message: LoadMessage) -> LoadEvent {
        match message {
            LoadMessage::ScanProgress { count } => LoadEvent::ScanProgress {
                detected: count,
                elapsed: self.scan_started.elapsed(),
            },
            LoadMessage::ScanDone {
                total,
                reached_limit,
            } => {
                self.total = total;
                self.reached_limit = reached_limit;
                self.load_started = Some(Instant::now());
                if reached_limit {
                    tracing::warn!("{}: candidate limit reached at {}", self.label, total);
                }
                LoadEvent::ScanDone {
                    total,
                    reached_limit,
                }
            }
            LoadMessage::Loaded { path, image, index } => {
                self.loaded += 1;
                LoadEvent::Loaded {
                    job: ImageJob::new(path, Arc::from(image)),
                    index,
                }
            }
            LoadMessage::LoadError { path, error, index } => {
                self.failed_details
                    .push(format!("{}: {}", self.display_path(&path), error));
                self.failed_paths.push(path.clone());
                LoadEvent::Failed {
                    path,
                    detail: error,
                    index,
                }
            }
            LoadMessage::Fatal { error } => {
                tracing::error!("{}: fatal loader error: {}", self.label, error);
                self.failed_details.push(format!("fatal: {}", error));
                LoadEvent::Fatal(error)
            }
            LoadMessage::Done { canceled } => LoadEvent::Finished(self.finish(canceled)),
        }
    }

    fn finish_without_done(&mut self) -> LoadEvent {
        tracing::warn!("{}: worker exited without a done message", self.label);
        let canceled = self.cancel.is_cancelled();
        LoadEvent::Finished(self.finish(canceled))
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
            succeeded: self.loaded,
            failed: self.failed_details.len(),
            failed_details: self.failed_details.clone(),
            retry_paths: if canceled {
                Vec::new()
            } else {
                self.failed_paths.clone()
            },
        };
        tracing::info!("{}", summary);
        self.finished = Some(summary.clone());
        summary
    }
}

impl Drop for LoadSession {
    fn drop(&mut self) {
        // An abandoned session must not leave its worker decoding
        if self.finished.is_none() {
            self.cancel.cancel();
        }
    }
}
