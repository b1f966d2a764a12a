//! Background load worker.
//!
//! One plain thread per load session. It scans, decodes sequentially and
//! reports through a bounded queue, so a slow consumer stalls the decoder
//! instead of piling up decoded images.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crate::config::{LimitsConfig, LoadConfig};

use super::cancel::CancellationToken;
use super::channel::WorkerSender;
use super::decode::ImageDecoder;
use super::discovery::{Cancelled, FileDiscovery, LoadRequest};
use super::messages::{load_error_detail, LoadMessage};

/// Scans and decodes the candidates of one `LoadRequest`.
pub struct LoadWorker {
    discovery: FileDiscovery,
    decoder: ImageDecoder,
}

impl LoadWorker {
    pub fn new(load: LoadConfig, limits: LimitsConfig) -> Self {
        Self {
            discovery: FileDiscovery::new(load),
            decoder: ImageDecoder::new(limits),
        }
    }

    /// Start the worker on its own thread.
    pub fn spawn(
        self,
        request: LoadRequest,
        cancel: CancellationToken,
        sender: WorkerSender<LoadMessage>,
    ) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("karuku-load".into())
            .spawn(move || self.run(&request, &cancel, &sender))
    }

    /// Run to completion on the current thread. Always sends exactly one
    /// `Done`, also when the body panics.
    pub fn run(
        &self,
        request: &LoadRequest,
        cancel: &CancellationToken,
        sender: &WorkerSender<LoadMessage>,
    ) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.load_all(request, cancel, sender)
        }));
        let canceled = match outcome {
            Ok(canceled) => canceled,
            Err(payload) => {
                let error = panic_message(payload.as_ref());
                tracing::error!("Load worker failed: {}", error);
                sender.send(LoadMessage::Fatal { error });
                cancel.is_cancelled()
            }
        };
        sender.send(LoadMessage::Done { canceled });
    }

    /// Returns whether the run was canceled.
    fn load_all(
        &self,
        request: &LoadRequest,
        cancel: &CancellationToken,
        sender: &WorkerSender<LoadMessage>,
    ) -> bool {
        let discovery = match self.discovery.discover(request, cancel, |count| {
            sender.send(LoadMessage::ScanProgress { count });
        }) {
            Ok(discovery) => discovery,
            Err(Cancelled) => return true,
        };

        let total = discovery.candidates.len();
        tracing::info!(
            "Found {} candidates{}",
            total,
            if discovery.reached_limit { " (limit reached)" } else { "" }
        );
        if !sender.send(LoadMessage::ScanDone {
            total,
            reached_limit: discovery.reached_limit,
        }) {
            return cancel.is_cancelled();
        }

        for (i, path) in discovery.candidates.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return true;
            }
            let index = i + 1;
            let message = match self.decoder.decode_file(&path) {
                Ok(image) => {
                    tracing::debug!("Loaded {} ({}/{})", path.display(), index, total);
                    LoadMessage::Loaded {
                        path,
                        image: Box::new(image),
                        index,
                    }
                }
                Err(e) => {
                    let error = load_error_detail(&path, &e);
                    tracing::warn!("Load failed: {}", error);
                    LoadMessage::LoadError { path, error, index }
                }
            };
            if !sender.send(message) {
                tracing::debug!("Load queue closed, stopping worker");
                break;
            }
        }
        cancel.is_cancelled()
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::channel::bounded_queue;
    use image::{DynamicImage, ImageFormat};
    use std::path::PathBuf;

    fn worker() -> LoadWorker {
        LoadWorker::new(LoadConfig::default(), LimitsConfig::default())
    }

    fn collect(request: LoadRequest, cancel: CancellationToken) -> Vec<LoadMessage> {
        let (tx, mut rx) = bounded_queue(8);
        let handle = worker().spawn(request, cancel, tx).unwrap();
        let mut messages = Vec::new();
        loop {
            let batch = rx.drain(30);
            let done = batch.iter().any(LoadMessage::is_done);
            messages.extend(batch);
            if done {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        handle.join().unwrap();
        messages
    }

    #[test]
    fn test_message_order_and_indices() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("a.png");
        DynamicImage::new_rgb8(4, 4)
            .save_with_format(&good, ImageFormat::Png)
            .unwrap();
        let bad = dir.path().join("b.jpg");
        std::fs::write(&bad, b"garbage").unwrap();

        let messages = collect(
            LoadRequest::Paths(vec![good.clone(), bad.clone()]),
            CancellationToken::new(),
        );
        assert_eq!(messages.len(), 4);
        assert!(matches!(
            messages[0],
            LoadMessage::ScanDone { total: 2, reached_limit: false }
        ));
        assert!(matches!(&messages[1], LoadMessage::Loaded { index: 1, path, .. } if *path == good));
        assert!(matches!(&messages[2], LoadMessage::LoadError { index: 2, path, .. } if *path == bad));
        assert!(matches!(messages[3], LoadMessage::Done { canceled: false }));
    }

    #[test]
    fn test_cancel_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let messages = collect(
            LoadRequest::Paths(vec![PathBuf::from("x.jpg")]),
            cancel,
        );
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], LoadMessage::Done { canceled: true }));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(3u8);
        assert_eq!(panic_message(payload.as_ref()), "worker panicked");
    }
}
