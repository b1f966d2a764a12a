//! Bounded worker -> poller queue.
//!
//! Workers run on plain threads and block on `send` when the queue is full,
//! which caps memory at a few decoded images. The poller never blocks: it
//! drains at most a fixed number of messages per tick.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::config::LoadConfig;

/// Producer half, used from a worker thread.
#[derive(Debug)]
pub struct WorkerSender<T> {
    inner: mpsc::Sender<T>,
}

impl<T> Clone for WorkerSender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> WorkerSender<T> {
    /// Blocking send. Returns `false` once the poller has gone away.
    ///
    /// Must not be called from inside an async runtime.
    pub fn send(&self, message: T) -> bool {
        self.inner.blocking_send(message).is_ok()
    }
}

/// Consumer half, owned by the coordinator.
#[derive(Debug)]
pub struct MessageQueue<T> {
    inner: mpsc::Receiver<T>,
    disconnected: bool,
}

impl<T> MessageQueue<T> {
    /// Take up to `max` messages that are ready right now.
    pub fn drain(&mut self, max: usize) -> Vec<T> {
        let mut batch = Vec::new();
        while batch.len() < max {
            match self.inner.try_recv() {
                Ok(message) => batch.push(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        batch
    }

    /// Wait for the next message. Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<T> {
        let message = self.inner.recv().await;
        if message.is_none() {
            self.disconnected = true;
        }
        message
    }

    /// True once every sender has been dropped and the queue is empty.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

/// Create a bounded queue with an explicit capacity (minimum 1).
pub fn bounded_queue<T>(capacity: usize) -> (WorkerSender<T>, MessageQueue<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        WorkerSender { inner: tx },
        MessageQueue {
            inner: rx,
            disconnected: false,
        },
    )
}

/// Create a bounded queue sized from the load configuration.
pub fn queue_for<T>(config: &LoadConfig) -> (WorkerSender<T>, MessageQueue<T>) {
    bounded_queue(config.queue_capacity)
}
