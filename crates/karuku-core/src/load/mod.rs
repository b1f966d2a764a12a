//! The load side: candidate discovery, decoding and the background worker
//! that streams results to a session coordinator.

pub mod cancel;
pub mod channel;
pub mod decode;
pub mod discovery;
pub mod messages;
pub mod worker;

pub use cancel::CancellationToken;
pub use channel::{bounded_queue, queue_for, MessageQueue, WorkerSender};
pub use decode::ImageDecoder;
pub use discovery::{
    dedupe_paths, normalize_dropped_path_text, parse_path_list, Discovery, FileDiscovery,
    LoadRequest,
};
pub use messages::{load_error_detail, LoadMessage};
pub use worker::LoadWorker;
