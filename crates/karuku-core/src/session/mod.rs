//! Session coordinators: the owners of a worker's queue and cancellation
//! token, polled by the UI layer.

pub mod batch;
pub mod load;
pub mod progress;
pub mod summary;

pub use batch::{
    prepare_items, BatchEvent, BatchItem, BatchItemReport, BatchPlan, BatchSaveSession,
    BatchStats,
};
pub use load::{LoadEvent, LoadSession};
pub use progress::{format_duration, ProgressSnapshot};
pub use summary::{exif_status_text, OperationSummary};
