mod attempt;
mod error;
mod log;
mod metadata;

pub use attempt::{CaptureAttempt, CaptureState};
pub use error::{CaptureError, CaptureResult};
pub use log::{CaptureLog, LogEvent, Stage};
pub use metadata::{ArtifactRecord, SnapshotMetadata};
