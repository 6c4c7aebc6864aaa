//! Progress reporting and cooperative cancellation.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::sync::SyncOutcome;

/// Current stage of a synchronization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStage {
    OpeningArchive,
    Extracting,
    DownloadingFiles,
    ProcessingOverrides,
    DownloadingLoader,
    Complete,
}

/// Progress snapshot. `fraction` is in `0.0..=1.0` and never decreases
/// within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub stage: SyncStage,
    pub fraction: f32,
    pub message: String,
}

/// Events delivered to the caller while a run is in flight.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Progress(SyncProgress),
    /// A project was left out because its info could not be fetched or parsed.
    ProjectSkipped { project_id: u64, reason: String },
    /// Sent once when the run returns normally.
    Finished(SyncOutcome),
    /// Sent once when the run returns an error.
    Failed { message: String },
}

/// Callback receiving [`SyncEvent`]s. It may be invoked from the thread
/// running the engine, so it has to be thread-safe.
pub type EventCallback = Arc<dyn Fn(SyncEvent) + Send + Sync>;

/// Shared flag a caller raises to stop a run between steps.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Error::Cancelled)` once the flag has been raised.
    pub fn check(&self) -> Result<()> {
        if self.is_stopped() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Fraction reported before downloading item `index` of `total`.
pub(crate) fn download_fraction(index: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.15;
    }
    0.15 + 0.70 * index as f32 / total as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_flag_shared_between_clones() {
        let flag = StopFlag::new();
        let other = flag.clone();
        assert!(flag.check().is_ok());

        other.stop();
        assert!(flag.is_stopped());
        assert!(matches!(flag.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_download_fraction_range() {
        assert_eq!(download_fraction(0, 0), 0.15);
        assert_eq!(download_fraction(0, 4), 0.15);
        assert!((download_fraction(2, 4) - 0.5).abs() < f32::EPSILON);
        assert!(download_fraction(3, 4) < 0.90);
    }

    #[test]
    fn test_progress_serializes_camel_case() {
        let progress = SyncProgress {
            stage: SyncStage::ProcessingOverrides,
            fraction: 0.9,
            message: "Processing overrides".to_string(),
        };
        let json = serde_json::to_value(&progress).unwrap();

        assert_eq!(json["stage"], "processingOverrides");
        assert_eq!(json["message"], "Processing overrides");
    }
}
