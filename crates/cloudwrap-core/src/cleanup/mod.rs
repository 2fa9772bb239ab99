//! Best-effort cleanup recording
//!
//! After a resource is created, [`CleanupRecorder`] registers it with an
//! external tracking service that deletes it once its time-to-live expires.
//! Recording never fails from the caller's point of view: transport errors,
//! rejections and bad payloads are logged and dropped, and the created
//! resource is left in place.

mod error;
pub mod resource;
pub mod tracker;

pub use error::{CleanupRecordingError, Result};
pub use resource::*;
pub use tracker::{
    DEFAULT_TRACKER_TIMEOUT, HttpResourceTracker, ResourceTracker, TrackAck,
    TrackedResourceRequest,
};

use crate::config::{CleanupConfig, ClientConfig};
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Registers created resources for later cleanup
#[derive(Clone)]
pub struct CleanupRecorder {
    tracker: Arc<dyn ResourceTracker>,
}

impl std::fmt::Debug for CleanupRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupRecorder").finish_non_exhaustive()
    }
}

impl CleanupRecorder {
    pub fn new(tracker: Arc<dyn ResourceTracker>) -> Self {
        Self { tracker }
    }

    /// Recorder backed by [`HttpResourceTracker`] with default settings
    pub fn http() -> Result<Self> {
        Ok(Self::new(Arc::new(HttpResourceTracker::with_defaults()?)))
    }

    /// Register `uid` with the tracking service
    ///
    /// Failures are logged at warn level and otherwise ignored.
    pub async fn record(&self, uid: ResourceUid, config: &CleanupConfig) {
        let request = TrackedResourceRequest::new(uid, config, Utc::now());

        match self.tracker.create_tracked_resource(config, &request).await {
            Ok(ack) => {
                tracing::debug!(
                    resource = %request.resource_uid,
                    cleanup_id = %request.cleanup_id,
                    expiration = %request.expiration,
                    tracked_resource_id = ack.tracked_resource_id.as_deref(),
                    "Recorded resource for cleanup"
                );
            }
            Err(e) => {
                tracing::warn!(
                    resource = %request.resource_uid,
                    cleanup_id = %request.cleanup_id,
                    error = %e,
                    "Failed to record resource for cleanup"
                );
            }
        }
    }

    /// Register `uid` if the client has cleanup enabled
    pub async fn record_for(&self, config: &ClientConfig, uid: ResourceUid) {
        match config.cleanup() {
            Some(cleanup) => self.record(uid, cleanup).await,
            None => tracing::trace!(resource = %uid, "Cleanup disabled, not recording"),
        }
    }

    /// Record on a detached task
    ///
    /// Callers that need the recording to finish first can await the handle.
    pub fn spawn_record(&self, uid: ResourceUid, config: CleanupConfig) -> JoinHandle<()> {
        let recorder = self.clone();
        tokio::spawn(async move { recorder.record(uid, &config).await })
    }
}
