//! # cloudwrap-core
//!
//! Shared core for wrappers around cloud provider SDKs. A resource wrapper
//! (one per cloud resource type) composes four pieces from this crate around
//! a single provider call:
//!
//! - **[Operation polling](poller)** - provider-specific long-running operation
//!   values are mapped to a uniform [`OperationHandle`] by an
//!   [`OperationAdapter`], and one generic [`OperationPoller`] drives any of
//!   them to completion under a deadline.
//! - **[Call annotation](annotator)** - [`CallAnnotator`] times every remote
//!   call and emits exactly one [`CallRecord`] to a [`TelemetrySink`] without
//!   changing the call's result.
//! - **[Retry classification](retry)** - [`classify`] splits provider errors
//!   into retryable and terminal using only the provider's retryable flag.
//! - **[Cleanup recording](cleanup)** - [`CleanupRecorder`] registers created
//!   resources with a tracking service, best-effort and without rollback.
//!
//! All of them are configured from one immutable [`ClientConfig`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cloudwrap_core::{
//!     CleanupRecorder, ClientConfig, CoreContext, LongRunningAdapter, OperationPoller,
//!     Settings, TracingSink, create_and_wait,
//! };
//!
//! let settings = Settings::load_from_path(Path::new("cloudwrap.toml"))?;
//! let ctx = CoreContext::new(
//!     settings.client_config(Arc::new(TracingSink))?,
//!     CleanupRecorder::http()?,
//!     OperationPoller::from_config(&settings.polling),
//! );
//!
//! let handle = create_and_wait(
//!     &ctx,
//!     StorageOperation::CreateBucket,
//!     &LongRunningAdapter,
//!     uid,
//!     || storage.create_bucket(&request),
//!     || storage.get_operation(&name),
//! )
//! .await?;
//! ```
//!
//! ## Logging
//!
//! The crate logs through `tracing` and never installs a subscriber; the
//! default telemetry sink ([`TracingSink`]) writes call records as events.

pub mod annotator;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod kind;
pub mod operation;
pub mod poller;
pub mod retry;
pub mod telemetry;
pub mod workflows;

// Re-export main types
pub use annotator::{AnnotatedCall, CallAnnotator, RequestSerializer};
pub use cleanup::{
    CleanupRecorder, CleanupRecordingError, HttpResourceTracker, ResourceTracker, ResourceUid,
    TrackAck, TrackedResourceRequest,
};
pub use config::{
    CleanupConfig, ClientConfig, ClientConfigBuilder, ConfigError, PollingConfig, RetryConfig,
    Settings, TrackerCredentials,
};
pub use error::{
    CoreError, ErrorRecord, OperationFailed, OperationTimeoutError, ProviderError, Result,
};
pub use kind::{CloudOperationKind, CloudPlatform, OperationKindLabel};
pub use operation::{
    AzureAdapter, ComputeAdapter, JsonOperationAdapter, LongRunningAdapter, OperationAdapter,
    OperationHandle, OperationSchema,
};
pub use poller::{OperationPoller, ProgressCallback, ProgressEvent};
pub use retry::{RetryVerdict, TerminalError, classify, retry_annotated};
pub use telemetry::{
    CallOutcome, CallRecord, FanoutSink, InMemorySink, MetricsSink, NoopSink, RequestData,
    TelemetrySink, TracingSink,
};
pub use workflows::{CoreContext, create_and_wait};
