//! Workflows - multi-step operations
//!
//! These workflows compose the annotator, poller and cleanup recorder the
//! way a resource wrapper would: start the operation, wait for it, then
//! register the new resource for cleanup.

use crate::annotator::CallAnnotator;
use crate::cleanup::{CleanupRecorder, ResourceUid};
use crate::config::ClientConfig;
use crate::error::{OperationFailed, OperationTimeoutError, ProviderError};
use crate::kind::CloudOperationKind;
use crate::operation::{OperationAdapter, OperationHandle};
use crate::poller::OperationPoller;
use crate::telemetry::RequestData;
use std::future::Future;

/// Collaborators shared by every wrapper of one client
///
/// Built once at startup and passed by reference; nothing here is global.
#[derive(Debug)]
pub struct CoreContext {
    pub config: ClientConfig,
    pub annotator: CallAnnotator,
    pub recorder: CleanupRecorder,
    pub poller: OperationPoller,
}

impl CoreContext {
    pub fn new(config: ClientConfig, recorder: CleanupRecorder, poller: OperationPoller) -> Self {
        Self {
            annotator: CallAnnotator::new(&config),
            config,
            recorder,
            poller,
        }
    }
}

/// Create a resource and wait for its operation to finish
///
/// This is a convenience workflow that:
/// 1. Runs the annotated creation call (returns the provider's operation)
/// 2. Polls the operation until done, annotating every status fetch
/// 3. Registers `uid` for cleanup once the operation succeeded
///
/// # Arguments
///
/// * `ctx` - Shared collaborators
/// * `kind` - Operation kind used for the creation call and status fetches
/// * `adapter` - Maps the provider's raw operation to a handle
/// * `uid` - Identity of the resource being created
/// * `create` - The creation call
/// * `refresh` - One status fetch of the started operation
///
/// # Errors
///
/// The creation or status-fetch error unchanged, [`OperationTimeoutError`]
/// when the operation does not finish in time, or [`OperationFailed`] when it
/// finishes with an error. Nothing is recorded for cleanup in those cases.
///
/// # Example
///
/// ```rust,ignore
/// let uid = ResourceUid::from(GoogleBucketUid { bucket_name: name.clone() });
/// let handle = create_and_wait(
///     &ctx,
///     StorageOperation::CreateBucket,
///     &LongRunningAdapter,
///     uid,
///     || storage.create_bucket(&name),
///     || storage.get_operation(&op_name),
/// )
/// .await?;
/// ```
pub async fn create_and_wait<K, A, C, CFut, F, Fut, E>(
    ctx: &CoreContext,
    kind: K,
    adapter: &A,
    uid: ResourceUid,
    create: C,
    refresh: F,
) -> Result<OperationHandle, E>
where
    K: CloudOperationKind,
    A: OperationAdapter,
    C: FnOnce() -> CFut,
    CFut: Future<Output = Result<A::Raw, E>>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<A::Raw, E>>,
    E: ProviderError + From<OperationTimeoutError> + From<OperationFailed>,
{
    // Step 1: Create (returns operation)
    let raw = ctx
        .annotator
        .call(kind)
        .request(|| resource_request(&uid))
        .execute(create)
        .await?;
    let initial = adapter.adapt(&raw);

    // Step 2: Poll until done
    let handle = ctx
        .poller
        .poll_annotated(&ctx.annotator, kind, adapter, initial, refresh)
        .await?
        .into_result()?;

    // Step 3: Register for cleanup
    ctx.recorder.record_for(&ctx.config, uid).await;

    Ok(handle)
}

fn resource_request(uid: &ResourceUid) -> RequestData {
    let mut data = RequestData::new();
    match serde_json::to_value(uid) {
        Ok(value) => {
            data.insert("resourceUid".to_string(), value);
        }
        Err(e) => tracing::debug!(error = %e, "Could not serialize resource uid"),
    }
    data
}
