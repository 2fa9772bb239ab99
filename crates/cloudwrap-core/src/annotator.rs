//! Call instrumentation
//!
//! Every outbound provider call is wrapped by [`CallAnnotator`], which times
//! it and hands exactly one [`CallRecord`] to the configured sink. The call's
//! result is returned untouched: success values pass through and errors are
//! re-raised as the same value. A call whose future is dropped before it
//! resolves (a timeout or a losing `select!` branch) is still recorded, as an
//! error with code 0 and the message `call cancelled`.
//!
//! ## Usage Pattern
//!
//! ```rust,ignore
//! let bucket = annotator
//!     .execute(
//!         StorageOperation::CreateBucket,
//!         || storage.create_bucket(&request),
//!         || request_data(&request),
//!     )
//!     .await?;
//!
//! // Builder form, when an outer layer knows the attempt number
//! let bucket = annotator
//!     .call(StorageOperation::CreateBucket)
//!     .try_count(attempt)
//!     .request(|| request_data(&request))
//!     .execute(|| storage.create_bucket(&request))
//!     .await?;
//! ```

use crate::config::ClientConfig;
use crate::error::{ErrorRecord, ProviderError};
use crate::kind::{CloudOperationKind, OperationKindLabel};
use crate::telemetry::{CallOutcome, CallRecord, RequestData, TelemetrySink};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Lazily evaluated request serializer
pub type RequestSerializer<'a> = Box<dyn FnOnce() -> RequestData + Send + 'a>;

/// Wraps remote calls and records their outcome
#[derive(Clone)]
pub struct CallAnnotator {
    client_name: Arc<str>,
    sink: Arc<dyn TelemetrySink>,
}

impl std::fmt::Debug for CallAnnotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallAnnotator")
            .field("client_name", &self.client_name)
            .finish_non_exhaustive()
    }
}

impl CallAnnotator {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client_name: Arc::from(config.client_name()),
            sink: Arc::clone(config.sink()),
        }
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn sink(&self) -> &Arc<dyn TelemetrySink> {
        &self.sink
    }

    /// Start configuring a single annotated call
    pub fn call<K: CloudOperationKind>(&self, kind: K) -> AnnotatedCall<'_, K> {
        AnnotatedCall {
            annotator: self,
            kind,
            try_count: None,
            request: None,
        }
    }

    /// Run `call`, record its outcome, and return its result unchanged
    ///
    /// `request` is only evaluated when the sink reads request data.
    pub async fn execute<'a, K, T, E, F, Fut, S>(
        &'a self,
        kind: K,
        call: F,
        request: S,
    ) -> Result<T, E>
    where
        K: CloudOperationKind,
        E: ProviderError,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        S: FnOnce() -> RequestData + Send + 'a,
    {
        self.call(kind).request(request).execute(call).await
    }

    /// Synchronous counterpart of [`execute`](Self::execute)
    pub fn execute_blocking<'a, K, T, E, F, S>(
        &'a self,
        kind: K,
        call: F,
        request: S,
    ) -> Result<T, E>
    where
        K: CloudOperationKind,
        E: ProviderError,
        F: FnOnce() -> Result<T, E>,
        S: FnOnce() -> RequestData + Send + 'a,
    {
        self.call(kind).request(request).execute_blocking(call)
    }

    fn emit(
        &self,
        kind: OperationKindLabel,
        try_count: Option<NonZeroU32>,
        request: Option<RequestSerializer<'_>>,
        duration: Duration,
        http_status: Option<u16>,
        outcome: CallOutcome,
    ) {
        let request_data = match request {
            Some(serialize) if self.sink.is_active() => serialize(),
            _ => RequestData::new(),
        };

        self.sink.record(CallRecord {
            client_name: self.client_name.to_string(),
            duration,
            try_count,
            http_status,
            operation_kind: kind,
            request_data,
            outcome,
        });
    }
}

fn outcome_of<T, E: ProviderError>(
    result: &Result<T, E>,
    success_status: Option<u16>,
) -> (Option<u16>, CallOutcome) {
    match result {
        Ok(_) => (success_status, CallOutcome::Success),
        Err(e) => (e.http_status(), CallOutcome::Error(e.error_record())),
    }
}

/// Record for a call whose future is still pending
///
/// Dropping it before [`complete`](Self::complete) means the caller
/// abandoned the future; a cancelled record is emitted instead.
struct InFlight<'a> {
    annotator: &'a CallAnnotator,
    // None once the record has been emitted
    kind: Option<OperationKindLabel>,
    try_count: Option<NonZeroU32>,
    request: Option<RequestSerializer<'a>>,
    start: Instant,
}

impl InFlight<'_> {
    fn complete<T, E: ProviderError>(mut self, result: &Result<T, E>, success_status: Option<u16>) {
        let (http_status, outcome) = outcome_of(result, success_status);
        self.emit(http_status, outcome);
    }

    fn emit(&mut self, http_status: Option<u16>, outcome: CallOutcome) {
        if let Some(kind) = self.kind.take() {
            self.annotator.emit(
                kind,
                self.try_count,
                self.request.take(),
                self.start.elapsed(),
                http_status,
                outcome,
            );
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.emit(None, CallOutcome::Error(ErrorRecord::new(0, "call cancelled")));
    }
}

/// One call being configured for annotation
#[must_use = "an annotated call does nothing until executed"]
pub struct AnnotatedCall<'a, K> {
    annotator: &'a CallAnnotator,
    kind: K,
    try_count: Option<NonZeroU32>,
    request: Option<RequestSerializer<'a>>,
}

impl<'a, K: CloudOperationKind> AnnotatedCall<'a, K> {
    /// Attempt number supplied by an outer retry layer; zero is ignored
    pub fn try_count(mut self, attempt: u32) -> Self {
        self.try_count = NonZeroU32::new(attempt);
        self
    }

    pub fn request<S>(mut self, request: S) -> Self
    where
        S: FnOnce() -> RequestData + Send + 'a,
    {
        self.request = Some(Box::new(request));
        self
    }

    pub async fn execute<T, E, F, Fut>(self, call: F) -> Result<T, E>
    where
        E: ProviderError,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_status(call, |_| None).await
    }

    /// Like [`execute`](Self::execute), extracting an HTTP status from successful responses
    pub async fn execute_with_status<T, E, F, Fut, R>(
        self,
        call: F,
        response_status: R,
    ) -> Result<T, E>
    where
        E: ProviderError,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: FnOnce(&T) -> Option<u16>,
    {
        let in_flight = InFlight {
            annotator: self.annotator,
            kind: Some(self.kind.label()),
            try_count: self.try_count,
            request: self.request,
            start: Instant::now(),
        };
        let result = call().await;
        let success_status = result.as_ref().ok().and_then(response_status);
        in_flight.complete(&result, success_status);
        result
    }

    pub fn execute_blocking<T, E, F>(self, call: F) -> Result<T, E>
    where
        E: ProviderError,
        F: FnOnce() -> Result<T, E>,
    {
        let start = std::time::Instant::now();
        let result = call();
        let duration = start.elapsed();
        let (http_status, outcome) = outcome_of(&result, None);
        self.annotator.emit(
            self.kind.label(),
            self.try_count,
            self.request,
            duration,
            http_status,
            outcome,
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::CloudPlatform;
    use crate::telemetry::{InMemorySink, NoopSink};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Copy)]
    enum TestOp {
        CreateBucket,
    }

    impl CloudOperationKind for TestOp {
        fn name(&self) -> &'static str {
            "GOOGLE_CREATE_BUCKET"
        }

        fn platform(&self) -> CloudPlatform {
            CloudPlatform::Gcp
        }
    }

    #[derive(Debug, thiserror::Error, PartialEq)]
    #[error("conflict: {0}")]
    struct ConflictError(String);

    impl ProviderError for ConflictError {
        fn http_status(&self) -> Option<u16> {
            Some(409)
        }
    }

    fn annotator_with(sink: Arc<dyn TelemetrySink>) -> CallAnnotator {
        CallAnnotator::new(&ClientConfig::builder("annotator-test").sink(sink).build())
    }

    fn bucket_request() -> RequestData {
        let mut data = RequestData::new();
        data.insert("bucketName".to_string(), json!("my-bucket"));
        data
    }

    #[tokio::test]
    async fn test_success_emits_one_record() {
        let sink = Arc::new(InMemorySink::new());
        let annotator = annotator_with(sink.clone());

        let result: Result<&str, ConflictError> = annotator
            .execute(TestOp::CreateBucket, || async { Ok("created") }, bucket_request)
            .await;

        assert_eq!(result.unwrap(), "created");
        let records = sink.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.client_name, "annotator-test");
        assert_eq!(record.operation_kind.name, "GOOGLE_CREATE_BUCKET");
        assert_eq!(record.outcome, CallOutcome::Success);
        assert_eq!(record.try_count, None);
        assert_eq!(record.http_status, None);
        assert_eq!(record.request_data["bucketName"], "my-bucket");
    }

    #[tokio::test]
    async fn test_failure_reraises_original_error() {
        let sink = Arc::new(InMemorySink::new());
        let annotator = annotator_with(sink.clone());

        let result: Result<(), ConflictError> = annotator
            .execute(
                TestOp::CreateBucket,
                || async { Err(ConflictError("bucket exists".to_string())) },
                bucket_request,
            )
            .await;

        assert_eq!(result.unwrap_err(), ConflictError("bucket exists".to_string()));
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].http_status, Some(409));
        match &records[0].outcome {
            CallOutcome::Error(error) => {
                assert_eq!(error.code, 409);
                assert_eq!(error.message, "conflict: bucket exists");
            }
            other => panic!("expected error outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_request_not_serialized_for_inactive_sink() {
        let annotator = annotator_with(Arc::new(NoopSink));
        let serialized = AtomicUsize::new(0);

        let result: Result<u32, ConflictError> = annotator
            .execute(
                TestOp::CreateBucket,
                || async { Ok(7) },
                || {
                    serialized.fetch_add(1, Ordering::SeqCst);
                    RequestData::new()
                },
            )
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(serialized.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_covers_call() {
        let sink = Arc::new(InMemorySink::new());
        let annotator = annotator_with(sink.clone());

        let _: Result<(), ConflictError> = annotator
            .execute(
                TestOp::CreateBucket,
                || async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    Ok(())
                },
                RequestData::new,
            )
            .await;

        assert!(sink.records()[0].duration >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_call_emits_one_record() {
        let sink = Arc::new(InMemorySink::new());
        let annotator = annotator_with(sink.clone());

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            annotator.call(TestOp::CreateBucket).try_count(2).request(bucket_request).execute(
                || async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<(), ConflictError>(())
                },
            ),
        )
        .await;

        assert!(result.is_err());
        let records = sink.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.duration, Duration::from_secs(1));
        assert_eq!(record.try_count.map(NonZeroU32::get), Some(2));
        assert_eq!(record.http_status, None);
        assert_eq!(record.request_data["bucketName"], "my-bucket");
        assert_eq!(
            record.outcome,
            CallOutcome::Error(ErrorRecord::new(0, "call cancelled"))
        );
    }

    #[tokio::test]
    async fn test_abandoned_select_branch_is_recorded() {
        let sink = Arc::new(InMemorySink::new());
        let annotator = annotator_with(sink.clone());

        tokio::select! {
            _ = annotator.execute(
                TestOp::CreateBucket,
                std::future::pending::<Result<(), ConflictError>>,
                RequestData::new,
            ) => panic!("pending call resolved"),
            () = std::future::ready(()) => {}
        }

        assert_eq!(sink.len(), 1);
        assert!(!sink.records()[0].outcome.is_success());
    }

    #[tokio::test]
    async fn test_builder_sets_try_count_and_status() {
        let sink = Arc::new(InMemorySink::new());
        let annotator = annotator_with(sink.clone());

        let result: Result<u16, ConflictError> = annotator
            .call(TestOp::CreateBucket)
            .try_count(3)
            .request(bucket_request)
            .execute_with_status(|| async { Ok(201) }, |status| Some(*status))
            .await;

        assert_eq!(result.unwrap(), 201);
        let record = &sink.records()[0];
        assert_eq!(record.try_count.map(NonZeroU32::get), Some(3));
        assert_eq!(record.http_status, Some(201));
    }

    #[test]
    fn test_execute_blocking() {
        let sink = Arc::new(InMemorySink::new());
        let annotator = annotator_with(sink.clone());

        let result = annotator.execute_blocking(
            TestOp::CreateBucket,
            || Err::<(), _>(ConflictError("dup".to_string())),
            bucket_request,
        );

        assert!(result.is_err());
        assert_eq!(sink.len(), 1);
        assert!(!sink.records()[0].outcome.is_success());
    }
}
