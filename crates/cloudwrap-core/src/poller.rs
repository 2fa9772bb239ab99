//! Progress tracking and polling for long-running operations
//!
//! Provider calls that start asynchronous work return an operation value that
//! must be polled until it reports `done`. [`OperationPoller`] drives any
//! adapted operation to completion with a fixed interval and an overall
//! deadline, with optional progress callbacks for UI updates.
//!
//! The poll loop:
//!
//! 1. An initial handle that is already done is returned without fetching.
//! 2. Otherwise the status is fetched immediately and re-adapted.
//! 3. A done handle is returned as soon as it is seen.
//! 4. A not-done handle at or past the deadline fails with
//!    [`OperationTimeoutError`]; otherwise the poller sleeps for the interval
//!    (clamped to the time left) and fetches again.
//!
//! Fetch errors are returned as-is on the first failure.

use crate::annotator::CallAnnotator;
use crate::config::PollingConfig;
use crate::error::{ErrorRecord, OperationTimeoutError, ProviderError};
use crate::kind::CloudOperationKind;
use crate::operation::{OperationAdapter, OperationHandle};
use crate::telemetry::RequestData;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Progress events emitted while polling
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Polling has started
    Started { operation: String },
    /// A status fetch completed
    Polling {
        operation: String,
        done: Option<bool>,
        fetches: u32,
        elapsed: Duration,
    },
    /// Operation finished without an error
    Completed { operation: String, fetches: u32 },
    /// Operation finished with an error
    Failed {
        operation: String,
        error: ErrorRecord,
    },
    /// Deadline passed before the operation finished
    TimedOut {
        operation: String,
        elapsed: Duration,
    },
}

/// Callback type for progress updates
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Drives operation handles to a terminal state
pub struct OperationPoller {
    interval: Duration,
    timeout: Duration,
    on_progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for OperationPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationPoller")
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl OperationPoller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            on_progress: None,
        }
    }

    pub fn from_config(config: &PollingConfig) -> Self {
        Self::new(config.interval(), config.timeout())
    }

    #[must_use]
    pub fn on_progress<C>(mut self, callback: C) -> Self
    where
        C: Fn(ProgressEvent) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll until the operation is done or the timeout expires
    ///
    /// # Arguments
    ///
    /// * `adapter` - Mapping from the provider's raw operation to a handle
    /// * `initial` - Handle returned by the call that started the operation
    /// * `refresh` - Performs one remote status fetch
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let handle = poller
    ///     .poll(&LongRunningAdapter, initial, || operations.get(&name))
    ///     .await?;
    /// let handle = handle.into_result()?;
    /// ```
    pub async fn poll<A, F, Fut, E>(
        &self,
        adapter: &A,
        initial: OperationHandle,
        mut refresh: F,
    ) -> Result<OperationHandle, E>
    where
        A: OperationAdapter,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<A::Raw, E>>,
        E: From<OperationTimeoutError>,
    {
        let start = Instant::now();
        // An unrepresentable deadline means the poller never gives up
        let deadline = start.checked_add(self.timeout);

        self.emit(ProgressEvent::Started {
            operation: initial.name.clone(),
        });

        if initial.is_done() {
            self.emit_terminal(&initial, 0);
            return Ok(initial);
        }

        let mut fetches: u32 = 0;
        loop {
            let raw = refresh().await?;
            fetches = fetches.saturating_add(1);
            let handle = adapter.adapt(&raw);

            self.emit(ProgressEvent::Polling {
                operation: handle.name.clone(),
                done: handle.done,
                fetches,
                elapsed: start.elapsed(),
            });

            if handle.is_done() {
                self.emit_terminal(&handle, fetches);
                return Ok(handle);
            }

            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            if remaining == Some(Duration::ZERO) {
                return Err(self.timed_out(handle, start.elapsed()).into());
            }

            let pause = remaining.map_or(self.interval, |left| left.min(self.interval));
            tokio::time::sleep(pause).await;

            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(self.timed_out(handle, start.elapsed()).into());
            }
        }
    }

    /// Poll with every status fetch wrapped by the call annotator
    ///
    /// Each fetch is recorded under `kind` with the operation name as request data.
    pub async fn poll_annotated<K, A, F, Fut, E>(
        &self,
        annotator: &CallAnnotator,
        kind: K,
        adapter: &A,
        initial: OperationHandle,
        mut fetch: F,
    ) -> Result<OperationHandle, E>
    where
        K: CloudOperationKind,
        A: OperationAdapter,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<A::Raw, E>>,
        E: ProviderError + From<OperationTimeoutError>,
    {
        let name = initial.name.clone();
        self.poll(adapter, initial, || {
            let pending = fetch();
            let name = name.clone();
            async move {
                annotator
                    .call(kind)
                    .request(move || {
                        let mut data = RequestData::new();
                        data.insert("operationName".to_string(), Value::String(name));
                        data
                    })
                    .execute(move || pending)
                    .await
            }
        })
        .await
    }

    fn timed_out(&self, handle: OperationHandle, elapsed: Duration) -> OperationTimeoutError {
        tracing::warn!(
            operation = %handle.name,
            timeout_secs = self.timeout.as_secs_f64(),
            "Operation did not complete before the polling deadline"
        );
        self.emit(ProgressEvent::TimedOut {
            operation: handle.name.clone(),
            elapsed,
        });
        OperationTimeoutError {
            handle,
            timeout: self.timeout,
        }
    }

    fn emit_terminal(&self, handle: &OperationHandle, fetches: u32) {
        match &handle.error {
            Some(error) => {
                tracing::debug!(
                    operation = %handle.name,
                    code = error.code,
                    "Operation finished with error"
                );
                self.emit(ProgressEvent::Failed {
                    operation: handle.name.clone(),
                    error: error.clone(),
                });
            }
            None => {
                tracing::debug!(operation = %handle.name, fetches, "Operation completed");
                self.emit(ProgressEvent::Completed {
                    operation: handle.name.clone(),
                    fetches,
                });
            }
        }
    }

    /// Helper to emit progress events
    fn emit(&self, event: ProgressEvent) {
        if let Some(cb) = &self.on_progress {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::operation::{LongRunningAdapter, LongRunningOperation};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    fn op(done: Option<bool>) -> LongRunningOperation {
        LongRunningOperation {
            name: "operations/test".to_string(),
            done,
            ..Default::default()
        }
    }

    fn pending() -> OperationHandle {
        OperationHandle::new("operations/test", Some(false), None)
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_done_handle_skips_fetch() {
        let poller = OperationPoller::new(Duration::from_secs(1), Duration::from_secs(10));
        let initial = OperationHandle::new("operations/test", Some(true), None);
        let mut fetches = 0;

        let handle: Result<_, CoreError> = poller
            .poll(&LongRunningAdapter, initial.clone(), || {
                fetches += 1;
                async { Ok(op(Some(true))) }
            })
            .await;

        assert_eq!(handle.unwrap(), initial);
        assert_eq!(fetches, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_done_keeps_polling() {
        let poller = OperationPoller::new(Duration::from_secs(1), Duration::from_secs(10));
        let mut script = VecDeque::from(vec![op(None), op(None), op(Some(true))]);
        let mut fetches = 0;

        let handle: Result<_, CoreError> = poller
            .poll(&LongRunningAdapter, pending(), || {
                fetches += 1;
                let next = script.pop_front().unwrap_or_else(|| op(Some(true)));
                async move { Ok(next) }
            })
            .await;

        assert!(handle.unwrap().is_done());
        assert_eq!(fetches, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_error_propagates_without_retry() {
        let poller = OperationPoller::new(Duration::from_secs(1), Duration::from_secs(10));
        let mut fetches = 0;

        let result = poller
            .poll(&LongRunningAdapter, pending(), || {
                fetches += 1;
                async { Err(CoreError::provider("unavailable", Some(503), Some(true))) }
            })
            .await;

        match result {
            Err(CoreError::Provider { status, .. }) => assert_eq!(status, Some(503)),
            other => panic!("expected provider error, got {:?}", other),
        }
        assert_eq!(fetches, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_with_error_is_returned_as_handle() {
        let poller = OperationPoller::new(Duration::from_secs(1), Duration::from_secs(10));
        let failed = LongRunningOperation {
            name: "operations/test".to_string(),
            done: Some(true),
            error: Some(ErrorRecord::new(13, "internal")),
            ..Default::default()
        };

        let handle: OperationHandle = poller
            .poll(&LongRunningAdapter, pending(), || {
                let failed = failed.clone();
                async move { Ok::<_, CoreError>(failed) }
            })
            .await
            .unwrap();

        assert!(handle.is_done());
        assert_eq!(handle.error.as_ref().map(|e| e.code), Some(13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let poller = OperationPoller::new(Duration::from_secs(1), Duration::from_secs(10))
            .on_progress(move |event| sink.lock().unwrap().push(event));
        let mut script = VecDeque::from(vec![op(Some(false)), op(Some(true))]);

        let _: OperationHandle = poller
            .poll(&LongRunningAdapter, pending(), || {
                let next = script.pop_front().unwrap();
                async move { Ok::<_, CoreError>(next) }
            })
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], ProgressEvent::Started { .. }));
        assert!(matches!(events[1], ProgressEvent::Polling { fetches: 1, done: Some(false), .. }));
        assert!(matches!(events[2], ProgressEvent::Polling { fetches: 2, done: Some(true), .. }));
        assert!(matches!(events[3], ProgressEvent::Completed { fetches: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_emits_timed_out_event() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let poller = OperationPoller::new(Duration::from_secs(2), Duration::from_secs(3))
            .on_progress(move |event| sink.lock().unwrap().push(event));

        let result: Result<_, CoreError> = poller
            .poll(&LongRunningAdapter, pending(), || async { Ok(op(Some(false))) })
            .await;

        assert!(matches!(result, Err(CoreError::Timeout(_))));
        let events = events.lock().unwrap();
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::TimedOut { elapsed, .. }) if *elapsed == Duration::from_secs(3)
        ));
    }

    #[test]
    fn test_from_config() {
        let poller = OperationPoller::from_config(&PollingConfig {
            interval_secs: 5,
            timeout_secs: 30,
        });
        assert_eq!(poller.interval(), Duration::from_secs(5));
        assert_eq!(poller.timeout(), Duration::from_secs(30));
    }
}
