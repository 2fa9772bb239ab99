//! Retry classification
//!
//! Orchestration layers decide whether to retry by looking at the kind of
//! error they receive. [`classify`] turns a provider error into a
//! [`RetryVerdict`]: the same error when the provider says it is retryable
//! (or says nothing), or a [`TerminalError`] wrapping it when the provider
//! marks it as not retryable. Only the provider's flag is consulted.
//!
//! [`retry_annotated`] is a small outer layer built on top: it retries
//! retryable failures with exponential backoff and stamps each attempt's
//! call record with its attempt number.

use crate::annotator::CallAnnotator;
use crate::config::RetryConfig;
use crate::error::{ErrorRecord, ProviderError};
use crate::kind::CloudOperationKind;
use crate::telemetry::RequestData;
use std::error::Error;
use std::fmt;
use std::future::Future;

/// A provider error the provider marked as not retryable
#[derive(Debug)]
pub struct TerminalError<E> {
    pub cause: E,
}

impl<E> TerminalError<E> {
    pub fn into_cause(self) -> E {
        self.cause
    }
}

impl<E: fmt::Display> fmt::Display for TerminalError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Terminal provider error: {}", self.cause)
    }
}

impl<E: Error + 'static> Error for TerminalError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.cause)
    }
}

/// Outcome of classifying a provider error
#[derive(Debug)]
pub enum RetryVerdict<E> {
    /// The original error, unchanged
    Retryable(E),
    Terminal(TerminalError<E>),
}

impl<E> RetryVerdict<E> {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryVerdict::Retryable(_))
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.is_retryable()
    }

    /// The provider error, whichever way it was classified
    pub fn into_inner(self) -> E {
        match self {
            RetryVerdict::Retryable(e) => e,
            RetryVerdict::Terminal(t) => t.cause,
        }
    }

    pub fn inner(&self) -> &E {
        match self {
            RetryVerdict::Retryable(e) => e,
            RetryVerdict::Terminal(t) => &t.cause,
        }
    }
}

impl<E: Error + Send + Sync + 'static> RetryVerdict<E> {
    /// Erase into a boxed error, terminal errors staying distinguishable by type
    pub fn into_error(self) -> Box<dyn Error + Send + Sync> {
        match self {
            RetryVerdict::Retryable(e) => Box::new(e),
            RetryVerdict::Terminal(t) => Box::new(t),
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryVerdict<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryVerdict::Retryable(e) => e.fmt(f),
            RetryVerdict::Terminal(t) => t.fmt(f),
        }
    }
}

impl<E: Error + 'static> Error for RetryVerdict<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryVerdict::Retryable(e) => e.source(),
            RetryVerdict::Terminal(t) => Some(&t.cause),
        }
    }
}

impl<E: ProviderError + 'static> ProviderError for RetryVerdict<E> {
    fn retryable(&self) -> Option<bool> {
        Some(self.is_retryable())
    }

    fn http_status(&self) -> Option<u16> {
        self.inner().http_status()
    }

    fn error_record(&self) -> ErrorRecord {
        self.inner().error_record()
    }
}

/// Classify a provider error by its retryable flag
///
/// A missing flag counts as retryable.
pub fn classify<E: ProviderError>(err: E) -> RetryVerdict<E> {
    match err.retryable() {
        Some(false) => RetryVerdict::Terminal(TerminalError { cause: err }),
        Some(true) | None => RetryVerdict::Retryable(err),
    }
}

/// Run an annotated call, retrying retryable failures
///
/// Every attempt produces its own call record carrying the attempt number.
/// A terminal failure stops immediately; a retryable failure on the last
/// attempt is returned as [`RetryVerdict::Retryable`].
pub async fn retry_annotated<K, T, E, F, Fut, S>(
    annotator: &CallAnnotator,
    config: &RetryConfig,
    kind: K,
    mut call: F,
    mut request: S,
) -> Result<T, RetryVerdict<E>>
where
    K: CloudOperationKind,
    E: ProviderError,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    S: FnMut() -> RequestData + Send,
{
    let max_attempts = config.effective_attempts();
    let mut attempt = 1;
    loop {
        let result = annotator
            .call(kind)
            .try_count(attempt)
            .request(|| request())
            .execute(|| call())
            .await;

        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match classify(err) {
            RetryVerdict::Retryable(err) if attempt < max_attempts => {
                let backoff = config.backoff_for(attempt);
                tracing::debug!(
                    operation = %kind.label(),
                    attempt,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Retrying cloud call"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            verdict => return Err(verdict),
        }
    }
}
