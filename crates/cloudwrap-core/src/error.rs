//! Unified error handling for cloudwrap-core
//!
//! Provider SDK errors stay in their native types; the core only asks them
//! for metadata through [`ProviderError`]. [`CoreError`] is a convenience
//! error for wrappers that want a single type covering provider failures,
//! poller timeouts, failed operations and configuration problems.
//!
//! # Example
//!
//! ```rust
//! use cloudwrap_core::{CoreError, ProviderError};
//!
//! let err = CoreError::provider("quota exceeded", Some(429), Some(true));
//! assert!(err.is_retryable());
//! assert_eq!(err.http_status(), Some(429));
//! ```

use crate::config::ConfigError;
use crate::operation::OperationHandle;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Provider-reported error detail
///
/// `details` keeps the provider's opaque detail maps in their original order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Map<String, Value>>,
}

impl ErrorRecord {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Append one opaque detail map
    #[must_use]
    pub fn with_detail(mut self, detail: Map<String, Value>) -> Self {
        self.details.push(detail);
        self
    }
}

/// Metadata a provider error exposes to the core
///
/// Every method has a conservative default so any `std::error::Error` can
/// opt in with an empty `impl`.
pub trait ProviderError: std::error::Error {
    /// The provider-supplied retryable flag, if the provider supplies one
    fn retryable(&self) -> Option<bool> {
        None
    }

    /// HTTP status carried by the error, if any
    fn http_status(&self) -> Option<u16> {
        None
    }

    /// Structured record of this error for telemetry
    fn error_record(&self) -> ErrorRecord {
        ErrorRecord::new(
            self.http_status().map(i32::from).unwrap_or_default(),
            self.to_string(),
        )
    }
}

impl ProviderError for reqwest::Error {
    fn retryable(&self) -> Option<bool> {
        if self.is_timeout() || self.is_connect() {
            Some(true)
        } else {
            None
        }
    }

    fn http_status(&self) -> Option<u16> {
        self.status().map(|s| s.as_u16())
    }
}

/// Raised by the poller when an operation is still not done at its deadline
#[derive(Error, Debug, Clone)]
#[error("Operation '{}' did not complete within {timeout:?}", .handle.name)]
pub struct OperationTimeoutError {
    /// Last handle observed before the deadline
    pub handle: OperationHandle,
    pub timeout: Duration,
}

/// An operation reached `done` but reported an error
#[derive(Error, Debug, Clone)]
#[error("Operation '{name}' failed with code {}: {}", .error.code, .error.message)]
pub struct OperationFailed {
    pub name: String,
    pub error: ErrorRecord,
}

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// Operation polling deadline expired
    #[error(transparent)]
    Timeout(#[from] OperationTimeoutError),

    /// Operation finished with an error
    #[error(transparent)]
    OperationFailed(#[from] OperationFailed),

    /// Transport error from an HTTP-based provider client
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error reported by a provider SDK
    #[error("Provider error: {message}")]
    Provider {
        message: String,
        status: Option<u16>,
        retryable: Option<bool>,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Build a provider error from the metadata a provider SDK exposes
    pub fn provider(
        message: impl Into<String>,
        status: Option<u16>,
        retryable: Option<bool>,
    ) -> Self {
        CoreError::Provider {
            message: message.into(),
            status,
            retryable,
        }
    }

    /// Returns true if this is a polling timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            CoreError::Timeout(_) => true,
            CoreError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Returns true if this is a "not found" error (404)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.http_status() == Some(404)
    }

    /// Returns true unless the error is known to be terminal
    ///
    /// Unlike [`ProviderError::retryable`], this also judges errors raised by
    /// the core itself: configuration errors never succeed on retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Config(_) => false,
            _ => self.retryable().unwrap_or(true),
        }
    }
}

impl ProviderError for CoreError {
    fn retryable(&self) -> Option<bool> {
        match self {
            CoreError::Provider { retryable, .. } => *retryable,
            CoreError::Http(e) => e.retryable(),
            // Only providers supply the flag
            CoreError::Timeout(_) | CoreError::OperationFailed(_) | CoreError::Config(_) => None,
        }
    }

    fn http_status(&self) -> Option<u16> {
        match self {
            CoreError::Provider { status, .. } => *status,
            CoreError::Http(e) => e.http_status(),
            _ => None,
        }
    }

    fn error_record(&self) -> ErrorRecord {
        match self {
            CoreError::OperationFailed(failed) => failed.error.clone(),
            CoreError::Timeout(timeout) => timeout
                .handle
                .error
                .clone()
                .unwrap_or_else(|| ErrorRecord::new(0, self.to_string())),
            _ => ErrorRecord::new(
                self.http_status().map(i32::from).unwrap_or_default(),
                self.to_string(),
            ),
        }
    }
}
