//! Long-running operation handles and the adapters that produce them
//!
//! Providers return structurally different "operation" values: some carry a
//! `done` flag, some a `status` string, some an error list, some a single
//! error object. An [`OperationAdapter`] is a pure mapping from one such raw
//! value into an [`OperationHandle`], the one shape the poller understands.

pub mod adapters;

pub use adapters::*;

use crate::error::{ErrorRecord, OperationFailed};
use serde::{Deserialize, Serialize};

/// Immutable snapshot of an operation's status
///
/// A new handle is produced on every poll; handles are never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationHandle {
    pub name: String,
    /// `None` means the provider did not say; treated as not done
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
}

impl OperationHandle {
    pub fn new(name: impl Into<String>, done: Option<bool>, error: Option<ErrorRecord>) -> Self {
        Self {
            name: name.into(),
            done,
            error,
        }
    }

    /// True only when the provider reported `done == true`
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done == Some(true)
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Convert a terminal handle into a result
    ///
    /// A done handle can still carry an error, so callers that only care about
    /// success should go through this instead of `is_done`.
    pub fn into_result(self) -> Result<OperationHandle, OperationFailed> {
        match self.error {
            Some(error) => Err(OperationFailed {
                name: self.name,
                error,
            }),
            None => Ok(self),
        }
    }
}

/// Pure mapping from a provider's raw operation value into an [`OperationHandle`]
///
/// Implementations must not perform I/O; they are called once per poll on the
/// freshly fetched value.
pub trait OperationAdapter: Send + Sync {
    /// The provider's raw operation type
    type Raw;

    fn name(&self, raw: &Self::Raw) -> String;

    fn done(&self, raw: &Self::Raw) -> Option<bool>;

    fn error(&self, raw: &Self::Raw) -> Option<ErrorRecord>;

    fn adapt(&self, raw: &Self::Raw) -> OperationHandle {
        OperationHandle {
            name: self.name(raw),
            done: self.done(raw),
            error: self.error(raw),
        }
    }
}
