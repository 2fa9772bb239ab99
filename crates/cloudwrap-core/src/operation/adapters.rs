//! Built-in operation schemas and their adapters
//!
//! Three shapes cover the providers we wrap:
//!
//! - [`LongRunningOperation`] - `{name, done, error{code, message, details}}`
//! - [`ComputeOperation`] - `{name, status, error{errors[]}, httpErrorStatusCode}`
//! - [`AzureAsyncOperation`] - `{id, name, status, error{code, message}}`
//!
//! [`JsonOperationAdapter`] picks the right mapping for an untyped JSON value
//! given the [`OperationSchema`] it came from.

use super::{OperationAdapter, OperationHandle};
use crate::error::ErrorRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Long-running operation (done flag + status error)
// =============================================================================

/// Operation carrying an explicit `done` flag
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LongRunningOperation {
    pub name: String,
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LongRunningAdapter;

impl OperationAdapter for LongRunningAdapter {
    type Raw = LongRunningOperation;

    fn name(&self, raw: &LongRunningOperation) -> String {
        raw.name.clone()
    }

    fn done(&self, raw: &LongRunningOperation) -> Option<bool> {
        raw.done
    }

    fn error(&self, raw: &LongRunningOperation) -> Option<ErrorRecord> {
        raw.error.clone()
    }
}

// =============================================================================
// Compute-style operation (status string + error list)
// =============================================================================

/// Operation reporting progress through a `PENDING|RUNNING|DONE` status
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeOperation {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ComputeOperationErrors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_error_status_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComputeOperationErrors {
    #[serde(default)]
    pub errors: Vec<ComputeErrorItem>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComputeErrorItem {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeAdapter;

impl OperationAdapter for ComputeAdapter {
    type Raw = ComputeOperation;

    fn name(&self, raw: &ComputeOperation) -> String {
        raw.name.clone()
    }

    fn done(&self, raw: &ComputeOperation) -> Option<bool> {
        raw.status
            .as_deref()
            .map(|status| status.eq_ignore_ascii_case("DONE"))
    }

    fn error(&self, raw: &ComputeOperation) -> Option<ErrorRecord> {
        let errors = raw.error.as_ref()?;
        if errors.errors.is_empty() {
            return None;
        }

        let message = errors
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let message = match &raw.http_error_message {
            Some(http) if message.is_empty() => http.clone(),
            _ => message,
        };

        let details = errors
            .errors
            .iter()
            .map(|e| {
                let mut detail = Map::new();
                detail.insert("code".to_string(), Value::String(e.code.clone()));
                detail.insert("message".to_string(), Value::String(e.message.clone()));
                if let Some(location) = &e.location {
                    detail.insert("location".to_string(), Value::String(location.clone()));
                }
                detail
            })
            .collect();

        Some(ErrorRecord {
            code: raw.http_error_status_code.unwrap_or_default(),
            message,
            details,
        })
    }
}

// =============================================================================
// Azure asynchronous operation (terminal status strings)
// =============================================================================

/// Azure `Azure-AsyncOperation` status body
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureAsyncOperation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AzureOperationError>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AzureOperationError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AzureAdapter;

impl OperationAdapter for AzureAdapter {
    type Raw = AzureAsyncOperation;

    fn name(&self, raw: &AzureAsyncOperation) -> String {
        raw.name
            .clone()
            .or_else(|| raw.id.clone())
            .unwrap_or_default()
    }

    fn done(&self, raw: &AzureAsyncOperation) -> Option<bool> {
        match raw.status.to_lowercase().as_str() {
            "succeeded" | "failed" | "canceled" | "cancelled" => Some(true),
            "inprogress" | "accepted" | "running" | "creating" | "updating" | "deleting" => {
                Some(false)
            }
            _ => None,
        }
    }

    fn error(&self, raw: &AzureAsyncOperation) -> Option<ErrorRecord> {
        let status = raw.status.to_lowercase();
        let failed = status == "failed";
        let canceled = status == "canceled" || status == "cancelled";

        match &raw.error {
            Some(error) => {
                let mut detail = Map::new();
                detail.insert("code".to_string(), Value::String(error.code.clone()));
                Some(ErrorRecord::new(0, error.message.clone()).with_detail(detail))
            }
            None if failed => Some(ErrorRecord::new(0, "Operation failed")),
            None if canceled => Some(ErrorRecord::new(0, "Operation was canceled")),
            None => None,
        }
    }
}

// =============================================================================
// Schema-keyed adapter over untyped JSON
// =============================================================================

/// Origin of a raw operation value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationSchema {
    LongRunning,
    Compute,
    Azure,
}

impl OperationSchema {
    /// Adapter for raw JSON values of this schema
    pub fn adapter(self) -> JsonOperationAdapter {
        JsonOperationAdapter::new(self)
    }
}

/// Adapts raw `serde_json::Value` operations using the mapping for one schema
///
/// Values that do not match the schema adapt to an unknown, error-free handle
/// so the poller keeps polling rather than misreporting completion.
#[derive(Debug, Clone, Copy)]
pub struct JsonOperationAdapter {
    schema: OperationSchema,
}

impl JsonOperationAdapter {
    pub fn new(schema: OperationSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> OperationSchema {
        self.schema
    }

    fn unrecognized(raw: &Value) -> OperationHandle {
        let name = raw
            .get("name")
            .or_else(|| raw.get("id"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        OperationHandle::new(name, None, None)
    }
}

impl OperationAdapter for JsonOperationAdapter {
    type Raw = Value;

    fn name(&self, raw: &Value) -> String {
        self.adapt(raw).name
    }

    fn done(&self, raw: &Value) -> Option<bool> {
        self.adapt(raw).done
    }

    fn error(&self, raw: &Value) -> Option<ErrorRecord> {
        self.adapt(raw).error
    }

    fn adapt(&self, raw: &Value) -> OperationHandle {
        let typed = match self.schema {
            OperationSchema::LongRunning => {
                LongRunningOperation::deserialize(raw).map(|op| LongRunningAdapter.adapt(&op))
            }
            OperationSchema::Compute => {
                ComputeOperation::deserialize(raw).map(|op| ComputeAdapter.adapt(&op))
            }
            OperationSchema::Azure => {
                AzureAsyncOperation::deserialize(raw).map(|op| AzureAdapter.adapt(&op))
            }
        };

        typed.unwrap_or_else(|e| {
            tracing::debug!(schema = ?self.schema, error = %e, "Unrecognized operation shape");
            Self::unrecognized(raw)
        })
    }
}
