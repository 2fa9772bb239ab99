//! Call records and the sinks that receive them
//!
//! The annotator produces exactly one [`CallRecord`] per instrumented call and
//! hands it to a [`TelemetrySink`]. Sinks are shared across every call site, so
//! they must be cheap, non-blocking, and safe to call concurrently.

use crate::error::ErrorRecord;
use crate::kind::OperationKindLabel;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Serialized request arguments, in the order the serializer inserted them
pub type RequestData = Map<String, Value>;

/// Result of one instrumented call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "error")]
pub enum CallOutcome {
    Success,
    Error(ErrorRecord),
}

impl CallOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success)
    }
}

/// One record per call attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub client_name: String,
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: Duration,
    /// Attempt number, only when an outer retry layer supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub try_count: Option<NonZeroU32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub operation_kind: OperationKindLabel,
    pub request_data: RequestData,
    pub outcome: CallOutcome,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Destination for call records
///
/// `record` is called on the caller's task and must not block.
pub trait TelemetrySink: Send + Sync {
    /// Whether this sink reads request data; it is only serialized when true
    fn is_active(&self) -> bool {
        true
    }

    fn record(&self, record: CallRecord);
}

/// Emits one structured tracing event per record
///
/// Active only while the current subscriber accepts `WARN` events from this
/// module, the level failed calls are logged at.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn is_active(&self) -> bool {
        tracing::enabled!(tracing::Level::WARN)
    }

    fn record(&self, record: CallRecord) {
        let request = Value::Object(record.request_data.clone());
        match &record.outcome {
            CallOutcome::Success => tracing::info!(
                client = %record.client_name,
                operation = %record.operation_kind,
                duration_ms = record.duration.as_millis() as u64,
                try_count = record.try_count.map(NonZeroU32::get),
                http_status = record.http_status,
                request = %request,
                "Cloud call succeeded"
            ),
            CallOutcome::Error(error) => tracing::warn!(
                client = %record.client_name,
                operation = %record.operation_kind,
                duration_ms = record.duration.as_millis() as u64,
                try_count = record.try_count.map(NonZeroU32::get),
                http_status = record.http_status,
                request = %request,
                error_code = error.code,
                error_message = %error.message,
                "Cloud call failed"
            ),
        }
    }
}

/// Discards everything and reports itself inactive
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn is_active(&self) -> bool {
        false
    }

    fn record(&self, _record: CallRecord) {}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Buffers records in memory
#[derive(Debug, Default)]
pub struct InMemorySink {
    records: Mutex<Vec<CallRecord>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record received so far
    pub fn records(&self) -> Vec<CallRecord> {
        lock(&self.records).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain the buffer
    pub fn take(&self) -> Vec<CallRecord> {
        std::mem::take(&mut *lock(&self.records))
    }
}

impl TelemetrySink for InMemorySink {
    fn record(&self, record: CallRecord) {
        lock(&self.records).push(record);
    }
}

/// Aggregated statistics for one operation kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KindStats {
    pub calls: u64,
    pub errors: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
    pub status_counts: HashMap<u16, u64>,
}

impl KindStats {
    pub fn mean_duration(&self) -> Duration {
        match u32::try_from(self.calls) {
            Ok(calls) if calls > 0 => self.total_duration / calls,
            _ => Duration::ZERO,
        }
    }
}

/// Per-kind call counters and latency totals
#[derive(Debug, Default)]
pub struct MetricsSink {
    stats: Mutex<HashMap<OperationKindLabel, KindStats>>,
}

impl MetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HashMap<OperationKindLabel, KindStats> {
        lock(&self.stats).clone()
    }

    pub fn stats_for(&self, kind: OperationKindLabel) -> Option<KindStats> {
        lock(&self.stats).get(&kind).cloned()
    }
}

impl TelemetrySink for MetricsSink {
    fn is_active(&self) -> bool {
        // Counters never look at request data
        false
    }

    fn record(&self, record: CallRecord) {
        let mut stats = lock(&self.stats);
        let entry = stats.entry(record.operation_kind).or_default();
        entry.calls += 1;
        if !record.outcome.is_success() {
            entry.errors += 1;
        }
        entry.total_duration += record.duration;
        entry.max_duration = entry.max_duration.max(record.duration);
        if let Some(status) = record.http_status {
            *entry.status_counts.entry(status).or_default() += 1;
        }
    }
}

/// Forwards every record to several sinks
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }

    #[must_use]
    pub fn with(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl std::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl TelemetrySink for FanoutSink {
    fn is_active(&self) -> bool {
        self.sinks.iter().any(|s| s.is_active())
    }

    fn record(&self, record: CallRecord) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.record(record.clone());
            }
            last.record(record);
        }
    }
}
