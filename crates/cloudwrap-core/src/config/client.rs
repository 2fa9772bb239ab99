//! Runtime configuration threaded into every component
//!
//! [`ClientConfig`] is built once at startup and cloned into whatever needs it;
//! it never changes afterwards.

use crate::telemetry::{TelemetrySink, TracingSink};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default time-to-live for tracked resources
pub const DEFAULT_TIME_TO_LIVE: Duration = Duration::from_secs(2 * 60 * 60);

/// Credentials presented to the cleanup tracking service
#[derive(Clone, Default, PartialEq)]
pub enum TrackerCredentials {
    #[default]
    None,
    BearerToken(String),
}

impl fmt::Debug for TrackerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerCredentials::None => write!(f, "None"),
            TrackerCredentials::BearerToken(_) => write!(f, "BearerToken(<redacted>)"),
        }
    }
}

/// Where and how created resources are registered for later cleanup
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupConfig {
    pub time_to_live: Duration,
    pub tracking_endpoint: Url,
    pub credentials: TrackerCredentials,
    pub topic: String,
    /// Groups every resource created by one run, e.g. a test suite
    pub cleanup_id: String,
}

impl CleanupConfig {
    pub fn new(
        tracking_endpoint: Url,
        topic: impl Into<String>,
        cleanup_id: impl Into<String>,
    ) -> Self {
        Self {
            time_to_live: DEFAULT_TIME_TO_LIVE,
            tracking_endpoint,
            credentials: TrackerCredentials::None,
            topic: topic.into(),
            cleanup_id: cleanup_id.into(),
        }
    }

    #[must_use]
    pub fn time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = ttl;
        self
    }

    #[must_use]
    pub fn credentials(mut self, credentials: TrackerCredentials) -> Self {
        self.credentials = credentials;
        self
    }
}

/// Immutable configuration bundle shared by every component
#[derive(Clone)]
pub struct ClientConfig {
    client_name: String,
    cleanup: Option<CleanupConfig>,
    sink: Arc<dyn TelemetrySink>,
}

impl ClientConfig {
    pub fn builder(client_name: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            client_name: client_name.into(),
            cleanup: None,
            sink: None,
        }
    }

    /// Identifies the caller in telemetry
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// `None` disables cleanup recording entirely
    pub fn cleanup(&self) -> Option<&CleanupConfig> {
        self.cleanup.as_ref()
    }

    pub fn sink(&self) -> &Arc<dyn TelemetrySink> {
        &self.sink
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_name", &self.client_name)
            .field("cleanup", &self.cleanup)
            .field("sink_active", &self.sink.is_active())
            .finish()
    }
}

/// Builder for [`ClientConfig`]
pub struct ClientConfigBuilder {
    client_name: String,
    cleanup: Option<CleanupConfig>,
    sink: Option<Arc<dyn TelemetrySink>>,
}

impl ClientConfigBuilder {
    #[must_use]
    pub fn cleanup(mut self, cleanup: CleanupConfig) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the config; the sink defaults to [`TracingSink`]
    pub fn build(self) -> ClientConfig {
        ClientConfig {
            client_name: self.client_name,
            cleanup: self.cleanup,
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
        }
    }
}
