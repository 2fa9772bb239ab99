//! Client side of the cleanup tracking service

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::error::{CleanupRecordingError, Result};
use super::resource::ResourceUid;
use crate::config::{CleanupConfig, TrackerCredentials};

/// Default timeout for a single tracking request
pub const DEFAULT_TRACKER_TIMEOUT: Duration = Duration::from_secs(30);

/// Body of a `createTrackedResource` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedResourceRequest {
    pub resource_uid: ResourceUid,
    pub creation: DateTime<Utc>,
    pub expiration: DateTime<Utc>,
    pub cleanup_id: String,
    pub topic: String,
}

impl TrackedResourceRequest {
    /// Build a request created at `creation`, expiring after the configured time-to-live
    pub fn new(resource_uid: ResourceUid, config: &CleanupConfig, creation: DateTime<Utc>) -> Self {
        let expiration = TimeDelta::from_std(config.time_to_live)
            .ok()
            .and_then(|ttl| creation.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            resource_uid,
            creation,
            expiration,
            cleanup_id: config.cleanup_id.clone(),
            topic: config.topic.clone(),
        }
    }
}

/// Acknowledgement returned by the tracking service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackAck {
    /// Identifier the service assigned to the tracked resource, if it returns one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_resource_id: Option<String>,
}

/// Registers resources with a cleanup tracking service
#[async_trait]
pub trait ResourceTracker: Send + Sync {
    async fn create_tracked_resource(
        &self,
        config: &CleanupConfig,
        request: &TrackedResourceRequest,
    ) -> Result<TrackAck>;
}

/// HTTP tracker posting JSON to `{endpoint}/topics/{topic}/resources`
///
/// Requests are independent of each other, so one tracker can be shared by
/// any number of concurrent recorders.
#[derive(Debug, Clone)]
pub struct HttpResourceTracker {
    http: Client,
}

impl HttpResourceTracker {
    /// Create a tracker whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        tracing::debug!(
            timeout_ms = timeout.as_millis() as u64,
            "Creating cleanup tracking client"
        );

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cloudwrap-core/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_TRACKER_TIMEOUT)
    }

    /// Resolve the collection URL for a topic
    pub fn resources_url(endpoint: &Url, topic: &str) -> Result<Url> {
        let mut url = endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| CleanupRecordingError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
            })?
            .pop_if_empty()
            .extend(["topics", topic, "resources"]);
        Ok(url)
    }
}

#[async_trait]
impl ResourceTracker for HttpResourceTracker {
    async fn create_tracked_resource(
        &self,
        config: &CleanupConfig,
        request: &TrackedResourceRequest,
    ) -> Result<TrackAck> {
        let url = Self::resources_url(&config.tracking_endpoint, &config.topic)?;
        let body = serde_json::to_vec(request)?;

        let mut builder = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        if let TrackerCredentials::BearerToken(token) = &config.credentials {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(CleanupRecordingError::Rejected {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(TrackAck::default());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::resource::GoogleBucketUid;

    fn config(endpoint: &str) -> CleanupConfig {
        CleanupConfig::new(Url::parse(endpoint).unwrap(), "crl-janitor", "run-1")
            .time_to_live(Duration::from_secs(3600))
    }

    #[test]
    fn test_expiration_is_creation_plus_ttl() {
        let creation = Utc::now();
        let uid = ResourceUid::from(GoogleBucketUid {
            bucket_name: "b".to_string(),
        });
        let request = TrackedResourceRequest::new(uid, &config("https://j.example.com"), creation);
        assert_eq!(request.expiration - request.creation, TimeDelta::hours(1));
        assert_eq!(request.cleanup_id, "run-1");
        assert_eq!(request.topic, "crl-janitor");
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let cfg = config("https://j.example.com").time_to_live(Duration::MAX);
        let uid = ResourceUid::from(GoogleBucketUid {
            bucket_name: "b".to_string(),
        });
        let request = TrackedResourceRequest::new(uid, &cfg, Utc::now());
        assert_eq!(request.expiration, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_resources_url() {
        let url = HttpResourceTracker::resources_url(
            &Url::parse("https://j.example.com/api/").unwrap(),
            "crl-janitor",
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://j.example.com/api/topics/crl-janitor/resources");
    }

    #[test]
    fn test_resources_url_rejects_opaque_endpoint() {
        let result =
            HttpResourceTracker::resources_url(&Url::parse("mailto:ops@example.com").unwrap(), "t");
        assert!(matches!(
            result,
            Err(CleanupRecordingError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_request_wire_format() {
        let request = TrackedResourceRequest::new(
            ResourceUid::from(GoogleBucketUid {
                bucket_name: "b".to_string(),
            }),
            &config("https://j.example.com"),
            Utc::now(),
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["resourceUid"]["googleBucketUid"]["bucketName"], "b");
        assert_eq!(value["cleanupId"], "run-1");
        assert!(value["expiration"].is_string());
    }
}
