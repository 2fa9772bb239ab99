//! Integration tests for cleanup recording against a mock tracking service

use std::sync::Arc;
use std::time::Duration;

use cloudwrap_core::cleanup::{
    AwsS3BucketUid, AzureDatabaseUid, AzureDiskUid, AzureKubernetesNamespaceUid,
    AzureManagedIdentityUid, AzureResourceGroupUid, AzureStorageContainerUid,
    AzureVirtualMachineUid,
    CleanupRecorder, CleanupRecordingError, GoogleBigQueryDatasetUid, GoogleBigQueryTableUid,
    GoogleBlobUid, GoogleBucketUid, GoogleNotebookInstanceUid, GoogleProjectUid,
    GoogleServiceAccountUid, HttpResourceTracker, ResourceTracker, ResourceUid, TrackAck,
    TrackedResourceRequest,
};
use cloudwrap_core::operation::LongRunningOperation;
use cloudwrap_core::{
    CleanupConfig, ClientConfig, CloudOperationKind, CloudPlatform, CoreContext, CoreError,
    InMemorySink, LongRunningAdapter, OperationPoller, TrackerCredentials, create_and_wait,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOPIC: &str = "crl-janitor";

fn cleanup_config(endpoint: &str) -> CleanupConfig {
    CleanupConfig::new(Url::parse(endpoint).unwrap(), TOPIC, "integration-run")
        .time_to_live(Duration::from_secs(3600))
        .credentials(TrackerCredentials::BearerToken("janitor-token".to_string()))
}

fn http_recorder() -> CleanupRecorder {
    let tracker = HttpResourceTracker::new(Duration::from_secs(5)).unwrap();
    CleanupRecorder::new(Arc::new(tracker))
}

fn group() -> AzureResourceGroupUid {
    AzureResourceGroupUid {
        tenant_id: "tenant".to_string(),
        subscription_id: "subscription".to_string(),
        resource_group_name: "mrg-test".to_string(),
    }
}

fn every_variant() -> Vec<ResourceUid> {
    vec![
        GoogleProjectUid {
            project_id: "terra-test-1".to_string(),
        }
        .into(),
        GoogleBucketUid {
            bucket_name: "bucket".to_string(),
        }
        .into(),
        GoogleBlobUid {
            bucket_name: "bucket".to_string(),
            blob_name: "path/to/blob".to_string(),
        }
        .into(),
        GoogleBigQueryDatasetUid {
            project_id: "p".to_string(),
            dataset_id: "d".to_string(),
        }
        .into(),
        GoogleBigQueryTableUid {
            project_id: "p".to_string(),
            dataset_id: "d".to_string(),
            table_id: "t".to_string(),
        }
        .into(),
        GoogleNotebookInstanceUid {
            project_id: "p".to_string(),
            location: "us-east1-b".to_string(),
            instance_id: "notebook".to_string(),
        }
        .into(),
        GoogleServiceAccountUid {
            project_id: "p".to_string(),
            account_email: "sa@p.iam.gserviceaccount.com".to_string(),
        }
        .into(),
        group().into(),
        AzureStorageContainerUid {
            resource_group: group(),
            storage_account_name: "account".to_string(),
            container_name: "container".to_string(),
        }
        .into(),
        AzureVirtualMachineUid {
            resource_group: group(),
            vm_name: "vm".to_string(),
        }
        .into(),
        AzureDiskUid {
            resource_group: group(),
            disk_name: "disk".to_string(),
        }
        .into(),
        AzureManagedIdentityUid {
            resource_group: group(),
            identity_name: "identity".to_string(),
        }
        .into(),
        AzureDatabaseUid {
            resource_group: group(),
            server_name: "server".to_string(),
            database_name: "db".to_string(),
        }
        .into(),
        AzureKubernetesNamespaceUid {
            resource_group: group(),
            cluster_name: "aks".to_string(),
            namespace_name: "ns".to_string(),
        }
        .into(),
        AwsS3BucketUid {
            region: "us-west-2".to_string(),
            bucket_name: "bucket".to_string(),
        }
        .into(),
    ]
}

// ============================================================================
// Resource identities
// ============================================================================

#[test]
fn test_every_variant_round_trips() {
    for uid in every_variant() {
        let encoded = serde_json::to_string(&uid).unwrap();
        let decoded: ResourceUid = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, uid);
    }
}

#[test]
fn test_every_variant_has_distinct_tag() {
    let mut tags: Vec<_> = every_variant().iter().map(ResourceUid::resource_type).collect();
    let total = tags.len();
    tags.sort_unstable();
    tags.dedup();
    assert_eq!(tags.len(), total);
}

#[test]
fn test_every_tag_names_a_uid() {
    for uid in every_variant() {
        let tag = uid.resource_type();
        assert!(tag.ends_with("Uid"), "{tag}");

        let value = serde_json::to_value(&uid).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec![tag]);
    }
}

// ============================================================================
// HTTP tracker
// ============================================================================

#[tokio::test]
async fn test_record_posts_to_topic_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/topics/{TOPIC}/resources")))
        .and(header("authorization", "Bearer janitor-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"trackedResourceId": "tr-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let uid = ResourceUid::from(GoogleBigQueryTableUid {
        project_id: "p".to_string(),
        dataset_id: "d".to_string(),
        table_id: "t".to_string(),
    });
    http_recorder()
        .record(uid.clone(), &cleanup_config(&server.uri()))
        .await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["resourceUid"], serde_json::to_value(&uid).unwrap());
    assert_eq!(body["cleanupId"], "integration-run");
    assert_eq!(body["topic"], TOPIC);

    let sent: TrackedResourceRequest = serde_json::from_value(body).unwrap();
    assert_eq!(sent.expiration - sent.creation, chrono::TimeDelta::hours(1));
}

#[tokio::test]
async fn test_tracker_reports_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("janitor down"))
        .mount(&server)
        .await;

    let config = cleanup_config(&server.uri());
    let request = TrackedResourceRequest::new(
        GoogleBucketUid {
            bucket_name: "b".to_string(),
        }
        .into(),
        &config,
        chrono::Utc::now(),
    );

    let tracker = HttpResourceTracker::new(Duration::from_secs(5)).unwrap();
    match tracker.create_tracked_resource(&config, &request).await {
        Err(CleanupRecordingError::Rejected { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "janitor down");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_success_body_is_acknowledged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let config = cleanup_config(&server.uri());
    let request = TrackedResourceRequest::new(
        AwsS3BucketUid {
            region: "us-west-2".to_string(),
            bucket_name: "b".to_string(),
        }
        .into(),
        &config,
        chrono::Utc::now(),
    );

    let tracker = HttpResourceTracker::new(Duration::from_secs(5)).unwrap();
    let ack = tracker.create_tracked_resource(&config, &request).await.unwrap();
    assert_eq!(ack, TrackAck::default());
}

#[tokio::test]
async fn test_rejection_is_swallowed_by_recorder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let uid = ResourceUid::from(GoogleBucketUid {
        bucket_name: "b".to_string(),
    });
    // Returns normally even though the service failed
    http_recorder()
        .record(uid, &cleanup_config(&server.uri()))
        .await;
}

#[tokio::test]
async fn test_spawned_recording_can_be_awaited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let handle = http_recorder().spawn_record(
        GoogleProjectUid {
            project_id: "p".to_string(),
        }
        .into(),
        cleanup_config(&server.uri()),
    );
    handle.await.unwrap();

    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

// ============================================================================
// Unreachable tracking service
// ============================================================================

/// Endpoint on a local port nothing listens on
fn refused_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

#[derive(Debug, Clone, Copy)]
struct CreateDataset;

impl CloudOperationKind for CreateDataset {
    fn name(&self) -> &'static str {
        "GOOGLE_CREATE_BIGQUERY_DATASET"
    }

    fn platform(&self) -> CloudPlatform {
        CloudPlatform::Gcp
    }
}

#[tokio::test]
async fn test_connection_refused_surfaces_as_transport_error() {
    let config = cleanup_config(&refused_endpoint());
    let request = TrackedResourceRequest::new(
        GoogleBucketUid {
            bucket_name: "b".to_string(),
        }
        .into(),
        &config,
        chrono::Utc::now(),
    );

    let tracker = HttpResourceTracker::new(Duration::from_secs(5)).unwrap();
    let result = tracker.create_tracked_resource(&config, &request).await;
    assert!(matches!(result, Err(CleanupRecordingError::Transport(_))));
}

#[tokio::test]
async fn test_creation_succeeds_when_tracking_service_is_unreachable() {
    let sink = Arc::new(InMemorySink::new());
    let config = ClientConfig::builder("cleanup-test")
        .cleanup(cleanup_config(&refused_endpoint()))
        .sink(sink.clone())
        .build();
    let ctx = CoreContext::new(
        config,
        http_recorder(),
        OperationPoller::new(Duration::from_millis(10), Duration::from_secs(5)),
    );

    let uid = ResourceUid::from(GoogleBigQueryDatasetUid {
        project_id: "p".to_string(),
        dataset_id: "d".to_string(),
    });
    let operation = |done: bool| LongRunningOperation {
        name: "operations/dataset".to_string(),
        done: Some(done),
        ..Default::default()
    };

    let result: Result<_, CoreError> = create_and_wait(
        &ctx,
        CreateDataset,
        &LongRunningAdapter,
        uid,
        || async { Ok(operation(false)) },
        || async { Ok(operation(true)) },
    )
    .await;

    let handle = result.expect("creation flow completes despite cleanup failure");
    assert!(handle.is_done());
    assert_eq!(sink.len(), 2);
}
