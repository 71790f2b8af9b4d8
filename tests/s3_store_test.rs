//! S3 Object Store Integration Tests
//!
//! Session management (create/complete/abort) and object fetches run
//! against a wiremock S3 backend. Presigning is signature-only and needs
//! no backend at all, so those tests assert on the produced URLs.

use mediaflow::config::S3Config;
use mediaflow::storage::{CompletedPart, ObjectStore, S3ObjectStore, StorageError};
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_s3_config(endpoint: &str) -> S3Config {
    S3Config {
        bucket: "media".to_string(),
        region: "us-east-1".to_string(),
        endpoint: Some(endpoint.to_string()),
        access_key: Some("test-access".to_string()),
        secret_key: Some("test-secret".to_string()),
    }
}

async fn test_store(mock_server: &MockServer) -> S3ObjectStore {
    S3ObjectStore::connect(&test_s3_config(&mock_server.uri())).await
}

#[tokio::test]
async fn presign_put_embeds_key_and_expiry() {
    // Presigning never talks to the backend; a dead endpoint is fine.
    let store = S3ObjectStore::connect(&test_s3_config("http://127.0.0.1:9000")).await;

    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), "image/jpeg".to_string());
    headers.insert("If-None-Match".to_string(), "*".to_string());

    let url = store
        .presign_put(
            "originals/photos/ab/avatar.jpg",
            Duration::from_secs(900),
            &headers,
        )
        .await
        .unwrap();

    assert!(url.contains("/media/originals/photos/ab/avatar.jpg"));
    assert!(url.contains("X-Amz-Expires=900"));
    assert!(url.contains("X-Amz-Signature="));
}

#[tokio::test]
async fn presign_upload_part_carries_part_number_and_upload_id() {
    let store = S3ObjectStore::connect(&test_s3_config("http://127.0.0.1:9000")).await;

    let url = store
        .presign_upload_part(
            "originals/photos/ab/big.jpg",
            "upload-abc",
            5,
            Duration::from_secs(900),
        )
        .await
        .unwrap();

    assert!(url.contains("partNumber=5"));
    assert!(url.contains("uploadId=upload-abc"));
}

#[tokio::test]
async fn create_multipart_returns_backend_upload_id() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/media/originals/photos/ab/big.jpg"))
        .and(query_param("uploads", ""))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <InitiateMultipartUploadResult>
                <Bucket>media</Bucket>
                <Key>originals/photos/ab/big.jpg</Key>
                <UploadId>real-upload-id-12345</UploadId>
            </InitiateMultipartUploadResult>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = test_store(&mock_server).await;
    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), "image/jpeg".to_string());

    let upload_id = store
        .create_multipart_upload("originals/photos/ab/big.jpg", &headers)
        .await
        .unwrap();

    assert_eq!(upload_id, "real-upload-id-12345");
}

#[tokio::test]
async fn complete_sends_all_parts_in_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/media/originals/photos/ab/big.jpg"))
        .and(query_param("uploadId", "upload-abc"))
        .and(body_string_contains("<PartNumber>1</PartNumber>"))
        .and(body_string_contains("<PartNumber>2</PartNumber>"))
        .and(body_string_contains("etag-two"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <CompleteMultipartUploadResult>
                <Bucket>media</Bucket>
                <Key>originals/photos/ab/big.jpg</Key>
                <ETag>"final"</ETag>
            </CompleteMultipartUploadResult>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = test_store(&mock_server).await;
    let parts = vec![
        CompletedPart {
            part_number: 1,
            etag: "\"etag-one\"".to_string(),
        },
        CompletedPart {
            part_number: 2,
            etag: "\"etag-two\"".to_string(),
        },
    ];

    store
        .complete_multipart_upload("originals/photos/ab/big.jpg", "upload-abc", &parts)
        .await
        .unwrap();
}

#[tokio::test]
async fn complete_failure_carries_key_and_cause() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/media/originals/photos/ab/big.jpg"))
        .respond_with(ResponseTemplate::new(404).set_body_string(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <Error>
                <Code>NoSuchUpload</Code>
                <Message>The specified upload does not exist.</Message>
            </Error>"#,
        ))
        .mount(&mock_server)
        .await;

    let store = test_store(&mock_server).await;
    let parts = vec![CompletedPart {
        part_number: 1,
        etag: "\"etag\"".to_string(),
    }];

    let err = store
        .complete_multipart_upload("originals/photos/ab/big.jpg", "gone", &parts)
        .await
        .unwrap_err();

    match err {
        StorageError::CompleteMultipartUpload { key, message } => {
            assert_eq!(key, "originals/photos/ab/big.jpg");
            assert!(message.contains("NoSuchUpload"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn abort_relays_to_backend() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/media/originals/photos/ab/big.jpg"))
        .and(query_param("uploadId", "upload-abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = test_store(&mock_server).await;
    store
        .abort_multipart_upload("originals/photos/ab/big.jpg", "upload-abc")
        .await
        .unwrap();
}

#[tokio::test]
async fn get_object_returns_body_bytes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/media/originals/profile/pic.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png-bytes".to_vec()))
        .mount(&mock_server)
        .await;

    let store = test_store(&mock_server).await;
    let data = store.get_object("originals/profile/pic.png").await.unwrap();
    assert_eq!(&data[..], b"png-bytes");
}

#[tokio::test]
async fn get_object_missing_key_maps_to_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/media/originals/profile/missing.png"))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("content-type", "application/xml")
                .set_body_string(
                    r#"<?xml version="1.0" encoding="UTF-8"?>
                    <Error>
                        <Code>NoSuchKey</Code>
                        <Message>The specified key does not exist.</Message>
                        <Key>originals/profile/missing.png</Key>
                    </Error>"#,
                ),
        )
        .mount(&mock_server)
        .await;

    let store = test_store(&mock_server).await;
    let err = store
        .get_object("originals/profile/missing.png")
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::NotFound { .. }));
}
