//! Shared fixtures for integration tests

use async_trait::async_trait;
use bytes::Bytes;
use mediaflow::config::{
    AuthConfig, Config, MediaConfig, MetricsConfig, Profile, ProfileKind, S3Config, ServerConfig,
};
use mediaflow::storage::{CompletedPart, ObjectStore, StorageError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Recorded storage call, for asserting on ordering and arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    PresignPut { key: String },
    CreateMultipart { key: String },
    PresignPart { key: String, part_number: i32 },
    Complete { key: String, upload_id: String, parts: Vec<CompletedPart> },
    Abort { key: String, upload_id: String },
    Get { key: String },
}

/// In-memory ObjectStore that hands out fake presigned URLs and records
/// every call it sees.
#[derive(Default)]
pub struct FakeObjectStore {
    pub calls: Mutex<Vec<StoreCall>>,
    pub objects: Mutex<HashMap<String, Bytes>>,
    /// When set, presigning this part number fails.
    pub fail_part: Option<i32>,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, key: &str, data: Bytes) -> Self {
        self.objects.lock().unwrap().insert(key.to_string(), data);
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn presign_put(
        &self,
        key: &str,
        ttl: Duration,
        _headers: &HashMap<String, String>,
    ) -> Result<String, StorageError> {
        self.calls.lock().unwrap().push(StoreCall::PresignPut {
            key: key.to_string(),
        });
        Ok(format!(
            "https://s3.test/media/{}?X-Amz-Expires={}",
            key,
            ttl.as_secs()
        ))
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        _headers: &HashMap<String, String>,
    ) -> Result<String, StorageError> {
        self.calls.lock().unwrap().push(StoreCall::CreateMultipart {
            key: key.to_string(),
        });
        Ok("upload-123".to_string())
    }

    async fn presign_upload_part(
        &self,
        key: &str,
        _upload_id: &str,
        part_number: i32,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        self.calls.lock().unwrap().push(StoreCall::PresignPart {
            key: key.to_string(),
            part_number,
        });
        if self.fail_part == Some(part_number) {
            return Err(StorageError::PresignUploadPart {
                key: key.to_string(),
                part_number,
                message: "injected failure".into(),
            });
        }
        Ok(format!(
            "https://s3.test/media/{}?partNumber={}&X-Amz-Expires={}",
            key,
            part_number,
            ttl.as_secs()
        ))
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError> {
        self.calls.lock().unwrap().push(StoreCall::Complete {
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            parts: parts.to_vec(),
        });
        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> Result<(), StorageError> {
        self.calls.lock().unwrap().push(StoreCall::Abort {
            key: key.to_string(),
            upload_id: upload_id.to_string(),
        });
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        self.calls.lock().unwrap().push(StoreCall::Get {
            key: key.to_string(),
        });
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }
}

/// An image profile with sharding on and a 15 MB multipart threshold.
pub fn photo_profile() -> Profile {
    Profile {
        kind: ProfileKind::Image,
        allowed_mimes: vec!["image/jpeg".into(), "image/png".into()],
        size_max_bytes: 20 * 1024 * 1024 * 1024,
        multipart_threshold_mb: 15,
        part_size_mb: 8,
        token_ttl_seconds: 900,
        path_template: "originals/photos/{shard?}/{key_base}.{ext}".into(),
        enable_sharding: true,
    }
}

pub fn test_config(api_key: Option<&str>) -> Config {
    let mut profiles = HashMap::new();
    profiles.insert("photo".to_string(), photo_profile());
    Config {
        server: ServerConfig {
            address: "127.0.0.1:0".into(),
            public_base_url: Some("https://media.example.com".into()),
        },
        s3: S3Config {
            bucket: "media".into(),
            region: "us-east-1".into(),
            endpoint: None,
            access_key: None,
            secret_key: None,
        },
        auth: AuthConfig {
            api_key: api_key.map(str::to_string),
        },
        metrics: MetricsConfig { enabled: true },
        media: MediaConfig::default(),
        profiles,
    }
}
