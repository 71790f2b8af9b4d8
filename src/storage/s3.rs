//! S3 implementation of the [`ObjectStore`] trait
//!
//! Uses the AWS SDK presigner for PUT and UploadPart URLs and the plain
//! client for session management (create/complete/abort) and object
//! fetches. Custom endpoints (MinIO and friends) switch to path-style
//! addressing.

use super::{CompletedPart, ObjectStore, StorageError};
use crate::config::S3Config;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

/// Header consulted when building storage-side requests. Other required
/// headers ride along in the presigned response for the client to send.
const CONTENT_TYPE: &str = "Content-Type";
const IF_NONE_MATCH: &str = "If-None-Match";

/// S3-backed object store
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a store from configuration.
    ///
    /// Static credentials take precedence; otherwise the ambient AWS
    /// credential chain (env, profile, instance metadata) is used.
    pub async fn connect(config: &S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "mediaflow-config",
            ));
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }

    /// Wrap an existing SDK client (tests point this at a mock backend).
    pub fn with_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn presign_config(ttl: Duration, key: &str) -> Result<PresigningConfig, StorageError> {
        PresigningConfig::expires_in(ttl).map_err(|e| StorageError::PresignPut {
            key: key.to_string(),
            message: format!("invalid presign TTL: {}", e),
        })
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    #[tracing::instrument(name = "s3.presign_put", skip(self, headers), fields(s3.bucket = %self.bucket, s3.key = %key), err)]
    async fn presign_put(
        &self,
        key: &str,
        ttl: Duration,
        headers: &HashMap<String, String>,
    ) -> Result<String, StorageError> {
        let mut request = self.client.put_object().bucket(&self.bucket).key(key);
        if let Some(content_type) = headers.get(CONTENT_TYPE) {
            request = request.content_type(content_type);
        }
        if let Some(if_none_match) = headers.get(IF_NONE_MATCH) {
            request = request.if_none_match(if_none_match);
        }

        let presigned = request
            .presigned(Self::presign_config(ttl, key)?)
            .await
            .map_err(|e| StorageError::PresignPut {
                key: key.to_string(),
                message: format!("{}", DisplayErrorContext(&e)),
            })?;

        Ok(presigned.uri().to_string())
    }

    #[tracing::instrument(name = "s3.create_multipart_upload", skip(self, headers), fields(s3.bucket = %self.bucket, s3.key = %key), err)]
    async fn create_multipart_upload(
        &self,
        key: &str,
        headers: &HashMap<String, String>,
    ) -> Result<String, StorageError> {
        let mut request = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key);
        if let Some(content_type) = headers.get(CONTENT_TYPE) {
            request = request.content_type(content_type);
        }

        let output = request
            .send()
            .await
            .map_err(|e| StorageError::CreateMultipartUpload {
                key: key.to_string(),
                message: format!("{}", DisplayErrorContext(&e)),
            })?;

        output
            .upload_id()
            .map(|id| id.to_string())
            .ok_or_else(|| StorageError::CreateMultipartUpload {
                key: key.to_string(),
                message: "backend returned no upload id".into(),
            })
    }

    #[tracing::instrument(name = "s3.presign_upload_part", skip(self), fields(s3.bucket = %self.bucket, s3.key = %key, s3.part_number = part_number), err)]
    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let config =
            PresigningConfig::expires_in(ttl).map_err(|e| StorageError::PresignUploadPart {
                key: key.to_string(),
                part_number,
                message: format!("invalid presign TTL: {}", e),
            })?;

        let presigned = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .presigned(config)
            .await
            .map_err(|e| StorageError::PresignUploadPart {
                key: key.to_string(),
                part_number,
                message: format!("{}", DisplayErrorContext(&e)),
            })?;

        Ok(presigned.uri().to_string())
    }

    #[tracing::instrument(name = "s3.complete_multipart_upload", skip(self, parts), fields(s3.bucket = %self.bucket, s3.key = %key, parts_count = parts.len()), err)]
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError> {
        let completed = parts
            .iter()
            .map(|p| {
                S3CompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(&p.etag)
                    .build()
            })
            .collect::<Vec<_>>();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| StorageError::CompleteMultipartUpload {
                key: key.to_string(),
                message: format!("{}", DisplayErrorContext(&e)),
            })?;

        Ok(())
    }

    #[tracing::instrument(name = "s3.abort_multipart_upload", skip(self), fields(s3.bucket = %self.bucket, s3.key = %key), err)]
    async fn abort_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
    ) -> Result<(), StorageError> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| StorageError::AbortMultipartUpload {
                key: key.to_string(),
                message: format!("{}", DisplayErrorContext(&e)),
            })?;

        Ok(())
    }

    #[tracing::instrument(name = "s3.get_object", skip(self), fields(s3.bucket = %self.bucket, s3.key = %key), err)]
    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                if e.as_service_error().map(|s| s.is_no_such_key()) == Some(true) {
                    return Err(StorageError::NotFound {
                        key: key.to_string(),
                    });
                }
                return Err(StorageError::GetObject {
                    key: key.to_string(),
                    message: format!("{}", DisplayErrorContext(&e)),
                });
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::GetObject {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(data.into_bytes())
    }
}
