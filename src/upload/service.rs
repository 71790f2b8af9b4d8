//! Upload plan builder and completion/abort orchestrator

use super::key::build_object_key;
use super::shard::shard;
use super::strategy::{select_strategy, UploadStrategy};
use super::validate::validate_request;
use super::{
    CompleteMultipartRequest, MultipartUpload, PartUpload, PresignRequest, PresignResponse,
    SingleUpload, UploadAction, UploadDetails, UploadError,
};
use crate::config::Profile;
use crate::storage::ObjectStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on presigned part URLs per plan. Larger uploads are
/// silently clamped (with a warn) rather than rejected.
pub const MAX_PRESIGNED_PARTS: u64 = 100;

/// Drives presigning against the injected [`ObjectStore`].
pub struct UploadService {
    store: Arc<dyn ObjectStore>,
}

impl UploadService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Build an upload plan for a validated request.
    ///
    /// Validation runs first; nothing touches storage on invalid input.
    /// `base_url` is where the complete/abort actions point back to.
    #[tracing::instrument(name = "upload.presign", skip(self, req, profile), fields(profile = %req.profile, key_base = %req.key_base), err)]
    pub async fn presign(
        &self,
        req: &PresignRequest,
        profile: &Profile,
        base_url: &str,
    ) -> Result<PresignResponse, UploadError> {
        validate_request(req, profile)?;

        let shard_value = if !req.shard.is_empty() {
            req.shard.clone()
        } else if profile.enable_sharding {
            shard(&req.key_base)
        } else {
            String::new()
        };

        let object_key =
            build_object_key(&profile.path_template, &req.key_base, &req.ext, &shard_value);

        let strategy = select_strategy(&req.multipart, req.size_bytes, profile.multipart_threshold_mb);
        let headers = required_headers(&req.mime);
        let ttl = Duration::from_secs(profile.token_ttl_seconds);
        let expires_at = Utc::now() + ChronoDuration::seconds(profile.token_ttl_seconds as i64);

        let upload = match strategy {
            UploadStrategy::Single => {
                self.single_upload(&object_key, headers, ttl, expires_at)
                    .await?
            }
            UploadStrategy::Multipart => {
                self.multipart_upload(
                    &object_key,
                    headers,
                    ttl,
                    expires_at,
                    profile.part_size_mb,
                    req.size_bytes,
                    base_url,
                )
                .await?
            }
        };

        crate::metrics::record_presign(&req.profile, strategy.as_str());

        Ok(PresignResponse { object_key, upload })
    }

    /// Finalize a multipart upload from client-supplied part ETags.
    ///
    /// A thin relay: ETag authenticity and part contiguity are the storage
    /// backend's responsibility.
    #[tracing::instrument(name = "upload.complete", skip(self, req), fields(object_key = %object_key, upload_id = %upload_id), err)]
    pub async fn complete(
        &self,
        object_key: &str,
        upload_id: &str,
        req: &CompleteMultipartRequest,
    ) -> Result<(), UploadError> {
        if req.parts.is_empty() {
            return Err(UploadError::BadRequest(
                "parts is required and cannot be empty".into(),
            ));
        }

        self.store
            .complete_multipart_upload(object_key, upload_id, &req.parts)
            .await?;

        crate::metrics::record_completion("completed");
        Ok(())
    }

    /// Cancel an in-flight multipart upload.
    #[tracing::instrument(name = "upload.abort", skip(self), fields(object_key = %object_key, upload_id = %upload_id), err)]
    pub async fn abort(&self, object_key: &str, upload_id: &str) -> Result<(), UploadError> {
        self.store
            .abort_multipart_upload(object_key, upload_id)
            .await?;

        crate::metrics::record_completion("aborted");
        Ok(())
    }

    async fn single_upload(
        &self,
        object_key: &str,
        headers: HashMap<String, String>,
        ttl: Duration,
        expires_at: DateTime<Utc>,
    ) -> Result<UploadDetails, UploadError> {
        // Conditional create: the backend rejects overwrites of an
        // existing object at this key, so no read-before-write is needed.
        let mut single_headers = headers;
        single_headers.insert("If-None-Match".to_string(), "*".to_string());

        let url = self
            .store
            .presign_put(object_key, ttl, &single_headers)
            .await
            .map_err(UploadError::UploadDetailsFailed)?;

        Ok(UploadDetails {
            single: Some(SingleUpload {
                method: "PUT".to_string(),
                url,
                headers: single_headers,
                expires_at,
            }),
            multipart: None,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn multipart_upload(
        &self,
        object_key: &str,
        headers: HashMap<String, String>,
        ttl: Duration,
        expires_at: DateTime<Utc>,
        part_size_mb: u64,
        total_size_bytes: u64,
        base_url: &str,
    ) -> Result<UploadDetails, UploadError> {
        let upload_id = self
            .store
            .create_multipart_upload(object_key, &headers)
            .await
            .map_err(UploadError::UploadDetailsFailed)?;

        let part_size_bytes = part_size_mb * 1024 * 1024;
        let computed_parts = total_size_bytes.div_ceil(part_size_bytes);
        let num_parts = if computed_parts > MAX_PRESIGNED_PARTS {
            tracing::warn!(
                computed = computed_parts,
                clamped = MAX_PRESIGNED_PARTS,
                object_key = object_key,
                "part count exceeds presign limit; clamping"
            );
            MAX_PRESIGNED_PARTS
        } else {
            computed_parts
        } as i32;

        // Presigning does not mutate storage state, so the per-part calls
        // are independent; try_join_all keeps input order, which is
        // part_number order, and fails the whole plan on the first error.
        let part_futures = (1..=num_parts).map(|part_number| {
            let headers = headers.clone();
            let upload_id = upload_id.clone();
            async move {
                let url = self
                    .store
                    .presign_upload_part(object_key, &upload_id, part_number, ttl)
                    .await?;
                Ok::<_, crate::storage::StorageError>(PartUpload {
                    part_number,
                    method: "PUT".to_string(),
                    url,
                    headers,
                    expires_at,
                })
            }
        });

        let parts = futures::future::try_join_all(part_futures)
            .await
            .map_err(UploadError::UploadDetailsFailed)?;

        crate::metrics::record_multipart_parts(parts.len());

        let base = base_url.trim_end_matches('/');
        let complete = UploadAction {
            method: "POST".to_string(),
            url: format!("{}/v1/uploads/{}/complete/{}", base, object_key, upload_id),
            expires_at,
        };
        let abort = UploadAction {
            method: "DELETE".to_string(),
            url: format!("{}/v1/uploads/{}/abort/{}", base, object_key, upload_id),
            expires_at,
        };

        Ok(UploadDetails {
            single: None,
            multipart: Some(MultipartUpload {
                upload_id,
                part_size: part_size_bytes,
                parts,
                complete,
                abort,
            }),
        })
    }
}

/// Headers the client must send with every upload request.
fn required_headers(mime: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), mime.to_string());
    headers
}
