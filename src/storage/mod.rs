//! Object storage abstraction
//!
//! The upload engine and the media path talk to storage exclusively through
//! the [`ObjectStore`] trait, keeping the core free of any concrete SDK
//! type. The production implementation lives in [`s3`].

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub mod s3;

pub use s3::S3ObjectStore;

/// Storage errors, one variant per backend operation so every failure
/// carries the operation and key it belongs to.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to presign PUT for '{key}': {message}")]
    PresignPut { key: String, message: String },

    #[error("failed to create multipart upload for '{key}': {message}")]
    CreateMultipartUpload { key: String, message: String },

    #[error("failed to presign part {part_number} for '{key}': {message}")]
    PresignUploadPart {
        key: String,
        part_number: i32,
        message: String,
    },

    #[error("failed to complete multipart upload for '{key}': {message}")]
    CompleteMultipartUpload { key: String, message: String },

    #[error("failed to abort multipart upload for '{key}': {message}")]
    AbortMultipartUpload { key: String, message: String },

    #[error("failed to get object '{key}': {message}")]
    GetObject { key: String, message: String },

    #[error("object not found: {key}")]
    NotFound { key: String },
}

/// A part the client finished uploading, echoed back at completion time.
/// The ETag is opaque and storage-assigned; it is relayed verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

/// Capability interface over the object-storage backend.
///
/// Presigning operations are read-only with respect to storage state;
/// only create/complete/abort mutate the backend's session list.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Presign a single PUT of `key`, honoring the given required headers.
    async fn presign_put(
        &self,
        key: &str,
        ttl: Duration,
        headers: &HashMap<String, String>,
    ) -> Result<String, StorageError>;

    /// Start a multipart upload session, returning the opaque upload id.
    async fn create_multipart_upload(
        &self,
        key: &str,
        headers: &HashMap<String, String>,
    ) -> Result<String, StorageError>;

    /// Presign the upload of one numbered part (1-indexed).
    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        ttl: Duration,
    ) -> Result<String, StorageError>;

    /// Finalize a multipart upload from the client-supplied part ETags.
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError>;

    /// Cancel an in-flight multipart upload.
    async fn abort_multipart_upload(&self, key: &str, upload_id: &str)
        -> Result<(), StorageError>;

    /// Fetch an object's bytes (media variant path).
    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_part_wire_shape() {
        let part: CompletedPart =
            serde_json::from_str(r#"{"part_number":3,"etag":"\"abc\""}"#).unwrap();
        assert_eq!(part.part_number, 3);
        assert_eq!(part.etag, "\"abc\"");
    }

    #[test]
    fn test_error_carries_operation_context() {
        let err = StorageError::PresignUploadPart {
            key: "originals/a.jpg".into(),
            part_number: 4,
            message: "timeout".into(),
        };
        let text = err.to_string();
        assert!(text.contains("part 4"));
        assert!(text.contains("originals/a.jpg"));
        assert!(text.contains("timeout"));
    }
}
