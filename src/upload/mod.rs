//! Upload strategy engine
//!
//! The core of the service: validates presign requests against a profile,
//! picks the upload strategy, derives the deterministic object key, and
//! orchestrates presigned-URL generation plus the multipart
//! completion/abort protocol. The engine is stateless; all continuity
//! (object key, upload id) travels in the response and is echoed back by
//! the client.

use crate::storage::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub mod key;
pub mod service;
pub mod shard;
pub mod strategy;
pub mod validate;

pub use crate::storage::CompletedPart;
pub use service::UploadService;
pub use strategy::UploadStrategy;

/// Stable machine-readable error codes surfaced in response bodies.
pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const MIME_NOT_ALLOWED: &str = "mime_not_allowed";
    pub const SIZE_TOO_LARGE: &str = "size_too_large";
    pub const STORAGE_ERROR: &str = "storage_error";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const NOT_FOUND: &str = "not_found";
}

/// Upload engine errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("{0}")]
    BadRequest(String),

    #[error("mime type not allowed: {mime}")]
    MimeNotAllowed { mime: String },

    #[error("file size exceeds maximum: {size_bytes} > {max_bytes}")]
    SizeTooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("failed to create upload details: {0}")]
    UploadDetailsFailed(#[source] StorageError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl UploadError {
    /// Taxonomy code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::BadRequest(_) => codes::BAD_REQUEST,
            UploadError::MimeNotAllowed { .. } => codes::MIME_NOT_ALLOWED,
            UploadError::SizeTooLarge { .. } => codes::SIZE_TOO_LARGE,
            UploadError::UploadDetailsFailed(_) | UploadError::Storage(_) => codes::STORAGE_ERROR,
        }
    }

    /// Optional remediation hint for the error envelope.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            UploadError::MimeNotAllowed { .. } => {
                Some("Check allowed_mimes in the upload profile configuration")
            }
            UploadError::SizeTooLarge { .. } => {
                Some("Reduce file size or check size_max_bytes in the profile")
            }
            _ => None,
        }
    }
}

/// Request body for `POST /v1/uploads/presign`.
///
/// Every field defaults so that missing values surface as validation
/// errors with a stable code rather than as serde failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresignRequest {
    #[serde(default)]
    pub key_base: String,
    #[serde(default)]
    pub ext: String,
    #[serde(default)]
    pub mime: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub profile: String,
    /// `auto`, `force` or `off`; empty or unrecognized means `auto`.
    #[serde(default)]
    pub multipart: String,
    /// Optional shard override; normally derived from key_base.
    #[serde(default)]
    pub shard: String,
}

/// Response for a successful presign call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresignResponse {
    pub object_key: String,
    pub upload: UploadDetails,
}

/// Exactly one of the two strategies is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single: Option<SingleUpload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multipart: Option<MultipartUpload>,
}

/// Single presigned PUT descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleUpload {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub expires_at: DateTime<Utc>,
}

/// Multipart descriptor: per-part presigned URLs plus the complete and
/// abort actions, which target this API rather than storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipartUpload {
    pub upload_id: String,
    /// Part size in bytes.
    pub part_size: u64,
    pub parts: Vec<PartUpload>,
    pub complete: UploadAction,
    pub abort: UploadAction,
}

/// One presigned part upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartUpload {
    pub part_number: i32,
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub expires_at: DateTime<Utc>,
}

/// Follow-up action the client invokes against this API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadAction {
    pub method: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Body for `POST /v1/uploads/{object_key}/complete/{upload_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteMultipartRequest {
    #[serde(default)]
    pub parts: Vec<CompletedPart>,
}
