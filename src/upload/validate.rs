//! Presign request validation
//!
//! Pure checks, run before any storage call: invalid input never reaches
//! the backend.

use super::{PresignRequest, UploadError};
use crate::config::Profile;

/// Validate a presign request against its resolved profile.
///
/// MIME matching is exact, case-sensitive string equality against the
/// profile's allow-set; no wildcards, no normalization.
pub fn validate_request(req: &PresignRequest, profile: &Profile) -> Result<(), UploadError> {
    if req.key_base.is_empty() {
        return Err(UploadError::BadRequest("key_base is required".into()));
    }
    if req.ext.is_empty() {
        return Err(UploadError::BadRequest("ext is required".into()));
    }
    if req.mime.is_empty() {
        return Err(UploadError::BadRequest("mime is required".into()));
    }
    if req.size_bytes == 0 {
        return Err(UploadError::BadRequest(
            "size_bytes must be greater than 0".into(),
        ));
    }
    if req.kind.is_empty() {
        return Err(UploadError::BadRequest("kind is required".into()));
    }
    if req.profile.is_empty() {
        return Err(UploadError::BadRequest("profile is required".into()));
    }

    if profile.kind.as_str() != req.kind {
        return Err(UploadError::BadRequest(format!(
            "Kind mismatch: expected {}, got {}",
            profile.kind.as_str(),
            req.kind
        )));
    }

    if !profile.allowed_mimes.iter().any(|m| m == &req.mime) {
        return Err(UploadError::MimeNotAllowed {
            mime: req.mime.clone(),
        });
    }

    if req.size_bytes > profile.size_max_bytes {
        return Err(UploadError::SizeTooLarge {
            size_bytes: req.size_bytes,
            max_bytes: profile.size_max_bytes,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProfileKind;

    fn image_profile() -> Profile {
        Profile {
            kind: ProfileKind::Image,
            allowed_mimes: vec!["image/jpeg".into(), "image/png".into()],
            size_max_bytes: 5 * 1024 * 1024,
            multipart_threshold_mb: 15,
            part_size_mb: 8,
            token_ttl_seconds: 900,
            path_template: "originals/{key_base}.{ext}".into(),
            enable_sharding: false,
        }
    }

    fn valid_request() -> PresignRequest {
        PresignRequest {
            key_base: "photo-1".into(),
            ext: "jpg".into(),
            mime: "image/jpeg".into(),
            size_bytes: 1024 * 1024,
            kind: "image".into(),
            profile: "photo".into(),
            multipart: "auto".into(),
            shard: String::new(),
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(validate_request(&valid_request(), &image_profile()).is_ok());
    }

    #[test]
    fn test_missing_fields_rejected() {
        for field in ["key_base", "ext", "mime", "kind", "profile"] {
            let mut req = valid_request();
            match field {
                "key_base" => req.key_base.clear(),
                "ext" => req.ext.clear(),
                "mime" => req.mime.clear(),
                "kind" => req.kind.clear(),
                _ => req.profile.clear(),
            }
            let err = validate_request(&req, &image_profile()).unwrap_err();
            assert_eq!(err.code(), "bad_request", "field {}", field);
            assert!(err.to_string().contains(field));
        }
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut req = valid_request();
        req.size_bytes = 0;
        let err = validate_request(&req, &image_profile()).unwrap_err();
        assert_eq!(err.code(), "bad_request");
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let mut req = valid_request();
        req.kind = "video".into();
        let err = validate_request(&req, &image_profile()).unwrap_err();
        assert_eq!(err.code(), "bad_request");
        assert!(err.to_string().contains("Kind mismatch"));
    }

    #[test]
    fn test_mime_not_in_allow_set() {
        let mut req = valid_request();
        req.mime = "text/plain".into();
        let err = validate_request(&req, &image_profile()).unwrap_err();
        assert_eq!(err.code(), "mime_not_allowed");
    }

    #[test]
    fn test_mime_match_is_case_sensitive() {
        let mut req = valid_request();
        req.mime = "Image/JPEG".into();
        let err = validate_request(&req, &image_profile()).unwrap_err();
        assert_eq!(err.code(), "mime_not_allowed");
    }

    #[test]
    fn test_size_over_cap() {
        let mut req = valid_request();
        req.size_bytes = 10 * 1024 * 1024;
        let err = validate_request(&req, &image_profile()).unwrap_err();
        assert_eq!(err.code(), "size_too_large");
        let text = err.to_string();
        assert!(text.contains(&(10 * 1024 * 1024).to_string()));
        assert!(text.contains(&(5 * 1024 * 1024).to_string()));
    }

    #[test]
    fn test_size_exactly_at_cap_allowed() {
        let mut req = valid_request();
        req.size_bytes = 5 * 1024 * 1024;
        assert!(validate_request(&req, &image_profile()).is_ok());
    }
}
