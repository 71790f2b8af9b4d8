//! API Router
//!
//! Parses incoming requests and routes them to appropriate handlers.
//! Object keys may contain slashes, so the multipart routes are split on
//! their literal `/complete/` and `/abort/` markers rather than on path
//! segments.

use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use thiserror::Error;

/// Router errors
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid query parameter: {0}")]
    InvalidQuery(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),
}

/// API operation types
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRoute {
    /// POST /v1/uploads/presign
    PresignUpload,
    /// POST /v1/uploads/{object_key}/complete/{upload_id}
    CompleteMultipart {
        object_key: String,
        upload_id: String,
    },
    /// DELETE /v1/uploads/{object_key}/abort/{upload_id}
    AbortMultipart {
        object_key: String,
        upload_id: String,
    },
    /// GET /thumb/{category}/{file}?width=N&quality=N
    Thumbnail {
        category: String,
        file: String,
        width: Option<u32>,
        quality: Option<u8>,
    },
    /// GET /originals/{category}/{file}
    Original { category: String, file: String },
    /// GET /health
    Health,
    /// GET /metrics
    Metrics,
}

/// API Request Parser
pub struct ApiRequestParser;

impl ApiRequestParser {
    /// Parse an HTTP request into an API operation
    pub fn parse(method: &str, path: &str, query: Option<&str>) -> Result<ApiRoute, RouterError> {
        match (method, path) {
            ("GET", "/health") => return Ok(ApiRoute::Health),
            ("GET", "/metrics") => return Ok(ApiRoute::Metrics),
            ("POST", "/v1/uploads/presign") => return Ok(ApiRoute::PresignUpload),
            _ => {}
        }

        if let Some(rest) = path.strip_prefix("/v1/uploads/") {
            return Self::parse_upload_action(method, rest);
        }
        if let Some(rest) = path.strip_prefix("/thumb/") {
            if method != "GET" {
                return Err(RouterError::MethodNotAllowed(format!(
                    "Method {} not allowed for /thumb",
                    method
                )));
            }
            let (category, file) = Self::parse_media_path(rest)?;
            let params = Self::parse_query(query);
            return Ok(ApiRoute::Thumbnail {
                category,
                file,
                width: Self::parse_numeric(&params, "width")?,
                quality: Self::parse_numeric(&params, "quality")?,
            });
        }
        if let Some(rest) = path.strip_prefix("/originals/") {
            if method != "GET" {
                return Err(RouterError::MethodNotAllowed(format!(
                    "Method {} not allowed for /originals",
                    method
                )));
            }
            let (category, file) = Self::parse_media_path(rest)?;
            return Ok(ApiRoute::Original { category, file });
        }

        Err(RouterError::InvalidPath(format!("Unknown path: {}", path)))
    }

    fn parse_upload_action(method: &str, rest: &str) -> Result<ApiRoute, RouterError> {
        if let Some((object_key, upload_id)) = rest.split_once("/complete/") {
            if method != "POST" {
                return Err(RouterError::MethodNotAllowed(
                    "complete requires POST".into(),
                ));
            }
            if object_key.is_empty() || upload_id.is_empty() {
                return Err(RouterError::InvalidPath(
                    "Missing object key or upload id".into(),
                ));
            }
            return Ok(ApiRoute::CompleteMultipart {
                object_key: object_key.to_string(),
                upload_id: upload_id.to_string(),
            });
        }
        if let Some((object_key, upload_id)) = rest.split_once("/abort/") {
            if method != "DELETE" {
                return Err(RouterError::MethodNotAllowed(
                    "abort requires DELETE".into(),
                ));
            }
            if object_key.is_empty() || upload_id.is_empty() {
                return Err(RouterError::InvalidPath(
                    "Missing object key or upload id".into(),
                ));
            }
            return Ok(ApiRoute::AbortMultipart {
                object_key: object_key.to_string(),
                upload_id: upload_id.to_string(),
            });
        }
        Err(RouterError::InvalidPath(format!(
            "Unknown upload action: /v1/uploads/{}",
            rest
        )))
    }

    /// Split `{category}/{file}` and percent-decode both segments.
    fn parse_media_path(rest: &str) -> Result<(String, String), RouterError> {
        let (category, file) = rest
            .split_once('/')
            .ok_or_else(|| RouterError::InvalidPath("Missing file name".into()))?;
        if category.is_empty() || file.is_empty() || file.contains('/') {
            return Err(RouterError::InvalidPath(
                "Expected /{category}/{file}".into(),
            ));
        }
        let decode = |s: &str| -> Result<String, RouterError> {
            percent_decode_str(s)
                .decode_utf8()
                .map(|c| c.into_owned())
                .map_err(|_| RouterError::InvalidPath("Invalid percent-encoding".into()))
        };
        Ok((decode(category)?, decode(file)?))
    }

    fn parse_numeric<T: std::str::FromStr>(
        params: &HashMap<String, String>,
        name: &str,
    ) -> Result<Option<T>, RouterError> {
        match params.get(name) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|_| {
                RouterError::InvalidQuery(format!("{} must be a positive integer", name))
            }),
        }
    }

    fn parse_query(query: Option<&str>) -> HashMap<String, String> {
        let mut params = HashMap::new();
        if let Some(q) = query {
            for pair in q.split('&') {
                let mut kv = pair.splitn(2, '=');
                if let Some(key) = kv.next() {
                    let value = kv.next().unwrap_or("");
                    params.insert(key.to_string(), value.to_string());
                }
            }
        }
        params
    }
}
