//! API key authentication
//!
//! Mutating requests must present the configured key either as a Bearer
//! token or in `X-API-Key`. An unconfigured key disables the check
//! (development mode).

use std::collections::HashMap;
use thiserror::Error;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid or missing API key")]
    Unauthorized,
}

/// Validates the API key on incoming requests.
#[derive(Debug, Clone)]
pub struct ApiKeyAuthenticator {
    api_key: Option<String>,
}

impl ApiKeyAuthenticator {
    pub fn new(api_key: Option<String>) -> Self {
        // Treat an empty configured key the same as no key.
        let api_key = api_key.filter(|k| !k.is_empty());
        Self { api_key }
    }

    /// Check the request headers against the configured key.
    ///
    /// Header names are expected lowercased (the server normalizes them).
    pub fn authorize(&self, headers: &HashMap<String, String>) -> Result<(), AuthError> {
        let Some(expected) = &self.api_key else {
            return Ok(());
        };

        if let Some(auth) = headers.get("authorization") {
            if let Some(token) = auth.strip_prefix("Bearer ") {
                if token == expected {
                    return Ok(());
                }
            }
        }

        if headers.get("x-api-key") == Some(expected) {
            return Ok(());
        }

        Err(AuthError::Unauthorized)
    }
}
