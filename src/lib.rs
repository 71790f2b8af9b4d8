//! Mediaflow Library
//!
//! Presigned-upload orchestration and image variant serving over S3.
//!
//! # Features
//!
//! - **Presigned Uploads**: Clients PUT straight to S3, never through us
//! - **Strategy Engine**: Single PUT vs multipart chosen per request size
//! - **Deterministic Keys**: Templated object keys with optional sharding
//! - **Variant Serving**: Resized image thumbnails with cache headers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mediaflow::config::Config;
//! use mediaflow::media::MediaService;
//! use mediaflow::server::{ApiServer, AppState};
//! use mediaflow::storage::s3::S3ObjectStore;
//! use mediaflow::upload::UploadService;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(Config::load("mediaflow.yaml")?);
//!     let store = Arc::new(S3ObjectStore::connect(&config.s3).await);
//!     let state = AppState::new(
//!         Arc::clone(&config),
//!         UploadService::new(store.clone()),
//!         MediaService::new(store, config.media.clone()),
//!     );
//!     let mut server = ApiServer::new(config.server.address.clone(), Arc::new(state));
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod media;
pub mod metrics;
pub mod router;
pub mod server;
pub mod storage;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use server::{ApiServer, AppState};
pub use storage::ObjectStore;
pub use upload::UploadService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
