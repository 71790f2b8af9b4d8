//! Image variant serving
//!
//! Fetches originals from object storage and serves resized, re-encoded
//! variants. Decoding, resizing and encoding are delegated to the `image`
//! crate; this module only wires dimensions, formats and cache metadata.

use crate::config::MediaConfig;
use crate::storage::{ObjectStore, StorageError};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;

/// Largest accepted target width; wider requests are misconfigured
/// clients, not real thumbnails.
pub const MAX_VARIANT_WIDTH: u32 = 4096;

/// Media serving errors
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("image not found: {key}")]
    NotFound { key: String },

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for MediaError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { key } => MediaError::NotFound { key },
            other => MediaError::Storage(other),
        }
    }
}

/// Variant output encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    /// Parse from a config value or file extension.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::WebP),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
        }
    }
}

/// A rendered variant ready to serve.
#[derive(Debug, Clone)]
pub struct Variant {
    pub data: Bytes,
    pub content_type: &'static str,
    pub etag: String,
    pub cache_max_age: u64,
}

/// Serves resized image variants straight out of object storage.
pub struct MediaService {
    store: Arc<dyn ObjectStore>,
    config: MediaConfig,
}

impl MediaService {
    pub fn new(store: Arc<dyn ObjectStore>, config: MediaConfig) -> Self {
        Self { store, config }
    }

    /// Render a resized variant of `{origin_folder}/{category}/{file}`.
    #[tracing::instrument(name = "media.variant", skip(self), fields(category = %category, file = %file), err)]
    pub async fn variant(
        &self,
        category: &str,
        file: &str,
        width: Option<u32>,
        quality: Option<u8>,
    ) -> Result<Variant, MediaError> {
        let width = width.unwrap_or(self.config.default_width);
        if width == 0 || width > MAX_VARIANT_WIDTH {
            return Err(MediaError::InvalidParams(format!(
                "width {} out of range: must be 1-{}",
                width, MAX_VARIANT_WIDTH
            )));
        }
        let quality = quality.unwrap_or(self.config.quality);
        if !(1..=100).contains(&quality) {
            return Err(MediaError::InvalidParams(format!(
                "quality {} out of range: must be 1-100",
                quality
            )));
        }

        let key = format!("{}/{}/{}", self.config.origin_folder, category, file);
        let data = self.store.get_object(&key).await?;

        let img = image::load_from_memory(&data).map_err(|e| MediaError::Decode(e.to_string()))?;

        let (target_w, target_h) = scaled_dimensions(img.width(), img.height(), width);
        let resized = if (target_w, target_h) == (img.width(), img.height()) {
            img
        } else {
            img.resize(target_w, target_h, image::imageops::FilterType::Lanczos3)
        };

        let format = self
            .config
            .convert_to
            .as_deref()
            .and_then(OutputFormat::parse)
            .or_else(|| OutputFormat::parse(extension(file)))
            .unwrap_or(OutputFormat::Jpeg);

        let encoded = encode_image(&resized, format, quality)?;

        Ok(Variant {
            data: Bytes::from(encoded),
            content_type: format.content_type(),
            etag: format!("\"{}_{}_{}\"", file, target_w, quality),
            cache_max_age: self.config.cache_max_age,
        })
    }

    /// Serve an original without transformation.
    #[tracing::instrument(name = "media.original", skip(self), fields(category = %category, file = %file), err)]
    pub async fn original(&self, category: &str, file: &str) -> Result<Variant, MediaError> {
        let key = format!("{}/{}/{}", self.config.origin_folder, category, file);
        let data = self.store.get_object(&key).await?;

        let content_type = OutputFormat::parse(extension(file))
            .map(|f| f.content_type())
            .unwrap_or("application/octet-stream");

        Ok(Variant {
            data,
            content_type,
            etag: format!("\"{}\"", file),
            cache_max_age: self.config.cache_max_age,
        })
    }
}

fn extension(file: &str) -> &str {
    file.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

/// Width-constrained dimensions, aspect preserved, never enlarged,
/// never below 1px.
fn scaled_dimensions(src_w: u32, src_h: u32, target_w: u32) -> (u32, u32) {
    let scale = (target_w as f64 / src_w as f64).min(1.0);
    let w = ((src_w as f64 * scale).round() as u32).max(1);
    let h = ((src_h as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Encode an image in the requested output format.
///
/// The `image` crate's WebP encoder is lossless only; quality applies to
/// JPEG.
fn encode_image(
    img: &DynamicImage,
    format: OutputFormat,
    quality: u8,
) -> Result<Vec<u8>, MediaError> {
    let mut buf = Cursor::new(Vec::new());

    match format {
        OutputFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            img.to_rgb8()
                .write_with_encoder(encoder)
                .map_err(|e| MediaError::Encode(e.to_string()))?;
        }
        OutputFormat::Png => {
            img.write_to(&mut buf, ImageFormat::Png)
                .map_err(|e| MediaError::Encode(e.to_string()))?;
        }
        OutputFormat::WebP => {
            let encoder = WebPEncoder::new_lossless(&mut buf);
            img.write_with_encoder(encoder)
                .map_err(|e| MediaError::Encode(e.to_string()))?;
        }
    }

    Ok(buf.into_inner())
}
