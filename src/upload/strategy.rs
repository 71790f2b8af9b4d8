//! Upload strategy selection
//!
//! Pure decision table over (mode, size, threshold). A file exactly at
//! the threshold uses the single-PUT path.

/// Chosen upload strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    Single,
    Multipart,
}

impl UploadStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStrategy::Single => "single",
            UploadStrategy::Multipart => "multipart",
        }
    }
}

/// Select the upload strategy.
///
/// `force` always yields multipart, `off` always single; anything else
/// (including empty) behaves as `auto`: multipart only for sizes strictly
/// greater than the threshold.
pub fn select_strategy(mode: &str, size_bytes: u64, threshold_mb: u64) -> UploadStrategy {
    let threshold_bytes = threshold_mb * 1024 * 1024;

    match mode {
        "force" => UploadStrategy::Multipart,
        "off" => UploadStrategy::Single,
        _ => {
            if size_bytes > threshold_bytes {
                UploadStrategy::Multipart
            } else {
                UploadStrategy::Single
            }
        }
    }
}
