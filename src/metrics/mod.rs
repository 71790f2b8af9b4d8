//! Prometheus metrics
//!
//! Registered once via lazy_static and exposed on the main server's
//! `/metrics` route.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, CounterVec, Histogram,
};

lazy_static! {
    pub static ref PRESIGN_REQUESTS: CounterVec = register_counter_vec!(
        "mediaflow_presign_requests_total",
        "Presign plans issued, by profile and strategy",
        &["profile", "strategy"]
    )
    .unwrap();

    pub static ref MULTIPART_PARTS: Histogram = register_histogram!(
        "mediaflow_multipart_parts",
        "Presigned parts per multipart plan",
        vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]
    )
    .unwrap();

    pub static ref COMPLETIONS: CounterVec = register_counter_vec!(
        "mediaflow_multipart_outcomes_total",
        "Multipart uploads finalized, by outcome",
        &["outcome"] // "completed" or "aborted"
    )
    .unwrap();

    pub static ref VARIANT_REQUESTS: CounterVec = register_counter_vec!(
        "mediaflow_variant_requests_total",
        "Image variant requests, by status",
        &["status"]
    )
    .unwrap();

    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "mediaflow_errors_total",
        "Errors surfaced to clients, by taxonomy code",
        &["code"]
    )
    .unwrap();
}

/// Record a successfully issued presign plan.
pub fn record_presign(profile: &str, strategy: &str) {
    PRESIGN_REQUESTS
        .with_label_values(&[profile, strategy])
        .inc();
}

/// Record the part count of a multipart plan.
pub fn record_multipart_parts(parts: usize) {
    MULTIPART_PARTS.observe(parts as f64);
}

/// Record a multipart completion or abort.
pub fn record_completion(outcome: &str) {
    COMPLETIONS.with_label_values(&[outcome]).inc();
}

/// Record a served (or failed) variant request.
pub fn record_variant(status: &str) {
    VARIANT_REQUESTS.with_label_values(&[status]).inc();
}

/// Record a client-visible error by taxonomy code.
pub fn record_error(code: &str) {
    ERRORS_TOTAL.with_label_values(&[code]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let before = PRESIGN_REQUESTS
            .with_label_values(&["photo", "single"])
            .get();
        record_presign("photo", "single");
        let after = PRESIGN_REQUESTS
            .with_label_values(&["photo", "single"])
            .get();
        assert!(after > before);
    }

    #[test]
    fn test_error_counter() {
        record_error("bad_request");
        assert!(ERRORS_TOTAL.with_label_values(&["bad_request"]).get() >= 1.0);
    }
}
