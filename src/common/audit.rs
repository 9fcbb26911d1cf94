//! Forensic Audit Logging
//!
//! Structured records for chain-of-custody: every image opened and every
//! digest computed is logged under the `forensic_audit` target with an
//! RFC 3339 timestamp.

use std::path::Path;
use tracing::{info, span, warn, Level};

/// Log that an evidence image was opened for reading
pub fn log_evidence_access(operation: &str, path: &Path, segment_count: usize, media_size: u64) {
    let _span = span!(
        Level::INFO,
        "evidence_access",
        operation = operation,
        path = %path.display(),
    ).entered();

    info!(
        target: "forensic_audit",
        operation = operation,
        path = %path.display(),
        segment_count = segment_count,
        media_size = media_size,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Evidence image accessed"
    );
}

/// Log the outcome of one algorithm in a verification run
pub fn log_hash_verification(
    path: &Path,
    algorithm: &str,
    computed_hash: &str,
    expected_hash: Option<&str>,
    verified: bool,
) {
    let status = match (expected_hash, verified) {
        (None, _) => "COMPUTED",
        (Some(_), true) => "VERIFIED",
        (Some(_), false) => "MISMATCH",
    };

    if status == "MISMATCH" {
        warn!(
            target: "forensic_audit",
            operation = "hash_verification",
            path = %path.display(),
            algorithm = algorithm,
            computed_hash = computed_hash,
            expected_hash = expected_hash.unwrap_or("none"),
            status = status,
            timestamp = %chrono::Utc::now().to_rfc3339(),
            "Hash verification failed"
        );
        return;
    }

    info!(
        target: "forensic_audit",
        operation = "hash_verification",
        path = %path.display(),
        algorithm = algorithm,
        computed_hash = computed_hash,
        expected_hash = expected_hash.unwrap_or("none"),
        status = status,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Hash verification completed"
    );
}

/// Log a verification run that stopped before producing digests
pub fn log_verification_aborted(path: &Path, reason: &str, bytes_processed: u64) {
    warn!(
        target: "forensic_audit",
        operation = "hash_verification",
        path = %path.display(),
        reason = reason,
        bytes_processed = bytes_processed,
        timestamp = %chrono::Utc::now().to_rfc3339(),
        "Hash verification aborted"
    );
}
