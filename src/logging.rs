//! Logging and tracing configuration for EWF Verify
//!
//! Structured logging via the `tracing` crate. Initialize once at startup:
//! ```rust,ignore
//! ewf_verify_lib::logging::init();
//! ```
//!
//! # Log Levels
//!
//! - `error` - Open/read/verification failures
//! - `warn`  - Glob fallback, early end of stream, digest mismatches
//! - `info`  - Run start/finish, forensic audit records (default in release)
//! - `debug` - Image open details, segment discovery (default in debug builds)
//! - `trace` - Per-section and per-chunk details
//!
//! # Environment Variable Control
//!
//! ```bash
//! RUST_LOG=debug ewf-verify image.E01
//! RUST_LOG=ewf_verify_lib::ewf=trace ewf-verify image.E01
//! RUST_LOG=forensic_audit=info,warn ewf-verify image.E01   # Audit trail only
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn default_filter() -> EnvFilter {
    // Default: info in release, debug in debug builds or with `debug-logging`
    if cfg!(any(debug_assertions, feature = "debug-logging")) {
        EnvFilter::new("ewf_verify=debug,ewf_verify_lib=debug,forensic_audit=info")
    } else {
        EnvFilter::new("ewf_verify=info,ewf_verify_lib=info,forensic_audit=info")
    }
}

/// Initialize the logging/tracing system
///
/// Logs go to stderr so reports printed on stdout stay machine-readable.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter());

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)      // Show module path
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact()
        );

    // Ignore error if already set
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Initialize logging with verbose output (file:line, thread names)
pub fn init_verbose() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trace"));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .pretty()
        );

    let _ = tracing::subscriber::set_global_default(subscriber);
}
