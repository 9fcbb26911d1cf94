//! EWF Verify - streaming hash verification of forensic disk images
//!
//! Opens E01/L01 and raw (dd/img/.001) images as one logical media stream,
//! reads their case metadata and stored acquisition digests, and recomputes
//! MD5/SHA1/SHA256 on a background worker with progress, cancellation and a
//! per-algorithm verdict.
//!
//! ```rust,ignore
//! use ewf_verify_lib::{VerificationSession, VerifyEvent};
//!
//! let mut session = VerificationSession::new();
//! let metadata = session.open("/evidence/disk.E01")?;
//! for event in session.start()? {
//!     if let VerifyEvent::VerificationComplete(result) = event {
//!         println!("all verified: {}", result.all_passed());
//!     }
//! }
//! ```

pub mod common;
pub mod engine;
pub mod error;
pub mod ewf;
pub mod library;
pub mod logging;
pub mod metadata;
pub mod raw;
pub mod reader;
pub mod session;

pub use common::HashAlgorithm;
pub use engine::{
    format_remaining, AlgorithmVerdict, CancelToken, DigestConfig, DigestEngine, JobState,
    ProgressUpdate, SharedReader, VerificationResult, VerifyEvent,
};
pub use error::{ImageError, VerifyError};
pub use library::{ContainerHandle, ContainerLibrary, ForensicLibrary};
pub use metadata::ImageMetadata;
pub use reader::ImageReader;
pub use session::VerificationSession;
