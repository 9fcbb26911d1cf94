// Shared hash utilities for forensic image verification
//
// One incremental-digest interface over the RustCrypto implementations of
// MD5, SHA-1 and SHA-256. Engine code selects by `HashAlgorithm` only and
// never branches on platform.

use std::fmt;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::Sha256;

// =============================================================================
// Hash Algorithm Enum
// =============================================================================

/// Digest algorithms a verification run can compute
/// - MD5/SHA1: stored by EnCase/FTK Imager inside EWF containers
/// - SHA256: computed for the report, never stored in EWF v1
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Every supported algorithm, in the order chunks are fed to contexts
    pub const ALL: [HashAlgorithm; 3] = [HashAlgorithm::Md5, HashAlgorithm::Sha1, HashAlgorithm::Sha256];

    /// Canonical algorithm name, also used as the verdict key
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
        }
    }

    /// Raw digest length in bytes
    pub fn digest_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
        }
    }

    /// Expected hash length in hex characters
    pub fn hash_length(&self) -> usize {
        self.digest_len() * 2
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    /// Parse algorithm name (case-insensitive)
    fn from_str(algorithm: &str) -> Result<Self, Self::Err> {
        match algorithm.trim().to_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" | "sha-1" => Ok(HashAlgorithm::Sha1),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            _ => Err(format!(
                "Unsupported hash algorithm: '{}'. Supported: md5, sha1, sha256",
                algorithm
            )),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Streaming Hasher - incremental digest context
// =============================================================================

/// Incremental digest context for one algorithm
#[derive(Clone)]
pub enum StreamingHasher {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl StreamingHasher {
    /// Create a fresh context for the specified algorithm
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => StreamingHasher::Md5(Md5::new()),
            HashAlgorithm::Sha1 => StreamingHasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => StreamingHasher::Sha256(Sha256::new()),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            StreamingHasher::Md5(_) => HashAlgorithm::Md5,
            StreamingHasher::Sha1(_) => HashAlgorithm::Sha1,
            StreamingHasher::Sha256(_) => HashAlgorithm::Sha256,
        }
    }

    /// Update the hash with more data
    pub fn update(&mut self, data: &[u8]) {
        match self {
            StreamingHasher::Md5(h) => Digest::update(h, data),
            StreamingHasher::Sha1(h) => Digest::update(h, data),
            StreamingHasher::Sha256(h) => Digest::update(h, data),
        }
    }

    /// Finalize to the fixed-length raw digest
    pub fn finalize_raw(self) -> Vec<u8> {
        match self {
            StreamingHasher::Md5(h) => h.finalize().to_vec(),
            StreamingHasher::Sha1(h) => h.finalize().to_vec(),
            StreamingHasher::Sha256(h) => h.finalize().to_vec(),
        }
    }

    /// Finalize and return the digest as lowercase hex
    pub fn finalize(self) -> String {
        hex::encode(self.finalize_raw())
    }
}

// =============================================================================
// Digest Provider - where contexts come from
// =============================================================================

/// Source of incremental digest contexts
///
/// Context creation is the only place a run can fail with a hash
/// initialisation error.
pub trait DigestProvider: Send + Sync {
    fn create(&self, algorithm: HashAlgorithm) -> Result<StreamingHasher, String>;
}

/// RustCrypto-backed provider (always succeeds)
#[derive(Clone, Copy, Debug, Default)]
pub struct RustCryptoProvider;

impl DigestProvider for RustCryptoProvider {
    fn create(&self, algorithm: HashAlgorithm) -> Result<StreamingHasher, String> {
        Ok(StreamingHasher::new(algorithm))
    }
}

// =============================================================================
// One-shot Hash Computation
// =============================================================================

/// Compute hash of data using specified algorithm (one-shot, for small data)
pub fn compute_hash(data: &[u8], algorithm: HashAlgorithm) -> String {
    let mut hasher = StreamingHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize()
}

// =============================================================================
// Hash Validation Utilities
// =============================================================================

/// Trim and lowercase a hash string; empty input means "no hash"
pub fn normalize_hash(hash: &str) -> Option<String> {
    let trimmed = hash.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Validate that a string looks like a valid hash for the given algorithm
pub fn is_valid_hash(hash: &str, algorithm: HashAlgorithm) -> bool {
    hash.len() == algorithm.hash_length() && hash.chars().all(|c| c.is_ascii_hexdigit())
}

/// Compare two hashes (case-insensitive, surrounding whitespace ignored)
pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
    hash1.trim().eq_ignore_ascii_case(hash2.trim())
}
