// Common utilities shared by the image reader, container backends and digest engine

pub mod audit;
pub mod binary;
pub mod hash;
pub mod io_pool;
pub mod segments;

// Re-exports for convenience
pub use hash::{
    compute_hash, hashes_match, normalize_hash, DigestProvider, HashAlgorithm, RustCryptoProvider,
    StreamingHasher,
};
pub use io_pool::FileIoPool;
pub use segments::glob_segments;
