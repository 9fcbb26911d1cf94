//! VerificationSession - one open image plus its verification runs
//!
//! Opening an image seeds the expected digests from the values stored in the
//! container, so a plain `open` + `start` verifies an E01 against its own
//! acquisition hashes.

use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::common::HashAlgorithm;
use crate::engine::{DigestConfig, DigestEngine, JobState, SharedReader, VerifyEvent};
use crate::error::{ImageResult, VerifyResult};
use crate::metadata::ImageMetadata;
use crate::reader::ImageReader;

pub struct VerificationSession {
    reader: SharedReader,
    engine: DigestEngine,
}

impl Default for VerificationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationSession {
    pub fn new() -> Self {
        Self::with_reader(ImageReader::new())
    }

    pub fn with_reader(reader: ImageReader) -> Self {
        let reader = Arc::new(Mutex::new(reader));
        let engine = DigestEngine::new(Arc::clone(&reader));
        Self { reader, engine }
    }

    /// Open `path`, replacing any current image, and return its metadata
    pub fn open(&mut self, path: impl AsRef<Path>) -> ImageResult<ImageMetadata> {
        self.engine.cancel();
        let _ = self.engine.join();

        let metadata = {
            let mut reader = self.lock_reader();
            reader.open(path.as_ref())?;
            reader.metadata()?.clone()
        };

        let config = self.engine.config_mut();
        for algorithm in [HashAlgorithm::Md5, HashAlgorithm::Sha1] {
            let stored = metadata.stored_hash(algorithm);
            config.set_expected(algorithm, stored);
            if stored.is_some() {
                config.enable(algorithm, true);
            }
        }

        info!(
            path = %path.as_ref().display(),
            stored_md5 = metadata.stored_md5().is_some(),
            stored_sha1 = metadata.stored_sha1().is_some(),
            "Session image opened"
        );
        Ok(metadata)
    }

    pub fn metadata(&self) -> ImageResult<ImageMetadata> {
        Ok(self.lock_reader().metadata()?.clone())
    }

    pub fn media_size(&self) -> ImageResult<u64> {
        self.lock_reader().media_size()
    }

    /// The shared reader; the worker owns its cursor while `is_running()`
    ///
    /// Use `read_at` through this handle during a run. A sequential `read`
    /// or `seek` moves the cursor under the worker and corrupts its digests.
    pub fn reader(&self) -> &SharedReader {
        &self.reader
    }

    pub fn config(&self) -> &DigestConfig {
        self.engine.config()
    }

    pub fn configure(&mut self, config: DigestConfig) {
        self.engine.set_config(config);
    }

    pub fn config_mut(&mut self) -> &mut DigestConfig {
        self.engine.config_mut()
    }

    pub fn start(&mut self) -> VerifyResult<Receiver<VerifyEvent>> {
        self.engine.start()
    }

    /// Request cancellation and wait for the worker to exit
    pub fn cancel(&mut self) -> VerifyResult<JobState> {
        self.engine.cancel();
        self.engine.join()
    }

    pub fn wait(&mut self) -> VerifyResult<JobState> {
        self.engine.join()
    }

    pub fn state(&self) -> JobState {
        self.engine.state()
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Stop any run and close the image
    pub fn close(&mut self) {
        self.engine.cancel();
        let _ = self.engine.join();
        self.lock_reader().close();
    }

    fn lock_reader(&self) -> MutexGuard<'_, ImageReader> {
        self.reader.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for VerificationSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::compute_hash;
    use crate::engine::VerificationResult;
    use crate::error::ImageError;
    use crate::ewf::fixture::{sample_media, ChunkMode, E01Builder};
    use tempfile::TempDir;

    fn run_to_completion(session: &mut VerificationSession) -> VerificationResult {
        let events = session.start().unwrap();
        let result = events
            .iter()
            .find_map(|e| match e {
                VerifyEvent::VerificationComplete(result) => Some(result),
                _ => None,
            })
            .unwrap();
        assert_eq!(session.wait().unwrap(), JobState::Completed);
        result
    }

    #[test]
    fn test_ewf_verifies_against_stored_hashes() {
        let dir = TempDir::new().unwrap();
        let data = sample_media(200 * 1024);
        let md5 = compute_hash(&data, HashAlgorithm::Md5);
        let sha1 = compute_hash(&data, HashAlgorithm::Sha1);
        let first = E01Builder::new()
            .chunk_mode(ChunkMode::Mixed)
            .segments(3)
            .case_fields(&[("c", "CASE-1"), ("n", "EV-3")])
            .stored_md5(&md5)
            .stored_sha1(&sha1)
            .write(dir.path(), "evidence", &data);

        let mut session = VerificationSession::new();
        session.config_mut().chunk_size = 48 * 1024;
        let metadata = session.open(&first).unwrap();
        assert_eq!(metadata.get("evidence_number"), Some("EV-3"));
        assert_eq!(session.media_size().unwrap(), data.len() as u64);
        assert_eq!(session.config().expected(HashAlgorithm::Sha1), Some(sha1.as_str()));

        let result = run_to_completion(&mut session);
        assert!(!session.is_running());
        assert!(result.all_passed());

        let mut tail = [0u8; 512];
        let offset = data.len() as u64 - 512;
        assert_eq!(session.reader().lock().unwrap().read_at(&mut tail, offset).unwrap(), 512);
        assert_eq!(&tail[..], &data[offset as usize..]);
        assert_eq!(result.get(HashAlgorithm::Md5).unwrap().expected.as_deref(), Some(md5.as_str()));
        assert_eq!(result.get(HashAlgorithm::Sha256).unwrap().expected, None);
    }

    #[test]
    fn test_corrupted_chunk_is_a_mismatch() {
        let dir = TempDir::new().unwrap();
        let data = sample_media(64 * 1024);
        let mut tampered = data.clone();
        tampered[40_000] ^= 0xFF;
        let first = E01Builder::new()
            .chunk_mode(ChunkMode::Stored)
            .stored_md5(&compute_hash(&data, HashAlgorithm::Md5))
            .write(dir.path(), "tampered", &tampered);

        let mut session = VerificationSession::new();
        session.open(&first).unwrap();
        let result = run_to_completion(&mut session);
        assert!(!result.verdicts()[&HashAlgorithm::Md5]);
        // No stored SHA1: vacuous pass
        assert!(result.verdicts()[&HashAlgorithm::Sha1]);
    }

    #[test]
    fn test_reopen_resets_expected_digests() {
        let dir = TempDir::new().unwrap();
        let data = sample_media(16 * 1024);
        let with_hash = E01Builder::new()
            .stored_md5(&compute_hash(&data, HashAlgorithm::Md5))
            .write(dir.path(), "hashed", &data);
        let raw = dir.path().join("plain.dd");
        std::fs::write(&raw, &data).unwrap();

        let mut session = VerificationSession::new();
        session.open(&with_hash).unwrap();
        assert!(session.config().expected(HashAlgorithm::Md5).is_some());

        session.open(&raw).unwrap();
        assert_eq!(session.config().expected(HashAlgorithm::Md5), None);
        assert!(run_to_completion(&mut session).all_passed());
    }

    #[test]
    fn test_close_and_failed_open() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("disk.img");
        std::fs::write(&raw, [0u8; 512]).unwrap();

        let mut session = VerificationSession::new();
        session.open(&raw).unwrap();
        session.close();
        assert!(matches!(session.media_size(), Err(ImageError::NotOpen)));
        assert!(matches!(session.open(dir.path().join("missing.E01")), Err(ImageError::FileNotFound(_))));
        assert!(session.start().is_err());
        assert_eq!(session.cancel().unwrap(), JobState::Idle);
    }
}
