//! DigestEngine - background hash verification of an open image
//!
//! One run at a time executes on a dedicated worker thread. The worker reads
//! the media stream sequentially in fixed chunks, feeds every enabled digest
//! context (always MD5, SHA1, SHA256 in that order) and reports through a
//! channel of [`VerifyEvent`]s:
//!
//! ```text
//! Progress / TimeEstimate ...   (throttled, non-decreasing percentage)
//! Progress(100)                 (always, once)
//! DigestComputed x N            (one per enabled algorithm)
//! VerificationComplete          (verdicts)
//! ```
//!
//! A cancelled run ends with `Cancelled`, a failed one with `Error`; neither
//! reports digests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::common::{audit, hashes_match, normalize_hash, DigestProvider, HashAlgorithm, RustCryptoProvider};
use crate::error::{VerifyError, VerifyResult};
use crate::reader::ImageReader;

/// Bytes read per worker iteration
pub const CHUNK_SIZE: usize = 1024 * 1024;
/// Minimum wall-clock gap between progress events
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Reader shared between the caller and the worker; locked per chunk read
pub type SharedReader = Arc<Mutex<ImageReader>>;

// =============================================================================
// Configuration
// =============================================================================

/// Algorithm selection and expected digests for the next run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub md5: bool,
    pub sha1: bool,
    pub sha256: bool,
    pub expected_md5: Option<String>,
    pub expected_sha1: Option<String>,
    pub expected_sha256: Option<String>,
    pub chunk_size: usize,
    pub progress_interval_ms: u64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            md5: true,
            sha1: true,
            sha256: true,
            expected_md5: None,
            expected_sha1: None,
            expected_sha256: None,
            chunk_size: CHUNK_SIZE,
            progress_interval_ms: PROGRESS_INTERVAL.as_millis() as u64,
        }
    }
}

impl DigestConfig {
    pub fn enable(&mut self, algorithm: HashAlgorithm, enabled: bool) {
        match algorithm {
            HashAlgorithm::Md5 => self.md5 = enabled,
            HashAlgorithm::Sha1 => self.sha1 = enabled,
            HashAlgorithm::Sha256 => self.sha256 = enabled,
        }
    }

    pub fn is_enabled(&self, algorithm: HashAlgorithm) -> bool {
        match algorithm {
            HashAlgorithm::Md5 => self.md5,
            HashAlgorithm::Sha1 => self.sha1,
            HashAlgorithm::Sha256 => self.sha256,
        }
    }

    /// Set the digest a run must reproduce; empty or `None` clears it
    pub fn set_expected(&mut self, algorithm: HashAlgorithm, value: Option<&str>) {
        let value = value.and_then(normalize_hash);
        match algorithm {
            HashAlgorithm::Md5 => self.expected_md5 = value,
            HashAlgorithm::Sha1 => self.expected_sha1 = value,
            HashAlgorithm::Sha256 => self.expected_sha256 = value,
        }
    }

    pub fn expected(&self, algorithm: HashAlgorithm) -> Option<&str> {
        match algorithm {
            HashAlgorithm::Md5 => self.expected_md5.as_deref(),
            HashAlgorithm::Sha1 => self.expected_sha1.as_deref(),
            HashAlgorithm::Sha256 => self.expected_sha256.as_deref(),
        }
    }

    /// Enabled algorithms in feed order
    pub fn enabled_algorithms(&self) -> Vec<HashAlgorithm> {
        HashAlgorithm::ALL.into_iter().filter(|a| self.is_enabled(*a)).collect()
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

// =============================================================================
// Events and Results
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    /// floor(bytes_processed * 100 / total_bytes)
    pub percentage: u8,
    pub bytes_processed: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlgorithmVerdict {
    pub algorithm: HashAlgorithm,
    pub computed: String,
    pub expected: Option<String>,
    /// True when nothing was expected or the digests match
    pub verified: bool,
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub entries: Vec<AlgorithmVerdict>,
    pub bytes_processed: u64,
    pub duration_ms: u64,
}

impl VerificationResult {
    pub fn verdicts(&self) -> BTreeMap<HashAlgorithm, bool> {
        self.entries.iter().map(|e| (e.algorithm, e.verified)).collect()
    }

    pub fn all_passed(&self) -> bool {
        self.entries.iter().all(|e| e.verified)
    }

    pub fn get(&self, algorithm: HashAlgorithm) -> Option<&AlgorithmVerdict> {
        self.entries.iter().find(|e| e.algorithm == algorithm)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyEvent {
    Progress(ProgressUpdate),
    TimeEstimate { remaining: Duration },
    DigestComputed { algorithm: HashAlgorithm, digest: String },
    VerificationComplete(VerificationResult),
    Cancelled { bytes_processed: u64 },
    Error(VerifyError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Cooperative cancellation flag, observed once per chunk
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Engine
// =============================================================================

struct Worker {
    cancel: CancelToken,
    thread: JoinHandle<JobState>,
}

pub struct DigestEngine {
    reader: SharedReader,
    config: DigestConfig,
    provider: Arc<dyn DigestProvider>,
    worker: Option<Worker>,
    state: Arc<Mutex<JobState>>,
}

impl DigestEngine {
    pub fn new(reader: SharedReader) -> Self {
        Self::with_provider(reader, Arc::new(RustCryptoProvider))
    }

    pub fn with_provider(reader: SharedReader, provider: Arc<dyn DigestProvider>) -> Self {
        Self {
            reader,
            config: DigestConfig::default(),
            provider,
            worker: None,
            state: Arc::new(Mutex::new(JobState::Idle)),
        }
    }

    pub fn reader(&self) -> &SharedReader {
        &self.reader
    }

    pub fn config(&self) -> &DigestConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut DigestConfig {
        &mut self.config
    }

    pub fn set_config(&mut self, config: DigestConfig) {
        self.config = config;
    }

    /// Start a run from offset 0; events arrive on the returned receiver
    pub fn start(&mut self) -> VerifyResult<Receiver<VerifyEvent>> {
        if self.is_running() {
            return Err(VerifyError::AlreadyRunning);
        }
        // Reap a finished worker before reusing the reader
        if self.worker.is_some() {
            self.join()?;
        }

        let (total_bytes, path) = {
            let mut reader = lock(&self.reader);
            if !reader.is_open() {
                return Err(VerifyError::NotOpen);
            }
            let total_bytes = reader.media_size()?;
            reader.seek(0)?;
            (total_bytes, reader.file_path().map(Path::to_path_buf).unwrap_or_default())
        };

        let cancel = CancelToken::default();
        let (events, receiver) = mpsc::channel();
        let job = DigestJob {
            reader: Arc::clone(&self.reader),
            provider: Arc::clone(&self.provider),
            algorithms: self.config.enabled_algorithms(),
            expected: HashAlgorithm::ALL
                .into_iter()
                .filter_map(|a| self.config.expected(a).and_then(normalize_hash).map(|e| (a, e)))
                .collect(),
            chunk_size: self.config.chunk_size.max(1),
            progress_interval: self.config.progress_interval(),
            total_bytes,
            path,
            cancel: cancel.clone(),
            events,
        };

        *lock(&self.state) = JobState::Running;
        let state = Arc::clone(&self.state);
        let thread = thread::Builder::new()
            .name("digest-worker".to_string())
            .spawn(move || {
                let final_state = job.run();
                *lock(&state) = final_state;
                final_state
            })
            .map_err(|e| {
                *lock(&self.state) = JobState::Failed;
                VerifyError::Spawn(e.to_string())
            })?;

        self.worker = Some(Worker { cancel, thread });
        Ok(receiver)
    }

    /// Request cancellation of the running job; returns immediately
    pub fn cancel(&self) {
        if let Some(worker) = &self.worker {
            debug!("Cancellation requested");
            worker.cancel.cancel();
        }
    }

    pub fn cancel_token(&self) -> Option<CancelToken> {
        self.worker.as_ref().map(|w| w.cancel.clone())
    }

    /// Wait for the worker to exit and return its terminal state
    pub fn join(&mut self) -> VerifyResult<JobState> {
        let Some(worker) = self.worker.take() else {
            return Ok(self.state());
        };
        match worker.thread.join() {
            Ok(state) => Ok(state),
            Err(_) => {
                error!("Digest worker panicked");
                *lock(&self.state) = JobState::Failed;
                Err(VerifyError::WorkerPanicked)
            }
        }
    }

    pub fn state(&self) -> JobState {
        *lock(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.thread.is_finished())
    }
}

impl Drop for DigestEngine {
    fn drop(&mut self) {
        self.cancel();
        let _ = self.join();
    }
}

// =============================================================================
// Worker
// =============================================================================

/// Everything one run owns; moved onto the worker thread
struct DigestJob {
    reader: SharedReader,
    provider: Arc<dyn DigestProvider>,
    algorithms: Vec<HashAlgorithm>,
    expected: BTreeMap<HashAlgorithm, String>,
    chunk_size: usize,
    progress_interval: Duration,
    total_bytes: u64,
    path: PathBuf,
    cancel: CancelToken,
    events: Sender<VerifyEvent>,
}

impl DigestJob {
    fn run(self) -> JobState {
        let started = Instant::now();
        info!(
            path = %self.path.display(),
            total_bytes = self.total_bytes,
            algorithms = ?self.algorithms,
            "Verification started"
        );

        let mut contexts = Vec::with_capacity(self.algorithms.len());
        for &algorithm in &self.algorithms {
            match self.provider.create(algorithm) {
                Ok(context) => contexts.push(context),
                Err(message) => {
                    let err = VerifyError::HashInitFailure { algorithm: algorithm.name().to_string(), message };
                    return self.fail(err, 0);
                }
            }
        }

        let mut buffer = vec![0u8; self.chunk_size];
        let mut bytes_processed = 0u64;
        let mut last_emit = started;
        let mut last_percentage = 0u8;

        while bytes_processed < self.total_bytes {
            if self.cancel.is_cancelled() {
                return self.cancelled(bytes_processed);
            }

            let wanted = (self.total_bytes - bytes_processed).min(self.chunk_size as u64) as usize;
            let read = lock(&self.reader).read(&mut buffer[..wanted]);
            let count = match read {
                Ok(0) => {
                    warn!(bytes_processed, total_bytes = self.total_bytes, "Media stream ended early");
                    break;
                }
                Ok(count) => count,
                Err(e) => {
                    let err = VerifyError::ReadFailure { bytes_processed, message: e.to_string() };
                    return self.fail(err, bytes_processed);
                }
            };

            for context in contexts.iter_mut() {
                context.update(&buffer[..count]);
            }
            bytes_processed += count as u64;

            if last_emit.elapsed() >= self.progress_interval {
                last_emit = Instant::now();
                last_percentage = percentage(bytes_processed, self.total_bytes).max(last_percentage);
                self.send(VerifyEvent::Progress(ProgressUpdate {
                    percentage: last_percentage,
                    bytes_processed,
                    total_bytes: self.total_bytes,
                }));
                if last_percentage > 0 && last_percentage < 100 {
                    let remaining = estimate_remaining(started.elapsed(), last_percentage);
                    self.send(VerifyEvent::TimeEstimate { remaining });
                }
            }
        }

        if self.cancel.is_cancelled() {
            return self.cancelled(bytes_processed);
        }

        self.send(VerifyEvent::Progress(ProgressUpdate {
            percentage: 100,
            bytes_processed: self.total_bytes,
            total_bytes: self.total_bytes,
        }));

        let mut entries = Vec::with_capacity(contexts.len());
        for context in contexts {
            let algorithm = context.algorithm();
            let computed = context.finalize();
            self.send(VerifyEvent::DigestComputed { algorithm, digest: computed.clone() });

            let expected = self.expected.get(&algorithm).cloned();
            let verified = expected.as_deref().map_or(true, |e| hashes_match(e, &computed));
            audit::log_hash_verification(&self.path, algorithm.name(), &computed, expected.as_deref(), verified);
            entries.push(AlgorithmVerdict { algorithm, computed, expected, verified });
        }

        let result = VerificationResult {
            entries,
            bytes_processed,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            path = %self.path.display(),
            passed = result.all_passed(),
            duration_ms = result.duration_ms,
            "Verification finished"
        );
        self.send(VerifyEvent::VerificationComplete(result));
        JobState::Completed
    }

    fn cancelled(&self, bytes_processed: u64) -> JobState {
        info!(bytes_processed, "Verification cancelled");
        audit::log_verification_aborted(&self.path, "cancelled", bytes_processed);
        self.send(VerifyEvent::Cancelled { bytes_processed });
        JobState::Cancelled
    }

    fn fail(&self, err: VerifyError, bytes_processed: u64) -> JobState {
        error!(error = %err, "Verification failed");
        audit::log_verification_aborted(&self.path, &err.to_string(), bytes_processed);
        self.send(VerifyEvent::Error(err));
        JobState::Failed
    }

    fn send(&self, event: VerifyEvent) {
        // A dropped receiver does not stop the run
        let _ = self.events.send(event);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn percentage(bytes_processed: u64, total_bytes: u64) -> u8 {
    if total_bytes == 0 {
        return 100;
    }
    (bytes_processed.saturating_mul(100) / total_bytes).min(100) as u8
}

/// elapsed * 100 / percentage - elapsed
fn estimate_remaining(elapsed: Duration, percentage: u8) -> Duration {
    if percentage == 0 {
        return Duration::MAX;
    }
    elapsed
        .checked_mul(100)
        .map(|total| total / u32::from(percentage))
        .unwrap_or(Duration::MAX)
        .saturating_sub(elapsed)
}

/// Render a remaining-time estimate as "4m 12s" or "37s"
pub fn format_remaining(remaining: Duration) -> String {
    let seconds = remaining.as_secs();
    if seconds >= 60 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}
