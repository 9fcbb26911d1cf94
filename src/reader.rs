//! ImageReader - one logical byte stream over a (possibly multi-segment)
//! forensic container, plus case metadata and stored digest lookup
//!
//! Every failing operation records a human-readable description retrievable
//! through [`ImageReader::last_error`] and returns an [`ImageError`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, error, warn};

use crate::common::{audit, HashAlgorithm};
use crate::error::{ImageError, ImageResult};
use crate::library::{ContainerHandle, ContainerLibrary, ForensicLibrary};
use crate::metadata::{ImageMetadata, CASE_FIELDS, FILE_PATH, MEDIA_SIZE};

/// Open container state; dropped on close or re-open
struct ImageHandle {
    segments: Vec<PathBuf>,
    media_size: u64,
    cursor: u64,
    /// Populated on the first metadata query
    metadata: Option<ImageMetadata>,
    container: Box<dyn ContainerHandle>,
}

pub struct ImageReader {
    library: Box<dyn ContainerLibrary>,
    handle: Option<ImageHandle>,
    path: Option<PathBuf>,
    last_error: Option<String>,
}

impl Default for ImageReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageReader {
    /// Reader backed by the bundled EWF/raw library
    pub fn new() -> Self {
        Self::with_library(Box::new(ForensicLibrary::new()))
    }

    pub fn with_library(library: Box<dyn ContainerLibrary>) -> Self {
        Self {
            library,
            handle: None,
            path: None,
            last_error: None,
        }
    }

    // =========================================================================
    // Open / Close
    // =========================================================================

    /// Open the image at `path`, discovering its sibling segments
    ///
    /// If segment discovery fails the path is opened on its own.
    pub fn open(&mut self, path: impl AsRef<Path>) -> ImageResult<()> {
        let path = path.as_ref();
        self.close();

        if !path.exists() {
            return Err(self.fail(ImageError::FileNotFound(path.display().to_string())));
        }

        let segments = match self.library.glob(path) {
            Ok(segments) => segments,
            Err(e) => {
                warn!(path = %path.display(), reason = %e, "Segment detection failed, opening as single file");
                vec![path.to_path_buf()]
            }
        };
        if segments.is_empty() {
            return Err(self.fail(ImageError::OpenFailure(format!(
                "No segments found for {}",
                path.display()
            ))));
        }
        debug!(path = %path.display(), segments = segments.len(), "Opening image");

        let container = match self.library.open(&segments) {
            Ok(container) => container,
            Err(e) => return Err(self.fail(ImageError::OpenFailure(e))),
        };
        // Dropping `container` on this path releases every opened segment
        let media_size = match container.media_size() {
            Ok(size) => size,
            Err(e) => return Err(self.fail(ImageError::OpenFailure(format!("Media size query failed: {}", e)))),
        };

        audit::log_evidence_access("open_image", path, segments.len(), media_size);

        self.handle = Some(ImageHandle {
            segments,
            media_size,
            cursor: 0,
            metadata: None,
            container,
        });
        self.path = Some(path.to_path_buf());
        self.last_error = None;
        Ok(())
    }

    /// Release the container and cached metadata; no-op when nothing is open
    pub fn close(&mut self) {
        if self.handle.take().is_some() {
            debug!(path = ?self.path, "Image closed");
        }
        self.path = None;
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// The path given to the last successful `open`
    pub fn file_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn segment_paths(&self) -> &[PathBuf] {
        self.handle.as_ref().map(|h| h.segments.as_slice()).unwrap_or(&[])
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Sequential read at the cursor; 0 at end of stream
    pub fn read(&mut self, buf: &mut [u8]) -> ImageResult<usize> {
        let handle = self.handle_mut()?;
        let offset = handle.cursor;
        match handle.container.read_at(buf, offset) {
            Ok(count) => {
                handle.cursor += count as u64;
                Ok(count)
            }
            Err(e) => Err(self.fail(ImageError::ReadFailure(format!("at offset {}: {}", offset, e)))),
        }
    }

    /// Random-access read; the sequential cursor is left untouched
    pub fn read_at(&mut self, buf: &mut [u8], offset: u64) -> ImageResult<usize> {
        let handle = self.handle_mut()?;
        match handle.container.read_at(buf, offset) {
            Ok(count) => Ok(count),
            Err(e) => Err(self.fail(ImageError::ReadFailure(format!("at offset {}: {}", offset, e)))),
        }
    }

    /// Reposition the sequential cursor
    pub fn seek(&mut self, offset: u64) -> ImageResult<()> {
        self.handle_mut()?.cursor = offset;
        Ok(())
    }

    pub fn media_size(&mut self) -> ImageResult<u64> {
        Ok(self.handle_mut()?.media_size)
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Case fields plus stored digests, queried once per open
    pub fn metadata(&mut self) -> ImageResult<&ImageMetadata> {
        let path = self.path.clone().unwrap_or_default();
        let handle = self.handle_mut()?;
        if handle.metadata.is_none() {
            let mut metadata = ImageMetadata::new();
            metadata.insert_field(FILE_PATH, &path.display().to_string());
            metadata.insert_field(MEDIA_SIZE, &handle.media_size.to_string());
            query_metadata(handle.container.as_mut(), &mut metadata);
            handle.metadata = Some(metadata);
        }
        Ok(handle.metadata.get_or_insert_with(ImageMetadata::new))
    }

    pub fn metadata_value(&mut self, key: &str) -> ImageResult<Option<String>> {
        Ok(self.metadata()?.get(key).map(str::to_string))
    }

    pub fn stored_md5(&mut self) -> ImageResult<Option<String>> {
        Ok(self.metadata()?.stored_md5().map(str::to_string))
    }

    pub fn stored_sha1(&mut self) -> ImageResult<Option<String>> {
        Ok(self.metadata()?.stored_sha1().map(str::to_string))
    }

    /// Whether the container stores a digest for `algorithm` ("MD5", "SHA1", "SHA-1")
    pub fn has_stored_hash(&mut self, algorithm: &str) -> ImageResult<bool> {
        let Ok(algorithm) = HashAlgorithm::from_str(algorithm) else {
            return Ok(false);
        };
        Ok(self.metadata()?.stored_hash(algorithm).is_some())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn handle_mut(&mut self) -> ImageResult<&mut ImageHandle> {
        if self.handle.is_none() {
            return Err(self.fail(ImageError::NotOpen));
        }
        self.handle.as_mut().ok_or(ImageError::NotOpen)
    }

    fn fail(&mut self, err: ImageError) -> ImageError {
        error!(path = ?self.path, error = %err, "Image operation failed");
        self.last_error = Some(err.to_string());
        err
    }
}

fn query_metadata(container: &mut dyn ContainerHandle, metadata: &mut ImageMetadata) {
    for field in CASE_FIELDS {
        match container.header_value(field) {
            Ok(Some(value)) => metadata.insert_field(field, &value),
            Ok(None) => {}
            Err(e) => warn!(field, error = %e, "Header lookup failed"),
        }
    }

    for algorithm in [HashAlgorithm::Md5, HashAlgorithm::Sha1] {
        match container.hash_value(algorithm.name()) {
            Ok(Some(value)) => metadata.insert_stored_hash(algorithm, &value),
            Ok(None) => {}
            Err(e) => warn!(%algorithm, error = %e, "Stored hash lookup failed"),
        }
    }

    debug!(fields = metadata.len(), "Metadata loaded");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::compute_hash;
    use crate::ewf::fixture::{sample_media, E01Builder};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// In-memory container with counted header/hash lookups
    struct MockLibrary {
        pub glob_result: Result<Vec<PathBuf>, String>,
        pub data: Vec<u8>,
        pub fields: HashMap<String, String>,
        pub lookups: Arc<AtomicUsize>,
    }

    impl MockLibrary {
        pub fn new(data: Vec<u8>) -> Self {
            Self {
                glob_result: Err("no scheme".into()),
                data,
                fields: HashMap::new(),
                lookups: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    struct MockHandle {
        data: Vec<u8>,
        fields: HashMap<String, String>,
        lookups: Arc<AtomicUsize>,
    }

    impl ContainerLibrary for MockLibrary {
        fn glob(&self, _path: &Path) -> Result<Vec<PathBuf>, String> {
            self.glob_result.clone()
        }

        fn open(&self, _segments: &[PathBuf]) -> Result<Box<dyn ContainerHandle>, String> {
            Ok(Box::new(MockHandle {
                data: self.data.clone(),
                fields: self.fields.clone(),
                lookups: Arc::clone(&self.lookups),
            }))
        }
    }

    impl ContainerHandle for MockHandle {
        fn media_size(&self) -> Result<u64, String> {
            Ok(self.data.len() as u64)
        }

        fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, String> {
            let start = (offset as usize).min(self.data.len());
            let count = buf.len().min(self.data.len() - start);
            buf[..count].copy_from_slice(&self.data[start..start + count]);
            Ok(count)
        }

        fn header_value(&mut self, identifier: &str) -> Result<Option<String>, String> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.fields.get(identifier).cloned())
        }

        fn hash_value(&mut self, identifier: &str) -> Result<Option<String>, String> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.fields.get(identifier).cloned())
        }
    }

    fn existing_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_file() {
        let mut reader = ImageReader::new();
        let err = reader.open("/nonexistent/evidence.E01").unwrap_err();
        assert!(matches!(err, ImageError::FileNotFound(_)));
        assert!(reader.last_error().unwrap().contains("evidence.E01"));
        assert!(!reader.is_open());
    }

    #[test]
    fn test_single_file_fallback() {
        let dir = TempDir::new().unwrap();
        let path = existing_file(&dir, "memory.bin", &vec![0xAB; 5000]);

        let mut reader = ImageReader::new();
        reader.open(&path).unwrap();
        assert_eq!(reader.segment_paths(), &[path.clone()]);
        assert_eq!(reader.media_size().unwrap(), 5000);
        assert_eq!(reader.file_path(), Some(path.as_path()));

        // Only what the reader itself knows; raw images carry no case fields
        let metadata = reader.metadata().unwrap().clone();
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata.get("file_path"), Some(path.display().to_string().as_str()));
        assert_eq!(reader.metadata_value("media_size").unwrap().as_deref(), Some("5000"));
        assert_eq!(reader.metadata_value("case_number").unwrap(), None);
    }

    #[test]
    fn test_empty_glob_is_open_failure() {
        let dir = TempDir::new().unwrap();
        let path = existing_file(&dir, "image.E01", b"x");
        let mut library = MockLibrary::new(vec![1, 2, 3]);
        library.glob_result = Ok(Vec::new());

        let mut reader = ImageReader::with_library(Box::new(library));
        assert!(matches!(reader.open(&path), Err(ImageError::OpenFailure(_))));
        assert!(reader.last_error().is_some());
        assert!(!reader.is_open());
    }

    #[test]
    fn test_numbered_path_outside_series_opens_alone() {
        let dir = TempDir::new().unwrap();
        for name in ["disk.001", "disk.002", "disk.003"] {
            existing_file(&dir, name, &[1; 1000]);
        }
        let stray = existing_file(&dir, "disk.005", &[5; 77]);

        let mut reader = ImageReader::new();
        reader.open(&stray).unwrap();
        assert_eq!(reader.segment_paths(), &[stray.clone()]);
        assert_eq!(reader.media_size().unwrap(), 77);

        let lone = existing_file(&dir, "memdump.200", &[2; 300]);
        reader.open(&lone).unwrap();
        assert_eq!(reader.segment_paths(), &[lone.clone()]);
        assert_eq!(reader.media_size().unwrap(), 300);

        let first = dir.path().join("disk.001");
        reader.open(&first).unwrap();
        assert_eq!(reader.segment_paths().len(), 3);
        assert_eq!(reader.media_size().unwrap(), 3000);
    }

    #[test]
    fn test_not_open() {
        let mut reader = ImageReader::new();
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf), Err(ImageError::NotOpen));
        assert_eq!(reader.media_size(), Err(ImageError::NotOpen));
        assert!(matches!(reader.metadata(), Err(ImageError::NotOpen)));
        assert_eq!(reader.last_error(), Some("No image is open"));
    }

    #[test]
    fn test_sequential_and_random_reads() {
        let dir = TempDir::new().unwrap();
        let path = existing_file(&dir, "stream.dd", b"");
        let data: Vec<u8> = (0..=255u8).collect();
        let mut reader = ImageReader::with_library(Box::new(MockLibrary::new(data)));
        reader.open(&path).unwrap();

        let mut buf = [0u8; 100];
        assert_eq!(reader.read(&mut buf).unwrap(), 100);
        assert_eq!(buf[99], 99);

        // read_at leaves the cursor alone
        assert_eq!(reader.read_at(&mut buf[..4], 250).unwrap(), 4);
        assert_eq!(&buf[..4], &[250, 251, 252, 253]);

        assert_eq!(reader.read(&mut buf).unwrap(), 100);
        assert_eq!(buf[0], 100);
        assert_eq!(reader.read(&mut buf).unwrap(), 56);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);

        reader.seek(0).unwrap();
        assert_eq!(reader.read(&mut buf[..1]).unwrap(), 1);
        assert_eq!(buf[0], 0);
    }

    #[test]
    fn test_metadata_is_cached_and_normalised() {
        let dir = TempDir::new().unwrap();
        let path = existing_file(&dir, "case.E01", b"");
        let mut library = MockLibrary::new(vec![0; 16]);
        library.fields.insert("case_number".into(), "2024-001".into());
        library.fields.insert("notes".into(), "".into());
        library.fields.insert("MD5".into(), " D41D8CD98F00B204E9800998ECF8427E ".into());
        library.fields.insert("SHA1".into(), "".into());
        let lookups = Arc::clone(&library.lookups);

        let mut reader = ImageReader::with_library(Box::new(library));
        reader.open(&path).unwrap();

        let first = reader.metadata().unwrap().clone();
        let after_first = lookups.load(Ordering::SeqCst);
        let second = reader.metadata().unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(lookups.load(Ordering::SeqCst), after_first);

        assert_eq!(first.get("case_number"), Some("2024-001"));
        assert_eq!(first.get("media_size"), Some("16"));
        assert_eq!(first.get("notes"), None);
        assert_eq!(first.get("examiner_name"), None);
        assert_eq!(reader.stored_md5().unwrap().as_deref(), Some("d41d8cd98f00b204e9800998ecf8427e"));
        assert_eq!(reader.stored_sha1().unwrap(), None);
        assert!(reader.has_stored_hash("md5").unwrap());
        assert!(!reader.has_stored_hash("SHA-1").unwrap());
        assert!(!reader.has_stored_hash("crc32").unwrap());
    }

    #[test]
    fn test_reopen_and_close() {
        let dir = TempDir::new().unwrap();
        let small = existing_file(&dir, "small.raw", &[1; 10]);
        let large = existing_file(&dir, "large.raw", &[2; 20]);

        let mut reader = ImageReader::new();
        assert!(reader.open(dir.path().join("absent.raw")).is_err());
        reader.open(&small).unwrap();
        assert_eq!(reader.last_error(), None);

        reader.open(&large).unwrap();
        assert_eq!(reader.media_size().unwrap(), 20);
        assert_eq!(reader.file_path(), Some(large.as_path()));

        reader.close();
        reader.close();
        assert!(!reader.is_open());
        assert!(reader.segment_paths().is_empty());
        assert_eq!(reader.file_path(), None);
    }

    #[test]
    fn test_ewf_image_end_to_end() {
        let dir = TempDir::new().unwrap();
        let data = sample_media(64 * 1024);
        let md5 = compute_hash(&data, HashAlgorithm::Md5);
        let first = E01Builder::new()
            .segments(2)
            .case_fields(&[("c", "CASE-12"), ("e", "Analyst"), ("t", "")])
            .stored_md5(&md5.to_uppercase())
            .write(dir.path(), "suspect", &data);

        let mut reader = ImageReader::new();
        reader.open(&first).unwrap();
        assert_eq!(reader.segment_paths().len(), 2);
        assert_eq!(reader.media_size().unwrap(), data.len() as u64);

        let metadata = reader.metadata().unwrap();
        assert_eq!(metadata.get("case_number"), Some("CASE-12"));
        assert_eq!(metadata.get("examiner_name"), Some("Analyst"));
        assert_eq!(metadata.get("notes"), None);
        assert_eq!(metadata.stored_md5(), Some(md5.as_str()));

        let mut streamed = Vec::new();
        let mut buf = vec![0u8; 10_000];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            streamed.extend_from_slice(&buf[..n]);
        }
        assert_eq!(streamed, data);
    }
}
