// Forensic container library interface
//
// The image reader talks to containers only through these two traits:
// segment discovery plus open on the library, and media size, positioned
// reads and header/digest lookup on an open handle. `ForensicLibrary` is the
// bundled implementation (EWF v1 and raw); tests substitute their own.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::common::glob_segments;
use crate::ewf::{detect_format, EwfHandle};
use crate::raw::RawHandle;

/// Segment discovery and open
pub trait ContainerLibrary: Send + Sync {
    /// Every segment belonging to the image at `path`, in stream order
    fn glob(&self, path: &Path) -> Result<Vec<PathBuf>, String>;

    /// Open an ordered segment list as one media stream
    fn open(&self, segments: &[PathBuf]) -> Result<Box<dyn ContainerHandle>, String>;
}

/// One open media stream
pub trait ContainerHandle: Send {
    fn media_size(&self) -> Result<u64, String>;

    /// Read up to `buf.len()` bytes at `offset`; 0 at end of media
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, String>;

    /// Case field by identifier (`case_number`, `examiner_name`, ...)
    fn header_value(&mut self, identifier: &str) -> Result<Option<String>, String>;

    /// Stored digest by identifier (`MD5`, `SHA1`)
    fn hash_value(&mut self, identifier: &str) -> Result<Option<String>, String>;
}

// =============================================================================
// Bundled implementation
// =============================================================================

/// EWF v1 (E01/L01) and raw (dd/img/.001) images
#[derive(Debug, Default, Clone, Copy)]
pub struct ForensicLibrary;

impl ForensicLibrary {
    pub fn new() -> Self {
        Self
    }
}

impl ContainerLibrary for ForensicLibrary {
    fn glob(&self, path: &Path) -> Result<Vec<PathBuf>, String> {
        glob_segments(path)
    }

    fn open(&self, segments: &[PathBuf]) -> Result<Box<dyn ContainerHandle>, String> {
        let first = segments.first().ok_or("No segment files given")?;

        let mut signature = [0u8; 8];
        let sniffed = File::open(first)
            .and_then(|mut f| f.read(&mut signature))
            .map_err(|e| format!("Failed to open {}: {}", first.display(), e))?;

        if sniffed == signature.len() && detect_format(&signature)?.is_some() {
            debug!(path = %first.display(), "Opening as EWF");
            return Ok(Box::new(EwfHandle::open(segments)?));
        }

        debug!(path = %first.display(), "Opening as raw image");
        Ok(Box::new(RawHandle::open(segments)?))
    }
}

impl ContainerHandle for EwfHandle {
    fn media_size(&self) -> Result<u64, String> {
        Ok(EwfHandle::media_size(self))
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, String> {
        EwfHandle::read_at(self, buf, offset)
    }

    fn header_value(&mut self, identifier: &str) -> Result<Option<String>, String> {
        Ok(EwfHandle::header_value(self, identifier))
    }

    fn hash_value(&mut self, identifier: &str) -> Result<Option<String>, String> {
        Ok(EwfHandle::hash_value(self, identifier))
    }
}

impl ContainerHandle for RawHandle {
    fn media_size(&self) -> Result<u64, String> {
        Ok(self.total_size())
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, String> {
        RawHandle::read_at(self, buf, offset)
    }

    fn header_value(&mut self, _identifier: &str) -> Result<Option<String>, String> {
        Ok(None)
    }

    fn hash_value(&mut self, _identifier: &str) -> Result<Option<String>, String> {
        Ok(None)
    }
}
