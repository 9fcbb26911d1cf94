// File I/O pool for multi-segment images
//
// Keeps a bounded number of segment files open at once (LRU eviction) so
// large EWF sets don't exhaust OS file descriptors.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::path::PathBuf;
use tracing::{debug, trace};

/// Manages segment file handles with LRU caching
pub struct FileIoPool {
    /// Paths to all segment files in order
    file_paths: Vec<PathBuf>,
    /// Currently open file handles (file_index -> File)
    open_handles: HashMap<usize, File>,
    /// Most recently used at the front
    lru_queue: VecDeque<usize>,
    max_open: usize,
}

impl FileIoPool {
    pub fn new(file_paths: Vec<PathBuf>, max_open: usize) -> Self {
        Self {
            file_paths,
            open_handles: HashMap::new(),
            lru_queue: VecDeque::new(),
            max_open: max_open.max(1),
        }
    }

    /// Get a file handle, opening it if necessary
    pub fn get_file(&mut self, file_index: usize) -> Result<&mut File, String> {
        let Some(file_path) = self.file_paths.get(file_index) else {
            return Err(format!(
                "Segment index {} out of range (have {} segments)",
                file_index,
                self.file_paths.len()
            ));
        };

        if self.open_handles.contains_key(&file_index) {
            self.lru_queue.retain(|&x| x != file_index);
            self.lru_queue.push_front(file_index);
            trace!(file_index, "File handle cache hit");
        } else {
            if self.open_handles.len() >= self.max_open {
                if let Some(lru_index) = self.lru_queue.pop_back() {
                    trace!(lru_index, "Evicting LRU file handle");
                    self.open_handles.remove(&lru_index);
                }
            }

            debug!(file_index, path = %file_path.display(), "Opening segment file");
            let file = File::open(file_path)
                .map_err(|e| format!("Failed to open segment {}: {}", file_path.display(), e))?;
            self.open_handles.insert(file_index, file);
            self.lru_queue.push_front(file_index);
        }

        self.open_handles
            .get_mut(&file_index)
            .ok_or_else(|| format!("Segment {} handle missing from pool", file_index))
    }

    /// Size of a segment file in bytes
    pub fn file_size(&mut self, file_index: usize) -> Result<u64, String> {
        let file = self.get_file(file_index)?;
        file.metadata()
            .map(|m| m.len())
            .map_err(|e| format!("Failed to get metadata for segment {}: {}", file_index, e))
    }

    pub fn get_file_count(&self) -> usize {
        self.file_paths.len()
    }

    /// Number of currently open handles
    pub fn open_count(&self) -> usize {
        self.open_handles.len()
    }

    /// Close all open file handles
    pub fn close_all(&mut self) {
        self.open_handles.clear();
        self.lru_queue.clear();
    }
}
