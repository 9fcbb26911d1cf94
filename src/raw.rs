// RAW disk image backend (.dd, .raw, .img, .001, .002, etc.)
// Single-file and numbered multi-segment images, concatenated in order

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use tracing::debug;

// =============================================================================
// Raw Image Handle
// =============================================================================

pub struct RawHandle {
    segments: Vec<PathBuf>,
    segment_sizes: Vec<u64>,
    total_size: u64,
    current_segment: usize,
    current_file: Option<File>,
}

impl RawHandle {
    /// Open a raw image from its ordered segment list
    pub fn open(segments: &[PathBuf]) -> Result<Self, String> {
        if segments.is_empty() {
            return Err("No segment files given".to_string());
        }

        let mut segment_sizes = Vec::with_capacity(segments.len());
        for path in segments {
            let size = std::fs::metadata(path)
                .map_err(|e| format!("Failed to get size of {}: {}", path.display(), e))?
                .len();
            segment_sizes.push(size);
        }
        let total_size: u64 = segment_sizes.iter().sum();
        debug!(segments = segments.len(), total_size, "Raw image opened");

        Ok(RawHandle {
            segments: segments.to_vec(),
            segment_sizes,
            total_size,
            current_segment: 0,
            current_file: None,
        })
    }

    /// Get total size of all segments
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Read bytes at an absolute offset, crossing segment boundaries
    pub fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, String> {
        let mut total_read = 0;
        let mut position = offset;

        while total_read < buf.len() && position < self.total_size {
            let (seg_idx, seg_offset) = self.position_to_segment(position);

            if self.current_segment != seg_idx || self.current_file.is_none() {
                let file = File::open(&self.segments[seg_idx])
                    .map_err(|e| format!("Failed to open segment {}: {}", seg_idx + 1, e))?;
                self.current_segment = seg_idx;
                self.current_file = Some(file);
            }
            let Some(file) = self.current_file.as_mut() else {
                break;
            };

            file.seek(SeekFrom::Start(seg_offset))
                .map_err(|e| format!("Seek failed: {}", e))?;

            let seg_remaining = self.segment_sizes[seg_idx] - seg_offset;
            let to_read = (buf.len() - total_read).min(seg_remaining as usize);

            let bytes_read = file.read(&mut buf[total_read..total_read + to_read])
                .map_err(|e| format!("Read failed: {}", e))?;
            if bytes_read == 0 {
                break;
            }

            total_read += bytes_read;
            position += bytes_read as u64;
        }

        Ok(total_read)
    }

    /// Convert absolute position to (segment_index, offset_within_segment)
    fn position_to_segment(&self, pos: u64) -> (usize, u64) {
        let mut offset = pos;
        for (idx, &size) in self.segment_sizes.iter().enumerate() {
            if offset < size {
                return (idx, offset);
            }
            offset -= size;
        }
        // Past end - return last segment
        let last = self.segments.len() - 1;
        (last, self.segment_sizes[last])
    }
}
