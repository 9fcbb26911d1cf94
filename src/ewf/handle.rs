//! EwfHandle - random access to the media stream of an EWF v1 segment set
//! (like libewf_handle)

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;

use flate2::read::ZlibDecoder;
use tracing::{debug, trace, warn};

use crate::common::{
    binary::{bytes_to_string, read_bytes_at, u32_le_at, u64_le_at},
    FileIoPool,
};

use super::cache::ChunkCache;
use super::header::{decode_header_section, format_header_date, header_key};
use super::types::*;

/// EnCase volume section body; SMART (EWF-S01) writes a 94-byte variant
const ENCASE_VOLUME_SIZE: u64 = 1052;

// =============================================================================
// Section walk state
// =============================================================================

#[derive(Default)]
struct SectionWalk {
    volume: Option<VolumeSection>,
    chunks: Vec<ChunkLocation>,
    header: Option<Vec<u8>>,
    header2: Option<Vec<u8>>,
    hashes: StoredHashes,
    done: bool,
}

// =============================================================================
// EWF Handle - Main Interface
// =============================================================================

pub struct EwfHandle {
    /// File I/O pool managing all segment files
    file_pool: FileIoPool,
    format: EwfFormat,
    volume: VolumeSection,
    /// Global chunk table, chunk_index -> storage location
    chunks: Vec<ChunkLocation>,
    chunk_cache: ChunkCache,
    /// Short-key case fields from header2 (preferred) or header
    header_fields: HashMap<String, String>,
    stored_hashes: StoredHashes,
}

impl EwfHandle {
    /// Open an ordered EWF segment list (like libewf_handle_open)
    pub fn open(segment_paths: &[PathBuf]) -> Result<Self, String> {
        if segment_paths.is_empty() {
            return Err("No segment files given".to_string());
        }

        let mut file_pool = FileIoPool::new(segment_paths.to_vec(), MAX_OPEN_FILES);
        let mut walk = SectionWalk::default();
        let mut format = EwfFormat::E01;

        for index in 0..file_pool.get_file_count() {
            if walk.done {
                warn!(segment = index + 1, "Segment follows 'done' section, ignoring remaining segments");
                break;
            }
            let segment_format = Self::read_file_header(&mut file_pool, index)?;
            if index == 0 {
                format = segment_format;
            }
            Self::walk_segment(&mut file_pool, index, &mut walk)?;
        }

        if !walk.done {
            warn!("No 'done' section found; segment set may be incomplete");
        }

        let volume = walk.volume.ok_or("No volume section found")?;
        if volume.bytes_per_sector == 0 || volume.sectors_per_chunk == 0 {
            return Err(format!(
                "Invalid volume geometry: {} sectors per chunk, {} bytes per sector",
                volume.sectors_per_chunk, volume.bytes_per_sector
            ));
        }

        let needed_chunks = volume.media_size().div_ceil(volume.chunk_size());
        if (walk.chunks.len() as u64) < needed_chunks {
            return Err(format!(
                "Chunk table lists {} chunks but media needs {}",
                walk.chunks.len(),
                needed_chunks
            ));
        }

        let header_fields = Self::decode_case_fields(walk.header2.as_deref(), walk.header.as_deref());

        debug!(
            segments = file_pool.get_file_count(),
            chunks = walk.chunks.len(),
            chunk_size = volume.chunk_size(),
            media_size = volume.media_size(),
            "EWF image opened"
        );

        Ok(Self {
            file_pool,
            format,
            volume,
            chunks: walk.chunks,
            chunk_cache: ChunkCache::new(64),
            header_fields,
            stored_hashes: walk.hashes,
        })
    }

    pub fn format(&self) -> EwfFormat {
        self.format
    }

    pub fn volume(&self) -> &VolumeSection {
        &self.volume
    }

    pub fn media_size(&self) -> u64 {
        self.volume.media_size()
    }

    pub fn segment_count(&self) -> usize {
        self.file_pool.get_file_count()
    }

    pub fn stored_hashes(&self) -> &StoredHashes {
        &self.stored_hashes
    }

    /// Header value by library identifier (e.g. "case_number")
    pub fn header_value(&self, identifier: &str) -> Option<String> {
        let key = header_key(identifier)?;
        let value = self.header_fields.get(key)?;
        if key == "m" || key == "u" {
            Some(format_header_date(value))
        } else {
            Some(value.clone())
        }
    }

    /// Stored digest by algorithm identifier ("MD5", "SHA1")
    pub fn hash_value(&self, identifier: &str) -> Option<String> {
        match identifier.to_uppercase().as_str() {
            "MD5" => self.stored_hashes.md5.clone(),
            "SHA1" | "SHA-1" => self.stored_hashes.sha1.clone(),
            _ => None,
        }
    }

    /// Read media bytes at an absolute offset (like libewf_handle_read_buffer_at_offset)
    pub fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, String> {
        let media_size = self.media_size();
        let chunk_size = self.volume.chunk_size();
        let mut written = 0usize;
        let mut position = offset;

        while written < buf.len() && position < media_size {
            let chunk_index = (position / chunk_size) as usize;
            let within = (position % chunk_size) as usize;
            let chunk = self.read_chunk(chunk_index)?;
            if within >= chunk.len() {
                break;
            }

            let count = (chunk.len() - within).min(buf.len() - written);
            buf[written..written + count].copy_from_slice(&chunk[within..within + count]);
            written += count;
            position += count as u64;
        }

        Ok(written)
    }

    /// Read and decompress one chunk, trimmed to its media length
    fn read_chunk(&mut self, chunk_index: usize) -> Result<Arc<[u8]>, String> {
        if let Some(cached) = self.chunk_cache.get(chunk_index) {
            return Ok(cached);
        }

        let location = self.chunks.get(chunk_index).cloned()
            .ok_or_else(|| format!("Chunk {} missing from chunk table", chunk_index))?;
        let chunk_size = self.volume.chunk_size();
        let chunk_start = chunk_index as u64 * chunk_size;
        let expected_len = chunk_size.min(self.media_size().saturating_sub(chunk_start)) as usize;

        let file = self.file_pool.get_file(location.segment_index)?;
        file.seek(SeekFrom::Start(location.offset))
            .map_err(|e| format!("Seek to chunk {} at offset {} failed: {}", chunk_index, location.offset, e))?;

        let mut chunk_data = if location.compressed {
            let buffered = BufReader::with_capacity(65536, file.take(location.stored_size));
            let mut decoder = ZlibDecoder::new(buffered);
            let mut decompressed = Vec::with_capacity(chunk_size as usize);
            decoder.read_to_end(&mut decompressed)
                .map_err(|e| format!("Chunk {} decompression failed at offset {}: {}", chunk_index, location.offset, e))?;
            decompressed
        } else {
            if location.stored_size < expected_len as u64 + CHUNK_CHECKSUM_SIZE {
                return Err(format!(
                    "Chunk {} stores {} bytes, expected {} plus checksum",
                    chunk_index, location.stored_size, expected_len
                ));
            }
            let mut stored = vec![0u8; expected_len];
            file.read_exact(&mut stored)
                .map_err(|e| format!("Read of chunk {} failed: {}", chunk_index, e))?;
            stored
        };

        if chunk_data.len() < expected_len {
            return Err(format!(
                "Chunk {} holds {} bytes, expected {}",
                chunk_index,
                chunk_data.len(),
                expected_len
            ));
        }
        chunk_data.truncate(expected_len);

        trace!(chunk_index, compressed = location.compressed, len = expected_len, "Chunk loaded");
        Ok(self.chunk_cache.insert(chunk_index, chunk_data))
    }

    // =========================================================================
    // Section Walking
    // =========================================================================

    fn read_file_header(file_pool: &mut FileIoPool, index: usize) -> Result<EwfFormat, String> {
        let file = file_pool.get_file(index)?;
        let header = read_bytes_at(file, 0, FILE_HEADER_SIZE as usize)
            .map_err(|e| format!("Segment {}: {}", index + 1, e))?;

        match detect_format(&header[..8])? {
            Some(format) => Ok(format),
            None => Err(format!("Segment {} is not an EWF file (bad signature)", index + 1)),
        }
    }

    fn walk_segment(file_pool: &mut FileIoPool, index: usize, walk: &mut SectionWalk) -> Result<(), String> {
        let file_size = file_pool.file_size(index)?;
        let file = file_pool.get_file(index)?;
        let mut offset = FILE_HEADER_SIZE;
        let mut sectors_end: Option<u64> = None;

        for _ in 0..MAX_SECTIONS_PER_SEGMENT {
            if offset + SECTION_DESCRIPTOR_SIZE > file_size {
                return Err(format!(
                    "Segment {} truncated: section descriptor at {} exceeds file size {}",
                    index + 1, offset, file_size
                ));
            }

            let section = Self::read_section_descriptor(file, offset)?;
            trace!(
                segment = index + 1,
                section = %section.section_type,
                offset,
                size = section.size,
                "Section"
            );

            match section.section_type.as_str() {
                "header" if walk.header.is_none() => {
                    walk.header = Some(Self::read_header_data(file, &section)?);
                }
                "header2" if walk.header2.is_none() => {
                    walk.header2 = Some(Self::read_header_data(file, &section)?);
                }
                "volume" | "disk" if walk.volume.is_none() => {
                    walk.volume = Some(Self::read_volume_section(file, &section)?);
                }
                "sectors" => {
                    let end = section.offset.checked_add(section.size).ok_or_else(|| format!(
                        "Segment {}: sectors section at {} has invalid size {}",
                        index + 1, section.offset, section.size
                    ))?;
                    sectors_end = Some(end);
                }
                "table" => {
                    let data_end = sectors_end.unwrap_or(section.offset);
                    let entries = Self::read_table_section(file, &section, index, data_end)?;
                    trace!(entries = entries.len(), "Table section");
                    walk.chunks.extend(entries);
                }
                "hash" => {
                    let data = read_bytes_at(file, section.data_offset(), 16)?;
                    if walk.hashes.md5.is_none() {
                        walk.hashes.md5 = non_zero_hex(&data);
                    }
                }
                "digest" => {
                    let data = read_bytes_at(file, section.data_offset(), 36)?;
                    walk.hashes.md5 = non_zero_hex(&data[..16]).or(walk.hashes.md5.take());
                    walk.hashes.sha1 = non_zero_hex(&data[16..36]).or(walk.hashes.sha1.take());
                }
                "next" => return Ok(()),
                "done" => {
                    walk.done = true;
                    return Ok(());
                }
                _ => {}
            }

            if section.next_offset == offset {
                return Ok(());
            }
            if section.next_offset < offset || section.next_offset > file_size {
                return Err(format!(
                    "Segment {}: section '{}' at {} points to invalid next offset {}",
                    index + 1, section.section_type, offset, section.next_offset
                ));
            }
            offset = section.next_offset;
        }

        Err(format!("Segment {}: too many sections", index + 1))
    }

    fn read_section_descriptor(file: &mut File, offset: u64) -> Result<SectionDescriptor, String> {
        let raw = read_bytes_at(file, offset, SECTION_DESCRIPTOR_SIZE as usize)?;
        Ok(SectionDescriptor {
            section_type: bytes_to_string(&raw[..16]),
            offset,
            next_offset: u64_le_at(&raw, 16)?,
            size: u64_le_at(&raw, 24)?,
        })
    }

    fn read_header_data(file: &mut File, section: &SectionDescriptor) -> Result<Vec<u8>, String> {
        let size = section.data_size();
        if size > MAX_HEADER_SECTION_SIZE {
            return Err(format!("Header section of {} bytes is implausibly large", size));
        }
        read_bytes_at(file, section.data_offset(), size as usize)
    }

    fn read_volume_section(file: &mut File, section: &SectionDescriptor) -> Result<VolumeSection, String> {
        let data = read_bytes_at(file, section.data_offset(), 24)?;
        let sector_count = if section.data_size() >= ENCASE_VOLUME_SIZE {
            u64_le_at(&data, 16)?
        } else {
            u32_le_at(&data, 16)? as u64
        };

        let volume = VolumeSection {
            media_type: data[0],
            chunk_count: u32_le_at(&data, 4)?,
            sectors_per_chunk: u32_le_at(&data, 8)?,
            bytes_per_sector: u32_le_at(&data, 12)?,
            sector_count,
        };
        trace!(?volume, "Volume section");
        Ok(volume)
    }

    fn read_table_section(
        file: &mut File,
        section: &SectionDescriptor,
        segment_index: usize,
        data_end: u64,
    ) -> Result<Vec<ChunkLocation>, String> {
        let header = read_bytes_at(file, section.data_offset(), TABLE_HEADER_SIZE as usize)?;
        let entry_count = u32_le_at(&header, 0)? as u64;
        let base_offset = u64_le_at(&header, 8)?;

        let capacity = section.data_size().saturating_sub(TABLE_HEADER_SIZE) / 4;
        if entry_count > capacity {
            return Err(format!(
                "Table lists {} entries but section only holds {}",
                entry_count, capacity
            ));
        }

        let raw = read_bytes_at(
            file,
            section.data_offset() + TABLE_HEADER_SIZE,
            (entry_count * 4) as usize,
        )?;
        let entries: Vec<u32> = raw
            .chunks_exact(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let offset_of = |entry: u32| {
            base_offset.checked_add((entry & !COMPRESSED_FLAG) as u64).ok_or_else(|| format!(
                "Table base offset {} overflows with entry {:#010x}",
                base_offset, entry
            ))
        };

        entries
            .iter()
            .enumerate()
            .map(|(i, &entry)| {
                let offset = offset_of(entry)?;
                let end = match entries.get(i + 1) {
                    Some(&next) => offset_of(next)?,
                    None => data_end,
                };
                Ok(ChunkLocation {
                    segment_index,
                    offset,
                    stored_size: end.saturating_sub(offset),
                    compressed: entry & COMPRESSED_FLAG != 0,
                })
            })
            .collect()
    }

    fn decode_case_fields(header2: Option<&[u8]>, header: Option<&[u8]>) -> HashMap<String, String> {
        let candidates = [(header2, true), (header, false)];
        for (data, utf16) in candidates {
            let Some(data) = data else { continue };
            match decode_header_section(data, utf16) {
                Ok(fields) if !fields.is_empty() => return fields,
                Ok(_) => {}
                Err(e) => warn!(error = %e, utf16, "Unreadable header section"),
            }
        }
        HashMap::new()
    }
}

/// Hex-encode a stored digest; all-zero means "not stored"
fn non_zero_hex(bytes: &[u8]) -> Option<String> {
    if bytes.iter().all(|&b| b == 0) {
        None
    } else {
        Some(hex::encode(bytes))
    }
}
