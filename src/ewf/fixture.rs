//! Minimal EWF v1 writer used to produce test images
//!
//! Writes header, volume, sectors, table, hash/digest and next/done sections.
//! Section and chunk checksums are left zero; the reader does not check them.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::types::{CHUNK_CHECKSUM_SIZE, COMPRESSED_FLAG, EWF_SIGNATURE, SECTION_DESCRIPTOR_SIZE};
use crate::common::segments::ewf_segment_extension;

const BYTES_PER_SECTOR: u32 = 512;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChunkMode {
    Stored,
    Compressed,
    /// Even chunks compressed, odd chunks stored
    Mixed,
}

pub(crate) struct E01Builder {
    sectors_per_chunk: u32,
    chunk_mode: ChunkMode,
    segments: usize,
    case_fields: Vec<(String, String)>,
    md5: Option<String>,
    sha1: Option<String>,
}

impl E01Builder {
    pub fn new() -> Self {
        Self {
            sectors_per_chunk: 64,
            chunk_mode: ChunkMode::Compressed,
            segments: 1,
            case_fields: Vec::new(),
            md5: None,
            sha1: None,
        }
    }

    pub fn chunk_mode(mut self, mode: ChunkMode) -> Self {
        self.chunk_mode = mode;
        self
    }

    pub fn segments(mut self, count: usize) -> Self {
        self.segments = count.max(1);
        self
    }

    pub fn case_fields(mut self, fields: &[(&str, &str)]) -> Self {
        self.case_fields = fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        self
    }

    pub fn stored_md5(mut self, hex_digest: &str) -> Self {
        self.md5 = Some(hex_digest.to_string());
        self
    }

    pub fn stored_sha1(mut self, hex_digest: &str) -> Self {
        self.sha1 = Some(hex_digest.to_string());
        self
    }

    /// Write `<stem>.E01` (and following segments) into `dir`; returns the first segment
    ///
    /// `media` must be a whole number of 512-byte sectors.
    pub fn write(&self, dir: &Path, stem: &str, media: &[u8]) -> PathBuf {
        assert_eq!(media.len() % BYTES_PER_SECTOR as usize, 0, "media must be sector aligned");

        let chunk_size = (self.sectors_per_chunk * BYTES_PER_SECTOR) as usize;
        let chunks: Vec<&[u8]> = media.chunks(chunk_size).collect();
        let per_segment = chunks.len().div_ceil(self.segments).max(1);
        let mut first = None;

        for segment in 0..self.segments {
            let start = (segment * per_segment).min(chunks.len());
            let end = ((segment + 1) * per_segment).min(chunks.len());
            let is_last = segment + 1 == self.segments;

            let mut file = Vec::new();
            file.extend_from_slice(EWF_SIGNATURE);
            file.push(1);
            file.extend_from_slice(&((segment + 1) as u16).to_le_bytes());
            file.extend_from_slice(&[0, 0]);

            if segment == 0 {
                if !self.case_fields.is_empty() {
                    write_section(&mut file, "header", &zlib(self.header_text().as_bytes()));
                }
                write_section(&mut file, "volume", &self.volume_data(chunks.len(), media.len()));
            }

            let mut sectors = Vec::new();
            let mut entries = Vec::new();
            let sectors_data_start = file.len() as u64 + SECTION_DESCRIPTOR_SIZE;
            for (i, chunk) in chunks[start..end].iter().enumerate() {
                let chunk_index = start + i;
                let compress = match self.chunk_mode {
                    ChunkMode::Stored => false,
                    ChunkMode::Compressed => true,
                    ChunkMode::Mixed => chunk_index % 2 == 0,
                };
                let offset = (sectors_data_start + sectors.len() as u64) as u32;
                if compress {
                    entries.push(offset | COMPRESSED_FLAG);
                    sectors.extend_from_slice(&zlib(chunk));
                } else {
                    entries.push(offset);
                    sectors.extend_from_slice(chunk);
                    sectors.extend_from_slice(&[0u8; CHUNK_CHECKSUM_SIZE as usize]);
                }
            }
            write_section(&mut file, "sectors", &sectors);
            write_section(&mut file, "table", &table_data(&entries));

            if is_last {
                self.write_hash_sections(&mut file);
                write_terminal_section(&mut file, "done");
            } else {
                write_terminal_section(&mut file, "next");
            }

            let extension = ewf_segment_extension('E', (segment + 1) as u32).unwrap();
            let path = dir.join(format!("{}.{}", stem, extension));
            std::fs::write(&path, &file).unwrap();
            first.get_or_insert(path);
        }

        first.unwrap()
    }

    fn header_text(&self) -> String {
        let keys: Vec<&str> = self.case_fields.iter().map(|(k, _)| k.as_str()).collect();
        let values: Vec<&str> = self.case_fields.iter().map(|(_, v)| v.as_str()).collect();
        format!("1\nmain\n{}\n{}\n\n", keys.join("\t"), values.join("\t"))
    }

    fn volume_data(&self, chunk_count: usize, media_len: usize) -> Vec<u8> {
        let mut data = vec![0u8; 1052];
        data[0] = 0x01;
        data[4..8].copy_from_slice(&(chunk_count as u32).to_le_bytes());
        data[8..12].copy_from_slice(&self.sectors_per_chunk.to_le_bytes());
        data[12..16].copy_from_slice(&BYTES_PER_SECTOR.to_le_bytes());
        data[16..24].copy_from_slice(&((media_len / BYTES_PER_SECTOR as usize) as u64).to_le_bytes());
        data
    }

    fn write_hash_sections(&self, file: &mut Vec<u8>) {
        let md5 = self.md5.as_deref().map(|h| hex::decode(h).unwrap()).unwrap_or_else(|| vec![0; 16]);
        match &self.sha1 {
            Some(sha1) => {
                let mut data = md5;
                data.extend_from_slice(&hex::decode(sha1).unwrap());
                data.extend_from_slice(&[0u8; 44]);
                write_section(file, "digest", &data);
            }
            None if self.md5.is_some() => {
                let mut data = md5;
                data.extend_from_slice(&[0u8; 20]);
                write_section(file, "hash", &data);
            }
            None => {}
        }
    }
}

/// Deterministic, poorly compressible sector-aligned test media
pub(crate) fn sample_media(len: usize) -> Vec<u8> {
    let len = len - len % BYTES_PER_SECTOR as usize;
    let mut state: u32 = 0x1234_5678;
    (0..len)
        .map(|i| {
            // xorshift, with a readable run every few KiB so chunks compress unevenly
            if (i / 4096) % 3 == 0 {
                return (i % 251) as u8;
            }
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn write_section(file: &mut Vec<u8>, kind: &str, data: &[u8]) {
    let offset = file.len() as u64;
    let size = SECTION_DESCRIPTOR_SIZE + data.len() as u64;
    push_descriptor(file, kind, offset + size, size);
    file.extend_from_slice(data);
}

fn write_terminal_section(file: &mut Vec<u8>, kind: &str) {
    let offset = file.len() as u64;
    push_descriptor(file, kind, offset, SECTION_DESCRIPTOR_SIZE);
}

fn push_descriptor(file: &mut Vec<u8>, kind: &str, next_offset: u64, size: u64) {
    let mut section_type = [0u8; 16];
    section_type[..kind.len()].copy_from_slice(kind.as_bytes());
    file.extend_from_slice(&section_type);
    file.extend_from_slice(&next_offset.to_le_bytes());
    file.extend_from_slice(&size.to_le_bytes());
    file.extend_from_slice(&[0u8; 40]);
    file.extend_from_slice(&[0u8; 4]);
}

fn table_data(entries: &[u32]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    data.extend_from_slice(&[0u8; 4]);
    data.extend_from_slice(&0u64.to_le_bytes());
    data.extend_from_slice(&[0u8; 8]);
    for entry in entries {
        data.extend_from_slice(&entry.to_le_bytes());
    }
    data.extend_from_slice(&[0u8; 4]);
    data
}
