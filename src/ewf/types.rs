//! Type definitions for EWF format parsing

use serde::Serialize;

// =============================================================================
// Core Constants
// =============================================================================

pub(crate) const EWF_SIGNATURE: &[u8; 8] = b"EVF\x09\x0d\x0a\xff\x00";
pub(crate) const LVF_SIGNATURE: &[u8; 8] = b"LVF\x09\x0d\x0a\xff\x00";
pub(crate) const EWF2_SIGNATURE: &[u8; 8] = b"EVF2\x0d\x0a\x81\x00";
pub(crate) const LVF2_SIGNATURE: &[u8; 8] = b"LVF2\x0d\x0a\x81\x00";

/// Signature + fields_start (1) + segment_number (2) + fields_end (2)
pub(crate) const FILE_HEADER_SIZE: u64 = 13;
/// type (16) + next (8) + size (8) + padding (40) + checksum (4)
pub(crate) const SECTION_DESCRIPTOR_SIZE: u64 = 76;
/// entry count (4) + padding (4) + base offset (8) + padding (4) + checksum (4)
pub(crate) const TABLE_HEADER_SIZE: u64 = 24;
/// Stored (uncompressed) chunks carry a trailing Adler-32
pub(crate) const CHUNK_CHECKSUM_SIZE: u64 = 4;
pub(crate) const COMPRESSED_FLAG: u32 = 0x8000_0000;

pub(crate) const MAX_OPEN_FILES: usize = 16; // Like libewf's rlimit handling
pub(crate) const MAX_SECTIONS_PER_SEGMENT: u32 = 100_000;
/// Header sections larger than this are not case metadata
pub(crate) const MAX_HEADER_SECTION_SIZE: u64 = 16 * 1024 * 1024;

/// Which container signature the first segment carries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum EwfFormat {
    /// E01 - physical disk image (EWF v1)
    E01,
    /// L01 - logical evidence file (EWF v1)
    L01,
}

/// Classify an 8-byte signature
pub(crate) fn detect_format(signature: &[u8]) -> Result<Option<EwfFormat>, String> {
    if signature == EWF_SIGNATURE {
        return Ok(Some(EwfFormat::E01));
    }
    if signature == LVF_SIGNATURE {
        return Ok(Some(EwfFormat::L01));
    }
    if signature == EWF2_SIGNATURE || signature == LVF2_SIGNATURE {
        return Err("EWF version 2 (Ex01/Lx01) containers are not supported".to_string());
    }
    Ok(None)
}

// =============================================================================
// Section Descriptors - EWF Format Structures
// =============================================================================

#[derive(Clone, Debug)]
pub(crate) struct SectionDescriptor {
    pub section_type: String,
    /// Offset of this descriptor within its segment file
    pub offset: u64,
    /// Offset of the next descriptor (points at itself for done/next)
    pub next_offset: u64,
    /// Section size including the 76-byte descriptor
    pub size: u64,
}

impl SectionDescriptor {
    pub fn data_offset(&self) -> u64 {
        self.offset + SECTION_DESCRIPTOR_SIZE
    }

    pub fn data_size(&self) -> u64 {
        self.size.saturating_sub(SECTION_DESCRIPTOR_SIZE)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct VolumeSection {
    pub media_type: u8,
    pub chunk_count: u32,
    pub sectors_per_chunk: u32,
    pub bytes_per_sector: u32,
    pub sector_count: u64,
}

impl VolumeSection {
    pub fn chunk_size(&self) -> u64 {
        self.sectors_per_chunk as u64 * self.bytes_per_sector as u64
    }

    pub fn media_size(&self) -> u64 {
        self.sector_count * self.bytes_per_sector as u64
    }
}

// =============================================================================
// Chunk Location - Maps chunks to their storage location
// =============================================================================

#[derive(Clone, Debug)]
pub(crate) struct ChunkLocation {
    pub segment_index: usize,
    /// Absolute offset of the chunk data within its segment file
    pub offset: u64,
    /// Bytes on disk (compressed stream, or data + checksum)
    pub stored_size: u64,
    pub compressed: bool,
}

/// Digests embedded in hash/digest sections
#[derive(Clone, Debug, Default, Serialize)]
pub struct StoredHashes {
    pub md5: Option<String>,
    pub sha1: Option<String>,
}
