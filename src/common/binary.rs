// Shared binary reading utilities for the container parsers
//
// Positioned reads over seekable readers and little-endian decoding of
// in-memory buffers.

use std::io::{Read, Seek, SeekFrom};

// =============================================================================
// Stream Reads
// =============================================================================

/// Read exact bytes at a specific offset
pub fn read_bytes_at<R: Read + Seek>(reader: &mut R, offset: u64, length: usize) -> Result<Vec<u8>, String> {
    if length == 0 {
        return Ok(Vec::new());
    }
    reader.seek(SeekFrom::Start(offset))
        .map_err(|e| format!("Failed to seek to offset {}: {}", offset, e))?;
    let mut buf = vec![0u8; length];
    reader.read_exact(&mut buf)
        .map_err(|e| format!("Failed to read {} bytes at offset {}: {}", length, offset, e))?;
    Ok(buf)
}

// =============================================================================
// Buffer Reads
// =============================================================================

/// Decode u32 little-endian from a buffer slice
pub fn u32_le_at(buf: &[u8], offset: usize) -> Result<u32, String> {
    buf.get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| format!("Buffer too short for u32 at {}", offset))
}

/// Decode u64 little-endian from a buffer slice
pub fn u64_le_at(buf: &[u8], offset: usize) -> Result<u64, String> {
    buf.get(offset..offset + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| format!("Buffer too short for u64 at {}", offset))
}

/// Convert bytes to a string, stopping at the first null
pub fn bytes_to_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_bytes_at() {
        let mut cursor = Cursor::new(b"skip-this-DATA".to_vec());
        assert_eq!(read_bytes_at(&mut cursor, 10, 4).unwrap(), b"DATA");
        assert!(read_bytes_at(&mut cursor, 12, 4).is_err());
        assert!(read_bytes_at(&mut cursor, 99, 0).unwrap().is_empty());
    }

    #[test]
    fn test_buffer_reads() {
        let buf = [0x01, 0x00, 0x00, 0x00, 0x02, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(u32_le_at(&buf, 0).unwrap(), 1);
        assert_eq!(u64_le_at(&buf, 4).unwrap(), 2);
        assert!(u64_le_at(&buf, 8).is_err());
    }

    #[test]
    fn test_bytes_to_string() {
        assert_eq!(bytes_to_string(b"sectors\x00\x00\x00"), "sectors");
        assert_eq!(bytes_to_string(b"no null"), "no null");
    }
}
