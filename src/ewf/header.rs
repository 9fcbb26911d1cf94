//! Case metadata from EWF `header` / `header2` sections
//!
//! Both sections hold a small zlib-compressed table:
//!
//! ```text
//! 1                      <- number of categories
//! main                   <- category name
//! c  n  a  e  t  m  u    <- tab-separated keys
//! 42 1  .. .. .. .. ..   <- tab-separated values
//! ```
//!
//! `header` is ASCII, `header2` is UTF-16LE (with BOM). Dates are
//! `YYYY M D h m s` in `header` and Unix seconds in `header2`.

use std::collections::HashMap;
use std::io::Read;

use chrono::{DateTime, NaiveDate};
use flate2::read::ZlibDecoder;

/// Map a library header identifier to the EWF short key
pub(crate) fn header_key(identifier: &str) -> Option<&'static str> {
    let key = match identifier {
        "case_number" => "c",
        "description" => "a",
        "examiner_name" => "e",
        "evidence_number" => "n",
        "notes" => "t",
        "acquiry_date" => "m",
        "system_date" => "u",
        "acquiry_operating_system" => "ov",
        "acquiry_software_version" => "av",
        "password" => "p",
        "model" => "md",
        "serial_number" => "sn",
        "device_label" => "l",
        _ => return None,
    };
    Some(key)
}

/// Decode a raw header/header2 section body into key -> value
pub(crate) fn decode_header_section(data: &[u8], utf16: bool) -> Result<HashMap<String, String>, String> {
    let body = if data.first() == Some(&0x78) {
        decompress_zlib(data)?
    } else {
        data.to_vec()
    };

    let text = if utf16 {
        decode_utf16le(&body)
    } else {
        String::from_utf8_lossy(&body).to_string()
    };

    Ok(parse_header_text(&text))
}

/// Parse the category/key/value table
pub(crate) fn parse_header_text(text: &str) -> HashMap<String, String> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.trim_end_matches(|c: char| c == '\r' || c == '\0'))
        .collect();

    let main_index = lines.iter().position(|line| line.trim() == "main").unwrap_or(1);
    let keys = lines.get(main_index + 1).copied().unwrap_or_default();
    let values = lines.get(main_index + 2).copied().unwrap_or_default();

    let mut fields = HashMap::new();
    for (key, value) in keys.split('\t').zip(values.split('\t')) {
        let key = key.trim();
        let value = value.trim();
        if !key.is_empty() && !value.is_empty() {
            fields.insert(key.to_string(), value.to_string());
        }
    }
    fields
}

/// Render EWF date values as `YYYY-MM-DD HH:MM:SS`; unknown layouts pass through
pub(crate) fn format_header_date(raw: &str) -> String {
    let parts: Vec<&str> = raw.split_whitespace().collect();

    if parts.len() == 6 {
        let numbers: Option<Vec<u32>> = parts.iter().map(|p| p.parse().ok()).collect();
        if let Some(n) = numbers {
            let formatted = NaiveDate::from_ymd_opt(n[0] as i32, n[1], n[2])
                .and_then(|date| date.and_hms_opt(n[3], n[4], n[5]))
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string());
            if let Some(formatted) = formatted {
                return formatted;
            }
        }
    }

    if parts.len() == 1 {
        if let Ok(seconds) = parts[0].parse::<i64>() {
            if let Some(dt) = DateTime::from_timestamp(seconds, 0) {
                return dt.format("%Y-%m-%d %H:%M:%S").to_string();
            }
        }
    }

    raw.to_string()
}

fn decompress_zlib(data: &[u8]) -> Result<Vec<u8>, String> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)
        .map_err(|e| format!("Header decompression failed: {}", e))?;
    Ok(decompressed)
}

fn decode_utf16le(data: &[u8]) -> String {
    let body = data.strip_prefix(&[0xFF, 0xFE]).unwrap_or(data);
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}
