// Segment discovery ("globbing") for multi-file forensic images
//
// Handles the two naming schemes the bundled container library reads:
// - EWF segments: .E01 ... .E99, then .EAA, .EAB, ... .EZZ, .FAA, ... (L01 alike)
// - Numbered raw segments: .001, .002, .003, etc.
//
// Any other extension is reported as a detection failure; callers decide
// whether to fall back to single-file mode.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Upper bound on EWF segment numbers (E01..ZZZ)
const MAX_EWF_SEGMENTS: u32 = 14_971;

// =============================================================================
// Entry Point
// =============================================================================

/// Discover every segment belonging to the image at `path`
pub fn glob_segments(path: &Path) -> Result<Vec<PathBuf>, String> {
    let filename = path.file_name()
        .ok_or("Invalid filename")?
        .to_string_lossy()
        .to_string();

    if is_first_ewf_segment(&filename) {
        return discover_ewf_segments(path);
    }
    if is_numbered_segment(&filename) {
        return discover_numbered_segments(path);
    }

    Err(format!("No segment naming scheme recognised for: {}", filename))
}

// =============================================================================
// EWF Segment Discovery (.E01, .E02, ..., .EAA, ...)
// =============================================================================

/// Extension for EWF segment `number` (1-based) with the given format letter
///
/// `ewf_segment_extension('E', 1)` is `E01`, `('E', 100)` is `EAA`.
pub fn ewf_segment_extension(letter: char, number: u32) -> Option<String> {
    if number == 0 || number > MAX_EWF_SEGMENTS {
        return None;
    }
    if number <= 99 {
        return Some(format!("{}{:02}", letter, number));
    }

    let index = number - 100;
    let first = (letter as u32) + index / (26 * 26);
    let second = (index / 26) % 26;
    let third = index % 26;
    if first > 'Z' as u32 {
        return None;
    }

    Some(format!(
        "{}{}{}",
        char::from_u32(first)?,
        char::from_u32('A' as u32 + second)?,
        char::from_u32('A' as u32 + third)?,
    ))
}

/// Discover EWF segments starting from the first segment
pub fn discover_ewf_segments(first_segment: &Path) -> Result<Vec<PathBuf>, String> {
    debug!(path = %first_segment.display(), "Discovering EWF segments");
    if !first_segment.exists() {
        return Err(format!("First segment not found: {}", first_segment.display()));
    }

    let parent = first_segment.parent().unwrap_or(Path::new("."));
    let stem = first_segment.file_stem().ok_or("No filename")?.to_string_lossy();
    let ext = first_segment.extension().ok_or("No extension")?.to_string_lossy();
    let letter = ext.chars().next().ok_or("Empty extension")?.to_ascii_uppercase();
    let lowercase = ext.chars().next().is_some_and(|c| c.is_ascii_lowercase());

    let mut paths = vec![first_segment.to_path_buf()];

    for number in 2..=MAX_EWF_SEGMENTS {
        let Some(segment_ext) = ewf_segment_extension(letter, number) else {
            break;
        };
        let (preferred, alternate) = if lowercase {
            (segment_ext.to_lowercase(), segment_ext)
        } else {
            (segment_ext.clone(), segment_ext.to_lowercase())
        };

        let candidate = parent.join(format!("{}.{}", stem, preferred));
        if candidate.exists() {
            trace!(segment = number, path = %candidate.display(), "Found EWF segment");
            paths.push(candidate);
            continue;
        }
        let candidate = parent.join(format!("{}.{}", stem, alternate));
        if candidate.exists() {
            trace!(segment = number, path = %candidate.display(), "Found EWF segment (other case)");
            paths.push(candidate);
            continue;
        }
        break;
    }

    debug!(segment_count = paths.len(), "EWF segments discovered");
    Ok(paths)
}

// =============================================================================
// Numbered Segment Discovery (.001, .002, etc.)
// =============================================================================

/// Discover numbered segments (.001, .002, ...) for the series containing `path`
pub fn discover_numbered_segments(path: &Path) -> Result<Vec<PathBuf>, String> {
    debug!(path = %path.display(), "Discovering numbered segments");
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let stem = path.file_stem().ok_or("No filename")?.to_string_lossy().to_lowercase();

    let mut found: Vec<(u32, PathBuf)> = Vec::new();
    let entries = fs::read_dir(parent)
        .map_err(|e| format!("Failed to read directory {}: {}", parent.display(), e))?;

    for entry in entries.flatten() {
        let entry_path = entry.path();
        let Some(name) = entry_path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        if !is_numbered_segment(&name) {
            continue;
        }
        let entry_stem = entry_path.file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if entry_stem != stem {
            continue;
        }
        if let Some(number) = extract_segment_number(&name) {
            found.push((number, entry_path));
        }
    }

    found.sort_by_key(|(number, _)| *number);

    // Keep the contiguous run starting at .001
    let mut segments = Vec::with_capacity(found.len());
    for (expected, (number, segment)) in (1u32..).zip(found) {
        if number != expected {
            break;
        }
        segments.push(segment);
    }

    // A path outside the run belongs to some other image
    let requested = path.file_name().map(|n| n.to_string_lossy().to_lowercase());
    let is_member = segments.iter()
        .any(|s| s.file_name().map(|n| n.to_string_lossy().to_lowercase()) == requested);
    if !is_member {
        return Err(format!(
            "{} is not part of a contiguous series starting at .001",
            path.display()
        ));
    }

    debug!(segment_count = segments.len(), "Numbered segments discovered");
    Ok(segments)
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Check if filename names the first segment of an EWF set (.E01 / .L01)
pub fn is_first_ewf_segment(filename: &str) -> bool {
    let lower = filename.to_lowercase();
    lower.ends_with(".e01") || lower.ends_with(".l01") || lower.ends_with(".s01")
}

/// Check if filename is a numbered segment (.001, .002, etc.)
pub fn is_numbered_segment(filename: &str) -> bool {
    match filename.rfind('.') {
        Some(dot) => {
            let ext = &filename[dot + 1..];
            ext.len() == 3 && ext.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Extract segment number from segment name (e.g., "SCHARDT.001" -> 1, "image.E02" -> 2)
pub fn extract_segment_number(name: &str) -> Option<u32> {
    let ext = &name[name.rfind('.')? + 1..];
    if let Ok(number) = ext.parse::<u32>() {
        return Some(number);
    }
    let mut chars = ext.chars();
    let letter = chars.next()?;
    if !letter.is_ascii_alphabetic() {
        return None;
    }
    chars.as_str().parse::<u32>().ok()
}
