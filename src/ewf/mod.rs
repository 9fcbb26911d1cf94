//! EWF (Expert Witness Format) v1 - E01/L01 segment set reader
//!
//! Provides the random-access media stream and embedded case metadata of
//! EnCase images, the native backend of [`crate::library::ForensicLibrary`].
//!
//! ## EWF Format Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ File header (13 bytes)                                       │
//! │  - E01:  "EVF\x09\x0d\x0a\xff\x00" + segment number          │
//! │  - L01:  "LVF\x09\x0d\x0a\xff\x00" + segment number          │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Section chain (76-byte descriptors, linked by next offset)   │
//! │  header / header2  case fields (zlib, ASCII / UTF-16LE)      │
//! │  volume / disk     chunk geometry and sector count           │
//! │  sectors           chunk data (zlib or raw + Adler-32)       │
//! │  table             chunk offsets, MSB = compressed           │
//! │  hash / digest     acquisition MD5 / SHA1                    │
//! │  next / done       end of segment / end of image             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Segments continue as .E02 ... .E99, .EAA ... (see [`crate::common::segments`]).
//! EWF v2 (Ex01/Lx01) signatures are recognised and rejected.

mod cache;
mod handle;
mod header;
mod types;

#[cfg(test)]
pub(crate) mod fixture;

pub use handle::EwfHandle;
pub use types::{EwfFormat, StoredHashes, VolumeSection};

pub(crate) use types::detect_format;
