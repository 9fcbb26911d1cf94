//! Case metadata snapshot of an open image

use std::collections::BTreeMap;

use serde::Serialize;

use crate::common::{normalize_hash, HashAlgorithm};

/// Free-text case fields queried from the container, in display order
pub const CASE_FIELDS: [&str; 7] = [
    "case_number",
    "description",
    "examiner_name",
    "evidence_number",
    "notes",
    "acquiry_date",
    "system_date",
];

pub const FILE_PATH: &str = "file_path";
pub const MEDIA_SIZE: &str = "media_size";
pub const STORED_MD5: &str = "stored_md5";
pub const STORED_SHA1: &str = "stored_sha1";

/// Field name -> value. Absent fields are never present-but-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ImageMetadata {
    fields: BTreeMap<String, String>,
}

impl ImageMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a case field; empty or whitespace-only values are dropped
    pub fn insert_field(&mut self, name: &str, value: &str) {
        let value = value.trim();
        if !value.is_empty() {
            self.fields.insert(name.to_string(), value.to_string());
        }
    }

    /// Insert a stored digest, normalised to lowercase hex
    pub fn insert_stored_hash(&mut self, algorithm: HashAlgorithm, value: &str) {
        let key = match algorithm {
            HashAlgorithm::Md5 => STORED_MD5,
            HashAlgorithm::Sha1 => STORED_SHA1,
            HashAlgorithm::Sha256 => return,
        };
        if let Some(normalized) = normalize_hash(value) {
            self.fields.insert(key.to_string(), normalized);
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn stored_md5(&self) -> Option<&str> {
        self.get(STORED_MD5)
    }

    pub fn stored_sha1(&self) -> Option<&str> {
        self.get(STORED_SHA1)
    }

    /// Stored digest for an algorithm; EWF v1 never stores SHA-256
    pub fn stored_hash(&self, algorithm: HashAlgorithm) -> Option<&str> {
        match algorithm {
            HashAlgorithm::Md5 => self.stored_md5(),
            HashAlgorithm::Sha1 => self.stored_sha1(),
            HashAlgorithm::Sha256 => None,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
