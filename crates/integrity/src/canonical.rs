//! Canonical, pipe-delimited content strings and their digests.
//!
//! Verifiers must rebuild exactly the same string: fields keep their declared
//! order, absent or blank values become `""`, and nothing is trimmed.

use sha2::{Digest, Sha256};

const SEPARATOR: char = '|';

/// Builder for a canonical content string.
#[derive(Debug, Default, Clone)]
pub struct Canonical {
    buf: String,
    fields: usize,
}

impl Canonical {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field; `None` and blank strings render as `""`.
    pub fn field(mut self, value: Option<&str>) -> Self {
        if self.fields > 0 {
            self.buf.push(SEPARATOR);
        }
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            self.buf.push_str(v);
        }
        self.fields += 1;
        self
    }

    pub fn display(self, value: impl core::fmt::Display) -> Self {
        let rendered = value.to_string();
        self.field(Some(&rendered))
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

/// SHA-256 over the UTF-8 bytes of `content`, lowercase hex (64 chars).
pub fn sha256_hex(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
