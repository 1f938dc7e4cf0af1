//! Stable identity of an uploaded document.

use crate::error::{Result, RetrievalError};
use docqa_context::PageText;
use serde::{Deserialize, Serialize};
use std::path::Path;

const MAX_STEM_LEN: usize = 48;
const DIGEST_HEX_LEN: usize = 16;

/// Identifies one document's persisted index.
///
/// Derived from the source name and the extracted page content, so two
/// different documents never share an index even when their file names
/// collide, while re-uploading identical content maps to the same artifacts.
/// The string form only contains `[a-z0-9-]` and is safe to use as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn derive(source_name: &str, pages: &[PageText]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for page in pages {
            hasher.update(&page.page.to_le_bytes());
            hasher.update(page.kind.as_str().as_bytes());
            hasher.update(&(page.content.len() as u64).to_le_bytes());
            hasher.update(page.content.as_bytes());
        }
        let digest = hasher.finalize();
        let digest = hex::encode(&digest.as_bytes()[..DIGEST_HEX_LEN / 2]);

        Self(format!("{}-{digest}", sanitize_stem(source_name)))
    }

    /// Parse an identifier previously produced by [`DocumentId::derive`].
    pub fn parse(value: &str) -> Result<Self> {
        let valid = !value.is_empty()
            && value.len() <= MAX_STEM_LEN + 1 + DIGEST_HEX_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && !value.starts_with('-');
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(RetrievalError::configuration(format!(
                "invalid document id: {value:?}"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for DocumentId {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn sanitize_stem(source_name: &str) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source_name);

    let mut sanitized = String::with_capacity(stem.len());
    for c in stem.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            sanitized.push(c);
        } else if !sanitized.ends_with('-') {
            sanitized.push('-');
        }
    }

    let sanitized: String = sanitized
        .trim_matches('-')
        .chars()
        .take(MAX_STEM_LEN)
        .collect();
    let sanitized = sanitized.trim_end_matches('-');
    if sanitized.is_empty() {
        "document".to_string()
    } else {
        sanitized.to_string()
    }
}
