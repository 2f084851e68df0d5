//! Source identity.
//!
//! A source is identified by the SHA-256 of its bytes, so a cached load stays valid
//! exactly as long as the content is unchanged, regardless of path or mtime.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{RawTable, Result};

const BUFFER_SIZE: usize = 65536; // 64 KB

/// Hex-encoded SHA-256 of a source's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(String);

impl SourceId {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    /// Hash a file without loading it into memory.
    pub fn of_path(path: &Path) -> Result<Self> {
        debug!("Computing SHA256 for: {}", path.display());

        let file = File::open(path)?;
        let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(Self(hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What was read, when, and how big it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub name: String,
    pub id: SourceId,
    pub read_at: DateTime<Utc>,
    pub rows: usize,
    pub columns: usize,
}

impl SourceMetadata {
    pub fn new(name: impl Into<String>, id: SourceId, table: &RawTable) -> Self {
        Self {
            name: name.into(),
            id,
            read_at: Utc::now(),
            rows: table.height(),
            columns: table.width(),
        }
    }
}
