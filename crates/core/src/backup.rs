use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const SQL_EXTENSION: &str = ".sql";
pub const COMPRESSED_EXTENSION: &str = ".bz2";

/// One backup file as found on disk. Computed on demand from a directory
/// listing, never persisted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BackupFile {
    pub filename: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

impl BackupFile {
    pub fn is_compressed(&self) -> bool {
        is_compressed(&self.filename)
    }

    /// Default listing order: oldest first, ties broken by filename.
    pub fn oldest_first(a: &BackupFile, b: &BackupFile) -> Ordering {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.filename.cmp(&b.filename))
    }

    /// Exact reverse of [`BackupFile::oldest_first`].
    pub fn newest_first(a: &BackupFile, b: &BackupFile) -> Ordering {
        Self::oldest_first(b, a)
    }
}

/// Whether a backup filename denotes a compressed dump.
pub fn is_compressed(filename: &str) -> bool {
    filename.ends_with(COMPRESSED_EXTENSION)
}
