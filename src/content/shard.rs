//! Content id → log file path.
//!
//! Ids longer than eight characters are spread over two directory levels
//! keyed by their first two and first four characters; shorter ids live
//! directly in the root, where legacy flat files also live.

use std::path::{Path, PathBuf};

use crate::content::id::ContentId;

/// Ids up to this many characters are not sharded.
pub const SHARD_THRESHOLD: usize = 8;

pub const LOG_EXTENSION: &str = "log";

fn prefix(id: &ContentId, chars: usize) -> String {
    id.as_str().chars().take(chars).collect()
}

/// Directory holding the log file for `id`.
pub fn shard_dir(root: &Path, id: &ContentId) -> PathBuf {
    if id.char_len() > SHARD_THRESHOLD {
        root.join(prefix(id, 2)).join(prefix(id, 4))
    } else {
        root.to_path_buf()
    }
}

/// Current log file for `id`.
pub fn shard_path(root: &Path, id: &ContentId) -> PathBuf {
    shard_dir(root, id).join(file_name(id))
}

/// Where the flat layout kept the log file for `id`.
pub fn legacy_path(root: &Path, id: &ContentId) -> PathBuf {
    root.join(file_name(id))
}

fn file_name(id: &ContentId) -> String {
    format!("{}.{}", id.as_str(), LOG_EXTENSION)
}
