//! Input/output: CSV ingest, scored-table export, and the summary artifact.
//!
//! File artifacts are written all-or-nothing: writers produce a `.tmp`
//! sibling and rename it into place only once the content is complete, so a
//! failed run never leaves a partially-written output behind.

use std::path::{Path, PathBuf};

pub mod export;
pub mod ingest;
pub mod summary;

/// Temporary sibling used for all-or-nothing writes.
pub(crate) fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| std::ffi::OsString::from("out"));
    name.push(".tmp");
    path.with_file_name(name)
}
