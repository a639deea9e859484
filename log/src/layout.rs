// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Data directory layout: one `<hash>.log` per stream, plus an optional
//! `<hash>.sealed` marker for archived streams.

use std::path::{Path, PathBuf};

use crate::event_log::{LOG_EXTENSION, TEMP_EXTENSION};

/// Marker file next to a log: the stream is archived.
pub const SEALED_EXTENSION: &str = "sealed";

/// Lists `*.log` files in `dir`, sorted by name.
pub fn list_logs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    list_with_extension(dir, LOG_EXTENSION)
}

/// Lists leftover `*.log.tmp` staging files in `dir`.
pub fn list_staging(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    list_with_extension(dir, TEMP_EXTENSION)
}

fn list_with_extension(dir: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

pub fn sealed_marker(log_path: &Path) -> PathBuf {
    log_path.with_extension(SEALED_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::{log_file_name, temp_path};
    use cim_kernel::types::id::StreamId;
    use tempfile::tempdir;

    #[test]
    fn test_listing_separates_logs_and_staging() {
        let dir = tempdir().unwrap();
        let log = dir.path().join(log_file_name(&StreamId::new("a").unwrap()));
        std::fs::write(&log, b"").unwrap();
        std::fs::write(temp_path(&log), b"").unwrap();
        std::fs::write(sealed_marker(&log), b"a").unwrap();

        assert_eq!(list_logs(dir.path()).unwrap(), vec![log.clone()]);
        assert_eq!(list_staging(dir.path()).unwrap(), vec![temp_path(&log)]);
        assert_eq!(sealed_marker(&log).extension().unwrap(), SEALED_EXTENSION);
    }
}
