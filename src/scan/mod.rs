// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Device scanning.
//!
//! This module handles the discovery of audio files on the local filesystem.
//!
//! It utilizes `WalkDir` for efficient directory traversal and `Lofty` for
//! reading track durations. Only file identity and attributes are gathered
//! here, tag metadata is read later and only for files that changed.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use lofty::config::ParseOptions;
use lofty::prelude::*;
use lofty::probe::Probe;
use tracing::{debug, info};
use walkdir::WalkDir;
use xxhash_rust::xxh3::xxh3_64;

use crate::{error::ScanError, model::DeviceFile};

/// Enumerates the audio files currently visible on the device.
pub trait DeviceScanner {
    /// Lists every accessible audio file.
    ///
    /// # Errors
    ///
    /// Fails as a whole when the listing cannot be produced completely. A
    /// partial listing must never be returned.
    fn scan(&self) -> Result<Vec<DeviceFile>, ScanError>;
}

/// Which files found under the media roots are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanFilter {
    pub block_dirs: Vec<PathBuf>,
    /// Accepted extensions, compared case-insensitively.
    pub extensions: Vec<String>,
    pub min_duration_seconds: i64,
}

impl ScanFilter {
    fn accepts_path(&self, path: &Path) -> bool {
        let extension_ok = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)));

        extension_ok && !self.block_dirs.iter().any(|dir| path.starts_with(dir))
    }

    fn accepts_duration(&self, duration_seconds: i64) -> bool {
        self.min_duration_seconds <= 0 || duration_seconds >= self.min_duration_seconds
    }
}

/// Scans directories on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsScanner {
    roots: Vec<PathBuf>,
    filter: ScanFilter,
}

impl FsScanner {
    pub fn new(roots: Vec<PathBuf>, filter: ScanFilter) -> Self {
        Self { roots, filter }
    }

    fn scan_root(
        &self,
        root: &Path,
        seen: &mut HashSet<String>,
        files: &mut Vec<DeviceFile>,
    ) -> Result<(), ScanError> {
        if !root.is_dir() {
            return Err(ScanError::MissingRoot(root.to_path_buf()));
        }

        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|source| ScanError::Walk {
                path: root.to_path_buf(),
                source,
            })?;

            let path = entry.path();
            if !entry.file_type().is_file() || !self.filter.accepts_path(path) {
                continue;
            }

            let attributes = entry.metadata().map_err(|source| ScanError::Walk {
                path: path.to_path_buf(),
                source,
            })?;
            let modified_at = attributes
                .modified()
                .map_err(|source| ScanError::Attributes {
                    path: path.to_path_buf(),
                    source,
                })?
                .duration_since(UNIX_EPOCH)
                .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
                .unwrap_or(0);

            let duration_seconds = read_duration(path);
            if !self.filter.accepts_duration(duration_seconds) {
                debug!(path = %path.display(), duration_seconds, "skipping short file");
                continue;
            }

            let id = file_id(path);
            if !seen.insert(id.clone()) {
                continue;
            }

            files.push(DeviceFile {
                id,
                uri: path.to_string_lossy().into_owned(),
                duration_seconds,
                modified_at,
            });
        }

        Ok(())
    }
}

impl DeviceScanner for FsScanner {
    fn scan(&self) -> Result<Vec<DeviceFile>, ScanError> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for root in &self.roots {
            let before = files.len();
            self.scan_root(root, &mut seen, &mut files)?;
            info!(root = %root.display(), count = files.len() - before, "scanned media directory");
        }

        Ok(files)
    }
}

/// Stable identity of the file at `path`.
///
/// Derived from the location, never from the contents, so editing the tags
/// of a file keeps its id.
pub fn file_id(path: &Path) -> String {
    format!("{:016x}", xxh3_64(path.as_os_str().as_encoded_bytes()))
}

/// Reads the playing time of an audio file, 0 when it cannot be determined.
fn read_duration(path: &Path) -> i64 {
    let options = ParseOptions::new().read_cover_art(false);

    match Probe::open(path).and_then(|p| p.options(options).read()) {
        Ok(tagged_file) => {
            i64::try_from(tagged_file.properties().duration().as_secs()).unwrap_or(i64::MAX)
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "cannot read duration");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn filter() -> ScanFilter {
        ScanFilter {
            block_dirs: vec![],
            extensions: vec!["mp3".into(), "flac".into()],
            min_duration_seconds: 0,
        }
    }

    #[test]
    fn file_id_is_stable_and_location_based() {
        let a = file_id(Path::new("/music/a.mp3"));

        assert_eq!(a, file_id(Path::new("/music/a.mp3")));
        assert_ne!(a, file_id(Path::new("/music/b.mp3")));
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn filter_checks_extension_and_block_list() {
        let mut filter = filter();
        filter.block_dirs = vec![PathBuf::from("/music/podcasts")];

        assert!(filter.accepts_path(Path::new("/music/a.MP3")));
        assert!(filter.accepts_path(Path::new("/music/b.flac")));
        assert!(!filter.accepts_path(Path::new("/music/c.txt")));
        assert!(!filter.accepts_path(Path::new("/music/noext")));
        assert!(!filter.accepts_path(Path::new("/music/podcasts/ep1.mp3")));
    }

    #[test]
    fn duration_filter_is_disabled_at_zero() {
        let mut filter = filter();
        assert!(filter.accepts_duration(0));

        filter.min_duration_seconds = 30;
        assert!(!filter.accepts_duration(29));
        assert!(filter.accepts_duration(30));
    }

    #[test]
    fn scan_lists_matching_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("album")).unwrap();
        fs::write(dir.path().join("one.mp3"), b"x").unwrap();
        fs::write(dir.path().join("album/two.flac"), b"x").unwrap();
        fs::write(dir.path().join("album/cover.jpg"), b"x").unwrap();

        let scanner = FsScanner::new(vec![dir.path().to_path_buf()], filter());
        let mut files = scanner.scan().unwrap();
        files.sort_by(|a, b| a.uri.cmp(&b.uri));

        assert_eq!(files.len(), 2);
        assert!(files[0].uri.ends_with("two.flac"));
        assert!(files[1].uri.ends_with("one.mp3"));
        assert!(files.iter().all(|f| f.modified_at > 0));
        assert_eq!(files[1].id, file_id(Path::new(&files[1].uri)));
    }

    #[test]
    fn overlapping_roots_do_not_duplicate_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/one.mp3"), b"x").unwrap();

        let roots = vec![dir.path().to_path_buf(), dir.path().join("sub")];
        let files = FsScanner::new(roots, filter()).scan().unwrap();

        assert_eq!(files.len(), 1);
    }

    #[test]
    fn missing_root_fails_the_scan() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = FsScanner::new(vec![dir.path().join("gone")], filter());

        assert!(matches!(scanner.scan(), Err(ScanError::MissingRoot(_))));
    }
}
