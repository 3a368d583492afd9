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

//! Cover artwork storage and enrichment.
//!
//! Artwork images live outside the database; rows only hold the path an
//! [`ArtworkStore`] handed out. The [`enrich`] module fills in missing artwork
//! after the catalog is already usable.

pub mod enrich;

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use xxhash_rust::xxh3::xxh3_64;

use crate::error::ArtworkError;

pub use enrich::{ArtworkJob, EnrichmentReport, JobState};

/// Abstracts the file store artwork images are kept in.
pub trait ArtworkStore: Send + Sync {
    /// Stores an image and returns the path rows should reference.
    fn persist_artwork(&self, bytes: &[u8]) -> Result<String, ArtworkError>;

    /// Deletes a previously persisted image.
    fn release_artwork(&self, path: &str) -> Result<(), ArtworkError>;

    /// Every image currently held by the store.
    fn list_artwork(&self) -> Result<Vec<String>, ArtworkError>;
}

/// Keeps artwork as individual files in one directory.
///
/// Each persisted image gets a fresh file name, even when the same bytes are
/// stored twice, so releasing one row's artwork never affects another row.
#[derive(Debug)]
pub struct FsArtworkStore {
    dir: PathBuf,
    counter: AtomicU64,
}

impl FsArtworkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&self, bytes: &[u8]) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);

        format!(
            "{:016x}-{nanos:x}-{seq}.{}",
            xxh3_64(bytes),
            image_extension(bytes)
        )
    }
}

impl ArtworkStore for FsArtworkStore {
    fn persist_artwork(&self, bytes: &[u8]) -> Result<String, ArtworkError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(self.file_name(bytes));
        fs::write(&path, bytes)?;

        Ok(path.to_string_lossy().into_owned())
    }

    fn release_artwork(&self, path: &str) -> Result<(), ArtworkError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ArtworkError::Missing(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn list_artwork(&self) -> Result<Vec<String>, ArtworkError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                paths.push(entry.path().to_string_lossy().into_owned());
            }
        }
        paths.sort();

        Ok(paths)
    }
}

/// Guesses a file extension from the image magic bytes.
fn image_extension(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "png",
        [0xFF, 0xD8, 0xFF, ..] => "jpg",
        [b'G', b'I', b'F', b'8', ..] => "gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "webp",
        _ => "img",
    }
}
