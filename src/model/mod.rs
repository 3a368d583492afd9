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

//! Domain models and core data structures.
//!
//! This module defines the central entities of the catalog (Artists, Albums,
//! Tracks and quarantined files) together with the ephemeral records that
//! flow through a reconciliation pass: the [`DeviceFile`] produced by a scan
//! and the [`Metadata`] produced by extraction.

use std::fmt;

use thiserror::Error;

/// An audio file visible on the device at scan time.
///
/// Produced fresh by every scan. The `id` is a stable identifier for the
/// underlying file and is never derived from the file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFile {
    pub id: String,
    pub uri: String,
    pub duration_seconds: i64,
    /// Milliseconds since the Unix epoch.
    pub modified_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Artist {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub id: i64,
    pub name: String,
    pub artist_name: String,
    pub release_year: Option<i32>,
    pub artwork: Option<String>,
    pub is_favorite: bool,
}

/// A catalogued track.
///
/// The `id` is the [`DeviceFile::id`] of the file the track was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub artist_name: Option<String>,
    pub album_id: Option<i64>,
    pub name: String,
    pub artwork: Option<String>,
    pub track_number: Option<u32>,
    pub duration_seconds: i64,
    pub is_favorite: bool,
    pub uri: String,
    pub modified_at: i64,
    pub artwork_fetched: bool,
}

/// A file whose metadata could not be read.
///
/// A file id is never both a [`Track`] and a [`QuarantinedTrack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantinedTrack {
    pub id: String,
    pub uri: String,
    pub modified_at: i64,
    pub error_kind: Option<ExtractionErrorKind>,
    pub error_message: Option<String>,
}

/// Normalised tag data for a single file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub artist_name: Option<String>,
    pub album_name: Option<String>,
    /// Falls back to the track artist when the file has no album artist.
    pub album_artist: Option<String>,
    pub track_name: String,
    pub track_number: Option<u32>,
    pub release_year: Option<i32>,
}

impl Metadata {
    /// The `(name, artist)` pair identifying the album this file belongs to,
    /// if the file carries enough information to place it on one.
    pub fn album_key(&self) -> Option<AlbumKey> {
        let name = self.album_name.as_deref()?;
        let artist = self
            .album_artist
            .as_deref()
            .or(self.artist_name.as_deref())?;

        Some(AlbumKey {
            name: name.to_string(),
            artist_name: artist.to_string(),
        })
    }
}

/// Deduplication identity of an album.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlbumKey {
    pub name: String,
    pub artist_name: String,
}

impl From<&Album> for AlbumKey {
    fn from(album: &Album) -> Self {
        Self {
            name: album.name.clone(),
            artist_name: album.artist_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionErrorKind {
    /// The file could not be opened or read.
    Unreadable,
    /// The container or tag data could not be parsed.
    Malformed,
    /// The file parsed but carries no tag at all.
    NoTags,
    /// The extraction unit panicked.
    Panicked,
}

impl ExtractionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionErrorKind::Unreadable => "unreadable",
            ExtractionErrorKind::Malformed => "malformed",
            ExtractionErrorKind::NoTags => "no_tags",
            ExtractionErrorKind::Panicked => "panicked",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unreadable" => Some(ExtractionErrorKind::Unreadable),
            "malformed" => Some(ExtractionErrorKind::Malformed),
            "no_tags" => Some(ExtractionErrorKind::NoTags),
            "panicked" => Some(ExtractionErrorKind::Panicked),
            _ => None,
        }
    }
}

impl fmt::Display for ExtractionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata could not be read from a file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot read metadata of {file_id} ({kind}): {message}")]
pub struct ExtractionError {
    pub file_id: String,
    pub kind: ExtractionErrorKind,
    pub message: String,
}

impl ExtractionError {
    pub fn new(file_id: &str, kind: ExtractionErrorKind, message: impl Into<String>) -> Self {
        Self {
            file_id: file_id.to_string(),
            kind,
            message: message.into(),
        }
    }
}
