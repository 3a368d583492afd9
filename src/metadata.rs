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

//! Tag metadata extraction.
//!
//! The synchronization engine treats tag parsing as a collaborator with a
//! fixed contract, [`MetadataExtractor`]. [`LoftyExtractor`] is the production
//! implementation and uses `Lofty` to read the primary tag of a file.

use std::path::Path;

use lofty::config::ParseOptions;
use lofty::error::{ErrorKind, LoftyError};
use lofty::file::TaggedFile;
use lofty::picture::PictureType;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};

use crate::model::{DeviceFile, ExtractionError, ExtractionErrorKind, Metadata};

/// Reads tag data out of audio files.
///
/// Implementations must be shareable across threads: extraction for a batch
/// of files runs as independent units on several workers.
pub trait MetadataExtractor: Send + Sync {
    /// Reads and normalises the tags of a file.
    fn extract(&self, file: &DeviceFile) -> Result<Metadata, ExtractionError>;

    /// Reads the embedded cover image of the file at `uri`, if it has one.
    fn extract_artwork(&self, file_id: &str, uri: &str)
        -> Result<Option<Vec<u8>>, ExtractionError>;
}

/// Extracts metadata with `Lofty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyExtractor;

impl LoftyExtractor {
    pub fn new() -> Self {
        Self
    }

    fn read(file_id: &str, uri: &str, options: ParseOptions) -> Result<TaggedFile, ExtractionError> {
        Probe::open(uri)
            .and_then(|p| p.options(options).read())
            .map_err(|e| lofty_error(file_id, e))
    }
}

impl MetadataExtractor for LoftyExtractor {
    fn extract(&self, file: &DeviceFile) -> Result<Metadata, ExtractionError> {
        let tagged_file = Self::read(&file.id, &file.uri, ParseOptions::new().read_cover_art(false))?;

        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
            .ok_or_else(|| {
                ExtractionError::new(&file.id, ExtractionErrorKind::NoTags, "file has no tags")
            })?;

        Ok(metadata_from_tag(tag, &file.uri))
    }

    fn extract_artwork(
        &self,
        file_id: &str,
        uri: &str,
    ) -> Result<Option<Vec<u8>>, ExtractionError> {
        let tagged_file = Self::read(file_id, uri, ParseOptions::new())?;

        let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
            return Ok(None);
        };

        let pictures = tag.pictures();
        let cover = pictures
            .iter()
            .find(|p| p.pic_type() == PictureType::CoverFront)
            .or_else(|| pictures.first());

        Ok(cover.map(|p| p.data().to_vec()))
    }
}

fn lofty_error(file_id: &str, err: LoftyError) -> ExtractionError {
    let kind = match err.kind() {
        ErrorKind::Io(_) => ExtractionErrorKind::Unreadable,
        _ => ExtractionErrorKind::Malformed,
    };

    ExtractionError::new(file_id, kind, err.to_string())
}

/// Normalises a tag into [`Metadata`].
///
/// Blank text items count as missing. The track name falls back to the file
/// stem, and the album artist falls back to the track artist.
fn metadata_from_tag(tag: &Tag, uri: &str) -> Metadata {
    let artist_name = non_blank(tag.artist().as_deref());
    let album_artist = tag
        .get(ItemKey::AlbumArtist)
        .and_then(|item| item.value().text())
        .and_then(|s| non_blank(Some(s)))
        .or_else(|| artist_name.clone());

    let track_name = non_blank(tag.title().as_deref()).unwrap_or_else(|| file_stem(uri));

    let release_year = tag
        .get(ItemKey::RecordingDate)
        .or_else(|| tag.get(ItemKey::Year))
        .and_then(|item| item.value().text())
        .and_then(parse_year);

    Metadata {
        artist_name,
        album_name: non_blank(tag.album().as_deref()),
        album_artist,
        track_name,
        track_number: tag.track(),
        release_year,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn file_stem(uri: &str) -> String {
    Path::new(uri)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| uri.to_string())
}

/// Takes the leading four digits of a date such as `1999` or `1999-04-01`.
fn parse_year(value: &str) -> Option<i32> {
    let digits = value.trim().get(..4)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    digits.parse().ok().filter(|&year| year > 0)
}
