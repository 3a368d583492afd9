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

//! Artist and album upserts.
//!
//! Every artist and album a batch refers to is resolved to a stable row
//! before any track row is written, so two tracks of the same new album
//! always end up pointing at the same album.

use std::collections::{BTreeSet, HashMap, HashSet};

use rusqlite::{Connection, Result, params};
use tracing::debug;

use crate::{
    db::snapshot::CatalogSnapshot,
    model::AlbumKey,
    sync::{SyncReport, extract::Extracted},
};

/// Album ids by `(name, artist_name)`.
#[derive(Debug, Default)]
pub struct AlbumIdentityMap {
    ids: HashMap<AlbumKey, i64>,
}

impl AlbumIdentityMap {
    fn seeded(snapshot: &CatalogSnapshot) -> Self {
        let ids = snapshot
            .albums
            .iter()
            .map(|album| (AlbumKey::from(album), album.id))
            .collect();

        Self { ids }
    }

    pub fn get(&self, key: &AlbumKey) -> Option<i64> {
        self.ids.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Inserts the artists and albums referenced by `extracted` that are not yet
/// catalogued and returns the identity of every album the batch uses.
///
/// Inserts tolerate conflicts: a row that already exists is reused, never
/// duplicated.
///
/// # Errors
///
/// Returns an error if any statement fails, in which case nothing is written.
pub(crate) fn upsert_dimensions(
    conn: &Connection,
    extracted: &[Extracted],
    snapshot: &CatalogSnapshot,
    report: &mut SyncReport,
) -> Result<AlbumIdentityMap> {
    let mut albums = AlbumIdentityMap::seeded(snapshot);

    let mut artist_names = BTreeSet::new();
    let mut album_years: Vec<(AlbumKey, Option<i32>)> = Vec::new();
    let mut pending_albums = HashSet::new();
    for item in extracted {
        let metadata = &item.metadata;
        if let Some(artist) = &metadata.artist_name {
            artist_names.insert(artist.as_str());
        }
        if let Some(key) = metadata.album_key() {
            if albums.get(&key).is_none() && pending_albums.insert(key.clone()) {
                album_years.push((key, metadata.release_year));
            }
        }
    }
    for (key, _) in &album_years {
        artist_names.insert(key.artist_name.as_str());
    }

    if artist_names.is_empty() && album_years.is_empty() {
        return Ok(albums);
    }

    let tx = conn.unchecked_transaction()?;

    {
        let mut insert_artist =
            tx.prepare_cached("INSERT INTO artists (name) VALUES (?) ON CONFLICT DO NOTHING")?;
        for name in &artist_names {
            report.artists_created += insert_artist.execute([name])?;
        }

        let mut insert_album = tx.prepare_cached(
            "INSERT INTO albums (name, artist_name, release_year) VALUES (?1, ?2, ?3)
             ON CONFLICT (name, artist_name) DO NOTHING",
        )?;
        let mut select_album =
            tx.prepare_cached("SELECT id FROM albums WHERE name = ?1 AND artist_name = ?2")?;

        for (key, release_year) in album_years {
            let inserted = insert_album.execute(params![key.name, key.artist_name, release_year])?;
            let id = if inserted == 1 {
                report.albums_created += 1;
                tx.last_insert_rowid()
            } else {
                debug!(album = %key.name, artist = %key.artist_name, "album already catalogued");
                select_album.query_row(params![key.name, key.artist_name], |row| row.get(0))?
            };
            albums.ids.insert(key, id);
        }
    }

    tx.commit()?;

    Ok(albums)
}
