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

//! Track upserts.

use rusqlite::{Connection, Result, params};
use tracing::warn;

use crate::{
    artwork::ArtworkStore,
    db::snapshot::CatalogSnapshot,
    sync::{
        SyncReport, classify::Change, dimensions::AlbumIdentityMap, extract::Extracted,
        release_artwork,
    },
};

/// Writes a track row for every successfully extracted file.
///
/// Modified files are updated in place and lose their previous artwork. New
/// and recovered files are inserted with `artwork_fetched` cleared so the
/// enrichment pass visits them. A recovered file leaves the quarantine in
/// the same transaction.
pub(crate) fn upsert_tracks(
    conn: &Connection,
    extracted: &[Extracted],
    albums: &AlbumIdentityMap,
    snapshot: &CatalogSnapshot,
    artwork: &dyn ArtworkStore,
    report: &mut SyncReport,
) {
    for item in extracted {
        let album_id = item.metadata.album_key().and_then(|key| albums.get(&key));

        let outcome = match item.change {
            Change::Modified => update_track(conn, item, album_id, snapshot).map(|old_artwork| {
                report.tracks_updated += 1;
                if let Some(path) = old_artwork {
                    release_artwork(artwork, &path);
                }
            }),
            Change::New | Change::QuarantineRetry => {
                insert_track(conn, item, album_id).map(|()| report.tracks_inserted += 1)
            }
        };

        if let Err(e) = outcome {
            warn!(file_id = %item.file.id, error = %e, "cannot write track");
        }
    }
}

/// Returns the artwork the row held before the update.
fn update_track(
    conn: &Connection,
    item: &Extracted,
    album_id: Option<i64>,
    snapshot: &CatalogSnapshot,
) -> Result<Option<String>> {
    let file = &item.file;
    let metadata = &item.metadata;
    let tx = conn.unchecked_transaction()?;

    let sql = "
        UPDATE tracks SET
            artist_name = ?2,
            album_id = ?3,
            name = ?4,
            artwork = NULL,
            track_number = ?5,
            duration = ?6,
            uri = ?7,
            modified_at = ?8
        WHERE id = ?1";

    tx.prepare_cached(sql)?.execute(params![
        file.id,
        metadata.artist_name,
        album_id,
        metadata.track_name,
        metadata.track_number,
        file.duration_seconds,
        file.uri,
        file.modified_at,
    ])?;

    if snapshot.quarantined.contains_key(&file.id) {
        tx.prepare_cached("DELETE FROM quarantined_tracks WHERE id = ?")?
            .execute([&file.id])?;
    }

    tx.commit()?;

    Ok(snapshot
        .tracks
        .get(&file.id)
        .and_then(|track| track.artwork.clone()))
}

fn insert_track(conn: &Connection, item: &Extracted, album_id: Option<i64>) -> Result<()> {
    let file = &item.file;
    let metadata = &item.metadata;
    let tx = conn.unchecked_transaction()?;

    let sql = "
        INSERT INTO tracks (
            id, artist_name, album_id, name, track_number, duration, uri, modified_at,
            artwork_fetched
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)";

    tx.prepare_cached(sql)?.execute(params![
        file.id,
        metadata.artist_name,
        album_id,
        metadata.track_name,
        metadata.track_number,
        file.duration_seconds,
        file.uri,
        file.modified_at,
    ])?;

    if item.change == Change::QuarantineRetry {
        tx.prepare_cached("DELETE FROM quarantined_tracks WHERE id = ?")?
            .execute([&file.id])?;
    }

    tx.commit()
}
