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

//! Garbage collection.
//!
//! Removes whatever the device no longer has, working from tracks to albums
//! to artists since emptiness is defined through tracks. Each stale row is
//! removed on its own; a failure is logged and the sweep moves on, and the
//! next pass picks up whatever was left behind.

use std::collections::HashSet;

use rusqlite::{Connection, Result};
use tracing::{debug, warn};

use crate::{
    artwork::ArtworkStore,
    db,
    sync::{SyncReport, release_artwork},
};

/// Deletes every catalog row whose file was not part of the scan, then the
/// albums and artists left without tracks.
///
/// Ids of removed tracks are appended to `report.removed_track_ids`.
///
/// # Errors
///
/// Returns an error only if the stale rows cannot be listed. Failures on
/// individual rows are logged.
pub(crate) fn collect_garbage(
    conn: &Connection,
    scanned: &HashSet<String>,
    artwork: &dyn ArtworkStore,
    report: &mut SyncReport,
) -> Result<()> {
    let stale_tracks = stale_ids(conn, "SELECT id FROM tracks", scanned)?;
    for id in stale_tracks {
        match remove_track(conn, &id) {
            Ok(removed_artwork) => {
                report.tracks_removed += 1;
                report.removed_track_ids.push(id);
                if let Some(path) = removed_artwork {
                    release_artwork(artwork, &path);
                }
            }
            Err(e) => warn!(track_id = %id, error = %e, "cannot remove stale track"),
        }
    }

    let stale_quarantined = stale_ids(conn, "SELECT id FROM quarantined_tracks", scanned)?;
    for id in stale_quarantined {
        match conn
            .prepare_cached("DELETE FROM quarantined_tracks WHERE id = ?")
            .and_then(|mut stmt| stmt.execute([&id]))
        {
            Ok(_) => report.quarantine_removed += 1,
            Err(e) => warn!(file_id = %id, error = %e, "cannot remove stale quarantine entry"),
        }
    }

    remove_empty_albums(conn, artwork, report)?;
    remove_unused_artists(conn, report);

    Ok(())
}

fn stale_ids(conn: &Connection, sql: &str, scanned: &HashSet<String>) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .filter(|id| id.as_ref().map_or(true, |id| !scanned.contains(id)))
        .collect::<Result<Vec<_>>>()?;

    Ok(ids)
}

/// Removes a track along with its playlist entries and any quarantine row.
fn remove_track(conn: &Connection, id: &str) -> Result<Option<String>> {
    let tx = conn.unchecked_transaction()?;

    tx.prepare_cached("DELETE FROM quarantined_tracks WHERE id = ?")?
        .execute([id])?;
    let removed_artwork = db::delete_track(&tx, id)?;

    tx.commit()?;

    Ok(removed_artwork)
}

fn remove_empty_albums(
    conn: &Connection,
    artwork: &dyn ArtworkStore,
    report: &mut SyncReport,
) -> Result<()> {
    let sql = "
        SELECT id, artwork FROM albums
        WHERE NOT EXISTS (SELECT 1 FROM tracks WHERE tracks.album_id = albums.id)";

    let mut stmt = conn.prepare_cached(sql)?;
    let empty = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)))?
        .collect::<Result<Vec<_>>>()?;

    for (album_id, album_artwork) in empty {
        match conn
            .prepare_cached("DELETE FROM albums WHERE id = ?")
            .and_then(|mut stmt| stmt.execute([album_id]))
        {
            Ok(_) => {
                report.albums_removed += 1;
                if let Some(path) = album_artwork {
                    release_artwork(artwork, &path);
                }
            }
            Err(e) => warn!(album_id, error = %e, "cannot remove empty album"),
        }
    }

    Ok(())
}

/// An artist is kept while a track or an album refers to it.
fn remove_unused_artists(conn: &Connection, report: &mut SyncReport) {
    let sql = "
        DELETE FROM artists
        WHERE NOT EXISTS (SELECT 1 FROM tracks WHERE tracks.artist_name = artists.name)
          AND NOT EXISTS (SELECT 1 FROM albums WHERE albums.artist_name = artists.name)";

    match conn.prepare_cached(sql).and_then(|mut stmt| stmt.execute([])) {
        Ok(removed) => report.artists_removed += removed,
        Err(e) => warn!(error = %e, "cannot remove unused artists"),
    }
}

/// Releases artwork files that no album or track refers to.
///
/// Must not run while an enrichment pass is persisting artwork, since a file
/// is stored before the row that refers to it is written.
pub(crate) fn sweep_orphan_artwork(
    conn: &Connection,
    artwork: &dyn ArtworkStore,
    report: &mut SyncReport,
) -> Result<()> {
    let stored = match artwork.list_artwork() {
        Ok(stored) => stored,
        Err(e) => {
            warn!(error = %e, "cannot list artwork store");
            return Ok(());
        }
    };

    let sql = "
        SELECT artwork FROM albums WHERE artwork IS NOT NULL
        UNION
        SELECT artwork FROM tracks WHERE artwork IS NOT NULL";

    let mut stmt = conn.prepare_cached(sql)?;
    let referenced = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>>>()?;

    for path in stored.iter().filter(|path| !referenced.contains(*path)) {
        debug!(%path, "releasing orphaned artwork");
        match artwork.release_artwork(path) {
            Ok(()) => report.artwork_swept += 1,
            Err(e) => warn!(%path, error = %e, "cannot release orphaned artwork"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ArtworkError, sync::tests::RecordingArtwork};

    /// A store whose files have all gone missing behind its back.
    struct VanishedArtwork;

    impl ArtworkStore for VanishedArtwork {
        fn persist_artwork(&self, _bytes: &[u8]) -> std::result::Result<String, ArtworkError> {
            Err(ArtworkError::Missing("/art".into()))
        }

        fn release_artwork(&self, path: &str) -> std::result::Result<(), ArtworkError> {
            Err(ArtworkError::Missing(path.to_string()))
        }

        fn list_artwork(&self) -> std::result::Result<Vec<String>, ArtworkError> {
            Err(ArtworkError::Missing("/art".into()))
        }
    }

    fn seed(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO artists (name) VALUES ('Stereolab'), ('Solo');
             INSERT INTO albums (id, name, artist_name, artwork) VALUES
                (1, 'Dots and Loops', 'Stereolab', '/art/dots.png');
             INSERT INTO tracks (id, name, artist_name, album_id, duration, uri, modified_at) VALUES
                ('a', 'Brakhage', 'Stereolab', 1, 300, '/music/a.mp3', 1),
                ('b', 'Miss Modular', 'Stereolab', 1, 300, '/music/b.mp3', 1),
                ('s', 'Alone', 'Solo', NULL, 200, '/music/s.mp3', 1);
             INSERT INTO quarantined_tracks (id, uri, modified_at) VALUES ('q', '/music/q.mp3', 1);
             INSERT INTO playlists (name) VALUES ('mix');
             INSERT INTO tracks_to_playlists (track_id, playlist_name) VALUES ('a', 'mix'), ('s', 'mix');",
        )
        .unwrap();
    }

    fn scanned(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn nothing_is_removed_when_everything_was_scanned() {
        let conn = db::init_in_memory().unwrap();
        seed(&conn);
        let mut report = SyncReport::default();

        collect_garbage(&conn, &scanned(&["a", "b", "s", "q"]), &RecordingArtwork::default(), &mut report)
            .unwrap();

        assert_eq!(report.writes(), 0);
        assert_eq!(db::catalog_counts(&conn).unwrap().tracks, 3);
    }

    #[test]
    fn stale_tracks_take_playlist_entries_and_empty_dimensions_with_them() {
        let conn = db::init_in_memory().unwrap();
        seed(&conn);
        let artwork = RecordingArtwork::default();
        let mut report = SyncReport::default();

        collect_garbage(&conn, &scanned(&["b"]), &artwork, &mut report).unwrap();

        let mut removed = report.removed_track_ids.clone();
        removed.sort();
        assert_eq!(removed, vec!["a".to_string(), "s".to_string()]);
        assert!(db::fetch_playlist_track_ids(&conn, "mix").unwrap().is_empty());
        assert!(db::fetch_quarantined(&conn).unwrap().is_empty());
        assert_eq!(report.quarantine_removed, 1);

        // "b" keeps the album and its artist alive.
        assert_eq!(db::fetch_albums(&conn).unwrap().len(), 1);
        let artists: Vec<_> = db::fetch_artists(&conn).unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(artists, vec!["Stereolab".to_string()]);
        assert_eq!(report.artists_removed, 1);
    }

    #[test]
    fn last_track_removes_album_and_artist() {
        let conn = db::init_in_memory().unwrap();
        seed(&conn);
        let artwork = RecordingArtwork::default();
        let mut report = SyncReport::default();

        collect_garbage(&conn, &scanned(&["s"]), &artwork, &mut report).unwrap();

        assert!(db::fetch_albums(&conn).unwrap().is_empty());
        assert_eq!(report.albums_removed, 1);
        assert!(artwork.released().contains(&"/art/dots.png".to_string()));
        let artists: Vec<_> = db::fetch_artists(&conn).unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(artists, vec!["Solo".to_string()]);
    }

    #[test]
    fn artwork_failures_do_not_stop_the_sweep() {
        let conn = db::init_in_memory().unwrap();
        seed(&conn);
        conn.execute("UPDATE tracks SET artwork = '/art/s.png' WHERE id = 's'", [])
            .unwrap();
        let mut report = SyncReport::default();

        collect_garbage(&conn, &HashSet::new(), &VanishedArtwork, &mut report).unwrap();
        sweep_orphan_artwork(&conn, &VanishedArtwork, &mut report).unwrap();

        assert_eq!(report.tracks_removed, 3);
        assert_eq!(report.albums_removed, 1);
        assert_eq!(report.artists_removed, 2);
        assert_eq!(report.artwork_swept, 0);
        assert_eq!(db::catalog_counts(&conn).unwrap(), db::CatalogCounts::default());
    }

    #[test]
    fn sweep_releases_only_unreferenced_artwork() {
        let conn = db::init_in_memory().unwrap();
        seed(&conn);
        let artwork = RecordingArtwork::with_stored(&["/art/dots.png", "/art/stray.png"]);
        let mut report = SyncReport::default();

        sweep_orphan_artwork(&conn, &artwork, &mut report).unwrap();

        assert_eq!(artwork.released(), vec!["/art/stray.png".to_string()]);
        assert_eq!(report.artwork_swept, 1);
    }
}
