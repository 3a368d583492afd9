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

//! Data access layer.
//!
//! This module handles connection setup, schema creation and the read
//! queries presentation code uses to browse the catalog.
//!
//! # Tables
//!
//! * `artists` - Unique artist names, the identity of an artist.
//! * `albums` - Groups tracks under titles, linked to an album artist.
//! * `tracks` - Individual audio files, keyed by device file id.
//! * `quarantined_tracks` - Files whose metadata could not be read.
//! * `playlists` and `tracks_to_playlists` - User playlists.
//!
//! Foreign keys are enforced but never cascade. Removing a row that is still
//! referenced fails, so callers delete dependants first.
//!
//! # Performance
//!
//! Most functions in this module use [`rusqlite::Connection::prepare_cached`]
//! to reduce SQL parsing overhead.

mod model;
pub mod snapshot;

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Result, params};

use crate::model::{Album, Artist, QuarantinedTrack, Track};

pub(crate) const TRACK_COLUMNS: &str = "id, artist_name, album_id, name, artwork, track_number, \
     duration, is_favorite, uri, modified_at, artwork_fetched";

pub(crate) const ALBUM_COLUMNS: &str =
    "id, name, artist_name, release_year, artwork, is_favorite";

pub(crate) const QUARANTINE_COLUMNS: &str = "id, uri, modified_at, error_kind, error_message";

/// Row counts of every catalog table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub artists: i64,
    pub albums: i64,
    pub tracks: i64,
    pub quarantined: i64,
}

/// Opens a connection to the SQLite database and configures performance settings.
///
/// This function performs the following setup:
/// * **WAL Mode**: Enables Write-Ahead Logging so the artwork worker can
///   write while readers keep going.
/// * **Performance Tuning**: Sets synchronous mode to `NORMAL` and increases the cache size.
/// * **Constraints**: Enforces foreign key integrity.
/// * **Schema**: Executes [`create_schema`] to ensure all tables and indices exist.
///
/// # Errors
///
/// Returns an error if the database file cannot be opened, if it cannot be
/// switched to WAL mode, or if the schema initialization fails.
pub fn init_db(path: impl AsRef<Path>) -> anyhow::Result<Connection> {
    let conn = Connection::open(path)?;

    let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
    if journal_mode != "wal" {
        anyhow::bail!(
            "Failed to switch to WAL mode. Current mode: {}",
            journal_mode
        );
    }

    conn.execute_batch(
        "
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -64000; -- Use 64MB of RAM for cache
    ",
    )?;

    configure(&conn)?;

    Ok(conn)
}

/// Opens a private in-memory database with the full schema.
///
/// Every call returns an isolated catalog, which is what tests want.
pub fn init_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;

    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.set_prepared_statement_cache_capacity(100);

    create_schema(conn)
}

/// Create the database schema.
///
/// This operation is wrapped in a single SQL transaction to ensure the schema
/// is updated atomically.
///
/// Albums are unique on `(name, artist_name)`, which is also the identity the
/// reconciliation pass deduplicates on. The constraint lets a racing insert
/// fall back to the existing row instead of creating a second album.
fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;

        CREATE TABLE IF NOT EXISTS artists (
            name TEXT PRIMARY KEY NOT NULL
        );

        CREATE TABLE IF NOT EXISTS albums (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            artist_name TEXT NOT NULL REFERENCES artists (name),
            release_year INTEGER,
            artwork TEXT,
            is_favorite INTEGER NOT NULL DEFAULT 0,
            UNIQUE (name, artist_name)
        );

        CREATE INDEX IF NOT EXISTS idx_albums_artist_name ON albums (artist_name);

        CREATE TABLE IF NOT EXISTS tracks (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            artist_name TEXT REFERENCES artists (name),
            album_id INTEGER REFERENCES albums (id),
            artwork TEXT,
            track_number INTEGER,
            duration INTEGER NOT NULL,
            is_favorite INTEGER NOT NULL DEFAULT 0,
            uri TEXT NOT NULL,
            modified_at INTEGER NOT NULL,
            artwork_fetched INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_tracks_album_id ON tracks (album_id);
        CREATE INDEX IF NOT EXISTS idx_tracks_artist_name ON tracks (artist_name);
        CREATE INDEX IF NOT EXISTS idx_tracks_artwork_fetched ON tracks (artwork_fetched);

        CREATE TABLE IF NOT EXISTS quarantined_tracks (
            id TEXT PRIMARY KEY NOT NULL,
            uri TEXT NOT NULL,
            modified_at INTEGER NOT NULL,
            error_kind TEXT,
            error_message TEXT
        );

        CREATE TABLE IF NOT EXISTS playlists (
            name TEXT PRIMARY KEY NOT NULL,
            is_favorite INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS tracks_to_playlists (
            track_id TEXT NOT NULL REFERENCES tracks (id),
            playlist_name TEXT NOT NULL REFERENCES playlists (name),
            PRIMARY KEY (track_id, playlist_name)
        );

        COMMIT;",
    )
}

/// Removes a track together with its playlist entries.
///
/// Junction rows go first, the track row last, so no junction row can point
/// at a missing track. Returns the artwork path the removed row held, which
/// the caller is expected to release once the change is committed.
///
/// Returns `Ok(None)` both when the track had no artwork and when there was
/// no such track.
pub(crate) fn delete_track(conn: &Connection, track_id: &str) -> Result<Option<String>> {
    conn.prepare_cached("DELETE FROM tracks_to_playlists WHERE track_id = ?")?
        .execute([track_id])?;

    let artwork: Option<Option<String>> = conn
        .prepare_cached("DELETE FROM tracks WHERE id = ? RETURNING artwork")?
        .query_row([track_id], |row| row.get(0))
        .optional()?;

    Ok(artwork.flatten())
}

/// Fetches all artist names, sorted alphabetically.
pub fn fetch_artists(conn: &Connection) -> Result<Vec<Artist>> {
    let mut stmt = conn.prepare_cached("SELECT name FROM artists ORDER BY name")?;
    let rows = stmt.query_map([], |row| Ok(Artist { name: row.get(0)? }))?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }

    Ok(results)
}

/// Fetches all albums, ordered by artist then title.
pub fn fetch_albums(conn: &Connection) -> Result<Vec<Album>> {
    let sql = format!("SELECT {ALBUM_COLUMNS} FROM albums ORDER BY artist_name, name");

    let mut stmt = conn.prepare_cached(&sql)?;
    let results = stmt
        .query_map([], Album::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

/// Fetches all tracks associated with a specific album, ordered by track
/// number and title.
///
/// # Errors
///
/// Returns an error if the SQL query fails or if there is a type mismatch
/// when mapping the database rows to the [`Track`] struct.
pub fn fetch_album_tracks(conn: &Connection, album_id: i64) -> Result<Vec<Track>> {
    let sql = format!(
        "SELECT {TRACK_COLUMNS}
         FROM tracks
         WHERE album_id = ?
         ORDER BY track_number, name"
    );

    let mut stmt = conn.prepare_cached(&sql)?;
    let results = stmt
        .query_map([album_id], Track::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

pub fn fetch_tracks(conn: &Connection) -> Result<Vec<Track>> {
    let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks ORDER BY id");

    let mut stmt = conn.prepare_cached(&sql)?;
    let results = stmt
        .query_map([], Track::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

pub fn fetch_track(conn: &Connection, track_id: &str) -> Result<Option<Track>> {
    let sql = format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE id = ?");

    conn.prepare_cached(&sql)?
        .query_row([track_id], Track::from_row)
        .optional()
}

pub fn fetch_quarantined(conn: &Connection) -> Result<Vec<QuarantinedTrack>> {
    let sql = format!("SELECT {QUARANTINE_COLUMNS} FROM quarantined_tracks ORDER BY id");

    let mut stmt = conn.prepare_cached(&sql)?;
    let results = stmt
        .query_map([], QuarantinedTrack::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}

pub fn catalog_counts(conn: &Connection) -> Result<CatalogCounts> {
    let sql = "
        SELECT
            (SELECT COUNT(*) FROM artists),
            (SELECT COUNT(*) FROM albums),
            (SELECT COUNT(*) FROM tracks),
            (SELECT COUNT(*) FROM quarantined_tracks)
    ";

    conn.prepare_cached(sql)?.query_row([], |row| {
        Ok(CatalogCounts {
            artists: row.get(0)?,
            albums: row.get(1)?,
            tracks: row.get(2)?,
            quarantined: row.get(3)?,
        })
    })
}

pub fn create_playlist(conn: &Connection, name: &str) -> Result<()> {
    conn.prepare_cached("INSERT INTO playlists (name) VALUES (?) ON CONFLICT (name) DO NOTHING")?
        .execute([name])?;

    Ok(())
}

pub fn add_track_to_playlist(conn: &Connection, playlist: &str, track_id: &str) -> Result<()> {
    let sql = "
        INSERT INTO tracks_to_playlists (track_id, playlist_name)
        VALUES (?1, ?2)
        ON CONFLICT (track_id, playlist_name) DO NOTHING";

    conn.prepare_cached(sql)?
        .execute(params![track_id, playlist])?;

    Ok(())
}

pub fn fetch_playlist_track_ids(conn: &Connection, playlist: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT track_id FROM tracks_to_playlists WHERE playlist_name = ? ORDER BY track_id",
    )?;
    let results = stmt
        .query_map([playlist], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(results)
}
