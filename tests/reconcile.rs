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

//! End-to-end reconciliation passes against an in-memory catalog.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use rusqlite::Connection;

use mediasync::{
    ArtworkError, ScanError, SyncContext, SyncError, SyncOptions, SyncReport,
    artwork::{ArtworkJob, ArtworkStore},
    db,
    events::{CacheInvalidator, PlaybackState},
    metadata::MetadataExtractor,
    model::{DeviceFile, ExtractionError, ExtractionErrorKind, Metadata},
    playback::NowPlaying,
    scan::DeviceScanner,
    sync_library,
};

/// A device whose file list the test controls. `None` makes the scan fail.
#[derive(Default)]
struct Device {
    files: Mutex<Option<Vec<DeviceFile>>>,
}

impl DeviceScanner for Device {
    fn scan(&self) -> Result<Vec<DeviceFile>, ScanError> {
        self.files
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ScanError::MissingRoot("/device".into()))
    }
}

/// Tag contents by file id. Files without an entry, or at a broken uri,
/// cannot be read.
#[derive(Default)]
struct Tags {
    by_id: Mutex<HashMap<String, Metadata>>,
    broken_uris: Mutex<HashSet<String>>,
    calls: AtomicUsize,
    artwork_calls: AtomicUsize,
}

impl MetadataExtractor for Tags {
    fn extract(&self, file: &DeviceFile) -> Result<Metadata, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken_uris.lock().unwrap().contains(&file.uri) {
            return Err(ExtractionError::new(
                &file.id,
                ExtractionErrorKind::Unreadable,
                "permission denied",
            ));
        }
        self.by_id
            .lock()
            .unwrap()
            .get(&file.id)
            .cloned()
            .ok_or_else(|| {
                ExtractionError::new(&file.id, ExtractionErrorKind::Malformed, "no frame sync")
            })
    }

    fn extract_artwork(&self, _file_id: &str, _uri: &str) -> Result<Option<Vec<u8>>, ExtractionError> {
        self.artwork_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(b"\x89PNG cover".to_vec()))
    }
}

#[derive(Default)]
struct MemoryArtwork {
    files: Mutex<HashSet<String>>,
    next: AtomicUsize,
}

impl MemoryArtwork {
    fn contains(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains(path)
    }
}

impl ArtworkStore for MemoryArtwork {
    fn persist_artwork(&self, _bytes: &[u8]) -> Result<String, ArtworkError> {
        let path = format!("/art/{}.png", self.next.fetch_add(1, Ordering::SeqCst));
        self.files.lock().unwrap().insert(path.clone());
        Ok(path)
    }

    fn release_artwork(&self, path: &str) -> Result<(), ArtworkError> {
        if self.files.lock().unwrap().remove(path) {
            Ok(())
        } else {
            Err(ArtworkError::Missing(path.to_string()))
        }
    }

    fn list_artwork(&self) -> Result<Vec<String>, ArtworkError> {
        Ok(self.files.lock().unwrap().iter().cloned().collect())
    }
}

#[derive(Default)]
struct CountingCache {
    invalidations: AtomicUsize,
}

impl CacheInvalidator for CountingCache {
    fn invalidate_catalog_reads(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

struct Library {
    conn: Connection,
    device: Device,
    tags: Tags,
    artwork: MemoryArtwork,
    playback: NowPlaying,
    cache: CountingCache,
}

impl Library {
    fn new() -> Self {
        Self {
            conn: db::init_in_memory().unwrap(),
            device: Device {
                files: Mutex::new(Some(vec![])),
            },
            tags: Tags::default(),
            artwork: MemoryArtwork::default(),
            playback: NowPlaying::new(),
            cache: CountingCache::default(),
        }
    }

    fn try_sync(&self) -> Result<SyncReport, SyncError> {
        let ctx = SyncContext {
            scanner: &self.device,
            extractor: &self.tags,
            artwork: &self.artwork,
            playback: &self.playback,
            cache: &self.cache,
            options: SyncOptions {
                extraction_workers: 3,
                sweep_orphan_artwork: true,
            },
        };

        sync_library(&self.conn, &ctx)
    }

    fn sync(&self) -> SyncReport {
        self.try_sync().unwrap()
    }

    /// Places a file on the device, replacing any file with the same id.
    fn put(&self, id: &str, modified_at: i64) {
        let mut files = self.device.files.lock().unwrap();
        let files = files.get_or_insert_with(Vec::new);
        files.retain(|f| f.id != id);
        files.push(DeviceFile {
            id: id.into(),
            uri: format!("/device/{id}.mp3"),
            duration_seconds: 200,
            modified_at,
        });
    }

    fn remove(&self, id: &str) {
        if let Some(files) = self.device.files.lock().unwrap().as_mut() {
            files.retain(|f| f.id != id);
        }
    }

    fn tag(&self, id: &str, metadata: Metadata) {
        self.tags.by_id.lock().unwrap().insert(id.into(), metadata);
    }

    fn corrupt(&self, id: &str) {
        self.tags.by_id.lock().unwrap().remove(id);
    }

    fn extraction_calls(&self) -> usize {
        self.tags.calls.load(Ordering::SeqCst)
    }

    fn assert_consistent(&self) {
        let dangling: i64 = self
            .conn
            .query_row(
                "SELECT
                    (SELECT COUNT(*) FROM tracks t
                     WHERE t.album_id IS NOT NULL
                       AND NOT EXISTS (SELECT 1 FROM albums a WHERE a.id = t.album_id))
                  + (SELECT COUNT(*) FROM tracks t
                     WHERE t.artist_name IS NOT NULL
                       AND NOT EXISTS (SELECT 1 FROM artists r WHERE r.name = t.artist_name))
                  + (SELECT COUNT(*) FROM albums a
                     WHERE NOT EXISTS (SELECT 1 FROM artists r WHERE r.name = a.artist_name))
                  + (SELECT COUNT(*) FROM tracks t
                     WHERE EXISTS (SELECT 1 FROM quarantined_tracks q WHERE q.id = t.id))",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(dangling, 0);
    }
}

fn song(artist: &str, album: Option<&str>, title: &str) -> Metadata {
    Metadata {
        artist_name: Some(artist.into()),
        album_name: album.map(Into::into),
        album_artist: None,
        track_name: title.into(),
        track_number: None,
        release_year: None,
    }
}

#[test]
fn single_track_lifecycle() {
    let library = Library::new();
    library.put("a", 100);
    library.tag("a", song("Arthur Russell", None, "This Is How We Walk on the Moon"));

    let first = library.sync();

    let counts = db::catalog_counts(&library.conn).unwrap();
    assert_eq!((counts.artists, counts.albums, counts.tracks), (1, 0, 1));
    let track = db::fetch_track(&library.conn, "a").unwrap().unwrap();
    assert!(!track.artwork_fetched);
    assert_eq!(track.album_id, None);
    assert_eq!(first.new, 1);

    let second = library.sync();
    assert_eq!(second.writes(), 0);
    assert_eq!(second.unmodified, 1);
    assert_eq!(library.extraction_calls(), 1);

    library.put("a", 200);
    library.corrupt("a");
    let third = library.sync();

    assert!(db::fetch_track(&library.conn, "a").unwrap().is_none());
    let quarantined = db::fetch_quarantined(&library.conn).unwrap();
    assert_eq!(quarantined.len(), 1);
    assert_eq!(quarantined[0].id, "a");
    assert_eq!(quarantined[0].modified_at, 200);
    assert_eq!(third.removed_track_ids, vec!["a".to_string()]);
    library.assert_consistent();
}

#[test]
fn unchanged_device_produces_no_writes() {
    let library = Library::new();
    for (i, id) in ["a", "b", "c", "d"].into_iter().enumerate() {
        library.put(id, 10);
        library.tag(id, song("Cluster", Some("Zuckerzeit"), &format!("Track {i}")));
    }
    library.put("broken", 10);
    library.sync();
    let calls = library.extraction_calls();

    let report = library.sync();

    assert_eq!(report.writes(), 0);
    assert_eq!(report.found, 5);
    assert_eq!(report.unmodified, 5);
    assert_eq!(library.extraction_calls(), calls);
}

#[test]
fn quarantined_file_is_not_read_again_until_modified() {
    let library = Library::new();
    library.put("q", 100);

    let first = library.sync();
    let second = library.sync();

    assert_eq!(first.quarantined, 1);
    assert_eq!(second.quarantined, 0);
    assert_eq!(second.writes(), 0);
    assert_eq!(library.extraction_calls(), 1);
    assert_eq!(db::fetch_quarantined(&library.conn).unwrap().len(), 1);
}

#[test]
fn modified_quarantined_file_recovers() {
    let library = Library::new();
    library.put("q", 100);
    library.sync();

    library.put("q", 150);
    library.tag("q", song("Harmonia", Some("Deluxe"), "Monza"));
    let report = library.sync();

    assert_eq!(report.retried, 1);
    assert_eq!(db::fetch_tracks(&library.conn).unwrap().len(), 1);
    assert!(db::fetch_quarantined(&library.conn).unwrap().is_empty());
    library.assert_consistent();
}

#[test]
fn id_listed_twice_is_catalogued_once() {
    let library = Library::new();
    library.tag("d", song("Tortoise", None, "Djed"));
    *library.device.files.lock().unwrap() = Some(vec![
        DeviceFile {
            id: "d".into(),
            uri: "/device/1.mp3".into(),
            duration_seconds: 200,
            modified_at: 1,
        },
        DeviceFile {
            id: "d".into(),
            uri: "/device/2.mp3".into(),
            duration_seconds: 200,
            modified_at: 1,
        },
    ]);
    library
        .tags
        .broken_uris
        .lock()
        .unwrap()
        .insert("/device/2.mp3".into());

    library.sync();

    let counts = db::catalog_counts(&library.conn).unwrap();
    assert_eq!((counts.tracks, counts.quarantined), (1, 0));
    assert_eq!(library.extraction_calls(), 1);
    library.assert_consistent();

    let again = library.sync();
    assert_eq!(again.writes(), 0);
}

#[test]
fn new_tracks_of_one_album_share_it() {
    let library = Library::new();
    library.put("x", 1);
    library.put("y", 1);
    library.tag("x", song("Neu!", Some("Neu! 75"), "Isi"));
    library.tag("y", song("Neu!", Some("Neu! 75"), "Seeland"));

    library.sync();

    let albums = db::fetch_albums(&library.conn).unwrap();
    assert_eq!(albums.len(), 1);
    let tracks = db::fetch_album_tracks(&library.conn, albums[0].id).unwrap();
    assert_eq!(tracks.len(), 2);
}

#[test]
fn removing_an_albums_last_track_removes_album_and_artist() {
    let library = Library::new();
    library.put("solo", 1);
    library.put("other", 1);
    library.tag("solo", song("Moondog", Some("Moondog"), "Bird's Lament"));
    library.tag("other", song("Terry Riley", None, "A Rainbow in Curved Air"));
    library.sync();
    library.playback.play(vec!["solo".into()], "solo");
    library.playback.queue("other");

    library.remove("solo");
    let report = library.sync();

    assert!(db::fetch_albums(&library.conn).unwrap().is_empty());
    let artists: Vec<_> = db::fetch_artists(&library.conn)
        .unwrap()
        .into_iter()
        .map(|a| a.name)
        .collect();
    assert_eq!(artists, vec!["Terry Riley".to_string()]);
    assert_eq!(report.tracks_removed, 1);
    assert_eq!(report.albums_removed, 1);
    assert_eq!(report.artists_removed, 1);
    assert_eq!(library.playback.current(), None);
    assert_eq!(library.playback.queued(), vec!["other".to_string()]);
    library.assert_consistent();
}

#[test]
fn removed_track_leaves_its_playlists() {
    let library = Library::new();
    library.put("a", 1);
    library.put("b", 1);
    library.tag("a", song("Suicide", None, "Ghost Rider"));
    library.tag("b", song("Suicide", None, "Cheree"));
    library.sync();
    db::create_playlist(&library.conn, "night").unwrap();
    db::add_track_to_playlist(&library.conn, "night", "a").unwrap();
    db::add_track_to_playlist(&library.conn, "night", "b").unwrap();

    library.remove("a");
    library.sync();

    assert_eq!(
        db::fetch_playlist_track_ids(&library.conn, "night").unwrap(),
        vec!["b".to_string()]
    );
}

#[test]
fn modified_track_is_updated_in_place() {
    let library = Library::new();
    library.put("a", 1);
    library.tag("a", song("Can", Some("Ege Bamyasi"), "Vitamin C"));
    library.sync();

    library.put("a", 2);
    library.tag("a", song("Can", Some("Future Days"), "Moonshake"));
    let report = library.sync();

    assert_eq!(report.tracks_updated, 1);
    let albums = db::fetch_albums(&library.conn).unwrap();
    assert_eq!(albums.len(), 1);
    assert_eq!(albums[0].name, "Future Days");
    let track = db::fetch_track(&library.conn, "a").unwrap().unwrap();
    assert_eq!(track.name, "Moonshake");
    assert_eq!(track.album_id, Some(albums[0].id));
    library.assert_consistent();
}

#[test]
fn failed_scan_leaves_catalog_alone() {
    let library = Library::new();
    library.put("a", 1);
    library.tag("a", song("Faust", None, "Krautrock"));
    library.sync();
    let invalidations = library.cache.invalidations.load(Ordering::SeqCst);

    *library.device.files.lock().unwrap() = None;
    let outcome = library.try_sync();

    assert!(matches!(outcome, Err(SyncError::Scan(ScanError::MissingRoot(_)))));
    assert_eq!(db::catalog_counts(&library.conn).unwrap().tracks, 1);
    assert_eq!(library.cache.invalidations.load(Ordering::SeqCst), invalidations);
}

#[test]
fn every_pass_invalidates_reads() {
    let library = Library::new();

    library.sync();
    library.sync();

    assert_eq!(library.cache.invalidations.load(Ordering::SeqCst), 2);
}

#[test]
fn enrichment_saves_artwork_once_and_resumes() {
    let library = Library::new();
    for id in ["a", "b", "c"] {
        library.put(id, 1);
        library.tag(id, song("Popol Vuh", Some("Hosianna Mantra"), id));
    }
    library.put("loose", 1);
    library.tag("loose", song("Popol Vuh", None, "Aguirre"));
    library.sync();

    // Pretend an earlier process was stopped after looking at "a".
    library
        .conn
        .execute("UPDATE tracks SET artwork_fetched = 1 WHERE id = 'a'", [])
        .unwrap();

    let job = ArtworkJob::new();
    let report = job
        .run(&library.conn, &library.tags, &library.artwork, &library.cache)
        .unwrap()
        .unwrap();

    assert_eq!(report.examined, 3);
    assert_eq!(report.saved, 2);
    assert_eq!(library.tags.artwork_calls.load(Ordering::SeqCst), 2);
    let album = &db::fetch_albums(&library.conn).unwrap()[0];
    assert!(library.artwork.contains(album.artwork.as_deref().unwrap()));
    assert!(job.run(&library.conn, &library.tags, &library.artwork, &library.cache).is_none());

    // A later process finds nothing left to do.
    let next = ArtworkJob::new()
        .run(&library.conn, &library.tags, &library.artwork, &library.cache)
        .unwrap()
        .unwrap();
    assert_eq!(next.examined, 0);
}

#[test]
fn deleted_album_releases_its_artwork() {
    let library = Library::new();
    library.put("a", 1);
    library.tag("a", song("La Düsseldorf", Some("Viva"), "Rheinita"));
    library.sync();
    ArtworkJob::new()
        .run(&library.conn, &library.tags, &library.artwork, &library.cache)
        .unwrap()
        .unwrap();
    let path = db::fetch_albums(&library.conn).unwrap()[0]
        .artwork
        .clone()
        .unwrap();

    library.remove("a");
    library.sync();

    assert!(!library.artwork.contains(&path));
    assert_eq!(db::catalog_counts(&library.conn).unwrap(), Default::default());
}

#[test]
fn orphaned_artwork_is_swept() {
    let library = Library::new();
    let stray = library.artwork.persist_artwork(b"stray").unwrap();

    let report = library.sync();

    assert_eq!(report.artwork_swept, 1);
    assert!(!library.artwork.contains(&stray));
}
