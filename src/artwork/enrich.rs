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

//! Artwork enrichment.
//!
//! Embedded cover images are expensive to read, so they are not touched by
//! the reconciliation pass. Instead this pass runs afterwards over every
//! track whose `artwork_fetched` flag is still clear, saving the artwork to
//! the track's album, or to the track itself when it has no album.
//!
//! The pass keeps no checkpoint of its own. A track is flagged as soon as it
//! has been looked at, so a pass that is interrupted simply carries on from
//! the unflagged tracks the next time it runs.

use std::{
    collections::HashSet,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
    time::Instant,
};

use rusqlite::{Connection, Result, params};
use tracing::{debug, error, info, warn};

use crate::{
    artwork::ArtworkStore,
    db,
    events::{CacheInvalidator, CatalogEvent, ChannelNotifier},
    metadata::MetadataExtractor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    NotStarted,
    Running,
    Done,
}

/// Outcome of one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    /// Tracks that were looked at and flagged.
    pub examined: usize,
    /// Images newly stored against an album or a track.
    pub saved: usize,
    /// Tracks whose artwork could not be read or stored.
    pub failed: usize,
}

/// Guards the enrichment pass so it runs at most once per process.
///
/// Clones share their state, so the handle can be given to whichever part
/// of the application ends up starting the job.
#[derive(Debug, Clone)]
pub struct ArtworkJob {
    state: Arc<Mutex<JobState>>,
}

impl Default for ArtworkJob {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtworkJob {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(JobState::NotStarted)),
        }
    }

    pub fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves the job to [`JobState::Running`].
    ///
    /// Returns `false` if the job was already started, in which case the
    /// caller must not run the pass.
    pub fn begin(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != JobState::NotStarted {
            return false;
        }
        *state = JobState::Running;

        true
    }

    fn finish(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = JobState::Done;
    }

    /// Runs the pass on the calling thread.
    ///
    /// Returns `None` without doing anything if the job has been started
    /// before.
    pub fn run(
        &self,
        conn: &Connection,
        extractor: &dyn MetadataExtractor,
        store: &dyn ArtworkStore,
        cache: &dyn CacheInvalidator,
    ) -> Option<Result<EnrichmentReport>> {
        if !self.begin() {
            debug!("artwork enrichment already started");
            return None;
        }

        let outcome = run_enrichment(conn, extractor, store, cache);
        self.finish();

        Some(outcome)
    }

    /// Runs the pass on a background thread with its own database connection.
    ///
    /// The finished report is sent as [`CatalogEvent::EnrichmentFinished`].
    /// Returns `None` if the job has been started before.
    pub fn spawn(
        &self,
        db_path: PathBuf,
        extractor: Arc<dyn MetadataExtractor>,
        store: Arc<dyn ArtworkStore>,
        notifier: ChannelNotifier,
    ) -> Option<JoinHandle<()>> {
        if !self.begin() {
            debug!("artwork enrichment already started");
            return None;
        }

        let job = self.clone();
        let handle = thread::spawn(move || {
            match db::init_db(&db_path) {
                Ok(conn) => {
                    match run_enrichment(&conn, extractor.as_ref(), store.as_ref(), &notifier) {
                        Ok(report) => notifier.send(CatalogEvent::EnrichmentFinished(report)),
                        Err(e) => error!(error = %e, "artwork enrichment failed"),
                    }
                }
                Err(e) => error!(error = %e, path = %db_path.display(), "cannot open database"),
            }
            job.finish();
        });

        Some(handle)
    }
}

struct PendingTrack {
    id: String,
    album_id: Option<i64>,
    uri: String,
    name: String,
}

/// Looks for embedded artwork in every track not yet examined.
///
/// The first image found for an album is stored against the album and the
/// album's remaining tracks are not read. Readers are told to refresh when
/// at least one image was saved.
///
/// # Errors
///
/// Returns an error if the database cannot be read or written. Tracks
/// flagged before the error stay flagged.
pub fn run_enrichment(
    conn: &Connection,
    extractor: &dyn MetadataExtractor,
    store: &dyn ArtworkStore,
    cache: &dyn CacheInvalidator,
) -> Result<EnrichmentReport> {
    let start = Instant::now();

    let mut stmt = conn.prepare_cached(
        "SELECT id, album_id, uri, name FROM tracks WHERE artwork_fetched = 0 ORDER BY id",
    )?;
    let pending = stmt
        .query_map([], |row| {
            Ok(PendingTrack {
                id: row.get(0)?,
                album_id: row.get(1)?,
                uri: row.get(2)?,
                name: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;

    let mut stmt = conn.prepare_cached("SELECT id FROM albums WHERE artwork IS NOT NULL")?;
    let mut albums_with_artwork = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<Result<HashSet<_>>>()?;

    let mut report = EnrichmentReport::default();

    for track in pending {
        report.examined += 1;

        let needs_artwork = track
            .album_id
            .is_none_or(|album_id| !albums_with_artwork.contains(&album_id));

        let image = if needs_artwork {
            match extractor.extract_artwork(&track.id, &track.uri) {
                Ok(image) => image,
                Err(e) => {
                    debug!(track = %track.name, error = %e, "cannot read embedded artwork");
                    report.failed += 1;
                    None
                }
            }
        } else {
            None
        };

        let artwork = match image.map(|bytes| store.persist_artwork(&bytes)) {
            Some(Ok(path)) => Some(path),
            Some(Err(e)) => {
                warn!(track = %track.name, error = %e, "cannot save artwork");
                report.failed += 1;
                None
            }
            None => None,
        };

        if let Err(e) = save_artwork(conn, &track, artwork.as_deref()) {
            if let Some(path) = &artwork {
                if let Err(release_error) = store.release_artwork(path) {
                    warn!(%path, error = %release_error, "cannot release unsaved artwork");
                }
            }
            return Err(e);
        }

        if artwork.is_some() {
            report.saved += 1;
            if let Some(album_id) = track.album_id {
                albums_with_artwork.insert(album_id);
            }
        }
    }

    info!(
        examined = report.examined,
        saved = report.saved,
        failed = report.failed,
        took = ?start.elapsed(),
        "artwork enrichment finished"
    );

    if report.saved > 0 {
        cache.invalidate_catalog_reads();
    }

    Ok(report)
}

/// Stores the artwork, if any, and flags the track as examined.
fn save_artwork(conn: &Connection, track: &PendingTrack, artwork: Option<&str>) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    if let Some(path) = artwork {
        match track.album_id {
            Some(album_id) => tx
                .prepare_cached("UPDATE albums SET artwork = ?2 WHERE id = ?1")?
                .execute(params![album_id, path])?,
            None => tx
                .prepare_cached("UPDATE tracks SET artwork = ?2 WHERE id = ?1")?
                .execute(params![track.id, path])?,
        };
    }

    tx.prepare_cached("UPDATE tracks SET artwork_fetched = 1 WHERE id = ?")?
        .execute([&track.id])?;

    tx.commit()
}
