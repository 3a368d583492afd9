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

//! Library reconciliation.
//!
//! One pass brings the catalog in line with the files currently on the
//! device:
//!
//! 1. scan the device and read a snapshot of the catalog,
//! 2. classify every file as new, modified, quarantined-and-modified or
//!    unmodified,
//! 3. read metadata for the changed files, in parallel,
//! 4. quarantine the files that could not be read,
//! 5. resolve artists and albums, then write the tracks,
//! 6. remove what the device no longer has.
//!
//! Every step is idempotent given the stored state, so a pass that stopped
//! half way is repaired by the next one, and a pass over an unchanged device
//! writes nothing.

pub mod classify;
pub mod extract;

mod cleanup;
mod dimensions;
mod quarantine;
mod tracks;

use std::{collections::HashSet, time::Instant};

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::{
    artwork::ArtworkStore,
    db::snapshot::CatalogSnapshot,
    error::SyncError,
    events::{CacheInvalidator, PlaybackState},
    metadata::MetadataExtractor,
    scan::DeviceScanner,
};

pub use dimensions::AlbumIdentityMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Worker threads used to read metadata.
    pub extraction_workers: usize,
    /// Release artwork files nothing refers to at the end of a pass.
    pub sweep_orphan_artwork: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            extraction_workers: 4,
            sweep_orphan_artwork: true,
        }
    }
}

/// Everything a pass talks to besides the database.
pub struct SyncContext<'a> {
    pub scanner: &'a dyn DeviceScanner,
    pub extractor: &'a dyn MetadataExtractor,
    pub artwork: &'a dyn ArtworkStore,
    pub playback: &'a dyn PlaybackState,
    pub cache: &'a dyn CacheInvalidator,
    pub options: SyncOptions,
}

/// What a reconciliation pass found and did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub found: usize,
    pub unmodified: usize,
    pub new: usize,
    pub modified: usize,
    pub retried: usize,
    pub extraction_failures: usize,
    pub quarantined: usize,
    pub artists_created: usize,
    pub albums_created: usize,
    pub tracks_inserted: usize,
    pub tracks_updated: usize,
    pub tracks_removed: usize,
    pub quarantine_removed: usize,
    pub albums_removed: usize,
    pub artists_removed: usize,
    pub artwork_swept: usize,
    /// Tracks that left the catalog, whether deleted or quarantined.
    pub removed_track_ids: Vec<String>,
}

impl SyncReport {
    /// Number of catalog rows and artwork files written or removed.
    pub fn writes(&self) -> usize {
        self.quarantined
            + self.artists_created
            + self.albums_created
            + self.tracks_inserted
            + self.tracks_updated
            + self.tracks_removed
            + self.quarantine_removed
            + self.albums_removed
            + self.artists_removed
            + self.artwork_swept
    }
}

/// Runs one reconciliation pass over `conn`.
///
/// On success the catalog holds exactly the files the scan returned, each
/// either as a track or as a quarantined file, and readers have been told to
/// refresh.
///
/// # Errors
///
/// Fails without touching the catalog if the device cannot be scanned.
/// Database errors while reading the snapshot or resolving artists and
/// albums also abort the pass; the next pass continues from whatever was
/// committed. Failures on individual files never fail the pass.
pub fn sync_library(conn: &Connection, ctx: &SyncContext<'_>) -> Result<SyncReport, SyncError> {
    let start = Instant::now();
    let mut report = SyncReport::default();

    let files = ctx.scanner.scan()?;
    report.found = files.len();

    let snapshot = CatalogSnapshot::read(conn)?;
    let changes = classify::classify(&files, &snapshot);
    report.unmodified = changes.unmodified.len();
    report.new = changes.count(classify::Change::New);
    report.modified = changes.count(classify::Change::Modified);
    report.retried = changes.count(classify::Change::QuarantineRetry);
    info!(
        found = report.found,
        unmodified = report.unmodified,
        new = report.new,
        modified = report.modified,
        retried = report.retried,
        "classified device files"
    );

    let extraction_start = Instant::now();
    let batch = extract::extract_all(
        ctx.extractor,
        changes.pending,
        ctx.options.extraction_workers,
    );
    report.extraction_failures = batch.failed.len();
    debug!(
        succeeded = batch.succeeded.len(),
        failed = batch.failed.len(),
        took = ?extraction_start.elapsed(),
        "metadata extracted"
    );

    quarantine::quarantine_failures(conn, &batch.failed, ctx.artwork, &mut report);

    let albums = dimensions::upsert_dimensions(conn, &batch.succeeded, &snapshot, &mut report)?;
    tracks::upsert_tracks(
        conn,
        &batch.succeeded,
        &albums,
        &snapshot,
        ctx.artwork,
        &mut report,
    );

    let scanned: HashSet<String> = files.into_iter().map(|f| f.id).collect();
    cleanup::collect_garbage(conn, &scanned, ctx.artwork, &mut report)?;

    if !report.removed_track_ids.is_empty() {
        ctx.playback.notify_tracks_removed(&report.removed_track_ids);
    }

    if ctx.options.sweep_orphan_artwork {
        cleanup::sweep_orphan_artwork(conn, ctx.artwork, &mut report)?;
    }

    ctx.cache.invalidate_catalog_reads();

    info!(
        writes = report.writes(),
        quarantined = report.quarantined,
        removed = report.removed_track_ids.len(),
        took = ?start.elapsed(),
        "library synchronized"
    );

    Ok(report)
}

/// Releases an artwork file, logging instead of failing.
///
/// The row referring to the file is already gone when this runs, so a file
/// that cannot be released is at worst an orphan for the sweep to collect.
fn release_artwork(artwork: &dyn ArtworkStore, path: &str) {
    if let Err(e) = artwork.release_artwork(path) {
        warn!(%path, error = %e, "cannot release artwork");
    }
}
