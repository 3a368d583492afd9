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

//! # Media library synchronizer.
//!
//! Brings the catalog database in line with the configured media
//! directories, then backfills cover artwork in the background.
//!
//! ## Architecture
//!
//! The main thread runs the reconciliation pass and then drains the catalog
//! event channel. The artwork worker owns its own database connection and
//! reports back over the same channel; the program exits once every sender
//! has hung up.

use std::{
    fs,
    path::PathBuf,
    sync::{Arc, mpsc},
};

use anyhow::{Context, Result, bail};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mediasync::{
    SyncContext,
    artwork::{ArtworkJob, FsArtworkStore},
    config::{self, AppConfig},
    db,
    events::{CatalogEvent, ChannelNotifier, PlaybackState},
    metadata::LoftyExtractor,
    playback::NowPlaying,
    scan::FsScanner,
    sync_library,
};

/// The entry point of the application.
///
/// # Errors
///
/// Returns an error if no media directory is configured, if the database
/// cannot be opened, or if the device cannot be scanned.
fn main() -> Result<()> {
    let config = config::load_config();
    configure_logging(&config);

    if config.media_dirs.is_empty() {
        bail!("No media directories configured");
    }

    fs::create_dir_all(&config.artwork_dir)
        .with_context(|| format!("Failed to create artwork directory {}", config.artwork_dir))?;

    let conn = db::init_db(&config.database_file).context("Failed to initialise database")?;

    let (event_tx, event_rx) = mpsc::channel();
    let notifier = ChannelNotifier::new(event_tx);

    let scanner = FsScanner::new(
        config.media_dirs.iter().map(PathBuf::from).collect(),
        config.scan_filter(),
    );
    let extractor = Arc::new(LoftyExtractor::new());
    let artwork = Arc::new(FsArtworkStore::new(&config.artwork_dir));

    let ctx = SyncContext {
        scanner: &scanner,
        extractor: extractor.as_ref(),
        artwork: artwork.as_ref(),
        playback: &notifier,
        cache: &notifier,
        options: config.sync_options(),
    };

    let report = sync_library(&conn, &ctx).context("Library synchronization failed")?;
    let counts = db::catalog_counts(&conn)?;
    info!(
        artists = counts.artists,
        albums = counts.albums,
        tracks = counts.tracks,
        quarantined = counts.quarantined,
        writes = report.writes(),
        "library ready"
    );

    let job = ArtworkJob::new();
    let worker = job.spawn(
        PathBuf::from(&config.database_file),
        extractor,
        artwork,
        notifier.clone(),
    );
    drop(notifier);

    let now_playing = NowPlaying::new();
    for event in event_rx {
        match event {
            CatalogEvent::CatalogUpdated => debug!("catalog reads invalidated"),
            CatalogEvent::TracksRemoved(ids) => {
                info!(count = ids.len(), "tracks removed from catalog");
                now_playing.notify_tracks_removed(&ids);
            }
            CatalogEvent::EnrichmentFinished(enrichment) => {
                info!(
                    saved = enrichment.saved,
                    failed = enrichment.failed,
                    "artwork ready"
                );
            }
        }
    }

    if let Some(worker) = worker {
        if worker.join().is_err() {
            error!("artwork worker panicked");
        }
    }

    if report.quarantined > 0 {
        warn!(count = report.quarantined, "some files could not be read and were skipped");
    }

    Ok(())
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter.
fn configure_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_names(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
