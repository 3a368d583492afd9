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

//! Catalog change notifications.
//!
//! The synchronization engine never talks to presentation code directly.
//! Instead it reports through two narrow collaborator traits:
//!
//! * [`CacheInvalidator`] - readers holding query results must refresh.
//! * [`PlaybackState`] - tracks were removed and must not stay queued.
//!
//! [`ChannelNotifier`] implements both by forwarding [`CatalogEvent`]s over
//! an `std::sync::mpsc` channel, so a consumer thread can react in its own
//! event loop.

use std::sync::mpsc::Sender;

use tracing::debug;

use crate::artwork::EnrichmentReport;

/// Invalidates cached catalog reads held by presentation code.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate_catalog_reads(&self);
}

/// In-memory "now playing" and queued state referencing catalog tracks.
pub trait PlaybackState: Send + Sync {
    /// The given track ids no longer exist in the catalog.
    fn notify_tracks_removed(&self, ids: &[String]);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    CatalogUpdated,
    TracksRemoved(Vec<String>),
    EnrichmentFinished(EnrichmentReport),
}

/// Forwards catalog notifications to an event channel.
///
/// Send failures are ignored: a consumer that hung up no longer holds
/// anything that needs refreshing.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    event_tx: Sender<CatalogEvent>,
}

impl ChannelNotifier {
    pub fn new(event_tx: Sender<CatalogEvent>) -> Self {
        Self { event_tx }
    }

    pub fn send(&self, event: CatalogEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("catalog event dropped, receiver has gone away");
        }
    }
}

impl CacheInvalidator for ChannelNotifier {
    fn invalidate_catalog_reads(&self) {
        self.send(CatalogEvent::CatalogUpdated);
    }
}

impl PlaybackState for ChannelNotifier {
    fn notify_tracks_removed(&self, ids: &[String]) {
        self.send(CatalogEvent::TracksRemoved(ids.to_vec()));
    }
}
