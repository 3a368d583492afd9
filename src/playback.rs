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

//! Playback queue state.
//!
//! This module provides the state a player keeps about which catalog tracks
//! are playing and queued. It reacts to catalog removals so that nothing
//! keeps pointing at a deleted track.

use std::{
    collections::{HashSet, VecDeque},
    sync::{Mutex, PoisonError},
};

use crate::events::PlaybackState;

#[derive(Debug, Default)]
struct Inner {
    /// The list the current track was started from, e.g. an album.
    track_list: Vec<String>,
    current: Option<String>,
    queued: VecDeque<String>,
}

/// Current track list, playing track and queue, by track id.
#[derive(Debug, Default)]
pub struct NowPlaying {
    inner: Mutex<Inner>,
}

impl NowPlaying {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts playing `track_id` out of `track_list`.
    pub fn play(&self, track_list: Vec<String>, track_id: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.track_list = track_list;
        inner.current = Some(track_id.to_string());
    }

    pub fn queue(&self, track_id: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.queued.push_back(track_id.to_string());
    }

    pub fn current(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.current.clone()
    }

    pub fn track_list(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.track_list.clone()
    }

    pub fn queued(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.queued.iter().cloned().collect()
    }
}

impl PlaybackState for NowPlaying {
    /// A track list that lost a member may no longer have a source (the
    /// album it came from can be gone), so it is reset as a whole. The queue
    /// only loses the removed entries.
    fn notify_tracks_removed(&self, ids: &[String]) {
        let ids_to_remove: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let list_affected = inner
            .track_list
            .iter()
            .chain(inner.current.iter())
            .any(|id| ids_to_remove.contains(id.as_str()));
        if list_affected {
            inner.track_list.clear();
            inner.current = None;
        }

        inner.queued.retain(|id| !ids_to_remove.contains(id.as_str()));
    }
}
