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

//! Change classification.
//!
//! Diffs the scanned files against the catalog snapshot. A file is only
//! considered changed when its modification time is strictly newer than the
//! one recorded, so an unchanged device produces no work at all and a
//! quarantined file is not re-read until it is modified again.

use std::collections::HashSet;

use tracing::warn;

use crate::{db::snapshot::CatalogSnapshot, model::DeviceFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// No record of the file exists.
    New,
    /// The file is catalogued and has been modified since.
    Modified,
    /// The file is quarantined and has been modified since.
    QuarantineRetry,
}

/// A file that needs its metadata read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub file: DeviceFile,
    pub change: Change,
}

#[derive(Debug, Default)]
pub struct ChangeSet {
    /// Ids of files that need no work.
    pub unmodified: Vec<String>,
    /// New, modified and quarantine-retry files, in scan order.
    pub pending: Vec<PendingFile>,
}

impl ChangeSet {
    pub fn count(&self, change: Change) -> usize {
        self.pending.iter().filter(|p| p.change == change).count()
    }
}

/// Sorts every scanned file into exactly one of the four change sets.
///
/// Should a file somehow be recorded both as a track and as quarantined, the
/// track record decides. A file id listed more than once is classified once,
/// by its first entry, so one pass can never write it to both sets.
pub fn classify(files: &[DeviceFile], snapshot: &CatalogSnapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();
    let mut seen = HashSet::new();

    for file in files {
        if !seen.insert(file.id.as_str()) {
            warn!(file_id = %file.id, uri = %file.uri, "ignoring duplicate device file");
            continue;
        }

        let change = if let Some(track) = snapshot.tracks.get(&file.id) {
            (file.modified_at > track.modified_at).then_some(Change::Modified)
        } else if let Some(quarantined) = snapshot.quarantined.get(&file.id) {
            (file.modified_at > quarantined.modified_at).then_some(Change::QuarantineRetry)
        } else {
            Some(Change::New)
        };

        match change {
            Some(change) => changes.pending.push(PendingFile {
                file: file.clone(),
                change,
            }),
            None => changes.unmodified.push(file.id.clone()),
        }
    }

    changes
}
