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

//! Point-in-time copy of the catalog a reconciliation pass diffs against.

use std::collections::HashMap;

use rusqlite::{Connection, Result};

use crate::{
    db::{ALBUM_COLUMNS, QUARANTINE_COLUMNS, TRACK_COLUMNS},
    model::{Album, QuarantinedTrack, Track},
};

/// Accepted tracks, quarantined files and albums as they were before the
/// current pass touched anything.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    pub tracks: HashMap<String, Track>,
    pub quarantined: HashMap<String, QuarantinedTrack>,
    pub albums: Vec<Album>,
}

impl CatalogSnapshot {
    /// Reads the full current state of the three persisted sets.
    pub fn read(conn: &Connection) -> Result<Self> {
        let mut stmt = conn.prepare_cached(&format!("SELECT {TRACK_COLUMNS} FROM tracks"))?;
        let tracks = stmt
            .query_map([], Track::from_row)?
            .map(|row| row.map(|t| (t.id.clone(), t)))
            .collect::<Result<HashMap<_, _>>>()?;

        let mut stmt =
            conn.prepare_cached(&format!("SELECT {QUARANTINE_COLUMNS} FROM quarantined_tracks"))?;
        let quarantined = stmt
            .query_map([], QuarantinedTrack::from_row)?
            .map(|row| row.map(|q| (q.id.clone(), q)))
            .collect::<Result<HashMap<_, _>>>()?;

        let mut stmt = conn.prepare_cached(&format!("SELECT {ALBUM_COLUMNS} FROM albums"))?;
        let albums = stmt
            .query_map([], Album::from_row)?
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tracks,
            quarantined,
            albums,
        })
    }
}
