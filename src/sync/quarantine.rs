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

//! Quarantine of files whose metadata could not be read.
//!
//! A quarantined file carries the modification time it failed with, so the
//! next pass classifies it as unmodified and does not read it again until
//! the file itself changes.

use rusqlite::{Connection, Result, params};
use tracing::warn;

use crate::{
    artwork::ArtworkStore,
    db,
    sync::{SyncReport, classify::Change, extract::Failed, release_artwork},
};

/// Records every failed extraction in the quarantine.
///
/// A failure on a file that was a valid track first removes that track,
/// so the file is never catalogued and quarantined at the same time. Each
/// failure is handled on its own; a database error is logged and the file
/// is left for the next pass to retry.
pub(crate) fn quarantine_failures(
    conn: &Connection,
    failed: &[Failed],
    artwork: &dyn ArtworkStore,
    report: &mut SyncReport,
) {
    for failure in failed {
        match quarantine(conn, failure) {
            Ok(removed_artwork) => {
                report.quarantined += 1;
                if failure.change == Change::Modified {
                    report.removed_track_ids.push(failure.file.id.clone());
                }
                if let Some(path) = removed_artwork {
                    release_artwork(artwork, &path);
                }
            }
            Err(e) => {
                warn!(file_id = %failure.file.id, error = %e, "cannot quarantine file");
            }
        }
    }
}

/// Returns the artwork path of the track row that was removed, if any.
fn quarantine(conn: &Connection, failure: &Failed) -> Result<Option<String>> {
    let file = &failure.file;
    let tx = conn.unchecked_transaction()?;

    let removed_artwork = if failure.change == Change::Modified {
        db::delete_track(&tx, &file.id)?
    } else {
        None
    };

    let sql = "
        INSERT INTO quarantined_tracks (id, uri, modified_at, error_kind, error_message)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT (id) DO UPDATE SET
            uri = excluded.uri,
            modified_at = excluded.modified_at,
            error_kind = excluded.error_kind,
            error_message = excluded.error_message";

    tx.prepare_cached(sql)?.execute(params![
        file.id,
        file.uri,
        file.modified_at,
        failure.error.kind,
        failure.error.message,
    ])?;

    tx.commit()?;

    Ok(removed_artwork)
}
