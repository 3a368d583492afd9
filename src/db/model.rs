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

//! Database row mapping for domain models.
//!
//! This module provides the conversion logic between raw SQLite result rows
//! and high-level domain models. Column order follows the `*_COLUMNS`
//! constants in the parent module.

use rusqlite::{
    Result, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};

use crate::model::{Album, ExtractionErrorKind, QuarantinedTrack, Track};

impl Track {
    /// Maps an SQLite row selected with `TRACK_COLUMNS` to a [`Track`].
    ///
    /// This is a helper function designed to be used with [`rusqlite::Statement::query_map`].
    ///
    /// # Errors
    ///
    /// Returns a [`rusqlite::Error`] if:
    /// * The row does not contain enough columns.
    /// * The data in a column cannot be converted to the required Rust type.
    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            artist_name: row.get(1)?,
            album_id: row.get(2)?,
            name: row.get(3)?,
            artwork: row.get(4)?,
            track_number: row.get(5)?,
            duration_seconds: row.get(6)?,
            is_favorite: row.get(7)?,
            uri: row.get(8)?,
            modified_at: row.get(9)?,
            artwork_fetched: row.get(10)?,
        })
    }
}

impl Album {
    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            artist_name: row.get(2)?,
            release_year: row.get(3)?,
            artwork: row.get(4)?,
            is_favorite: row.get(5)?,
        })
    }
}

impl QuarantinedTrack {
    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            uri: row.get(1)?,
            modified_at: row.get(2)?,
            error_kind: row.get(3)?,
            error_message: row.get(4)?,
        })
    }
}

impl ToSql for ExtractionErrorKind {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ExtractionErrorKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        ExtractionErrorKind::parse(value.as_str()?).ok_or(FromSqlError::InvalidType)
    }
}
