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

//! Error types shared by the library.
//!
//! Per-file extraction failures are modelled separately by
//! [`crate::model::ExtractionError`] since they are routed to the quarantine
//! rather than surfaced to the caller.

use std::{io, path::PathBuf};

use thiserror::Error;

/// The device file list could not be produced.
///
/// This is fatal to a reconciliation pass: nothing in the catalog is touched.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("media directory {0} does not exist")]
    MissingRoot(PathBuf),

    #[error("cannot walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("cannot read file attributes of {path}: {source}")]
    Attributes {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ArtworkError {
    #[error("artwork file {0} does not exist")]
    Missing(String),

    #[error("artwork storage failure: {0}")]
    Io(#[from] io::Error),
}

/// A reconciliation pass could not complete.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("device scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("database failure: {0}")]
    Database(#[from] rusqlite::Error),
}
