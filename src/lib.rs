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

//! # Media library synchronization.
//!
//! Keeps a local SQLite catalog of artists, albums and tracks in line with
//! the audio files found on a device.
//!
//! * [`sync::sync_library`] reconciles the catalog with a fresh scan. Files
//!   whose tags cannot be read are quarantined until they change.
//! * [`artwork::ArtworkJob`] backfills cover artwork afterwards, once per
//!   process, resuming wherever an earlier run stopped.
//!
//! The engine talks to its surroundings only through traits: a
//! [`scan::DeviceScanner`], a [`metadata::MetadataExtractor`], an
//! [`artwork::ArtworkStore`] and the collaborators in [`events`].

pub mod artwork;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod metadata;
pub mod model;
pub mod playback;
pub mod scan;
pub mod sync;

pub use error::{ArtworkError, ScanError, SyncError};
pub use sync::{SyncContext, SyncOptions, SyncReport, sync_library};
