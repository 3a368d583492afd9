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

//! Application configuration.
//!
//! This module manages the application configuration file.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{scan::ScanFilter, sync::SyncOptions};

const CONFIG_NAME: &str = "mediasync";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub version: u32,
    /// Directories scanned for audio files.
    pub media_dirs: Vec<String>,
    /// Directories under a media directory that are left out of the scan.
    pub block_dirs: Vec<String>,
    pub extensions: Vec<String>,
    /// Files shorter than this are ignored, 0 keeps everything.
    pub min_duration_seconds: i64,
    pub database_file: String,
    pub artwork_dir: String,
    pub extraction_workers: usize,
    pub sweep_orphan_artwork: bool,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let sync = SyncOptions::default();

        Self {
            version: 1,
            media_dirs: vec![],
            block_dirs: vec![],
            extensions: ["mp3", "flac", "ogg", "opus", "m4a", "wav"]
                .into_iter()
                .map(String::from)
                .collect(),
            min_duration_seconds: 0,
            database_file: "library.db".to_string(),
            artwork_dir: "artwork".to_string(),
            extraction_workers: sync.extraction_workers,
            sweep_orphan_artwork: sync.sweep_orphan_artwork,
            log_filter: "mediasync=info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            extraction_workers: self.extraction_workers,
            sweep_orphan_artwork: self.sweep_orphan_artwork,
        }
    }

    pub fn scan_filter(&self) -> ScanFilter {
        ScanFilter {
            block_dirs: self.block_dirs.iter().map(Into::into).collect(),
            extensions: self.extensions.clone(),
            min_duration_seconds: self.min_duration_seconds,
        }
    }
}

pub fn load_config() -> AppConfig {
    confy::load(CONFIG_NAME, None).unwrap_or_else(|e| {
        warn!(error = %e, "cannot load configuration, using defaults");
        AppConfig::default()
    })
}

pub fn save_config(cfg: &AppConfig) -> Result<(), confy::ConfyError> {
    confy::store(CONFIG_NAME, None, cfg)
}
