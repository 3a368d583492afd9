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

//! Metadata extraction fan-out.
//!
//! Every pending file is read as an independent unit. Units are spread over
//! a handful of scoped worker threads that report each outcome back over a
//! channel; the join waits for all of them. One unit failing, or even
//! panicking, never affects its siblings.
//!
//! Workers only read files. All catalog writes happen afterwards on the
//! calling thread.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::mpsc,
    thread,
};

use tracing::warn;

use crate::{
    metadata::MetadataExtractor,
    model::{DeviceFile, ExtractionError, ExtractionErrorKind, Metadata},
    sync::classify::{Change, PendingFile},
};

#[derive(Debug, Clone)]
pub struct Extracted {
    pub file: DeviceFile,
    pub change: Change,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct Failed {
    pub file: DeviceFile,
    pub change: Change,
    pub error: ExtractionError,
}

/// Outcomes of a batch, partitioned and kept in the order files were given.
#[derive(Debug, Default)]
pub struct ExtractionBatch {
    pub succeeded: Vec<Extracted>,
    pub failed: Vec<Failed>,
}

type Outcome = Result<Metadata, ExtractionError>;

/// Reads the metadata of every pending file and partitions the results.
pub fn extract_all(
    extractor: &dyn MetadataExtractor,
    pending: Vec<PendingFile>,
    workers: usize,
) -> ExtractionBatch {
    if pending.is_empty() {
        return ExtractionBatch::default();
    }

    let chunk_size = pending.len().div_ceil(workers.max(1));
    let mut outcomes: Vec<Option<Outcome>> = (0..pending.len()).map(|_| None).collect();

    let (outcome_tx, outcome_rx) = mpsc::channel();
    thread::scope(|s| {
        for (chunk_index, chunk) in pending.chunks(chunk_size).enumerate() {
            let outcome_tx = outcome_tx.clone();
            s.spawn(move || {
                for (offset, item) in chunk.iter().enumerate() {
                    let outcome = extract_one(extractor, &item.file);
                    let _ = outcome_tx.send((chunk_index * chunk_size + offset, outcome));
                }
            });
        }
    });
    drop(outcome_tx);

    for (index, outcome) in outcome_rx {
        outcomes[index] = Some(outcome);
    }

    let mut batch = ExtractionBatch::default();
    for (PendingFile { file, change }, outcome) in pending.into_iter().zip(outcomes) {
        let outcome = outcome.unwrap_or_else(|| {
            Err(ExtractionError::new(
                &file.id,
                ExtractionErrorKind::Panicked,
                "extraction unit did not report",
            ))
        });

        match outcome {
            Ok(metadata) => batch.succeeded.push(Extracted {
                file,
                change,
                metadata,
            }),
            Err(error) => {
                warn!(file_id = %file.id, uri = %file.uri, %error, "metadata extraction failed");
                batch.failed.push(Failed {
                    file,
                    change,
                    error,
                });
            }
        }
    }

    batch
}

fn extract_one(extractor: &dyn MetadataExtractor, file: &DeviceFile) -> Outcome {
    panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(file))).unwrap_or_else(|_| {
        Err(ExtractionError::new(
            &file.id,
            ExtractionErrorKind::Panicked,
            "extraction panicked",
        ))
    })
}
