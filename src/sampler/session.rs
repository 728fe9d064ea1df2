// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Session persistence: the sample list with trim and gain edits.
//!
//! Only paths and edits are stored, never audio data. Restoring replays
//! ingestion for each entry in order and then applies the stored edits to
//! the record created for that entry, clamped to whatever the file decodes
//! to today.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::library::SampleLibrary;

/// Error types for session save and restore.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Session file error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// One persisted sample: its source path and edits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSample {
    pub path: PathBuf,
    pub start: usize,
    pub end: usize,
    pub gain: f32,
}

/// The persisted library, in library order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub samples: Vec<SessionSample>,
}

impl SessionState {
    /// Captures the current library as session state.
    pub fn from_library(library: &SampleLibrary) -> Self {
        let samples = library
            .records()
            .iter()
            .map(|record| SessionSample {
                path: record.source_path().to_path_buf(),
                start: record.trim_start(),
                end: record.trim_end(),
                gain: record.gain(),
            })
            .collect();
        Self { samples }
    }

    /// Writes the session as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SessionError> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Reads a session from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SessionError> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Replays ingestion into the library and applies the stored edits.
    ///
    /// Entries whose file no longer decodes are logged and skipped; edits
    /// are applied to the record created for the same entry, so a failed
    /// file never shifts edits onto a neighbor. Stored trims are clamped to
    /// the freshly decoded buffer length. Returns the number of samples
    /// restored.
    pub fn restore(&self, library: &mut SampleLibrary) -> usize {
        let mut restored = 0;
        for sample in &self.samples {
            match library.load_file(&sample.path) {
                Ok(index) => {
                    if let Some(record) = library.get_mut(index) {
                        // End first, then start: each setter clamps against
                        // the other, so this order preserves the invariant
                        // whatever the stored values are.
                        record.set_trim_end(sample.end);
                        record.set_trim_start(sample.start);
                        record.set_gain(sample.gain);
                        restored += 1;
                    }
                }
                Err(e) => warn!(path = ?sample.path, error = %e, "Skipping session sample"),
            }
        }
        info!(restored, total = self.samples.len(), "Session restored");
        restored
    }
}
