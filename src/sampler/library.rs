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

//! The sample library: ingested records and the active selection.
//!
//! Records are referenced by index only, never by pointer, so library growth
//! can never invalidate the active selection. The active index is recomputed
//! from the selector control every tick and re-clamped on removal.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::audio::{decode, resample, DecodeError, StereoFrame};

/// One ingested sample: the resampled stereo buffer plus trim and gain state.
#[derive(Clone, Debug)]
pub struct SampleRecord {
    source_path: PathBuf,
    native_channels: u16,
    native_rate: u32,
    native_frames: usize,
    buffer: Vec<StereoFrame>,
    trim_start: usize,
    trim_end: usize,
    gain: f32,
}

impl SampleRecord {
    /// Decodes a file and resamples it to `target_rate`, producing a record
    /// with default trim (the whole buffer) and unity gain.
    ///
    /// When the file is already at the target rate the decoded buffer is
    /// adopted as-is; otherwise it is run through the sinc resampler.
    pub fn ingest<P: AsRef<Path>>(path: P, target_rate: u32) -> Result<SampleRecord, DecodeError> {
        let path = path.as_ref();
        let decoded = decode::decode_file(path)?;
        let native_frames = decoded.frame_count();

        let buffer = if decoded.sample_rate == target_rate {
            decoded.frames
        } else {
            resample::resample(&decoded.frames, decoded.sample_rate, target_rate)?
        };

        info!(
            path = ?path,
            channels = decoded.channels,
            native_rate = decoded.sample_rate,
            native_frames,
            buffer_frames = buffer.len(),
            "Sample loaded"
        );

        Ok(Self::from_buffer(
            path.to_path_buf(),
            buffer,
            decoded.channels,
            decoded.sample_rate,
            native_frames,
        ))
    }

    pub(crate) fn from_buffer(
        source_path: PathBuf,
        buffer: Vec<StereoFrame>,
        native_channels: u16,
        native_rate: u32,
        native_frames: usize,
    ) -> Self {
        let trim_end = buffer.len();
        Self {
            source_path,
            native_channels,
            native_rate,
            native_frames,
            buffer,
            trim_start: 0,
            trim_end,
            gain: 1.0,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn native_channels(&self) -> u16 {
        self.native_channels
    }

    pub fn native_rate(&self) -> u32 {
        self.native_rate
    }

    pub fn native_frames(&self) -> usize {
        self.native_frames
    }

    pub fn buffer(&self) -> &[StereoFrame] {
        &self.buffer
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// First frame of the trim window.
    pub fn trim_start(&self) -> usize {
        self.trim_start
    }

    /// One past the last playable frame of the trim window.
    pub fn trim_end(&self) -> usize {
        self.trim_end
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Moves the trim start, clamped to `[0, trim_end]`.
    pub fn set_trim_start(&mut self, frame: usize) {
        self.trim_start = frame.min(self.trim_end);
    }

    /// Moves the trim end, clamped to `[trim_start, buffer_len]`.
    pub fn set_trim_end(&mut self, frame: usize) {
        self.trim_end = frame.clamp(self.trim_start, self.buffer.len());
    }

    /// Sets the per-sample gain, clamped to `[0.0, 2.0]`.
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 2.0);
    }
}

/// An ordered collection of samples with one active slot.
#[derive(Debug)]
pub struct SampleLibrary {
    records: Vec<SampleRecord>,
    active: Option<usize>,
    target_rate: u32,
}

impl SampleLibrary {
    /// Creates an empty library whose buffers will be kept at `target_rate`.
    pub fn new(target_rate: u32) -> Self {
        Self {
            records: Vec::new(),
            active: None,
            target_rate,
        }
    }

    /// The rate every buffer in the library is resampled to.
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Changes the target rate without touching existing buffers. Used by
    /// the engine when a reload is in flight on the loader thread; callers
    /// doing synchronous ingestion should use [`SampleLibrary::reload_all`].
    pub fn set_target_rate(&mut self, rate: u32) {
        self.target_rate = rate;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&SampleRecord> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut SampleRecord> {
        self.records.get_mut(index)
    }

    /// Decodes a file and appends it to the library. Returns the new index.
    ///
    /// On failure nothing is retained: no record is added and the partial
    /// decode buffer is dropped.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, DecodeError> {
        let record = SampleRecord::ingest(path, self.target_rate)?;
        Ok(self.push_record(record))
    }

    /// Appends an already-ingested record (the loader hand-off path).
    pub fn push_record(&mut self, record: SampleRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    /// Replaces the library with the contents of a directory.
    ///
    /// Destructive: the existing library is cleared before import. Only
    /// regular files are considered (symlinks and subdirectories are
    /// skipped); files that fail to decode are logged and skipped. Records
    /// end up ordered lexicographically by path, since directory enumeration
    /// order is filesystem-dependent.
    ///
    /// Returns the number of samples loaded.
    pub fn load_directory<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize, DecodeError> {
        let dir = dir.as_ref();
        let paths = directory_candidates(dir)?;

        self.clear();

        let mut loaded = 0;
        for path in &paths {
            match self.load_file(path) {
                Ok(_) => loaded += 1,
                Err(e) => warn!(path = ?path, error = %e, "Skipping file"),
            }
        }

        info!(dir = ?dir, loaded, skipped = paths.len() - loaded, "Directory imported");
        Ok(loaded)
    }

    /// Removes the record at `index`, returning it so the caller can decide
    /// where to drop the buffer (the engine ships it off the audio thread).
    ///
    /// The active index is re-clamped: removing the active record moves the
    /// selection to `min(index, len - 1)`; removing a record below it shifts
    /// it down; an emptied library has no selection.
    pub fn remove(&mut self, index: usize) -> Option<SampleRecord> {
        if index >= self.records.len() {
            return None;
        }
        let record = self.records.remove(index);

        self.active = if self.records.is_empty() {
            None
        } else {
            match self.active {
                Some(active) if active == index => Some(index.min(self.records.len() - 1)),
                Some(active) if active > index => Some(active - 1),
                other => other,
            }
        };

        Some(record)
    }

    /// Drops the selection and drains every record out of the library.
    pub fn clear(&mut self) -> Vec<SampleRecord> {
        self.active = None;
        std::mem::take(&mut self.records)
    }

    /// Re-ingests every sample at a new engine rate.
    ///
    /// Captures the ordered list of source paths, drops all buffers, and
    /// reloads each path. Trim and gain are reset to defaults: edits do not
    /// survive a rate change. Files that no longer decode are skipped.
    pub fn reload_all(&mut self, new_rate: u32) {
        let paths: Vec<PathBuf> = self
            .records
            .iter()
            .map(|r| r.source_path().to_path_buf())
            .collect();

        info!(count = paths.len(), new_rate, "Reloading library at new sample rate");

        self.target_rate = new_rate;
        self.clear();
        for path in paths {
            if let Err(e) = self.load_file(&path) {
                warn!(path = ?path, error = %e, "Failed to reload sample");
            }
        }
    }

    /// Recomputes the active slot from a continuous selector in `[0, 1]`.
    ///
    /// Out-of-range values clamp; an empty library has no active slot.
    pub fn select(&mut self, selector: f32) -> Option<usize> {
        self.active = if self.records.is_empty() {
            None
        } else {
            let position = selector.clamp(0.0, 1.0) * (self.records.len() - 1) as f32;
            Some(position.round() as usize)
        };
        self.active
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&SampleRecord> {
        self.active.and_then(|i| self.records.get(i))
    }

    pub fn active_mut(&mut self) -> Option<&mut SampleRecord> {
        match self.active {
            Some(i) => self.records.get_mut(i),
            None => None,
        }
    }
}

/// Lists the regular files in a directory, sorted lexicographically.
/// Symlinks and subdirectories are skipped. Decode candidates only; whether
/// each file is actually audio is decided by the decoder.
pub(crate) fn directory_candidates(dir: &Path) -> Result<Vec<PathBuf>, DecodeError> {
    let entries = std::fs::read_dir(dir)?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if !file_type.is_file() {
            debug!(path = ?entry.path(), "Skipping non-regular file");
            continue;
        }
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}
