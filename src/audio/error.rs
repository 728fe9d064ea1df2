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
use std::path::PathBuf;

/// Error types for sample ingestion.
///
/// A decode failure only ever aborts the offending file: no record is added
/// and no partial buffer is retained.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Audio file error: {0}")]
    AudioError(#[from] symphonia::core::errors::Error),

    #[error("No decodable audio track in {0:?}")]
    NoAudioTrack(PathBuf),

    #[error("Sample rate not specified in {0:?}")]
    UnknownSampleRate(PathBuf),

    #[error("Short read in {path:?}: header declares {declared} frames, decoded {decoded}")]
    ShortRead {
        path: PathBuf,
        declared: u64,
        decoded: u64,
    },

    #[error("Resampling failed: {0}Hz -> {1}Hz")]
    ResamplingFailed(u32, u32),
}
