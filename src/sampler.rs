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

//! The sample playback engine.
//!
//! This module provides:
//! - The sample library: ingested records with trim/gain state, indexed by
//!   a recomputed active slot
//! - The per-tick playback state machine with sub-sample interpolation
//! - Click-free shaping of trim and gain from delta-only rotary controls
//! - A background loader thread with a real-time-safe hand-off channel
//! - Session persistence of `(path, start, end, gain)` per sample

mod engine;
mod library;
mod loader;
mod playback;
mod session;
mod shaper;

pub use engine::{ControlInputs, Sampler};
pub use library::{SampleLibrary, SampleRecord};
pub use loader::{LoadRequest, LoaderEvent, LoaderHandle};
pub use playback::PlaybackState;
pub use session::{SessionError, SessionSample, SessionState};
pub use shaper::LiveParameterShaper;
