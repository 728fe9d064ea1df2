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

//! Background ingestion worker.
//!
//! Decoding and resampling allocate and block on IO, so they must never run
//! on the audio thread. Requests go to a dedicated loader thread; finished
//! records come back over a channel the engine drains with `try_recv` at the
//! start of each tick. Records evicted on the audio thread travel the other
//! way on a trash channel and are dropped here, keeping buffer deallocation
//! off the real-time path as well.

use std::path::PathBuf;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use super::library::{directory_candidates, SampleRecord};

/// Work for the loader thread. Each request carries the engine rate so an
/// in-flight rate change cannot produce buffers at a stale rate.
#[derive(Clone, Debug)]
pub enum LoadRequest {
    /// Ingest a single file and append it to the library.
    File { path: PathBuf, rate: u32 },
    /// Replace the library with a directory's contents (destructive).
    Directory { path: PathBuf, rate: u32 },
    /// Re-ingest the given paths at a new engine rate.
    Reload { paths: Vec<PathBuf>, rate: u32 },
}

/// What the engine drains each tick.
#[derive(Debug)]
pub enum LoaderEvent {
    /// Empty the library before applying the records that follow.
    Cleared,
    /// A finished record ready to append.
    Loaded(SampleRecord),
}

/// The engine's side of the loader thread.
///
/// Cloning is cheap; a clone lets a host thread file requests while the
/// engine owns the event-draining side.
#[derive(Clone, Debug)]
pub struct LoaderHandle {
    request_tx: Sender<LoadRequest>,
    event_rx: Receiver<LoaderEvent>,
    trash_tx: Sender<SampleRecord>,
}

impl LoaderHandle {
    /// Spawns the loader thread and returns the handle connected to it.
    pub fn spawn() -> LoaderHandle {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<LoadRequest>();
        let (event_tx, event_rx) = crossbeam_channel::unbounded::<LoaderEvent>();
        let (trash_tx, trash_rx) = crossbeam_channel::unbounded::<SampleRecord>();

        // The worker exits when the last handle is dropped and its channels
        // disconnect; the JoinHandle is intentionally not kept.
        if let Err(e) = thread::Builder::new()
            .name("samplebox-loader".to_string())
            .spawn(move || worker(request_rx, event_tx, trash_rx))
        {
            warn!(error = %e, "Failed to spawn loader thread");
        }

        LoaderHandle {
            request_tx,
            event_rx,
            trash_tx,
        }
    }

    /// Files a request with the loader thread. Never blocks.
    pub fn request(&self, request: LoadRequest) {
        if self.request_tx.send(request).is_err() {
            warn!("Loader thread is gone; request dropped");
        }
    }

    /// Next finished event, if any. Never blocks: safe on the audio thread.
    pub fn try_next_event(&self) -> Option<LoaderEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Ships an evicted record to the loader thread for deallocation. Falls
    /// back to dropping in place if the thread is gone.
    pub fn discard(&self, record: SampleRecord) {
        let _ = self.trash_tx.send(record);
    }
}

fn worker(
    requests: Receiver<LoadRequest>,
    events: Sender<LoaderEvent>,
    trash: Receiver<SampleRecord>,
) {
    loop {
        crossbeam_channel::select! {
            recv(requests) -> request => match request {
                Ok(request) => handle_request(request, &events),
                Err(_) => break,
            },
            recv(trash) -> record => match record {
                Ok(record) => {
                    debug!(path = ?record.source_path(), "Dropping evicted sample buffer");
                    drop(record);
                }
                Err(_) => break,
            },
        }
    }
    debug!("Loader thread exiting");
}

fn handle_request(request: LoadRequest, events: &Sender<LoaderEvent>) {
    match request {
        LoadRequest::File { path, rate } => {
            ingest_one(&path, rate, events);
        }
        LoadRequest::Directory { path, rate } => {
            let paths = match directory_candidates(&path) {
                Ok(paths) => paths,
                Err(e) => {
                    warn!(dir = ?path, error = %e, "Failed to read sample directory");
                    return;
                }
            };
            // Destructive import: the engine empties the library on this
            // marker, then appends the records as they finish.
            let _ = events.send(LoaderEvent::Cleared);
            for path in paths {
                ingest_one(&path, rate, events);
            }
        }
        LoadRequest::Reload { paths, rate } => {
            let _ = events.send(LoaderEvent::Cleared);
            for path in paths {
                ingest_one(&path, rate, events);
            }
        }
    }
}

fn ingest_one(path: &std::path::Path, rate: u32, events: &Sender<LoaderEvent>) {
    match SampleRecord::ingest(path, rate) {
        Ok(record) => {
            let _ = events.send(LoaderEvent::Loaded(record));
        }
        Err(e) => warn!(path = ?path, error = %e, "Skipping file"),
    }
}
