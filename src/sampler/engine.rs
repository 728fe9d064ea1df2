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

//! The per-tick engine: control routing, playback, and the post filter.
//!
//! `Sampler::process` is called once per audio frame on the real-time
//! thread. It never blocks and never performs IO; ingestion happens on the
//! loader thread and finished records are adopted here via the hand-off
//! channel at the start of each tick.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::audio::filter::{FilterMode, PostFilter};
use crate::audio::StereoFrame;

use super::library::SampleLibrary;
use super::loader::{LoadRequest, LoaderEvent, LoaderHandle};
use super::playback::PlaybackState;
use super::shaper::LiveParameterShaper;

// Cutoff ranges for the sweepable post filter. The filter control sweeps
// low-pass up to the middle of its travel and high-pass above it.
const LP_MIN_FREQ: f32 = 30.0;
const LP_MAX_FREQ: f32 = 16000.0;
const HP_MIN_FREQ: f32 = 50.0;
const HP_MAX_FREQ: f32 = 16000.0;

/// One tick of host-provided control values, already debounced and scaled
/// to engine ranges by the host.
#[derive(Clone, Copy, Debug)]
pub struct ControlInputs {
    /// Pitch in octaves, -3..3 once CV is mixed in.
    pub pitch: f32,
    pub pitch_cv: f32,
    pub pitch_att: f32,
    /// Master gain, 0..1.
    pub gain: f32,
    pub gain_cv: f32,
    pub gain_att: f32,
    /// Filter sweep, 0..1; 0.5 is neutral (no filtering).
    pub filter: f32,
    pub filter_cv: f32,
    pub filter_att: f32,
    pub filter_q: f32,
    /// Sample selector, 0..1 across the library.
    pub select: f32,
    pub select_cv: f32,
    pub select_att: f32,
    /// Trigger gate signal.
    pub gate: f32,
    /// Reverse toggle button and gate input; either rising edge toggles.
    pub reverse_button: f32,
    pub reverse_gate: f32,
    /// Removes the active sample on a rising edge.
    pub remove_button: f32,
    /// Delta-only rotary encoders shaping the active sample.
    pub trim_start: f32,
    pub trim_end: f32,
    pub sample_gain: f32,
}

impl Default for ControlInputs {
    fn default() -> Self {
        Self {
            pitch: 0.0,
            pitch_cv: 0.0,
            pitch_att: 0.0,
            gain: 1.0,
            gain_cv: 0.0,
            gain_att: 0.0,
            filter: 0.5,
            filter_cv: 0.0,
            filter_att: 0.0,
            filter_q: 0.8,
            select: 0.0,
            select_cv: 0.0,
            select_att: 0.0,
            gate: 0.0,
            reverse_button: 0.0,
            reverse_gate: 0.0,
            remove_button: 0.0,
            trim_start: 0.0,
            trim_end: 0.0,
            sample_gain: 0.0,
        }
    }
}

/// Rising-edge detector with hysteresis for gate and button signals.
#[derive(Clone, Copy, Debug, Default)]
struct GateTrigger {
    high: bool,
}

impl GateTrigger {
    const LOW: f32 = 0.1;
    const HIGH: f32 = 1.0;

    /// Returns true exactly once per rising edge.
    fn process(&mut self, value: f32) -> bool {
        if self.high {
            if value <= Self::LOW {
                self.high = false;
            }
            false
        } else if value >= Self::HIGH {
            self.high = true;
            true
        } else {
            false
        }
    }
}

/// The sample playback engine.
pub struct Sampler {
    sample_rate: u32,
    library: SampleLibrary,
    shaper: LiveParameterShaper,
    state: PlaybackState,
    reverse: bool,
    gate: GateTrigger,
    reverse_button: GateTrigger,
    reverse_gate: GateTrigger,
    remove_button: GateTrigger,
    filter: PostFilter,
    loader: LoaderHandle,
}

impl Sampler {
    /// Creates an engine running at the given sample rate, with its loader
    /// thread already started.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            library: SampleLibrary::new(sample_rate),
            shaper: LiveParameterShaper::new(),
            state: PlaybackState::Idle,
            reverse: false,
            gate: GateTrigger::default(),
            reverse_button: GateTrigger::default(),
            reverse_gate: GateTrigger::default(),
            remove_button: GateTrigger::default(),
            filter: PostFilter::new(sample_rate),
            loader: LoaderHandle::spawn(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn library(&self) -> &SampleLibrary {
        &self.library
    }

    /// Direct library access for host-side setup (session restore,
    /// synchronous ingestion). Not for use from the audio thread.
    pub fn library_mut(&mut self) -> &mut SampleLibrary {
        &mut self.library
    }

    /// A clone of the loader handle, letting host threads file load
    /// requests while the engine runs.
    pub fn loader_handle(&self) -> LoaderHandle {
        self.loader.clone()
    }

    /// True when the playback cursor is running.
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    /// True when reverse playback is toggled on.
    pub fn reverse(&self) -> bool {
        self.reverse
    }

    /// Asks the loader thread to ingest a file and append it.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) {
        self.loader.request(LoadRequest::File {
            path: path.as_ref().to_path_buf(),
            rate: self.sample_rate,
        });
    }

    /// Asks the loader thread to replace the library with a directory's
    /// contents. Destructive, like the library operation it feeds.
    pub fn load_directory<P: AsRef<Path>>(&self, path: P) {
        self.loader.request(LoadRequest::Directory {
            path: path.as_ref().to_path_buf(),
            rate: self.sample_rate,
        });
    }

    /// Moves the engine to a new sample rate.
    ///
    /// Every retained path is re-ingested on the loader thread at the new
    /// rate; trim and gain edits are reset by the reload (documented
    /// behavior). Playback goes idle until the reloaded buffers arrive.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate == self.sample_rate {
            return;
        }
        self.sample_rate = sample_rate;
        self.library.set_target_rate(sample_rate);
        self.filter.set_sample_rate(sample_rate);
        self.state = PlaybackState::Idle;

        let paths: Vec<PathBuf> = self
            .library
            .records()
            .iter()
            .map(|r| r.source_path().to_path_buf())
            .collect();
        if !paths.is_empty() {
            self.loader.request(LoadRequest::Reload {
                paths,
                rate: sample_rate,
            });
        }
    }

    /// Produces one output frame. Called once per tick on the audio thread;
    /// no blocking, no IO.
    pub fn process(&mut self, controls: &ControlInputs) -> StereoFrame {
        self.drain_loader_events();

        // Toggles and the remove button act on rising edges.
        let reverse_edge = self.reverse_button.process(controls.reverse_button);
        let reverse_gate_edge = self.reverse_gate.process(controls.reverse_gate);
        if reverse_edge || reverse_gate_edge {
            self.reverse = !self.reverse;
        }
        if self.remove_button.process(controls.remove_button) {
            self.remove_active();
        }

        // The pitch control is exponential: one unit is one octave. Reverse
        // is a sign flip on the same scalar.
        let pitch = (controls.pitch + controls.pitch_cv * controls.pitch_att * 3.0 / 5.0)
            .clamp(-3.0, 3.0);
        let mut speed = 2.0_f32.powf(pitch);
        if self.reverse {
            speed = -speed;
        }

        let master_gain = (controls.gain + controls.gain_cv * controls.gain_att / 5.0)
            .clamp(0.0, 1.0);

        // Shape trim/gain against last tick's selection, then recompute the
        // active slot from the selector.
        self.shaper.apply(
            self.library.active_mut(),
            controls.trim_start,
            controls.trim_end,
            controls.sample_gain,
        );
        let selector = controls.select + controls.select_att * controls.select_cv / 5.0;
        self.library.select(selector);

        let gate_edge = self.gate.process(controls.gate);

        let record = match self.library.active() {
            Some(record) => record,
            // Empty library or no selection: exact silence, state untouched.
            None => return StereoFrame::ZERO,
        };

        if gate_edge {
            self.state = PlaybackState::trigger(record, self.reverse);
        }

        let frame = self.state.advance(record, speed);
        let record_gain = record.gain();

        // Filter sweep: below the midpoint low-pass, above it high-pass,
        // dead center bypasses entirely.
        let filter_position = (controls.filter + controls.filter_cv * controls.filter_att / 5.0)
            .clamp(0.0, 1.0)
            * 2.0;
        let frame = if filter_position != 1.0 {
            let q = controls.filter_q;
            if filter_position > 1.0 {
                let freq = HP_MIN_FREQ * (HP_MAX_FREQ / HP_MIN_FREQ).powf(filter_position - 1.0);
                self.filter.set_cutoff(freq, q, FilterMode::HighPass);
            } else {
                let freq = LP_MIN_FREQ * (LP_MAX_FREQ / LP_MIN_FREQ).powf(filter_position);
                self.filter.set_cutoff(freq, q, FilterMode::LowPass);
            }
            self.filter.process(frame)
        } else {
            frame
        };

        frame.scaled(master_gain * record_gain)
    }

    /// Adopts finished loader work. Buffer moves only; the decode already
    /// happened on the loader thread.
    fn drain_loader_events(&mut self) {
        while let Some(event) = self.loader.try_next_event() {
            match event {
                LoaderEvent::Cleared => {
                    self.state = PlaybackState::Idle;
                    for record in self.library.clear() {
                        self.loader.discard(record);
                    }
                }
                LoaderEvent::Loaded(record) => {
                    self.library.push_record(record);
                }
            }
        }
    }

    /// Removes the active record, shipping its buffer to the loader thread
    /// for deallocation.
    fn remove_active(&mut self) {
        if let Some(index) = self.library.active_index() {
            if let Some(record) = self.library.remove(index) {
                debug!(path = ?record.source_path(), "Sample removed");
                self.loader.discard(record);
            }
        }
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("sample_rate", &self.sample_rate)
            .field("samples", &self.library.len())
            .field("playing", &self.is_playing())
            .field("reverse", &self.reverse)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::library::SampleRecord;
    use crate::testutil;
    use std::path::PathBuf;

    fn constant_record(name: &str, frames: usize, value: f32) -> SampleRecord {
        SampleRecord::from_buffer(
            PathBuf::from(name),
            vec![StereoFrame::new(value, -value); frames],
            2,
            44100,
            frames,
        )
    }

    fn ramp_record(name: &str, frames: usize) -> SampleRecord {
        let buffer = (0..frames)
            .map(|i| StereoFrame::new(i as f32, -(i as f32)))
            .collect();
        SampleRecord::from_buffer(PathBuf::from(name), buffer, 2, 44100, frames)
    }

    /// Runs one tick with the gate high, then returns the controls to a
    /// held-gate state for subsequent ticks.
    fn trigger(sampler: &mut Sampler, controls: &mut ControlInputs) -> StereoFrame {
        controls.gate = 1.0;
        sampler.process(controls)
    }

    #[test]
    fn test_empty_library_is_silent() {
        let mut sampler = Sampler::new(44100);
        let mut controls = ControlInputs::default();
        assert_eq!(sampler.process(&controls), StereoFrame::ZERO);
        // Even with the gate firing.
        controls.gate = 1.0;
        assert_eq!(sampler.process(&controls), StereoFrame::ZERO);
    }

    #[test]
    fn test_forward_playback_runs_to_trim_end() {
        let mut sampler = Sampler::new(44100);
        sampler
            .library_mut()
            .push_record(ramp_record("a.wav", 1000));
        sampler
            .library_mut()
            .push_record(constant_record("b.wav", 500, 0.25));

        let mut controls = ControlInputs {
            select: 1.0, // slot B
            ..Default::default()
        };

        let first = trigger(&mut sampler, &mut controls);
        assert!(sampler.is_playing());
        assert!((first.left - 0.25).abs() < 1e-6);

        // 499 more sounding ticks, then exact silence.
        for tick in 1..500 {
            let frame = sampler.process(&controls);
            assert!((frame.left - 0.25).abs() < 1e-6, "tick {}", tick);
            assert!((frame.right + 0.25).abs() < 1e-6, "tick {}", tick);
        }
        assert_eq!(sampler.process(&controls), StereoFrame::ZERO);
        assert!(!sampler.is_playing());
    }

    #[test]
    fn test_reverse_playback_decreasing_cursor() {
        let mut sampler = Sampler::new(44100);
        sampler
            .library_mut()
            .push_record(ramp_record("ramp.wav", 300));
        {
            let record = sampler.library_mut().get_mut(0).unwrap();
            record.set_trim_end(200);
            record.set_trim_start(10);
        }

        let mut controls = ControlInputs::default();

        // Toggle reverse with a button edge before triggering.
        controls.reverse_button = 1.0;
        sampler.process(&controls);
        controls.reverse_button = 0.0;
        assert!(sampler.reverse());

        let first = trigger(&mut sampler, &mut controls);
        // Initial phase is trim_end - 1 = 199; the first tick reads 198.
        assert!((first.left - 198.0).abs() < 1e-6);

        let mut previous = first.left;
        for tick in 1..190 {
            let frame = sampler.process(&controls);
            assert!(frame.left < previous, "tick {}", tick);
            previous = frame.left;
        }
        assert_eq!(sampler.process(&controls), StereoFrame::ZERO);
        assert!(!sampler.is_playing());
    }

    #[test]
    fn test_zero_length_window_goes_idle() {
        let mut sampler = Sampler::new(44100);
        sampler
            .library_mut()
            .push_record(ramp_record("ramp.wav", 100));
        {
            let record = sampler.library_mut().get_mut(0).unwrap();
            record.set_trim_end(50);
            record.set_trim_start(50);
        }

        let mut controls = ControlInputs::default();
        assert_eq!(trigger(&mut sampler, &mut controls), StereoFrame::ZERO);
        assert!(!sampler.is_playing());
    }

    #[test]
    fn test_pitch_control_is_exponential() {
        let mut sampler = Sampler::new(44100);
        sampler
            .library_mut()
            .push_record(ramp_record("ramp.wav", 1000));

        let mut controls = ControlInputs {
            pitch: 1.0, // one octave up: speed 2.0
            ..Default::default()
        };
        let first = trigger(&mut sampler, &mut controls);
        assert!((first.left - 2.0).abs() < 1e-6);

        let second = sampler.process(&controls);
        assert!((second.left - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_gain_staging_multiplies_master_and_record() {
        let mut sampler = Sampler::new(44100);
        sampler
            .library_mut()
            .push_record(constant_record("c.wav", 100, 0.5));
        sampler.library_mut().get_mut(0).unwrap().set_gain(1.5);

        let mut controls = ControlInputs {
            gain: 0.5,
            ..Default::default()
        };
        let frame = trigger(&mut sampler, &mut controls);
        assert!((frame.left - 0.5 * 1.5 * 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_retrigger_resets_cursor() {
        let mut sampler = Sampler::new(44100);
        sampler
            .library_mut()
            .push_record(ramp_record("ramp.wav", 1000));

        let mut controls = ControlInputs::default();
        trigger(&mut sampler, &mut controls);
        for _ in 0..100 {
            sampler.process(&controls);
        }

        // Drop the gate, then raise it again: the cursor restarts.
        controls.gate = 0.0;
        sampler.process(&controls);
        let first = trigger(&mut sampler, &mut controls);
        assert!((first.left - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_remove_button_removes_active_sample() {
        let mut sampler = Sampler::new(44100);
        sampler
            .library_mut()
            .push_record(constant_record("a.wav", 100, 0.1));
        sampler
            .library_mut()
            .push_record(constant_record("b.wav", 100, 0.2));

        let mut controls = ControlInputs::default();
        sampler.process(&controls); // selects slot 0
        controls.remove_button = 1.0;
        sampler.process(&controls);
        controls.remove_button = 0.0;

        assert_eq!(sampler.library().len(), 1);
        assert!(sampler
            .library()
            .get(0)
            .unwrap()
            .source_path()
            .ends_with("b.wav"));
    }

    #[test]
    fn test_highpass_filter_removes_constant_signal() {
        let mut sampler = Sampler::new(44100);
        sampler
            .library_mut()
            .push_record(constant_record("dc.wav", 5000, 0.5));

        // Full filter sweep: high-pass at the top of its range.
        let mut controls = ControlInputs {
            filter: 1.0,
            ..Default::default()
        };
        trigger(&mut sampler, &mut controls);
        let mut last = f32::MAX;
        for _ in 0..200 {
            last = sampler.process(&controls).left.abs();
        }
        assert!(last < 0.05, "high-pass leaked DC: {}", last);
    }

    #[test]
    fn test_neutral_filter_is_bypass() {
        let mut sampler = Sampler::new(44100);
        sampler
            .library_mut()
            .push_record(constant_record("dc.wav", 100, 0.5));

        let mut controls = ControlInputs::default();
        let frame = trigger(&mut sampler, &mut controls);
        assert!((frame.left - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_loader_integration_appends_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hit.wav");
        testutil::write_wav_f32(&path, &[testutil::sine(220.0, 44100, 128)], 44100)
            .expect("write wav");

        let mut sampler = Sampler::new(44100);
        sampler.load_file(&path);

        let controls = ControlInputs::default();
        testutil::eventually(
            || {
                sampler.process(&controls);
                sampler.library().len() == 1
            },
            "loaded record never reached the engine",
        );
        assert_eq!(sampler.library().get(0).unwrap().buffer_len(), 128);
    }

    #[test]
    fn test_set_sample_rate_reloads_retained_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("hit.wav");
        testutil::write_wav_f32(&path, &[testutil::sine(220.0, 22050, 100)], 22050)
            .expect("write wav");

        let mut sampler = Sampler::new(22050);
        sampler
            .library_mut()
            .load_file(&path)
            .expect("synchronous load");
        assert_eq!(sampler.library().get(0).unwrap().buffer_len(), 100);

        sampler.set_sample_rate(44100);

        let controls = ControlInputs::default();
        testutil::eventually(
            || {
                sampler.process(&controls);
                sampler.library().len() == 1
                    && sampler.library().get(0).map(|r| r.buffer_len()) == Some(200)
            },
            "library was not reloaded at the new rate",
        );
    }
}
