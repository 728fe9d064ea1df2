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

//! Click-free shaping of per-sample trim and gain from rotary controls.
//!
//! The shaped fields are mutated by the *difference* between successive
//! control readings, never by the absolute value. Deltas above the jump
//! threshold are absorbed without being applied, so a session load or a host
//! reassigning a knob to a stored position cannot yank the trim window or
//! gain across the sample.

use super::library::SampleRecord;

/// Deltas whose magnitude exceeds this are treated as external reassignment
/// rather than a live nudge, and are never applied.
pub(crate) const JUMP_THRESHOLD: f32 = 0.3;

/// Fraction of the buffer a full-scale trim nudge moves per unit of delta.
const TRIM_SCALE: f32 = 0.1;

/// Gain moves at half the control rate.
const GAIN_SCALE: f32 = 0.5;

/// One delta-tracked control.
#[derive(Clone, Copy, Debug)]
struct ShapedControl {
    last: f32,
}

impl ShapedControl {
    fn new(initial: f32) -> Self {
        Self { last: initial }
    }

    /// Consumes a new reading. Returns the delta when it qualifies as a live
    /// nudge; jumps are absorbed into the tracking state and discarded.
    fn observe(&mut self, value: f32) -> Option<f32> {
        if value == self.last {
            return None;
        }
        let delta = value - self.last;
        self.last = value;
        if delta.abs() <= JUMP_THRESHOLD {
            Some(delta)
        } else {
            None
        }
    }
}

/// Converts the three per-sample rotary controls into bounded mutations of
/// the active record's trim window and gain.
#[derive(Debug)]
pub struct LiveParameterShaper {
    trim_start: ShapedControl,
    trim_end: ShapedControl,
    gain: ShapedControl,
}

impl Default for LiveParameterShaper {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveParameterShaper {
    /// The initial "last observed" values sit outside any real control range
    /// so the first reading after construction is always absorbed, filtering
    /// the jump from control initialization.
    pub fn new() -> Self {
        Self {
            trim_start: ShapedControl::new(10.0),
            trim_end: ShapedControl::new(10.0),
            gain: ShapedControl::new(0.0),
        }
    }

    /// Feeds one tick of control readings, mutating the active record.
    ///
    /// Deltas are tracked (and jumps absorbed) even when no record is
    /// active, so a sample selected later does not receive a stale delta.
    pub fn apply(
        &mut self,
        record: Option<&mut SampleRecord>,
        start_control: f32,
        end_control: f32,
        gain_control: f32,
    ) {
        let start_delta = self.trim_start.observe(start_control);
        let end_delta = self.trim_end.observe(end_control);
        let gain_delta = self.gain.observe(gain_control);

        let record = match record {
            Some(record) => record,
            None => return,
        };

        if let Some(delta) = start_delta {
            let scaled = delta * record.buffer_len() as f32 * TRIM_SCALE;
            let target = (record.trim_start() as f32 + scaled) as i64;
            record.set_trim_start(target.max(0) as usize);
        }

        if let Some(delta) = end_delta {
            let scaled = delta * record.buffer_len() as f32 * TRIM_SCALE;
            let target = (record.trim_end() as f32 + scaled) as i64;
            record.set_trim_end(target.max(0) as usize);
        }

        if let Some(delta) = gain_delta {
            record.set_gain(record.gain() + delta * GAIN_SCALE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::StereoFrame;
    use std::path::PathBuf;

    fn record(frames: usize) -> SampleRecord {
        SampleRecord::from_buffer(
            PathBuf::from("shaped.wav"),
            vec![StereoFrame::ZERO; frames],
            2,
            44100,
            frames,
        )
    }

    /// A shaper whose initial jump has already been absorbed, with all three
    /// controls parked at `at`.
    fn settled_shaper(record: &mut SampleRecord, at: f32) -> LiveParameterShaper {
        let mut shaper = LiveParameterShaper::new();
        shaper.apply(Some(record), at, at, at);
        shaper
    }

    #[test]
    fn test_first_observation_is_absorbed() {
        let mut shaper = LiveParameterShaper::new();
        let mut rec = record(1000);

        // First readings jump from the out-of-band initial state: nothing
        // may move, whatever the values are.
        shaper.apply(Some(&mut rec), 0.5, 0.5, 0.5);
        assert_eq!(rec.trim_start(), 0);
        assert_eq!(rec.trim_end(), 1000);
        assert_eq!(rec.gain(), 1.0);
    }

    #[test]
    fn test_nudge_moves_trim_window() {
        let mut rec = record(1000);
        let mut shaper = settled_shaper(&mut rec, 0.0);

        // +0.1 on the start control moves the start by 0.1 * 1000 * 0.1 = 10.
        shaper.apply(Some(&mut rec), 0.1, 0.0, 0.0);
        assert_eq!(rec.trim_start(), 10);

        // -0.2 on the end control moves the end by -0.2 * 1000 * 0.1 = -20.
        shaper.apply(Some(&mut rec), 0.1, -0.2, 0.0);
        assert_eq!(rec.trim_end(), 980);
    }

    #[test]
    fn test_gain_nudge_scaled_and_clamped() {
        let mut rec = record(100);
        let mut shaper = settled_shaper(&mut rec, 0.0);

        shaper.apply(Some(&mut rec), 0.0, 0.0, 0.2);
        assert!((rec.gain() - 1.1).abs() < 1e-6);

        // Walk the gain to the ceiling; it must never exceed 2.0.
        let mut value = 0.2;
        for _ in 0..20 {
            value += 0.25;
            shaper.apply(Some(&mut rec), 0.0, 0.0, value);
        }
        assert_eq!(rec.gain(), 2.0);
    }

    #[test]
    fn test_jump_is_never_applied() {
        let mut rec = record(1000);
        let mut shaper = settled_shaper(&mut rec, 0.0);

        for jump in [0.31, -0.31, 1.0, -5.0, 100.0] {
            shaper.apply(Some(&mut rec), jump, jump, jump);
            assert_eq!(rec.trim_start(), 0, "jump {} moved trim_start", jump);
            assert_eq!(rec.trim_end(), 1000, "jump {} moved trim_end", jump);
            assert_eq!(rec.gain(), 1.0, "jump {} moved gain", jump);
            // Park back at zero; this return jump must be absorbed too.
            shaper.apply(Some(&mut rec), 0.0, 0.0, 0.0);
        }
    }

    #[test]
    fn test_jump_resets_tracking_state() {
        let mut rec = record(1000);
        let mut shaper = settled_shaper(&mut rec, 0.0);

        // After an absorbed jump to 0.9, a small nudge from there applies.
        shaper.apply(Some(&mut rec), 0.9, 0.0, 0.0);
        assert_eq!(rec.trim_start(), 0);
        shaper.apply(Some(&mut rec), 1.0, 0.0, 0.0);
        assert_eq!(rec.trim_start(), 10);
    }

    #[test]
    fn test_deltas_absorbed_without_active_record() {
        let mut shaper = LiveParameterShaper::new();
        shaper.apply(None, 0.0, 0.0, 0.0);
        shaper.apply(None, 0.25, 0.0, 0.0);

        // The 0.25 nudge happened with no record selected; selecting one
        // afterwards must not replay it.
        let mut rec = record(1000);
        shaper.apply(Some(&mut rec), 0.25, 0.0, 0.0);
        assert_eq!(rec.trim_start(), 0);
    }

    #[test]
    fn test_ordering_invariant_holds_under_nudge_storm() {
        let mut rec = record(500);
        let mut shaper = settled_shaper(&mut rec, 0.0);

        let nudges = [
            0.3, -0.3, 0.25, 0.25, -0.1, 0.3, 0.3, -0.29, 0.15, -0.3, 0.3, 0.05,
        ];
        let mut start_value = 0.0;
        let mut end_value = 0.0;
        for (i, nudge) in nudges.iter().cycle().take(200).enumerate() {
            if i % 2 == 0 {
                start_value += nudge;
            } else {
                end_value -= nudge;
            }
            shaper.apply(Some(&mut rec), start_value, end_value, 0.0);

            assert!(rec.trim_start() <= rec.trim_end());
            assert!(rec.trim_end() <= rec.buffer_len());
        }
    }
}
