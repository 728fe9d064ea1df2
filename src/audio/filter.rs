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

//! Post-playback tone filter.
//!
//! A single RBJ biquad (direct form 1) with stereo state, switchable between
//! low-pass and high-pass. The engine reconfigures it per tick from the
//! filter control and runs every output frame through it.

use super::StereoFrame;

/// Filter response type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    LowPass,
    HighPass,
}

/// A second-order filter processing one stereo frame at a time.
#[derive(Clone, Debug)]
pub struct PostFilter {
    sample_rate: f32,
    // Normalized coefficients (a0 divided out)
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    // Input and output history, one frame per tap
    x: [StereoFrame; 2],
    y: [StereoFrame; 2],
}

impl PostFilter {
    /// Creates a filter in a passthrough configuration.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            x: [StereoFrame::ZERO; 2],
            y: [StereoFrame::ZERO; 2],
        }
    }

    /// Updates the sample rate the coefficient math is based on and clears
    /// the filter history.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate as f32;
        self.reset();
    }

    /// Clears the filter history.
    pub fn reset(&mut self) {
        self.x = [StereoFrame::ZERO; 2];
        self.y = [StereoFrame::ZERO; 2];
    }

    /// Recomputes coefficients for the given cutoff frequency and resonance.
    pub fn set_cutoff(&mut self, freq: f32, q: f32, mode: FilterMode) {
        let w0 = 2.0 * std::f32::consts::PI * freq / self.sample_rate;
        let alpha = w0.sin() / (2.0 * q);
        let cs0 = w0.cos();
        let a0 = 1.0 + alpha;

        match mode {
            FilterMode::LowPass => {
                self.b0 = (1.0 - cs0) / 2.0 / a0;
                self.b1 = (1.0 - cs0) / a0;
                self.b2 = (1.0 - cs0) / 2.0 / a0;
            }
            FilterMode::HighPass => {
                self.b0 = (1.0 + cs0) / 2.0 / a0;
                self.b1 = -(1.0 + cs0) / a0;
                self.b2 = (1.0 + cs0) / 2.0 / a0;
            }
        }
        self.a1 = (-2.0 * cs0) / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    /// Runs one frame through the filter.
    pub fn process(&mut self, input: StereoFrame) -> StereoFrame {
        let out = StereoFrame {
            left: self.b0 * input.left + self.b1 * self.x[0].left + self.b2 * self.x[1].left
                - self.a1 * self.y[0].left
                - self.a2 * self.y[1].left,
            right: self.b0 * input.right + self.b1 * self.x[0].right + self.b2 * self.x[1].right
                - self.a1 * self.y[0].right
                - self.a2 * self.y[1].right,
        };

        self.x[1] = self.x[0];
        self.x[0] = input;
        self.y[1] = self.y[0];
        self.y[0] = out;

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(filter: &mut PostFilter, input: f32, ticks: usize) -> f32 {
        let mut last = StereoFrame::ZERO;
        for _ in 0..ticks {
            last = filter.process(StereoFrame::new(input, input));
        }
        last.left
    }

    #[test]
    fn test_default_is_passthrough() {
        let mut filter = PostFilter::new(44100);
        let out = filter.process(StereoFrame::new(0.7, -0.3));
        assert!((out.left - 0.7).abs() < 1e-6);
        assert!((out.right + 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut filter = PostFilter::new(44100);
        filter.set_cutoff(1000.0, 0.8, FilterMode::LowPass);
        // A constant input should settle at the same constant.
        let settled = run(&mut filter, 0.5, 5000);
        assert!((settled - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut filter = PostFilter::new(44100);
        filter.set_cutoff(1000.0, 0.8, FilterMode::HighPass);
        let settled = run(&mut filter, 0.5, 5000);
        assert!(settled.abs() < 1e-3);
    }

    #[test]
    fn test_lowpass_attenuates_nyquist() {
        let mut filter = PostFilter::new(44100);
        filter.set_cutoff(200.0, 0.8, FilterMode::LowPass);
        // Alternate +1/-1 (the highest representable frequency) and measure
        // the output amplitude once the transient has passed.
        let mut peak = 0.0f32;
        for i in 0..4000 {
            let v = if i % 2 == 0 { 1.0 } else { -1.0 };
            let out = filter.process(StereoFrame::new(v, v));
            if i > 2000 {
                peak = peak.max(out.left.abs());
            }
        }
        assert!(peak < 0.05, "nyquist leak: {}", peak);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut filter = PostFilter::new(44100);
        filter.set_cutoff(500.0, 0.8, FilterMode::LowPass);
        run(&mut filter, 1.0, 100);
        filter.reset();
        let out = filter.process(StereoFrame::ZERO);
        assert_eq!(out, StereoFrame::ZERO);
    }
}
