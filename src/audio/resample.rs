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

//! One-shot sample rate conversion for ingested buffers.
//!
//! Ingestion hands the full decoded buffer to rubato's sinc resampler in a
//! single call. For an input of `n` frames the requested output length is
//! `ceil(n * target / source)`; if the resampler reports fewer frames, the
//! reported length is authoritative and nothing past it is ever read.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::error::DecodeError;
use super::StereoFrame;

/// Converts a stereo buffer from `source_rate` to `target_rate`.
///
/// Equal rates are a passthrough. The caller should avoid the call entirely
/// in that case (the decoded buffer can be reused without a copy), but the
/// contract holds either way: output length is exactly the input length.
pub fn resample(
    frames: &[StereoFrame],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<StereoFrame>, DecodeError> {
    if source_rate == target_rate || frames.is_empty() {
        return Ok(frames.to_vec());
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let requested = (frames.len() as f64 * ratio).ceil() as usize;

    let sinc_params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, sinc_params, frames.len(), 2)
        .map_err(|_e| DecodeError::ResamplingFailed(source_rate, target_rate))?;

    let mut waves_in: Vec<Vec<f32>> = vec![
        Vec::with_capacity(frames.len()),
        Vec::with_capacity(frames.len()),
    ];
    for frame in frames {
        waves_in[0].push(frame.left);
        waves_in[1].push(frame.right);
    }

    let waves_out = resampler
        .process(&waves_in, None)
        .map_err(|_e| DecodeError::ResamplingFailed(source_rate, target_rate))?;

    let mut output = Vec::with_capacity(requested);
    push_frames(&mut output, &waves_out, requested);

    // The sinc filter holds back its group delay; flush until the requested
    // length is reached or the resampler stops producing. If it comes up
    // short, the shorter reported length is authoritative.
    while output.len() < requested {
        let tail = resampler
            .process_partial(None::<&[Vec<f32>]>, None)
            .map_err(|_e| DecodeError::ResamplingFailed(source_rate, target_rate))?;
        if tail[0].len().min(tail[1].len()) == 0 {
            break;
        }
        push_frames(&mut output, &tail, requested);
    }

    Ok(output)
}

/// Appends zipped frames from planar resampler output, up to `limit` total.
fn push_frames(output: &mut Vec<StereoFrame>, waves: &[Vec<f32>], limit: usize) {
    let available = waves[0].len().min(waves[1].len());
    let take = available.min(limit.saturating_sub(output.len()));
    for i in 0..take {
        output.push(StereoFrame {
            left: waves[0][i],
            right: waves[1][i],
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize) -> Vec<StereoFrame> {
        (0..len)
            .map(|i| {
                let v = i as f32 / len as f32;
                StereoFrame::new(v, -v)
            })
            .collect()
    }

    #[test]
    fn test_equal_rates_passthrough() {
        let input = ramp(1234);
        let output = resample(&input, 44100, 44100).expect("resample");
        assert_eq!(output.len(), input.len());
        assert_eq!(output, input);
    }

    #[test]
    fn test_upsample_length_contract() {
        // 22050 -> 44100 is an exact 2:1 ratio: ceil(1000 * 2) = 2000.
        let input = ramp(1000);
        let output = resample(&input, 22050, 44100).expect("resample");
        assert_eq!(output.len(), 2000);
    }

    #[test]
    fn test_downsample_length_contract() {
        // 44100 -> 22050: ceil(2000 / 2) = 1000.
        let input = ramp(2000);
        let output = resample(&input, 44100, 22050).expect("resample");
        assert_eq!(output.len(), 1000);
    }

    #[test]
    fn test_never_longer_than_requested() {
        let input = ramp(4410);
        let output = resample(&input, 44100, 48000).expect("resample");
        let requested = (4410.0_f64 * 48000.0 / 44100.0).ceil() as usize;
        assert!(output.len() <= requested);
        assert!(output.len() > 0);
    }

    #[test]
    fn test_empty_input() {
        let output = resample(&[], 44100, 48000).expect("resample");
        assert!(output.is_empty());
    }
}
