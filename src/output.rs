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

//! cpal output driving the engine, used by the CLI host.
//!
//! The engine itself has no opinion about where its ticks come from; this
//! module supplies the default-device callback that calls
//! [`Sampler::process`] once per frame. Control updates reach the callback
//! over a channel and apply to every frame until the next update.

use std::error::Error;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Receiver;
use tracing::{error, info};

use crate::sampler::{ControlInputs, Sampler};

/// A running output stream. Dropping it stops playback.
pub struct AudioOutput {
    _stream: cpal::Stream,
    sample_rate: u32,
}

impl AudioOutput {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// The default output device's sample rate, for constructing an engine that
/// matches it.
pub fn default_device_rate() -> Result<u32, Box<dyn Error>> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or("no default output device")?;
    let config = device.default_output_config()?;
    Ok(config.sample_rate())
}

/// Starts playback on the default output device.
///
/// The engine is moved into the audio callback; use a cloned
/// [`crate::sampler::LoaderHandle`] to feed it samples afterwards. If the
/// device rate differs from the engine's, the engine is moved to the device
/// rate first.
pub fn start(
    mut sampler: Sampler,
    controls_rx: Receiver<ControlInputs>,
) -> Result<AudioOutput, Box<dyn Error>> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or("no default output device")?;
    let supported = device.default_output_config()?;

    if supported.sample_format() != cpal::SampleFormat::F32 {
        return Err(format!(
            "unsupported output sample format {:?} (only f32 is supported)",
            supported.sample_format()
        )
        .into());
    }

    let sample_rate = supported.sample_rate();
    let channels = supported.channels() as usize;
    if sample_rate != sampler.sample_rate() {
        sampler.set_sample_rate(sample_rate);
    }

    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    info!(device = %device_name, sample_rate, channels, "Starting audio output");

    let config: cpal::StreamConfig = supported.into();
    let mut controls = ControlInputs::default();
    let err_fn = |e| error!(error = %e, "Audio output stream error");

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _info| {
            // Latest control update wins for the whole block; edge
            // detection happens per frame inside the engine.
            while let Ok(update) = controls_rx.try_recv() {
                controls = update;
            }

            for frame in data.chunks_mut(channels) {
                let out = sampler.process(&controls);
                frame[0] = out.left;
                if channels > 1 {
                    frame[1] = out.right;
                }
                for extra in frame.iter_mut().skip(2) {
                    *extra = 0.0;
                }
            }
        },
        err_fn,
        None,
    )?;
    stream.play()?;

    Ok(AudioOutput {
        _stream: stream,
        sample_rate,
    })
}
