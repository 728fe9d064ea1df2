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
use std::error::Error;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};

use samplebox::audio::decode;
use samplebox::output;
use samplebox::sampler::{ControlInputs, Sampler};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "An embedded sample playback engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decodes an audio file and prints its properties.
    Probe {
        /// The path to the audio file.
        path: PathBuf,
    },
    /// Plays a sample file (or a directory of samples) through the default
    /// output device, re-triggering on an interval until interrupted.
    Play {
        /// The path to an audio file or a directory of audio files.
        path: PathBuf,
        /// Pitch in octaves (-3 to 3).
        #[arg(short, long, default_value_t = 0.0)]
        pitch: f32,
        /// Master gain (0 to 1).
        #[arg(short, long, default_value_t = 1.0)]
        gain: f32,
        /// Play in reverse.
        #[arg(short, long)]
        reverse: bool,
        /// Selector position in [0, 1] when playing from a directory.
        #[arg(short, long, default_value_t = 0.0)]
        select: f32,
        /// Seconds between trigger pulses.
        #[arg(short, long, default_value_t = 1.0)]
        interval: f32,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Probe { path } => {
            let decoded = decode::decode_file(&path)?;
            let seconds = decoded.frame_count() as f64 / decoded.sample_rate as f64;
            println!("{}:", path.display());
            println!("- channels: {}", decoded.channels);
            println!("- sample rate: {} Hz", decoded.sample_rate);
            println!("- frames: {}", decoded.frame_count());
            println!("- duration: {:.3} s", seconds);
        }
        Commands::Play {
            path,
            pitch,
            gain,
            reverse,
            select,
            interval,
        } => {
            let rate = output::default_device_rate()?;
            let sampler = Sampler::new(rate);
            let loader = sampler.loader_handle();

            let (controls_tx, controls_rx) = crossbeam_channel::bounded::<ControlInputs>(64);
            let out = output::start(sampler, controls_rx)?;

            if path.is_dir() {
                loader.request(samplebox::sampler::LoadRequest::Directory {
                    path,
                    rate: out.sample_rate(),
                });
            } else {
                loader.request(samplebox::sampler::LoadRequest::File {
                    path,
                    rate: out.sample_rate(),
                });
            }

            let base = ControlInputs {
                pitch,
                gain,
                select,
                ..Default::default()
            };

            if reverse {
                // One edge on the reverse button toggles reverse playback.
                let mut toggle = base;
                toggle.reverse_button = 1.0;
                controls_tx.send(toggle)?;
                thread::sleep(Duration::from_millis(50));
                controls_tx.send(base)?;
            }

            println!("Playing. Press Ctrl-C to stop.");
            loop {
                let mut pulse = base;
                pulse.gate = 1.0;
                controls_tx.send(pulse)?;
                thread::sleep(Duration::from_millis(50));
                controls_tx.send(base)?;

                let rest = (interval - 0.05).max(0.0);
                thread::sleep(Duration::from_secs_f32(rest));
            }
        }
    }

    Ok(())
}
