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

//! Whole-file decoding of audio files into stereo float frames.
//!
//! Uses symphonia to decode any supported format (WAV, AIFF, FLAC, MP3, OGG,
//! ...). Ingestion reads the entire file up front: playback never touches the
//! filesystem. Mono sources are duplicated to both channels; sources with
//! more than two channels keep only the first two.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use super::error::DecodeError;
use super::StereoFrame;

/// The result of decoding one audio file, still at its native sample rate.
#[derive(Clone, Debug)]
pub struct DecodedAudio {
    /// The decoded audio, folded to stereo.
    pub frames: Vec<StereoFrame>,
    /// Channel count of the source file.
    pub channels: u16,
    /// Native sample rate of the source file.
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Returns the number of decoded frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// Decodes an entire audio file into stereo frames.
///
/// Fails if the file cannot be opened, has no decodable audio track, or if
/// fewer frames decode than the container declares (truncated file). On any
/// failure the partially decoded buffer is discarded.
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<DecodedAudio, DecodeError> {
    let path = path.as_ref();

    // Open the file (include path in error so the user sees which file failed)
    let file = File::open(path).map_err(|e| {
        DecodeError::IoError(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // A hint helps the format registry guess the container
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::NoAudioTrack(path.to_path_buf()))?;

    let track_id = track.id;
    let params = &track.codec_params;

    let sample_rate = params
        .sample_rate
        .ok_or_else(|| DecodeError::UnknownSampleRate(path.to_path_buf()))?;
    let declared_frames = params.n_frames;

    // Containers usually report the channel count up front. When they don't
    // (some compressed formats), it is taken from the first decoded buffer.
    let mut channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs().make(params, &decoder_opts)?;

    let mut frames: Vec<StereoFrame> = match declared_frames {
        Some(n) => Vec::with_capacity(n as usize),
        None => Vec::new(),
    };

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // End of file
                break;
            }
            Err(SymphoniaError::DecodeError(_)) => {
                // Some decoders return DecodeError at EOF instead of IoError
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                decoder.decode(&packet)?
            }
            Err(e) => return Err(e.into()),
        };

        let seen_channels = fold_decoded_buffer(decoded, &mut frames);
        if channels == 0 {
            channels = seen_channels as u16;
        }
    }

    // A decoded frame count below what the header declares means the file is
    // truncated or corrupt. The whole load fails; no partial data survives.
    if let Some(declared) = declared_frames {
        if (frames.len() as u64) < declared {
            return Err(DecodeError::ShortRead {
                path: path.to_path_buf(),
                declared,
                decoded: frames.len() as u64,
            });
        }
    }

    if channels == 0 && frames.is_empty() {
        return Err(DecodeError::NoAudioTrack(path.to_path_buf()));
    }

    Ok(DecodedAudio {
        frames,
        channels,
        sample_rate,
    })
}

/// Folds a decoded buffer of any sample format into stereo frames and
/// returns the channel count observed in that buffer.
fn fold_decoded_buffer(decoded: AudioBufferRef, out: &mut Vec<StereoFrame>) -> usize {
    match decoded {
        AudioBufferRef::F32(buf) => fold_planar(&buf, |sample| sample, out),
        AudioBufferRef::F64(buf) => fold_planar(&buf, |sample| sample as f32, out),
        AudioBufferRef::S8(buf) => fold_planar(&buf, scale_s8, out),
        AudioBufferRef::S16(buf) => fold_planar(&buf, scale_s16, out),
        AudioBufferRef::S24(buf) => fold_planar(&buf, |sample| scale_s24(sample.inner()), out),
        AudioBufferRef::S32(buf) => fold_planar(&buf, scale_s32, out),
        AudioBufferRef::U8(buf) => fold_planar(&buf, scale_u8, out),
        AudioBufferRef::U16(buf) => fold_planar(&buf, scale_u16, out),
        AudioBufferRef::U24(buf) => fold_planar(&buf, |sample| scale_u24(sample.inner()), out),
        AudioBufferRef::U32(buf) => fold_planar(&buf, scale_u32, out),
    }
}

/// Folds planar samples to stereo: channel 0 goes left, channel 1 right.
/// Mono buffers are duplicated; channels beyond the second are dropped.
fn fold_planar<T, F>(buf: &AudioBuffer<T>, convert: F, out: &mut Vec<StereoFrame>) -> usize
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let frames = buf.frames();
    let channels = buf.spec().channels.count();
    let planes = buf.planes();
    let planes = planes.planes();

    out.reserve(frames);
    for frame_idx in 0..frames {
        let left = convert(planes[0][frame_idx]);
        let right = if channels > 1 {
            convert(planes[1][frame_idx])
        } else {
            left
        };
        out.push(StereoFrame { left, right });
    }
    channels
}

// Scaling helpers for all integer formats. These are `pub(crate)` so they can
// be validated directly in unit tests.

#[inline]
pub(crate) fn scale_s8(sample: i8) -> f32 {
    sample as f32 / (1i64 << 7) as f32
}

#[inline]
pub(crate) fn scale_s16(sample: i16) -> f32 {
    sample as f32 / (1i64 << 15) as f32
}

#[inline]
pub(crate) fn scale_s24(sample: i32) -> f32 {
    sample as f32 / (1i64 << 23) as f32
}

#[inline]
pub(crate) fn scale_s32(sample: i32) -> f32 {
    sample as f32 / (1i64 << 31) as f32
}

#[inline]
pub(crate) fn scale_u8(sample: u8) -> f32 {
    (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u16(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u24(sample: u32) -> f32 {
    let max = (1u32 << 24) - 1;
    (sample as f32 / max as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u32(sample: u32) -> f32 {
    (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
}
