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

//! Decodes audio files into memory. Supports WAV, FLAC, MP3 and everything else
//! symphonia knows about. No resampling or channel mixing happens here.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info};

/// Errors produced while decoding a file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Decode {
        path: String,
        source: SymphoniaError,
    },

    #[error("{path}: no audio track found")]
    NoTrack { path: String },

    #[error("{path}: {what} not specified")]
    MissingParameter { path: String, what: &'static str },
}

/// A fully decoded file: interleaved samples and the format they're in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedAudio {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl LoadedAudio {
    /// The number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }
}

/// Decodes the whole file at `path` into memory.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<LoadedAudio, LoadError> {
    let path = path.as_ref();
    let path_str = path.display().to_string();

    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path_str.clone(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Help the format registry guess.
    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let decode_err = |source| LoadError::Decode {
        path: path_str.clone(),
        source,
    };

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_err)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LoadError::NoTrack {
            path: path_str.clone(),
        })?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let sample_rate = params.sample_rate.ok_or_else(|| LoadError::MissingParameter {
        path: path_str.clone(),
        what: "sample rate",
    })?;
    let mut channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);

    let mut decoder = get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(decode_err)?;

    let mut samples = Vec::with_capacity(
        params
            .n_frames
            .map(|frames| frames as usize * channels.max(1) as usize)
            .unwrap_or(0),
    );
    while let Some((decoded, decoded_channels)) =
        decode_next_packet(format_reader.as_mut(), decoder.as_mut(), track_id)
            .map_err(decode_err)?
    {
        // Some containers don't report a channel count; trust the decoder.
        if channels == 0 {
            channels = decoded_channels as u16;
        }
        samples.extend_from_slice(&decoded);
    }

    if channels == 0 {
        if samples.is_empty() {
            debug!(path = %path_str, "File decoded to no samples");
            return Ok(LoadedAudio {
                samples,
                channels: 1,
                sample_rate,
            });
        }
        return Err(LoadError::MissingParameter {
            path: path_str,
            what: "channel count",
        });
    }

    let loaded = LoadedAudio {
        samples,
        channels,
        sample_rate,
    };
    info!(
        path = %path_str,
        channels,
        sample_rate,
        frames = loaded.frames(),
        memory_kb = loaded.memory_size() / 1024,
        "Audio file loaded"
    );
    Ok(loaded)
}

/// Reads and decodes packets until one for `track_id` yields samples. Returns None at
/// the end of the stream.
fn decode_next_packet(
    format_reader: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
    track_id: u32,
) -> Result<Option<(Vec<f32>, usize)>, SymphoniaError> {
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Skip corrupt packets rather than giving up on the whole file.
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(error = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e),
        };

        let (samples, channels) = to_interleaved_f32(decoded);
        if channels > 0 && !samples.is_empty() {
            return Ok(Some((samples, channels)));
        }
    }
}

fn to_interleaved_f32(decoded: AudioBufferRef) -> (Vec<f32>, usize) {
    match decoded {
        AudioBufferRef::F32(buf) => interleave(&buf, |s| s),
        AudioBufferRef::F64(buf) => interleave(&buf, |s| s as f32),
        AudioBufferRef::S8(buf) => interleave(&buf, |s| s as f32 / (1i64 << 7) as f32),
        AudioBufferRef::S16(buf) => interleave(&buf, |s| s as f32 / (1i64 << 15) as f32),
        AudioBufferRef::S24(buf) => interleave(&buf, |s| s.inner() as f32 / (1i64 << 23) as f32),
        AudioBufferRef::S32(buf) => interleave(&buf, |s| s as f32 / (1i64 << 31) as f32),
        AudioBufferRef::U8(buf) => interleave(&buf, |s| (s as f32 / u8::MAX as f32) * 2.0 - 1.0),
        AudioBufferRef::U16(buf) => {
            interleave(&buf, |s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0)
        }
        AudioBufferRef::U24(buf) => interleave(&buf, |s| {
            (s.inner() as f32 / ((1u32 << 24) - 1) as f32) * 2.0 - 1.0
        }),
        AudioBufferRef::U32(buf) => {
            interleave(&buf, |s| (s as f32 / u32::MAX as f32) * 2.0 - 1.0)
        }
    }
}

fn interleave<T, F>(buf: &AudioBuffer<T>, convert: F) -> (Vec<f32>, usize)
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let frames = buf.frames();
    let channels = buf.spec().channels.count();
    let planes = buf.planes();
    let planes = planes.planes();

    let mut samples = Vec::with_capacity(frames * channels);
    for frame in 0..frames {
        for plane in planes.iter().take(channels) {
            samples.push(convert(plane[frame]));
        }
    }
    (samples, channels)
}
