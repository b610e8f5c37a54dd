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

use std::{fmt, str::FromStr, time::Duration};

use super::error::AudioError;

/// Sample format enumeration for audio processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Integer samples (e.g., 16-bit, 24-bit, 32-bit)
    Int,
    /// Floating point samples
    Float,
}

impl FromStr for SampleFormat {
    type Err = AudioError;

    /// Convert from string representation
    fn from_str(s: &str) -> Result<Self, AudioError> {
        match s {
            "float" | "Float" => Ok(SampleFormat::Float),
            "int" | "Int" => Ok(SampleFormat::Int),
            _ => Err(AudioError::UnknownSampleFormat(s.to_string())),
        }
    }
}

impl SampleFormat {
    /// Convert to string representation
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Float => "float",
            SampleFormat::Int => "int",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The output format requested from a device.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSpec {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
    /// Sample format (integer or float)
    pub sample_format: SampleFormat,
    /// Bits per sample
    pub bits_per_sample: u16,
    /// Frames requested per device pull
    pub buffer_size: usize,
}

impl AudioSpec {
    /// Creates a new AudioSpec
    pub fn new(
        sample_rate: u32,
        channels: u16,
        sample_format: SampleFormat,
        bits_per_sample: u16,
        buffer_size: usize,
    ) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate);
        }
        if buffer_size == 0 {
            return Err(AudioError::InvalidBufferSize);
        }

        Ok(AudioSpec {
            sample_rate,
            channels,
            sample_format,
            bits_per_sample,
            buffer_size,
        })
    }

    /// A mono 32-bit float spec.
    pub fn mono_f32(sample_rate: u32, buffer_size: usize) -> Result<Self, AudioError> {
        AudioSpec::new(sample_rate, 1, SampleFormat::Float, 32, buffer_size)
    }

    /// Fails unless this is mono 32-bit float, the only format the engine renders.
    pub fn require_mono_f32(&self) -> Result<(), AudioError> {
        if self.channels == 1 && self.sample_format == SampleFormat::Float && self.bits_per_sample == 32
        {
            return Ok(());
        }
        Err(AudioError::UnsupportedFormat {
            channels: self.channels,
            sample_format: self.sample_format.to_string(),
            bits_per_sample: self.bits_per_sample,
        })
    }

    /// Converts milliseconds into a sample count at this rate.
    pub fn ms_to_samples(&self, ms: u32) -> usize {
        (ms as u64 * self.sample_rate as u64 / 1000) as usize
    }

    /// The wall-clock duration of one buffer.
    pub fn buffer_duration(&self) -> Duration {
        Duration::from_secs_f64(self.buffer_size as f64 / self.sample_rate as f64)
    }
}

impl Default for AudioSpec {
    /// 44.1kHz mono float with 4096-frame buffers.
    fn default() -> Self {
        AudioSpec {
            sample_rate: 44100,
            channels: 1,
            sample_format: SampleFormat::Float,
            bits_per_sample: 32,
            buffer_size: 4096,
        }
    }
}
