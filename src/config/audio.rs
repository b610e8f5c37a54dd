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
use std::str::FromStr;

use serde::Deserialize;

use crate::audio::{AudioError, AudioSpec, SampleFormat};

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_BUFFER_SIZE: usize = 4096;
const DEFAULT_BITS_PER_SAMPLE: u16 = 32;

#[derive(Deserialize, Clone, Debug)]
pub struct Audio {
    /// The audio device.
    device: String,

    /// Output sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Frames per device pull (default: 4096)
    buffer_size: Option<usize>,

    /// Output sample format (default: "float")
    sample_format: Option<String>,

    /// Output bits per sample (default: 32)
    bits_per_sample: Option<u16>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            sample_rate: None,
            buffer_size: None,
            sample_format: None,
            bits_per_sample: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the output sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the frames per device pull (default: 4096)
    pub fn buffer_size(&self) -> usize {
        self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE)
    }

    /// Returns the output sample format (default: Float)
    pub fn sample_format(&self) -> Result<SampleFormat, AudioError> {
        match self.sample_format.as_deref() {
            Some(format) => SampleFormat::from_str(format),
            None => Ok(SampleFormat::Float),
        }
    }

    /// Returns the output bits per sample (default: 32)
    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample.unwrap_or(DEFAULT_BITS_PER_SAMPLE)
    }

    /// The mono output spec described by this configuration.
    pub fn spec(&self) -> Result<AudioSpec, AudioError> {
        AudioSpec::new(
            self.sample_rate(),
            1,
            self.sample_format()?,
            self.bits_per_sample(),
            self.buffer_size(),
        )
    }
}
