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

/// Errors from device discovery, format negotiation and stream control.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Unsupported sample format: {0}")]
    UnknownSampleFormat(String),

    #[error("Sample rate must be greater than 0")]
    InvalidSampleRate,

    #[error("Buffer size must be greater than 0")]
    InvalidBufferSize,

    #[error("Unsupported audio format: {channels} channel(s), {bits_per_sample}-bit {sample_format}; only mono 32-bit float is supported")]
    UnsupportedFormat {
        channels: u16,
        sample_format: String,
        bits_per_sample: u16,
    },

    #[error("Device {device} has no mono float output at {sample_rate}Hz")]
    UnsupportedConfig { device: String, sample_rate: u32 },

    #[error("No device found with name {0}")]
    DeviceNotFound(String),

    #[error("Failed to query devices: {0}")]
    Devices(String),

    #[error("Failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Failed to pause output stream: {0}")]
    PauseStream(#[from] cpal::PauseStreamError),

    #[error("Output thread is gone")]
    OutputThread,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
