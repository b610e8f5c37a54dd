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
use std::{any::Any, fmt, sync::Arc};

use crate::config;

pub mod cpal;
pub mod error;
pub mod format;
pub mod mock;
mod thread_priority;

pub use error::AudioError;
pub use format::{AudioSpec, SampleFormat};

/// Fills a buffer of interleaved samples. Invoked on the device's thread for every pull.
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

pub trait Device: Any + fmt::Display + std::marker::Send + std::marker::Sync {
    /// The name of the device.
    fn name(&self) -> &str;

    /// Opens an output stream in the given format. The stream starts paused; while
    /// playing, every device pull invokes the callback.
    fn open(&self, spec: &AudioSpec, callback: RenderCallback)
        -> Result<Box<dyn Stream>, AudioError>;
}

/// An open output stream. Dropping it closes the stream.
pub trait Stream: std::marker::Send {
    /// Pauses or resumes device pulls.
    fn set_paused(&self, paused: bool) -> Result<(), AudioError>;

    fn is_paused(&self) -> bool;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, AudioError> {
    cpal::Device::list()
}

/// Gets the device named in the configuration. Names starting with "mock" select an
/// in-memory device.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, AudioError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device)));
    };

    Ok(Arc::new(cpal::Device::get(device)?))
}
