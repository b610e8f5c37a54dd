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
use crate::audio::AudioError;
use crate::loader::LoadError;

/// Errors returned by the launcher's control API. The render path never fails.
#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    #[error("Launcher is not initialized")]
    NotInitialized,

    #[error("Launcher is already initialized")]
    AlreadyInitialized,

    #[error("Clips can't be registered while playing")]
    Playing,

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Failed to load clip {name}: {source}")]
    Load { name: String, source: LoadError },

    #[error("Clip {0} has no samples")]
    EmptyClip(String),

    #[error("Clip {name} is {channels} channel(s) at {sample_rate}Hz, expected mono at {expected_rate}Hz")]
    FormatMismatch {
        name: String,
        channels: u16,
        sample_rate: u32,
        expected_rate: u32,
    },

    #[error("No commands given")]
    EmptyBatch,

    #[error("Command queue is full")]
    QueueFull,

    #[error("Unknown clip {0}")]
    UnknownClip(String),
}
