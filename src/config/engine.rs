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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;

pub const DEFAULT_COMMAND_CAPACITY: usize = 256;
pub const DEFAULT_MAX_VOICES: usize = 64;
const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(10);

/// Engine sizing and control loop timing.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Engine {
    /// The most commands that can wait for the render thread (default: 256).
    command_capacity: Option<usize>,

    /// Voice slots preallocated on the render side; starts beyond it are dropped (default: 64).
    max_voices: Option<usize>,

    /// How often the control loop collects notifications (default: 10ms).
    update_interval: Option<String>,
}

impl Engine {
    pub fn command_capacity(&self) -> usize {
        self.command_capacity
            .unwrap_or(DEFAULT_COMMAND_CAPACITY)
            .max(1)
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices.unwrap_or(DEFAULT_MAX_VOICES)
    }

    /// Returns the update interval from the configuration.
    pub fn update_interval(&self) -> Result<Duration, ConfigError> {
        match &self.update_interval {
            Some(interval) => Ok(DurationString::from_string(interval.clone())
                .map_err(|e| ConfigError::Duration {
                    value: interval.clone(),
                    reason: e.to_string(),
                })?
                .into()),
            None => Ok(DEFAULT_UPDATE_INTERVAL),
        }
    }
}
