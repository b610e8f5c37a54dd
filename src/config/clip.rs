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
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_FADE_MS: u32 = 5;

/// A clip to register at startup.
#[derive(Deserialize, Clone, Debug)]
pub struct ClipDefinition {
    /// The name commands refer to the clip by.
    name: String,

    /// The loopable part of the clip.
    head: String,

    /// Played after the head when a loop stops, and mixed over every loop restart.
    tail: Option<String>,

    /// Fade length for starts, stops and tails, in milliseconds (default: 5).
    fade_ms: Option<u32>,

    /// Trigger resolution used by the keyboard controller when none is given (default: 0).
    trigger: Option<usize>,
}

impl ClipDefinition {
    pub fn new(name: &str, head: &str, tail: Option<&str>) -> ClipDefinition {
        ClipDefinition {
            name: name.to_string(),
            head: head.to_string(),
            tail: tail.map(str::to_string),
            fade_ms: None,
            trigger: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The head file, resolved against `base_path` if relative.
    pub fn head_path(&self, base_path: &Path) -> PathBuf {
        resolve(base_path, &self.head)
    }

    /// The tail file, resolved against `base_path` if relative.
    pub fn tail_path(&self, base_path: &Path) -> Option<PathBuf> {
        self.tail.as_deref().map(|tail| resolve(base_path, tail))
    }

    pub fn fade_ms(&self) -> u32 {
        self.fade_ms.unwrap_or(DEFAULT_FADE_MS)
    }

    pub fn trigger(&self) -> usize {
        self.trigger.unwrap_or(0)
    }
}

fn resolve(base_path: &Path, file: &str) -> PathBuf {
    if Path::new(file).is_absolute() {
        PathBuf::from(file)
    } else {
        base_path.join(file)
    }
}
