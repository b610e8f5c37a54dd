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

//! Immutable audio clips.
//!
//! A clip owns a single contiguous buffer holding the head samples followed by the
//! tail samples. Clips are shared between the control thread and the render thread
//! through an `Arc` and are never mutated after construction.

use std::fmt;

/// A registered audio clip: a loopable head, an optional tail and a fade length.
#[derive(Clone, Default, PartialEq)]
pub struct Clip {
    /// The friendly name of the clip. Never touched by the render thread.
    name: String,
    /// The number of samples in the head.
    head_samples: usize,
    /// The fade duration for starting, stopping and tails, in samples.
    fade_samples: usize,
    /// The head followed by the tail.
    audio: Vec<f32>,
}

impl Clip {
    /// Creates a new clip, taking ownership of the head and tail buffers.
    /// The fade length is clamped to the head length.
    pub fn new(name: &str, mut head: Vec<f32>, tail: Vec<f32>, fade_samples: usize) -> Clip {
        let head_samples = head.len();
        head.extend_from_slice(&tail);
        Clip {
            name: name.to_string(),
            head_samples,
            fade_samples: fade_samples.min(head_samples),
            audio: head,
        }
    }

    /// The name of the clip.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of samples in the head, or in the head and tail together.
    pub fn num_samples(&self, include_tail: bool) -> usize {
        if include_tail {
            self.audio.len()
        } else {
            self.head_samples
        }
    }

    /// The number of samples in the tail (0 if the clip has no tail).
    pub fn num_tail_samples(&self) -> usize {
        self.audio.len() - self.head_samples
    }

    pub fn num_fade_samples(&self) -> usize {
        self.fade_samples
    }

    /// The full buffer: head samples followed by tail samples.
    pub fn audio_data(&self) -> &[f32] {
        &self.audio
    }

    pub fn head(&self) -> &[f32] {
        &self.audio[..self.head_samples]
    }

    pub fn tail(&self) -> &[f32] {
        &self.audio[self.head_samples..]
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.audio.len() * std::mem::size_of::<f32>()
    }
}

impl fmt::Debug for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clip")
            .field("name", &self.name)
            .field("head_samples", &self.head_samples)
            .field("tail_samples", &self.num_tail_samples())
            .field("fade_samples", &self.fade_samples)
            .finish()
    }
}
