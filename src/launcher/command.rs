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

//! Messages exchanged between the control thread and the render thread.

use std::fmt;
use std::sync::Arc;

use super::clip::Clip;

/// Identifies a voice. Control code chooses identities; at most one voice per
/// identity is live at a time.
pub type VoiceId = i32;

/// Everything needed to start a voice.
#[derive(Clone)]
pub struct VoiceStart {
    /// The clip to play. The registry keeps its own reference for the lifetime of the
    /// launcher, so the render thread never drops the last one.
    pub clip: Arc<Clip>,
    pub voice: VoiceId,
    /// Samples between trigger boundaries. 0 starts on the next rendered sample.
    pub trigger_res: usize,
    pub volume: f32,
}

impl VoiceStart {
    /// A start request at full volume.
    pub fn new(clip: Arc<Clip>, voice: VoiceId, trigger_res: usize) -> VoiceStart {
        VoiceStart {
            clip,
            voice,
            trigger_res,
            volume: 1.0,
        }
    }

    /// Sets the initial volume.
    pub fn with_volume(mut self, volume: f32) -> VoiceStart {
        self.volume = volume;
        self
    }
}

/// Commands posted by the control thread to the render thread.
#[derive(Clone)]
pub enum Command {
    /// Set the volume of a live voice.
    SetVolume { voice: VoiceId, volume: f32 },
    /// Start a new voice and loop it, or re-arm an existing one.
    StartVoice(VoiceStart),
    /// Stop a live voice at its next loop boundary.
    StopVoice { voice: VoiceId, trigger_res: usize },
    /// Stop every live voice at its next loop boundary.
    StopVoices { trigger_res: usize },
    /// Start a new voice and play its head once.
    OneShot(VoiceStart),
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetVolume { voice, volume } => f
                .debug_struct("SetVolume")
                .field("voice", voice)
                .field("volume", volume)
                .finish(),
            Command::StartVoice(start) | Command::OneShot(start) => f
                .debug_struct(if matches!(self, Command::StartVoice(_)) {
                    "StartVoice"
                } else {
                    "OneShot"
                })
                .field("clip", &start.clip.name())
                .field("voice", &start.voice)
                .field("trigger_res", &start.trigger_res)
                .field("volume", &start.volume)
                .finish(),
            Command::StopVoice { voice, trigger_res } => f
                .debug_struct("StopVoice")
                .field("voice", voice)
                .field("trigger_res", trigger_res)
                .finish(),
            Command::StopVoices { trigger_res } => f
                .debug_struct("StopVoices")
                .field("trigger_res", trigger_res)
                .finish(),
        }
    }
}

/// Notifications posted by the render thread for the control thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notification {
    /// The render thread has filled this many buffers.
    BufCompleted(usize),
    /// There are no live voices.
    AllQuiet,
}
