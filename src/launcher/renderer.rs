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

//! The render side of the launcher. Owns the live voices and the global sample
//! position; runs on the device's thread.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::command::{Command, Notification, VoiceId, VoiceStart};
use super::mailbox::Mailbox;
use super::voice::Voice;
use crate::audio::RenderCallback;

pub struct Renderer {
    mailbox: Arc<Mailbox>,
    /// Commands swapped out of the mailbox, applied outside the lock.
    commands: VecDeque<Command>,
    voices: Vec<Voice>,
    /// The global position of the next rendered sample.
    sample_pos: usize,
    /// Published copy of `sample_pos` for the control side.
    shared_pos: Arc<AtomicUsize>,
    /// The global position wraps at this many samples.
    max_sample_count: Arc<AtomicUsize>,
    /// The most voices that can be live at once.
    max_voices: usize,
    /// Starts refused because every voice slot was taken.
    dropped_starts: Arc<AtomicUsize>,
}

impl Renderer {
    pub fn new(
        mailbox: Arc<Mailbox>,
        max_sample_count: Arc<AtomicUsize>,
        shared_pos: Arc<AtomicUsize>,
        dropped_starts: Arc<AtomicUsize>,
        max_voices: usize,
    ) -> Renderer {
        let max_voices = max_voices.max(1);
        Renderer {
            commands: VecDeque::with_capacity(mailbox.capacity()),
            mailbox,
            voices: Vec::with_capacity(max_voices),
            sample_pos: 0,
            shared_pos,
            max_sample_count,
            max_voices,
            dropped_starts,
        }
    }

    /// Fills `out` with the next block of mixed audio.
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        if out.is_empty() {
            return;
        }

        self.drain();

        if self.voices.iter().all(Voice::is_stopped) {
            self.mailbox.lock().post(Notification::AllQuiet);
            return;
        }

        for voice in self.voices.iter_mut() {
            voice.render(out, self.sample_pos);
        }

        let max = self.max_sample_count.load(Ordering::Relaxed);
        self.sample_pos = if max > 0 {
            (self.sample_pos + out.len()) % max
        } else {
            0
        };
        self.shared_pos.store(self.sample_pos, Ordering::Relaxed);
    }

    /// Acknowledges the pass, takes the pending commands and applies them.
    fn drain(&mut self) {
        {
            let mut queues = self.mailbox.lock();
            queues.post(Notification::BufCompleted(1));
            // Quiet reports only describe the latest pass. `render` reposts if still quiet.
            queues.discard_all_quiet();
            queues.swap_commands(&mut self.commands);
        }

        self.voices.retain(|voice| !voice.is_stopped());
        while let Some(command) = self.commands.pop_front() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::StopVoices { trigger_res } => {
                for voice in self.voices.iter_mut() {
                    voice.set_stopping(trigger_res);
                }
            }
            Command::StartVoice(start) => self.start(start, true),
            Command::OneShot(start) => self.start(start, false),
            Command::StopVoice { voice, trigger_res } => {
                if let Some(voice) = self.voice_mut(voice) {
                    voice.set_stopping(trigger_res);
                }
            }
            Command::SetVolume { voice, volume } => {
                if let Some(voice) = self.voice_mut(voice) {
                    voice.set_volume(volume);
                }
            }
        }
    }

    /// Creates a voice for an unseen identity or re-arms the existing one. A new voice
    /// is refused once every slot is taken, so the voice list never reallocates.
    fn start(&mut self, start: VoiceStart, looping: bool) {
        if let Some(voice) = self.voice_mut(start.voice) {
            voice.set_pending(start.trigger_res, looping);
        } else if self.voices.len() < self.max_voices {
            self.voices.push(Voice::from_start(start, looping));
        } else {
            self.dropped_starts.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn voice_mut(&mut self, id: VoiceId) -> Option<&mut Voice> {
        self.voices.iter_mut().find(|voice| voice.id() == id)
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn sample_pos(&self) -> usize {
        self.sample_pos
    }

    /// Wraps the renderer into a device callback.
    pub fn into_callback(mut self) -> RenderCallback {
        Box::new(move |out: &mut [f32]| self.render(out))
    }
}
