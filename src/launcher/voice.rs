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

//! Voices: playing instances of a clip.
//!
//! A voice renders its clip into the mix buffer in a "pull" fashion. It plays the head
//! once (one shot) or loops it, mixing the tail over the start of every loop pass and
//! playing the tail on its own once stopped. Starts are quantized to the trigger
//! resolution; stops always resolve at the end of a head pass so nothing is cut
//! mid-segment.

use std::sync::Arc;

use super::clip::Clip;
use super::command::{VoiceId, VoiceStart};

/// The playback state of a voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// Start looping when the trigger resolution is hit.
    Pending,
    /// Play the head once when the trigger resolution is hit.
    OneShot,
    /// Play the head once and switch to looping on loop back.
    Starting,
    /// Play the head, mixed with the tail at the start of every pass, until stopped.
    Looping,
    /// Acts like starting or looping, and plays the tail only on loop back.
    Stopping,
    /// Play the tail only before stopping.
    Tail,
    /// Play the tail, then start looping at the next trigger.
    TailPending,
    /// Play the tail, then play the head once at the next trigger.
    TailOneShot,
    /// Renders nothing. The voice can be removed.
    Stopped,
}

/// A playing (or pending) instance of a clip.
pub struct Voice {
    /// Unique ID for this voice.
    id: VoiceId,
    state: State,
    /// The state before the last transition.
    prev_state: State,
    /// Each rendered sample is multiplied by this.
    volume: f32,
    /// Deferred starts fire on multiples of this many samples.
    trigger_res: usize,
    /// The global sample position at which the current segment started. `None` while
    /// waiting for a trigger.
    segment_start: Option<usize>,
    /// The next head sample to render.
    head_pos: usize,
    /// The next tail sample to mix, while a tail is ringing.
    tail_pos: Option<usize>,
    /// The clip this voice reads from.
    clip: Arc<Clip>,
}

impl Voice {
    /// Creates a voice that starts at the next trigger boundary.
    pub fn new(
        clip: Arc<Clip>,
        id: VoiceId,
        trigger_res: usize,
        volume: f32,
        looping: bool,
    ) -> Voice {
        Voice {
            id,
            state: if looping {
                State::Pending
            } else {
                State::OneShot
            },
            prev_state: State::Stopped,
            volume,
            trigger_res,
            segment_start: None,
            head_pos: 0,
            tail_pos: None,
            clip,
        }
    }

    /// Creates a voice from a start request.
    pub fn from_start(start: VoiceStart, looping: bool) -> Voice {
        Voice::new(
            start.clip,
            start.voice,
            start.trigger_res,
            start.volume,
            looping,
        )
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn prev_state(&self) -> State {
        self.prev_state
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn trigger_res(&self) -> usize {
        self.trigger_res
    }

    /// The global sample position at which the current segment started.
    pub fn segment_start(&self) -> Option<usize> {
        self.segment_start
    }

    pub fn clip(&self) -> &Arc<Clip> {
        &self.clip
    }

    pub fn is_stopped(&self) -> bool {
        self.state == State::Stopped
    }

    /// Sets the volume, effective from the next rendered sample.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    /// Asks the voice to stop. A playing loop finishes its current head pass and then
    /// plays its tail; a voice that hasn't started yet stops right away.
    pub fn set_stopping(&mut self, trigger_res: usize) {
        self.trigger_res = trigger_res;
        match self.state {
            State::Starting | State::Looping => self.set_state(State::Stopping),
            State::Pending => self.set_state(State::Stopped),
            State::OneShot if self.awaiting_trigger() => self.set_state(State::Stopped),
            State::TailPending | State::TailOneShot => self.set_state(State::Tail),
            _ => {}
        }
    }

    /// Asks an existing voice to start again. The request resolves at a segment
    /// boundary or is ignored if the voice is already doing what was asked.
    pub fn set_pending(&mut self, trigger_res: usize, looping: bool) {
        let (after_tail, deferred) = if looping {
            (State::TailPending, State::Pending)
        } else {
            (State::TailOneShot, State::OneShot)
        };

        let next = match self.state {
            // Restart once the tail has rung out.
            State::Tail | State::TailPending | State::TailOneShot => after_tail,
            // Take back a stop that hasn't resolved yet.
            State::Stopping if looping => self.prev_state,
            // Overwrite the pending slot.
            State::Pending => deferred,
            State::OneShot if self.awaiting_trigger() => deferred,
            State::Stopped => {
                self.head_pos = 0;
                self.tail_pos = None;
                deferred
            }
            _ => return,
        };

        self.trigger_res = trigger_res;
        if matches!(next, State::Pending | State::OneShot) {
            self.segment_start = None;
        }
        if next != self.state {
            self.set_state(next);
        }
    }

    /// Mixes up to `mix.len()` samples into the buffer. `sample_pos` is the global
    /// position of the first sample in `mix`. Never allocates or blocks.
    pub fn render(&mut self, mix: &mut [f32], sample_pos: usize) {
        for (offset, out) in mix.iter_mut().enumerate() {
            if self.state == State::Stopped {
                return;
            }
            *out += self.next_sample(sample_pos + offset) * self.volume;
        }
    }

    /// Produces the voice's contribution at global position `pos`.
    fn next_sample(&mut self, pos: usize) -> f32 {
        // A ringing tail is mixed first so a head that ends on this sample hands off
        // to the tail on the next one.
        let mut sample = self.next_tail_sample();

        if self.awaiting_trigger() && self.is_trigger_boundary(pos) {
            self.trigger(pos);
        }

        let playing_head = match self.state {
            State::Starting | State::Looping | State::Stopping => true,
            State::OneShot => self.segment_start.is_some(),
            _ => false,
        };
        if playing_head {
            sample += self.next_head_sample(pos);
        }

        sample
    }

    fn awaiting_trigger(&self) -> bool {
        matches!(self.state, State::Pending | State::OneShot) && self.segment_start.is_none()
    }

    fn is_trigger_boundary(&self, pos: usize) -> bool {
        self.trigger_res == 0 || pos % self.trigger_res == 0
    }

    /// Fires a deferred start at `pos`.
    fn trigger(&mut self, pos: usize) {
        if self.clip.num_samples(false) == 0 {
            self.set_state(State::Stopped);
            return;
        }

        self.segment_start = Some(pos);
        self.head_pos = 0;
        if self.state == State::Pending {
            self.set_state(State::Starting);
        }
    }

    fn next_head_sample(&mut self, pos: usize) -> f32 {
        let head = self.clip.head();
        let index = self.head_pos;
        let sample = head.get(index).copied().unwrap_or(0.0) * self.head_gain(index, head.len());

        self.head_pos += 1;
        if self.head_pos >= head.len() {
            self.end_of_head(pos + 1);
        }
        sample
    }

    /// Fade-in at the very start of a voice, fade-out ahead of the tail when stopping.
    fn head_gain(&self, index: usize, len: usize) -> f32 {
        let fade = self.clip.num_fade_samples();
        if fade == 0 {
            return 1.0;
        }

        let first_pass = match self.state {
            State::Starting | State::OneShot => true,
            State::Stopping => self.prev_state == State::Starting,
            _ => false,
        };

        let mut gain = 1.0;
        if first_pass && index < fade {
            gain *= index as f32 / fade as f32;
        }
        if self.state == State::Stopping && index + fade >= len {
            gain *= (len - index) as f32 / fade as f32;
        }
        gain
    }

    /// Resolves the end of a head pass. `next_pos` is where the next segment begins.
    fn end_of_head(&mut self, next_pos: usize) {
        self.head_pos = 0;
        match self.state {
            State::OneShot => self.set_state(State::Stopped),
            State::Starting | State::Looping => {
                self.set_state(State::Looping);
                self.segment_start = Some(next_pos);
                self.start_tail();
            }
            State::Stopping => {
                self.segment_start = Some(next_pos);
                if self.start_tail() {
                    self.set_state(State::Tail);
                } else {
                    self.set_state(State::Stopped);
                }
            }
            _ => {}
        }
    }

    /// Starts a tail pass. Returns false if the clip has no tail.
    fn start_tail(&mut self) -> bool {
        if self.clip.num_tail_samples() == 0 {
            return false;
        }
        self.tail_pos = Some(0);
        true
    }

    fn next_tail_sample(&mut self) -> f32 {
        let Some(index) = self.tail_pos else {
            return 0.0;
        };

        let tail = self.clip.tail();
        let fade = self.clip.num_fade_samples();
        let mut sample = tail.get(index).copied().unwrap_or(0.0);
        if index < fade {
            sample *= index as f32 / fade as f32;
        }

        if index + 1 >= tail.len() {
            self.end_of_tail();
        } else {
            self.tail_pos = Some(index + 1);
        }
        sample
    }

    fn end_of_tail(&mut self) {
        self.tail_pos = None;
        match self.state {
            State::Tail => self.set_state(State::Stopped),
            State::TailPending => {
                self.segment_start = None;
                self.set_state(State::Pending);
            }
            State::TailOneShot => {
                self.segment_start = None;
                self.set_state(State::OneShot);
            }
            _ => {}
        }
    }

    fn set_state(&mut self, next: State) {
        self.prev_state = self.state;
        self.state = next;
    }
}

impl std::fmt::Debug for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Voice")
            .field("id", &self.id)
            .field("clip", &self.clip.name())
            .field("state", &self.state)
            .field("prev_state", &self.prev_state)
            .field("volume", &self.volume)
            .field("trigger_res", &self.trigger_res)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(head: &[f32], tail: &[f32], fade: usize) -> Arc<Clip> {
        Arc::new(Clip::new("test", head.to_vec(), tail.to_vec(), fade))
    }

    fn render(voice: &mut Voice, samples: usize, pos: usize) -> Vec<f32> {
        let mut mix = vec![0.0; samples];
        voice.render(&mut mix, pos);
        mix
    }

    #[test]
    fn test_one_shot_plays_head_once() {
        let mut voice = Voice::new(clip(&[1.0, 2.0, 3.0, 4.0], &[], 0), 1, 0, 1.0, false);
        assert_eq!(voice.state(), State::OneShot);

        assert_eq!(render(&mut voice, 4, 0), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(voice.state(), State::Stopped);
        assert!(voice.is_stopped());

        // Stopped voices render silence.
        assert_eq!(render(&mut voice, 2, 4), vec![0.0, 0.0]);
    }

    #[test]
    fn test_one_shot_ignores_tail() {
        let mut voice = Voice::new(clip(&[1.0, 2.0], &[9.0, 9.0], 0), 1, 0, 1.0, false);
        assert_eq!(render(&mut voice, 5, 0), vec![1.0, 2.0, 0.0, 0.0, 0.0]);
        assert!(voice.is_stopped());
    }

    #[test]
    fn test_volume_scales_output() {
        let mut voice = Voice::new(clip(&[1.0, 2.0, 3.0, 4.0], &[], 0), 1, 0, 0.5, false);
        assert_eq!(render(&mut voice, 4, 0), vec![0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn test_rendering_is_additive() {
        let mut voice = Voice::new(clip(&[1.0, 1.0], &[], 0), 1, 0, 1.0, false);
        let mut mix = vec![0.25; 3];
        voice.render(&mut mix, 0);
        assert_eq!(mix, vec![1.25, 1.25, 0.25]);
    }

    #[test]
    fn test_pending_waits_for_trigger_boundary() {
        let mut voice = Voice::new(clip(&[1.0, 2.0, 3.0], &[], 0), 7, 4, 1.0, true);
        assert_eq!(voice.state(), State::Pending);

        // Global positions 1..=8: the first boundary is 4.
        let out = render(&mut voice, 8, 1);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 1.0, 2.0]);
        assert_eq!(voice.state(), State::Looping);
        assert_eq!(voice.prev_state(), State::Starting);
        assert_eq!(voice.segment_start(), Some(7));
    }

    #[test]
    fn test_pending_renders_nothing_before_boundary() {
        let mut voice = Voice::new(clip(&[1.0], &[], 0), 1, 100, 1.0, true);
        assert_eq!(render(&mut voice, 50, 1), vec![0.0; 50]);
        assert_eq!(voice.state(), State::Pending);
        assert_eq!(voice.segment_start(), None);
    }

    #[test]
    fn test_looping_mixes_tail_at_loop_start() {
        let mut voice = Voice::new(clip(&[1.0, 2.0], &[10.0], 0), 1, 0, 1.0, true);

        let out = render(&mut voice, 6, 0);
        assert_eq!(out, vec![1.0, 2.0, 11.0, 2.0, 11.0, 2.0]);
        assert_eq!(voice.state(), State::Looping);
    }

    #[test]
    fn test_stop_plays_tail_after_head_pass() {
        let mut voice = Voice::new(clip(&[1.0, 2.0], &[9.0], 0), 1, 0, 1.0, true);

        assert_eq!(render(&mut voice, 1, 0), vec![1.0]);
        assert_eq!(voice.state(), State::Starting);

        voice.set_stopping(0);
        assert_eq!(voice.state(), State::Stopping);
        assert_eq!(voice.prev_state(), State::Starting);

        assert_eq!(render(&mut voice, 4, 1), vec![2.0, 9.0, 0.0, 0.0]);
        assert!(voice.is_stopped());
    }

    #[test]
    fn test_stop_without_tail_stops_at_loop_boundary() {
        let mut voice = Voice::new(clip(&[1.0, 2.0, 3.0], &[], 0), 1, 0, 1.0, true);
        render(&mut voice, 4, 0);
        assert_eq!(voice.state(), State::Looping);

        voice.set_stopping(0);
        assert_eq!(render(&mut voice, 4, 4), vec![2.0, 3.0, 0.0, 0.0]);
        assert!(voice.is_stopped());
    }

    #[test]
    fn test_stop_before_start_is_immediate() {
        let mut voice = Voice::new(clip(&[1.0], &[9.0], 0), 1, 16, 1.0, true);
        voice.set_stopping(0);
        assert!(voice.is_stopped());

        let mut one_shot = Voice::new(clip(&[1.0], &[], 0), 2, 16, 1.0, false);
        one_shot.set_stopping(0);
        assert!(one_shot.is_stopped());
    }

    #[test]
    fn test_playing_one_shot_ignores_stop() {
        let mut voice = Voice::new(clip(&[1.0, 2.0, 3.0], &[], 0), 1, 0, 1.0, false);
        render(&mut voice, 1, 0);
        voice.set_stopping(0);
        assert_eq!(voice.state(), State::OneShot);
        assert_eq!(render(&mut voice, 3, 1), vec![2.0, 3.0, 0.0]);
    }

    #[test]
    fn test_pending_during_tail_restarts_after_tail() {
        let mut voice = Voice::new(clip(&[1.0, 2.0], &[7.0, 8.0], 0), 1, 0, 1.0, true);
        render(&mut voice, 1, 0);
        voice.set_stopping(0);
        // Finish the head, enter the tail.
        assert_eq!(render(&mut voice, 1, 1), vec![2.0]);
        assert_eq!(voice.state(), State::Tail);

        voice.set_pending(4, true);
        assert_eq!(voice.state(), State::TailPending);

        // Tail rings out at positions 2 and 3, the loop restarts on the boundary at 4.
        let out = render(&mut voice, 4, 2);
        assert_eq!(out, vec![7.0, 8.0, 1.0, 2.0]);
        assert_eq!(voice.state(), State::Looping);
    }

    #[test]
    fn test_one_shot_request_during_tail() {
        let mut voice = Voice::new(clip(&[1.0, 1.0], &[5.0, 5.0], 0), 1, 0, 1.0, true);
        render(&mut voice, 1, 0);
        voice.set_stopping(0);
        render(&mut voice, 2, 1);
        assert_eq!(voice.state(), State::Tail);

        voice.set_pending(0, false);
        assert_eq!(voice.state(), State::TailOneShot);
        // The head starts on the sample the tail ends on.
        let out = render(&mut voice, 5, 3);
        assert_eq!(out, vec![6.0, 1.0, 0.0, 0.0, 0.0]);
        assert!(voice.is_stopped());
    }

    #[test]
    fn test_stop_cancels_retrigger() {
        let mut voice = Voice::new(clip(&[1.0], &[5.0, 5.0, 5.0], 0), 1, 0, 1.0, true);
        render(&mut voice, 1, 0);
        voice.set_stopping(0);
        render(&mut voice, 1, 1);
        voice.set_pending(0, true);
        assert_eq!(voice.state(), State::TailPending);

        voice.set_stopping(0);
        assert_eq!(voice.state(), State::Tail);
        assert_eq!(render(&mut voice, 4, 2), vec![5.0, 5.0, 5.0, 0.0]);
        assert!(voice.is_stopped());
    }

    #[test]
    fn test_pending_revokes_stop() {
        let mut voice = Voice::new(clip(&[1.0, 2.0], &[9.0], 0), 1, 0, 1.0, true);
        render(&mut voice, 3, 0);
        assert_eq!(voice.state(), State::Looping);

        voice.set_stopping(0);
        voice.set_pending(0, true);
        assert_eq!(voice.state(), State::Looping);

        // No tail hand-off: the loop simply continues.
        assert_eq!(render(&mut voice, 3, 3), vec![2.0, 10.0, 2.0]);
    }

    #[test]
    fn test_pending_ignored_while_looping() {
        let mut voice = Voice::new(clip(&[1.0, 2.0], &[], 0), 1, 0, 1.0, true);
        render(&mut voice, 3, 0);
        voice.set_pending(64, false);
        assert_eq!(voice.state(), State::Looping);
        assert_eq!(voice.trigger_res(), 0);
    }

    #[test]
    fn test_pending_slot_last_write_wins() {
        let mut voice = Voice::new(clip(&[1.0, 2.0], &[], 0), 1, 8, 1.0, true);
        voice.set_pending(2, false);
        assert_eq!(voice.state(), State::OneShot);
        assert_eq!(voice.trigger_res(), 2);

        let out = render(&mut voice, 5, 1);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 0.0, 0.0]);
        assert!(voice.is_stopped());
    }

    #[test]
    fn test_stopped_voice_can_be_rearmed() {
        let mut voice = Voice::new(clip(&[1.0, 2.0], &[], 0), 1, 8, 1.0, true);
        voice.set_stopping(0);
        assert!(voice.is_stopped());

        voice.set_pending(0, false);
        assert_eq!(voice.state(), State::OneShot);
        assert_eq!(render(&mut voice, 3, 5), vec![1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_start_fades_in() {
        let mut voice = Voice::new(clip(&[1.0; 6], &[], 4), 1, 0, 1.0, true);
        let out = render(&mut voice, 8, 0);
        assert_eq!(out, vec![0.0, 0.25, 0.5, 0.75, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_stop_fades_out_and_tail_fades_in() {
        let mut voice = Voice::new(clip(&[1.0; 4], &[1.0; 4], 2), 1, 0, 1.0, true);
        // Get through the first pass so the start fade doesn't apply.
        render(&mut voice, 4, 0);
        voice.set_stopping(0);

        let out = render(&mut voice, 8, 4);
        // The looping pass mixes the tail (fading in) over the head while the head fades out.
        assert_eq!(out, vec![1.0, 1.5, 2.0, 1.5, 0.0, 0.5, 1.0, 1.0]);
        assert!(voice.is_stopped());
    }

    #[test]
    fn test_volume_change_takes_effect_immediately() {
        let mut voice = Voice::new(clip(&[1.0; 4], &[], 0), 1, 0, 1.0, true);
        assert_eq!(render(&mut voice, 2, 0), vec![1.0, 1.0]);
        voice.set_volume(0.25);
        assert_eq!(voice.volume(), 0.25);
        assert_eq!(render(&mut voice, 2, 2), vec![0.25, 0.25]);
    }

    #[test]
    fn test_empty_clip_stops_on_trigger() {
        let mut voice = Voice::new(Arc::new(Clip::default()), 1, 0, 1.0, true);
        assert_eq!(render(&mut voice, 2, 0), vec![0.0, 0.0]);
        assert!(voice.is_stopped());
    }

    #[test]
    fn test_from_start() {
        let start = VoiceStart::new(clip(&[1.0], &[], 0), 42, 16).with_volume(0.5);
        let voice = Voice::from_start(start, false);
        assert_eq!(voice.id(), 42);
        assert_eq!(voice.trigger_res(), 16);
        assert_eq!(voice.volume(), 0.5);
        assert_eq!(voice.state(), State::OneShot);
        assert_eq!(voice.clip().name(), "test");
    }
}
