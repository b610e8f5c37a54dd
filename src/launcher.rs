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

//! The clip launcher engine.
//!
//! The control side (`ClipLauncher`) owns the clip registry and talks to the render side
//! (`Renderer`, running on the device thread) only through the mailbox. Clips are loaded
//! up front and shared with voices through an `Arc`; the registry keeps every clip for
//! the lifetime of the launcher, so the render thread never frees clip memory.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, info, span, warn, Level};

use crate::audio::{AudioSpec, Device, Stream};
use crate::config;
use crate::loader::{self, LoadedAudio};

pub mod clip;
pub mod command;
pub mod error;
mod mailbox;
mod renderer;
pub mod voice;

pub use clip::Clip;
pub use command::{Command, Notification, VoiceId, VoiceStart};
pub use error::LauncherError;

use mailbox::Mailbox;
use renderer::Renderer;

/// The control side of the engine.
pub struct ClipLauncher {
    /// The open output stream. Declared first so it closes before anything it renders
    /// from is dropped.
    stream: Option<Box<dyn Stream>>,
    /// The negotiated output format.
    spec: Option<AudioSpec>,
    mailbox: Arc<Mailbox>,
    /// Registered clips by name.
    clips: HashMap<String, Arc<Clip>>,
    /// The longest registered head, in samples.
    max_sample_count: Arc<AtomicUsize>,
    /// The render side's global sample position after its last pass.
    sample_pos: Arc<AtomicUsize>,
    /// Buffers rendered, as of the last `update`.
    bufs_completed: usize,
    max_voices: usize,
    /// Starts the render side refused for lack of a free voice slot.
    dropped_starts: Arc<AtomicUsize>,
    /// `dropped_starts` as of the last `update`.
    dropped_starts_seen: usize,
}

impl ClipLauncher {
    /// Creates an uninitialized launcher.
    pub fn new(command_capacity: usize, max_voices: usize) -> ClipLauncher {
        ClipLauncher {
            stream: None,
            spec: None,
            mailbox: Arc::new(Mailbox::new(command_capacity)),
            clips: HashMap::new(),
            max_sample_count: Arc::new(AtomicUsize::new(0)),
            sample_pos: Arc::new(AtomicUsize::new(0)),
            bufs_completed: 0,
            max_voices,
            dropped_starts: Arc::new(AtomicUsize::new(0)),
            dropped_starts_seen: 0,
        }
    }

    /// Creates an uninitialized launcher sized from the engine configuration.
    pub fn from_config(config: &config::Engine) -> ClipLauncher {
        ClipLauncher::new(config.command_capacity(), config.max_voices())
    }

    /// Opens a paused output stream on the device. Fails without side effects if the
    /// format isn't mono 32-bit float or the device refuses it.
    pub fn init(&mut self, device: &dyn Device, spec: AudioSpec) -> Result<(), LauncherError> {
        let span = span!(Level::INFO, "init launcher");
        let _enter = span.enter();

        if self.stream.is_some() {
            return Err(LauncherError::AlreadyInitialized);
        }
        spec.require_mono_f32()?;

        let renderer = Renderer::new(
            self.mailbox.clone(),
            self.max_sample_count.clone(),
            self.sample_pos.clone(),
            self.dropped_starts.clone(),
            self.max_voices,
        );
        let stream = device.open(&spec, renderer.into_callback())?;

        info!(
            device = device.name(),
            sample_rate = spec.sample_rate,
            buffer_size = spec.buffer_size,
            command_capacity = self.mailbox.capacity(),
            "Launcher initialized."
        );
        self.stream = Some(stream);
        self.spec = Some(spec);
        Ok(())
    }

    /// Loads and registers a clip. A tail that fails to load or doesn't match the output
    /// format is dropped with a warning. Registering a known name again does nothing.
    pub fn register_clip(
        &mut self,
        name: &str,
        head_path: &Path,
        tail_path: Option<&Path>,
        fade_ms: u32,
    ) -> Result<(), LauncherError> {
        let spec = self.registration_spec()?;
        if self.clips.contains_key(name) {
            debug!(clip = name, "Clip already registered");
            return Ok(());
        }

        let head = loader::load_file(head_path).map_err(|source| LauncherError::Load {
            name: name.to_string(),
            source,
        })?;
        check_format(name, &head, &spec)?;

        let tail = match tail_path {
            None => Vec::new(),
            Some(tail_path) => match loader::load_file(tail_path) {
                Ok(tail) => match check_format(name, &tail, &spec) {
                    Ok(()) => tail.samples,
                    Err(e) => {
                        warn!(clip = name, err = %e, "Dropping tail");
                        Vec::new()
                    }
                },
                Err(e) => {
                    warn!(clip = name, err = %e, "Dropping tail");
                    Vec::new()
                }
            },
        };

        let fade_samples = spec.ms_to_samples(fade_ms);
        self.insert_clip(Clip::new(name, head.samples, tail, fade_samples));
        Ok(())
    }

    /// Registers a clip from in-memory mono samples, with the same rules as
    /// `register_clip`.
    pub fn register_clip_samples(
        &mut self,
        name: &str,
        head: Vec<f32>,
        tail: Vec<f32>,
        fade_samples: usize,
    ) -> Result<(), LauncherError> {
        self.registration_spec()?;
        if self.clips.contains_key(name) {
            debug!(clip = name, "Clip already registered");
            return Ok(());
        }
        if head.is_empty() {
            return Err(LauncherError::EmptyClip(name.to_string()));
        }

        self.insert_clip(Clip::new(name, head, tail, fade_samples));
        Ok(())
    }

    /// Registration needs a negotiated format and a paused engine.
    fn registration_spec(&self) -> Result<AudioSpec, LauncherError> {
        let spec = self.spec.clone().ok_or(LauncherError::NotInitialized)?;
        if self.is_playing() {
            return Err(LauncherError::Playing);
        }
        Ok(spec)
    }

    fn insert_clip(&mut self, clip: Clip) {
        let head_samples = clip.num_samples(false);
        self.max_sample_count
            .fetch_max(head_samples, Ordering::Relaxed);
        info!(
            clip = clip.name(),
            head_samples,
            tail_samples = clip.num_tail_samples(),
            fade_samples = clip.num_fade_samples(),
            memory_kb = clip.memory_size() / 1024,
            "Registered clip."
        );
        self.clips.insert(clip.name().to_string(), Arc::new(clip));
    }

    /// Queues a single command for the render thread.
    pub fn handle_command(&self, command: Command) -> Result<(), LauncherError> {
        self.handle_commands(vec![command])
    }

    /// Queues a batch of commands. The batch is accepted or rejected as a whole. While
    /// paused, `StartVoice` ignores its trigger resolution so the voice starts on the
    /// first pass after playback resumes.
    pub fn handle_commands(&self, commands: Vec<Command>) -> Result<(), LauncherError> {
        if self.stream.is_none() {
            return Err(LauncherError::NotInitialized);
        }
        if commands.is_empty() {
            return Err(LauncherError::EmptyBatch);
        }

        let paused = !self.is_playing();
        let count = commands.len();
        let commands = commands.into_iter().map(|mut command| {
            if let Command::StartVoice(start) = &mut command {
                if paused {
                    start.trigger_res = 0;
                }
            }
            command
        });

        if !self.mailbox.lock().push_commands(commands) {
            warn!(count, "Command queue is full, dropping batch");
            return Err(LauncherError::QueueFull);
        }
        debug!(count, "Queued commands");
        Ok(())
    }

    /// Builds a start request for a registered clip.
    pub fn voice_start(
        &self,
        clip: &str,
        voice: VoiceId,
        trigger_res: usize,
    ) -> Result<VoiceStart, LauncherError> {
        let clip = self
            .clip(clip)
            .ok_or_else(|| LauncherError::UnknownClip(clip.to_string()))?;
        Ok(VoiceStart::new(clip, voice, trigger_res))
    }

    /// Collects notifications from the render thread. Pauses playback once no voices
    /// are live, unless commands are still waiting to be applied.
    pub fn update(&mut self) -> Result<(), LauncherError> {
        let all_quiet = {
            let mut queues = self.mailbox.lock();
            self.bufs_completed += queues.take_completed();
            let all_quiet = queues.is_all_quiet();
            if all_quiet {
                queues.clear_notifications();
            }
            all_quiet && queues.pending_commands() == 0
        };

        let dropped_starts = self.dropped_starts();
        if dropped_starts > self.dropped_starts_seen {
            warn!(
                dropped = dropped_starts - self.dropped_starts_seen,
                max_voices = self.max_voices,
                "Voice slots exhausted, starts dropped."
            );
            self.dropped_starts_seen = dropped_starts;
        }

        if all_quiet && self.is_playing() {
            info!(bufs_completed = self.bufs_completed, "All voices quiet, pausing.");
            self.set_play_pause(false)?;
        }
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|stream| !stream.is_paused())
    }

    /// Starts or stops device pulls.
    pub fn set_play_pause(&mut self, play: bool) -> Result<(), LauncherError> {
        let stream = self.stream.as_ref().ok_or(LauncherError::NotInitialized)?;
        if play {
            // Don't let a quiet report from before the pause stop us again.
            self.mailbox.lock().discard_all_quiet();
        }
        stream.set_paused(!play)?;
        info!(playing = play, "Playback toggled.");
        Ok(())
    }

    /// The negotiated sample rate, or 0 before `init`.
    pub fn sample_rate(&self) -> u32 {
        self.spec.as_ref().map_or(0, |spec| spec.sample_rate)
    }

    /// The requested frames per device pull, or 0 before `init`.
    pub fn buffer_size(&self) -> usize {
        self.spec.as_ref().map_or(0, |spec| spec.buffer_size)
    }

    /// The longest registered head, in samples.
    pub fn max_sample_count(&self) -> usize {
        self.max_sample_count.load(Ordering::Relaxed)
    }

    /// The render side's global sample position after its last pass.
    pub fn sample_position(&self) -> usize {
        self.sample_pos.load(Ordering::Relaxed)
    }

    /// Buffers rendered, as of the last `update`.
    pub fn bufs_completed(&self) -> usize {
        self.bufs_completed
    }

    /// Starts refused by the render side because every voice slot was taken.
    pub fn dropped_starts(&self) -> usize {
        self.dropped_starts.load(Ordering::Relaxed)
    }

    /// The number of samples in the named clip, or 0 if it isn't registered.
    pub fn num_samples_in_clip(&self, name: &str, include_tail: bool) -> usize {
        self.clips
            .get(name)
            .map_or(0, |clip| clip.num_samples(include_tail))
    }

    pub fn clip(&self, name: &str) -> Option<Arc<Clip>> {
        self.clips.get(name).cloned()
    }

    /// Registered clips, sorted by name.
    pub fn clips(&self) -> Vec<Arc<Clip>> {
        let mut clips: Vec<Arc<Clip>> = self.clips.values().cloned().collect();
        clips.sort_by(|a, b| a.name().cmp(b.name()));
        clips
    }
}

impl Default for ClipLauncher {
    fn default() -> Self {
        ClipLauncher::from_config(&config::Engine::default())
    }
}

/// Fails unless decoded audio can be played as-is in the output format.
fn check_format(name: &str, audio: &LoadedAudio, spec: &AudioSpec) -> Result<(), LauncherError> {
    if audio.samples.is_empty() {
        return Err(LauncherError::EmptyClip(name.to_string()));
    }
    if audio.channels != spec.channels || audio.sample_rate != spec.sample_rate {
        return Err(LauncherError::FormatMismatch {
            name: name.to_string(),
            channels: audio.channels,
            sample_rate: audio.sample_rate,
            expected_rate: spec.sample_rate,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::error::Error;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::audio::{mock, SampleFormat};
    use crate::testutil::{eventually, write_wav};

    const BUFFER: usize = 4;

    fn spec() -> AudioSpec {
        AudioSpec::mono_f32(44100, BUFFER).unwrap()
    }

    fn launcher() -> (ClipLauncher, mock::Device) {
        let device = mock::Device::manual("mock-device");
        let mut launcher = ClipLauncher::new(16, 8);
        launcher.init(&device, spec()).unwrap();
        (launcher, device)
    }

    fn start(launcher: &ClipLauncher, clip: &str, voice: VoiceId, res: usize) -> Command {
        Command::StartVoice(launcher.voice_start(clip, voice, res).unwrap())
    }

    fn one_shot(launcher: &ClipLauncher, clip: &str, voice: VoiceId) -> Command {
        Command::OneShot(launcher.voice_start(clip, voice, 0).unwrap())
    }

    #[test]
    fn test_uninitialized() {
        let mut launcher = ClipLauncher::default();
        assert!(!launcher.is_playing());
        assert_eq!(launcher.sample_rate(), 0);
        assert_eq!(launcher.buffer_size(), 0);

        assert!(matches!(
            launcher.register_clip_samples("a", vec![1.0], vec![], 0),
            Err(LauncherError::NotInitialized)
        ));
        assert!(matches!(
            launcher.handle_command(Command::StopVoices { trigger_res: 0 }),
            Err(LauncherError::NotInitialized)
        ));
        assert!(matches!(
            launcher.set_play_pause(true),
            Err(LauncherError::NotInitialized)
        ));
        assert!(launcher.update().is_ok());
    }

    #[test]
    fn test_init_rejects_other_formats() {
        let device = mock::Device::manual("mock-device");
        let mut launcher = ClipLauncher::new(16, 8);

        let stereo = AudioSpec::new(44100, 2, SampleFormat::Float, 32, 64).unwrap();
        assert!(matches!(
            launcher.init(&device, stereo),
            Err(LauncherError::Audio(_))
        ));
        let int = AudioSpec::new(44100, 1, SampleFormat::Int, 16, 64).unwrap();
        assert!(launcher.init(&device, int).is_err());

        // No partial state was left behind.
        assert!(!device.is_open());
        assert_eq!(launcher.sample_rate(), 0);
        assert!(launcher.init(&device, spec()).is_ok());
        assert!(matches!(
            launcher.init(&device, spec()),
            Err(LauncherError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_init_opens_paused() {
        let (launcher, device) = launcher();
        assert!(device.is_open());
        assert!(!launcher.is_playing());
        assert_eq!(launcher.sample_rate(), 44100);
        assert_eq!(launcher.buffer_size(), BUFFER);
        assert_eq!(device.spec(), Some(spec()));
    }

    #[test]
    fn test_register_clip_samples() {
        let (mut launcher, _device) = launcher();
        launcher
            .register_clip_samples("short", vec![1.0, 2.0], vec![9.0], 1)
            .unwrap();
        launcher
            .register_clip_samples("long", vec![1.0; 10], vec![], 0)
            .unwrap();

        assert_eq!(launcher.num_samples_in_clip("short", false), 2);
        assert_eq!(launcher.num_samples_in_clip("short", true), 3);
        assert_eq!(launcher.num_samples_in_clip("missing", true), 0);
        assert_eq!(launcher.max_sample_count(), 10);
        assert_eq!(launcher.clip("short").unwrap().num_fade_samples(), 1);

        let names: Vec<String> = launcher
            .clips()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["long", "short"]);

        assert!(matches!(
            launcher.register_clip_samples("empty", vec![], vec![1.0], 0),
            Err(LauncherError::EmptyClip(_))
        ));
        assert!(launcher.clip("empty").is_none());
    }

    #[test]
    fn test_reregistration_is_noop() {
        let (mut launcher, _device) = launcher();
        launcher
            .register_clip_samples("a", vec![1.0, 2.0], vec![], 0)
            .unwrap();
        launcher
            .register_clip_samples("a", vec![5.0; 20], vec![], 0)
            .unwrap();

        assert_eq!(launcher.num_samples_in_clip("a", false), 2);
        assert_eq!(launcher.max_sample_count(), 2);
    }

    #[test]
    fn test_register_refused_while_playing() {
        let (mut launcher, _device) = launcher();
        launcher.set_play_pause(true).unwrap();
        assert!(matches!(
            launcher.register_clip_samples("a", vec![1.0], vec![], 0),
            Err(LauncherError::Playing)
        ));
        launcher.set_play_pause(false).unwrap();
        assert!(launcher
            .register_clip_samples("a", vec![1.0], vec![], 0)
            .is_ok());
    }

    #[test]
    fn test_register_clip_from_files() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let head = dir.path().join("head.wav");
        let tail = dir.path().join("tail.wav");
        write_wav(head.clone(), vec![vec![0.5f32; 441]], 44100)?;
        write_wav(tail.clone(), vec![vec![0.25f32; 100]], 44100)?;

        let (mut launcher, _device) = launcher();
        launcher.register_clip("loop", &head, Some(tail.as_path()), 5)?;

        let clip = launcher.clip("loop").ok_or("missing clip")?;
        assert_eq!(clip.num_samples(false), 441);
        assert_eq!(clip.num_tail_samples(), 100);
        // 5ms at 44.1kHz.
        assert_eq!(clip.num_fade_samples(), 220);
        assert_eq!(clip.head()[0], 0.5);
        assert_eq!(clip.tail()[0], 0.25);
        assert_eq!(launcher.max_sample_count(), 441);
        Ok(())
    }

    #[test]
    fn test_bad_tail_is_dropped() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let head = dir.path().join("head.wav");
        let stereo_tail = dir.path().join("stereo.wav");
        write_wav(head.clone(), vec![vec![0.5f32; 10]], 44100)?;
        write_wav(
            stereo_tail.clone(),
            vec![vec![0.1f32; 10], vec![0.2f32; 10]],
            44100,
        )?;

        let (mut launcher, _device) = launcher();
        launcher.register_clip("mismatched", &head, Some(stereo_tail.as_path()), 0)?;
        let missing = dir.path().join("nope.wav");
        launcher.register_clip("missing", &head, Some(missing.as_path()), 0)?;

        assert_eq!(launcher.num_samples_in_clip("mismatched", true), 10);
        assert_eq!(launcher.num_samples_in_clip("missing", true), 10);
        Ok(())
    }

    #[test]
    fn test_bad_head_is_refused() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let wrong_rate = dir.path().join("48k.wav");
        let stereo = dir.path().join("stereo.wav");
        write_wav(wrong_rate.clone(), vec![vec![0.5f32; 10]], 48000)?;
        write_wav(stereo.clone(), vec![vec![0.5f32; 10], vec![0.5f32; 10]], 44100)?;

        let (mut launcher, _device) = launcher();
        assert!(matches!(
            launcher.register_clip("rate", &wrong_rate, None, 0),
            Err(LauncherError::FormatMismatch {
                sample_rate: 48000,
                ..
            })
        ));
        assert!(matches!(
            launcher.register_clip("stereo", &stereo, None, 0),
            Err(LauncherError::FormatMismatch { channels: 2, .. })
        ));
        assert!(matches!(
            launcher.register_clip("missing", &dir.path().join("nope.wav"), None, 0),
            Err(LauncherError::Load { .. })
        ));
        assert!(launcher.clips().is_empty());
        assert_eq!(launcher.max_sample_count(), 0);
        Ok(())
    }

    #[test]
    fn test_command_errors() {
        let (mut launcher, _device) = launcher();
        launcher
            .register_clip_samples("a", vec![1.0], vec![], 0)
            .unwrap();

        assert!(matches!(
            launcher.handle_commands(vec![]),
            Err(LauncherError::EmptyBatch)
        ));
        assert!(matches!(
            launcher.voice_start("nope", 1, 0),
            Err(LauncherError::UnknownClip(_))
        ));

        let batch: Vec<Command> = (0..16).map(|id| one_shot(&launcher, "a", id)).collect();
        launcher.handle_commands(batch).unwrap();
        assert!(matches!(
            launcher.handle_command(Command::StopVoices { trigger_res: 0 }),
            Err(LauncherError::QueueFull)
        ));
    }

    #[test]
    fn test_one_shot_round_trip() {
        let (mut launcher, device) = launcher();
        launcher
            .register_clip_samples("a", vec![1.0, 2.0, 3.0, 4.0], vec![], 0)
            .unwrap();
        let start = launcher.voice_start("a", 1, 0).unwrap().with_volume(0.5);
        launcher.handle_command(Command::OneShot(start)).unwrap();
        launcher.set_play_pause(true).unwrap();

        assert_eq!(device.pull(BUFFER), vec![0.5, 1.0, 1.5, 2.0]);
        assert_eq!(device.pull(BUFFER), vec![0.0; BUFFER]);
    }

    #[test]
    fn test_start_while_paused_ignores_trigger() {
        let (mut launcher, device) = launcher();
        launcher
            .register_clip_samples("a", vec![1.0; 8], vec![], 0)
            .unwrap();
        // A resolution this large would never fire within the test.
        launcher
            .handle_command(start(&launcher, "a", 1, 1_000_000))
            .unwrap();

        // Pulls while paused don't reach the renderer.
        assert_eq!(device.pull(BUFFER), vec![0.0; BUFFER]);

        launcher.set_play_pause(true).unwrap();
        assert_eq!(device.pull(BUFFER), vec![1.0; BUFFER]);
    }

    #[test]
    fn test_trigger_respected_while_playing() {
        let (mut launcher, device) = launcher();
        launcher
            .register_clip_samples("a", vec![1.0; 8], vec![], 0)
            .unwrap();
        launcher
            .register_clip_samples("b", vec![2.0; 8], vec![], 0)
            .unwrap();
        launcher.handle_command(start(&launcher, "a", 1, 0)).unwrap();
        launcher.set_play_pause(true).unwrap();
        assert_eq!(device.pull(BUFFER), vec![1.0; BUFFER]);

        // Starts at the next multiple of 8.
        launcher.handle_command(start(&launcher, "b", 2, 8)).unwrap();
        assert_eq!(device.pull(BUFFER), vec![1.0; BUFFER]);
        assert_eq!(device.pull(BUFFER), vec![3.0; BUFFER]);
    }

    #[test]
    fn test_looping_stop_plays_tail() {
        let (mut launcher, device) = launcher();
        launcher
            .register_clip_samples("a", vec![1.0, 2.0], vec![9.0], 0)
            .unwrap();
        launcher.handle_command(start(&launcher, "a", 1, 0)).unwrap();
        launcher.set_play_pause(true).unwrap();

        let mut first = [0.0; 1];
        device.pull_into(&mut first);
        assert_eq!(first, [1.0]);

        launcher
            .handle_command(Command::StopVoice {
                voice: 1,
                trigger_res: 0,
            })
            .unwrap();
        assert_eq!(device.pull(4), vec![2.0, 9.0, 0.0, 0.0]);
    }

    #[test]
    fn test_update_counts_buffers_and_pauses_when_quiet() {
        let (mut launcher, device) = launcher();
        launcher
            .register_clip_samples("a", vec![1.0; 6], vec![], 0)
            .unwrap();
        launcher.handle_command(one_shot(&launcher, "a", 1)).unwrap();
        launcher.set_play_pause(true).unwrap();

        device.pull(BUFFER);
        device.pull(BUFFER);
        launcher.update().unwrap();
        assert_eq!(launcher.bufs_completed(), 2);
        assert!(launcher.is_playing());

        // The voice was removed and the pass reported quiet.
        device.pull(BUFFER);
        launcher.update().unwrap();
        assert_eq!(launcher.bufs_completed(), 3);
        assert!(!launcher.is_playing());
        assert!(!device.is_playing());
    }

    #[test]
    fn test_update_keeps_playing_with_pending_commands() {
        let (mut launcher, device) = launcher();
        launcher
            .register_clip_samples("a", vec![1.0; 4], vec![], 0)
            .unwrap();
        launcher.set_play_pause(true).unwrap();
        device.pull(BUFFER);

        // Quiet was reported, but a start is waiting to be applied.
        launcher.handle_command(one_shot(&launcher, "a", 1)).unwrap();
        launcher.update().unwrap();
        assert!(launcher.is_playing());
        assert_eq!(device.pull(BUFFER), vec![1.0; BUFFER]);
    }

    #[test]
    fn test_play_discards_stale_quiet() {
        let (mut launcher, device) = launcher();
        launcher
            .register_clip_samples("a", vec![1.0; 4], vec![], 0)
            .unwrap();
        launcher.set_play_pause(true).unwrap();
        device.pull(BUFFER);
        launcher.set_play_pause(false).unwrap();

        launcher.set_play_pause(true).unwrap();
        launcher.update().unwrap();
        assert!(launcher.is_playing());
    }

    #[test]
    fn test_sample_position_wraps() {
        let (mut launcher, device) = launcher();
        launcher
            .register_clip_samples("a", vec![1.0; 7], vec![], 0)
            .unwrap();
        launcher.handle_command(start(&launcher, "a", 1, 0)).unwrap();
        launcher.set_play_pause(true).unwrap();

        for _ in 0..25 {
            device.pull(BUFFER);
            assert!(launcher.sample_position() < launcher.max_sample_count());
        }
        assert_eq!(launcher.sample_position(), (25 * BUFFER) % 7);
    }

    #[test]
    fn test_quiet_report_does_not_pause_revived_voice() {
        let (mut launcher, device) = launcher();
        launcher
            .register_clip_samples("a", vec![1.0; 8], vec![], 0)
            .unwrap();
        launcher.set_play_pause(true).unwrap();

        // A pass with no voices reports quiet.
        assert_eq!(device.pull(BUFFER), vec![0.0; BUFFER]);

        launcher.handle_command(start(&launcher, "a", 1, 0)).unwrap();
        assert_eq!(device.pull(BUFFER), vec![1.0; BUFFER]);

        launcher.update().unwrap();
        assert!(launcher.is_playing());
        assert_eq!(device.pull(BUFFER), vec![1.0; BUFFER]);
    }

    #[test]
    fn test_starts_beyond_max_voices_are_dropped() {
        let device = mock::Device::manual("mock-device");
        let mut launcher = ClipLauncher::new(16, 2);
        launcher.init(&device, spec()).unwrap();
        launcher
            .register_clip_samples("a", vec![1.0; 8], vec![], 0)
            .unwrap();
        launcher.set_play_pause(true).unwrap();

        launcher
            .handle_commands(vec![
                start(&launcher, "a", 1, 0),
                start(&launcher, "a", 2, 0),
                start(&launcher, "a", 3, 0),
            ])
            .unwrap();
        assert_eq!(device.pull(BUFFER), vec![2.0; BUFFER]);
        assert_eq!(launcher.dropped_starts(), 1);

        // Re-arming a live voice doesn't need a free slot.
        launcher.handle_command(one_shot(&launcher, "a", 2)).unwrap();
        device.pull(BUFFER);
        assert_eq!(launcher.dropped_starts(), 1);

        launcher.update().unwrap();
        assert!(launcher.is_playing());
    }

    #[test]
    fn test_interleaved_control_and_render() {
        let (mut launcher, _device) = launcher();
        launcher
            .register_clip_samples("a", vec![0.1; 5], vec![0.1; 3], 1)
            .unwrap();
        launcher.set_play_pause(true).unwrap();

        // Drive a renderer wired to the same mailbox at a fixed cadence.
        let mut renderer = Renderer::new(
            launcher.mailbox.clone(),
            launcher.max_sample_count.clone(),
            launcher.sample_pos.clone(),
            launcher.dropped_starts.clone(),
            8,
        );
        let done = Arc::new(AtomicBool::new(false));
        let render_thread = {
            let done = done.clone();
            thread::spawn(move || {
                let mut out = vec![0.0; BUFFER];
                let mut passes = 0;
                while !done.load(Ordering::Relaxed) {
                    renderer.render(&mut out);
                    passes += 1;

                    let ids: HashSet<VoiceId> =
                        renderer.voices().iter().map(|voice| voice.id()).collect();
                    assert_eq!(ids.len(), renderer.voices().len());
                    assert!(renderer.sample_pos() < 5);
                    thread::sleep(Duration::from_micros(200));
                }
                passes
            })
        };

        let mut accepted = 0;
        for round in 0..200 {
            let id = round % 5;
            let command = match round % 4 {
                0 => start(&launcher, "a", id, (round % 3) as usize),
                1 => one_shot(&launcher, "a", id),
                2 => Command::StopVoice {
                    voice: id,
                    trigger_res: 0,
                },
                _ => Command::SetVolume {
                    voice: id,
                    volume: 0.5,
                },
            };
            if launcher.handle_command(command).is_ok() {
                accepted += 1;
            }
            thread::sleep(Duration::from_micros(100));
        }

        eventually(
            || launcher.mailbox.lock().pending_commands() == 0,
            "Render thread never drained the queue",
        );
        done.store(true, Ordering::Relaxed);
        let passes = render_thread.join().unwrap();

        assert!(passes > 0);
        assert!(accepted > 0);
        launcher.update().unwrap();
        assert!(launcher.bufs_completed() > 0);
    }
}
