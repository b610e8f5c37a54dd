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
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{error, info, span, Level};

use crate::config::{self, ConfigError};
use crate::launcher::{ClipLauncher, Command, LauncherError, VoiceId};

pub mod keyboard;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Starts a looping voice. Without a trigger, the clip's configured trigger is used.
    Start {
        voice: VoiceId,
        clip: String,
        trigger: Option<usize>,
    },

    /// Plays a clip's head once.
    OneShot {
        voice: VoiceId,
        clip: String,
        trigger: Option<usize>,
    },

    /// Stops a voice at its next loop boundary.
    Stop {
        voice: VoiceId,
        trigger: Option<usize>,
    },

    /// Stops every live voice.
    StopAll { trigger: Option<usize> },

    /// Sets a voice's gain.
    Volume { voice: VoiceId, gain: f32 },

    /// Resumes device pulls.
    Play,

    /// Pauses device pulls.
    Pause,

    /// Logs the launcher's state.
    Status,

    /// Shuts the controller down.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Drives a launcher from driver events and polls it for render-side notifications.
pub struct Controller {
    launcher: ClipLauncher,
    /// Default trigger resolution per clip name.
    triggers: HashMap<String, usize>,
    /// The clip each voice was last started with.
    voices: HashMap<VoiceId, String>,
    update_interval: Duration,
}

impl Controller {
    pub fn new(
        launcher: ClipLauncher,
        triggers: HashMap<String, usize>,
        update_interval: Duration,
    ) -> Controller {
        Controller {
            launcher,
            triggers,
            voices: HashMap::new(),
            update_interval,
        }
    }

    /// Creates a controller using the clip triggers and update interval from the config.
    pub fn from_config(
        launcher: ClipLauncher,
        config: &config::Launcher,
    ) -> Result<Controller, ConfigError> {
        let triggers = config
            .clips()
            .iter()
            .map(|clip| (clip.name().to_string(), clip.trigger()))
            .collect();
        Ok(Controller::new(
            launcher,
            triggers,
            config.engine().update_interval()?,
        ))
    }

    pub fn launcher(&self) -> &ClipLauncher {
        &self.launcher
    }

    /// Runs until the driver quits or closes its channel.
    pub fn run(&mut self, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, events_rx) = crossbeam_channel::bounded(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(
            clips = self.launcher.clips().len(),
            update_interval = format!("{:?}", self.update_interval),
            "Controller started."
        );

        self.event_loop(&events_rx);
        // Unblocks a driver waiting to send.
        drop(events_rx);

        match join_handle.join() {
            Ok(Err(e)) => error!("Event monitor failed: {}", e),
            Err(_) => error!("Event monitor panicked"),
            Ok(Ok(())) => {}
        }
        info!("Controller closing.");
    }

    fn event_loop(&mut self, events_rx: &Receiver<Event>) {
        loop {
            if let Err(e) = self.launcher.update() {
                error!("Error updating launcher: {}", e);
            }

            match events_rx.recv_timeout(self.update_interval) {
                Ok(Event::Quit) => return,
                Ok(event) => {
                    info!(event = format!("{:?}", event), "Received event.");
                    if let Err(e) = self.handle_event(event) {
                        error!("Error talking to launcher: {}", e);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    fn handle_event(&mut self, event: Event) -> Result<(), LauncherError> {
        match event {
            Event::Start {
                voice,
                clip,
                trigger,
            } => {
                let start = self
                    .launcher
                    .voice_start(&clip, voice, self.trigger_for_clip(&clip, trigger))?;
                self.launcher.handle_command(Command::StartVoice(start))?;
                self.voices.insert(voice, clip);
                self.ensure_playing()
            }
            Event::OneShot {
                voice,
                clip,
                trigger,
            } => {
                let start = self
                    .launcher
                    .voice_start(&clip, voice, self.trigger_for_clip(&clip, trigger))?;
                self.launcher.handle_command(Command::OneShot(start))?;
                self.voices.insert(voice, clip);
                self.ensure_playing()
            }
            Event::Stop { voice, trigger } => {
                let trigger_res = match trigger {
                    Some(trigger) => trigger,
                    None => self
                        .voices
                        .get(&voice)
                        .map_or(0, |clip| self.trigger_for_clip(clip, None)),
                };
                self.launcher
                    .handle_command(Command::StopVoice { voice, trigger_res })
            }
            Event::StopAll { trigger } => self.launcher.handle_command(Command::StopVoices {
                trigger_res: trigger.unwrap_or(0),
            }),
            Event::Volume { voice, gain } => self.launcher.handle_command(Command::SetVolume {
                voice,
                volume: gain,
            }),
            Event::Play => self.launcher.set_play_pause(true),
            Event::Pause => self.launcher.set_play_pause(false),
            Event::Status => {
                info!(
                    playing = self.launcher.is_playing(),
                    sample_position = self.launcher.sample_position(),
                    max_sample_count = self.launcher.max_sample_count(),
                    bufs_completed = self.launcher.bufs_completed(),
                    "Launcher status."
                );
                for clip in self.launcher.clips() {
                    info!(
                        clip = clip.name(),
                        head_samples = clip.num_samples(false),
                        tail_samples = clip.num_tail_samples(),
                        trigger = self.trigger_for_clip(clip.name(), None),
                        "Clip."
                    );
                }
                Ok(())
            }
            Event::Quit => Ok(()),
        }
    }

    fn trigger_for_clip(&self, clip: &str, trigger: Option<usize>) -> usize {
        trigger.unwrap_or_else(|| self.triggers.get(clip).copied().unwrap_or(0))
    }

    /// Starts pulls after a start request. The render side reports quiet once every
    /// voice has finished, and `update` pauses again.
    fn ensure_playing(&mut self) -> Result<(), LauncherError> {
        if !self.launcher.is_playing() {
            self.launcher.set_play_pause(true)?;
        }
        Ok(())
    }
}
