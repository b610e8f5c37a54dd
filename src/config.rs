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
use std::collections::HashSet;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use config::{Config, File};
use serde::Deserialize;
use tracing::{info, span, Level};

use crate::controller::Controller;
use crate::launcher::ClipLauncher;

mod audio;
mod clip;
mod engine;
pub mod error;

pub use self::audio::Audio;
pub use self::clip::ClipDefinition;
pub use self::engine::Engine;
pub use self::error::ConfigError;

/// The launcher configuration file.
#[derive(Deserialize, Clone, Debug)]
pub struct Launcher {
    /// The output device and format.
    audio: Audio,

    /// Engine sizing and timing.
    #[serde(default)]
    engine: Engine,

    /// Clips to register at startup.
    #[serde(default)]
    clips: Vec<ClipDefinition>,

    /// The directory relative clip paths resolve against.
    #[serde(skip)]
    base_path: PathBuf,
}

impl Launcher {
    /// Parse a launcher configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Launcher, ConfigError> {
        let mut launcher = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Launcher>()?;

        let mut names = HashSet::new();
        for clip in &launcher.clips {
            if !names.insert(clip.name()) {
                return Err(ConfigError::DuplicateClip(clip.name().to_string()));
            }
        }

        launcher.base_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(launcher)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn clips(&self) -> &[ClipDefinition] {
        &self.clips
    }

    pub fn clip(&self, name: &str) -> Option<&ClipDefinition> {
        self.clips.iter().find(|clip| clip.name() == name)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

/// Loads the configuration at `path`, brings up its launcher and wraps it in a
/// controller.
pub fn init_launcher_and_controller(path: &Path) -> Result<Controller, Box<dyn Error>> {
    let config = Launcher::deserialize(path)?;
    let launcher = init_launcher(&config)?;
    Ok(Controller::from_config(launcher, &config)?)
}

/// Opens the configured device, initializes a launcher on it and registers every
/// configured clip. The launcher is left paused.
pub fn init_launcher(config: &Launcher) -> Result<ClipLauncher, Box<dyn Error>> {
    let span = span!(Level::INFO, "init launcher from config");
    let _enter = span.enter();

    let device = crate::audio::get_device(config.audio())?;
    init_launcher_on(config, device)
}

/// Like `init_launcher`, on an already opened device.
pub fn init_launcher_on(
    config: &Launcher,
    device: Arc<dyn crate::audio::Device>,
) -> Result<ClipLauncher, Box<dyn Error>> {
    let mut launcher = ClipLauncher::from_config(config.engine());
    launcher.init(device.as_ref(), config.audio().spec()?)?;

    for clip in config.clips() {
        let head = clip.head_path(config.base_path());
        let tail = clip.tail_path(config.base_path());
        launcher.register_clip(clip.name(), &head, tail.as_deref(), clip.fade_ms())?;
    }

    info!(
        device = device.to_string(),
        clips = config.clips().len(),
        max_sample_count = launcher.max_sample_count(),
        "Launcher ready."
    );
    Ok(launcher)
}
