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
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};

use cliplauncher::controller::keyboard;
use cliplauncher::{audio, config, loader};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sample-accurate clip launcher."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Loads and verifies every clip in the given launcher config.
    Clips {
        /// The path to the launcher config.
        config_path: String,
    },
    /// Starts the launcher with a keyboard controller on stdin.
    Start {
        /// The path to the launcher config.
        config_path: String,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Clips { config_path } => {
            let config = config::Launcher::deserialize(&PathBuf::from(&config_path))?;
            let spec = config.audio().spec()?;

            if config.clips().is_empty() {
                println!("No clips found in {}.", config_path);
                return Ok(());
            }

            println!("Clips (count: {}):", config.clips().len());
            for clip in config.clips() {
                let head = loader::load_file(clip.head_path(config.base_path()))?;
                let tail = match clip.tail_path(config.base_path()) {
                    Some(tail_path) => Some(loader::load_file(tail_path)?),
                    None => None,
                };

                println!(
                    "- {} (head: {} samples, tail: {} samples, fade: {} samples, trigger: {})",
                    clip.name(),
                    head.frames(),
                    tail.as_ref().map_or(0, |tail| tail.frames()),
                    spec.ms_to_samples(clip.fade_ms()),
                    clip.trigger(),
                );
                for (part, audio) in [("head", Some(&head)), ("tail", tail.as_ref())] {
                    let Some(audio) = audio else {
                        continue;
                    };
                    if audio.channels != 1 || audio.sample_rate != spec.sample_rate {
                        println!(
                            "  warning: {} is {} channel(s) at {} Hz, output is mono at {} Hz",
                            part, audio.channels, audio.sample_rate, spec.sample_rate
                        );
                    }
                }
            }
        }
        Commands::Start { config_path } => {
            let mut controller =
                config::init_launcher_and_controller(&PathBuf::from(config_path))?;
            controller.run(Arc::new(keyboard::Driver::new()));
        }
    }

    Ok(())
}
