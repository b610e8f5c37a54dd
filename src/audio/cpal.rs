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
use std::{
    fmt,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, span, warn, Level};

use super::thread_priority::{
    configure_render_thread_priority, render_thread_priority, rt_audio_enabled,
};
use super::{AudioError, AudioSpec, RenderCallback};

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

/// Requests sent to the output thread.
enum StreamControl {
    Play(Sender<Result<(), AudioError>>),
    Pause(Sender<Result<(), AudioError>>),
}

/// A cpal stream. cpal streams can't be sent between threads, so the stream lives on
/// its own output thread and is controlled over a channel.
struct Stream {
    /// Closing this channel ends the output thread, which drops the cpal stream.
    control_tx: Option<Sender<StreamControl>>,
    paused: AtomicBool,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn super::Device>>, AudioError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn super::Device> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices that have at least one output configuration.
    fn list_cpal_devices() -> Result<Vec<Device>, AudioError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = match cpal::host_from_id(host_id) {
                Ok(host) => host,
                Err(e) => {
                    error!(err = e.to_string(), host = host_id.name(), "Host unavailable");
                    continue;
                }
            };
            let host_devices = match host.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);
                if max_channels == 0 {
                    continue;
                }

                let Ok(name) = device.name() else {
                    continue;
                };
                devices.push(Device {
                    name,
                    max_channels,
                    host_id,
                    device,
                })
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device.
    pub fn get(name: &str) -> Result<Device, AudioError> {
        Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))
    }

    /// Returns true if the device can output mono f32 at the given rate.
    fn supports(&self, spec: &AudioSpec) -> Result<bool, AudioError> {
        let configs = self
            .device
            .supported_output_configs()
            .map_err(|e| AudioError::Devices(e.to_string()))?;
        Ok(configs.into_iter().any(|config| {
            config.channels() == spec.channels
                && config.sample_format() == cpal::SampleFormat::F32
                && config.min_sample_rate().0 <= spec.sample_rate
                && spec.sample_rate <= config.max_sample_rate().0
        }))
    }
}

/// Builds the cpal stream, preferring the requested buffer size.
fn build_stream(
    device: &cpal::Device,
    spec: &AudioSpec,
    mut callback: RenderCallback,
) -> Result<cpal::Stream, AudioError> {
    let priority = render_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;
    let data_callback = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        configure_render_thread_priority(priority, rt_audio, &mut priority_set);
        callback(data);
    };
    let error_callback = |err: cpal::StreamError| error!("CPAL output stream error: {}", err);

    let fixed = cpal::StreamConfig {
        channels: spec.channels,
        sample_rate: cpal::SampleRate(spec.sample_rate),
        buffer_size: cpal::BufferSize::Fixed(spec.buffer_size as u32),
    };
    // Fall back to the host default if no config accepts the requested size.
    let fixed_supported = device
        .supported_output_configs()
        .map(|mut configs| {
            configs.any(|config| match config.buffer_size() {
                cpal::SupportedBufferSize::Range { min, max } => {
                    *min as usize <= spec.buffer_size && spec.buffer_size <= *max as usize
                }
                cpal::SupportedBufferSize::Unknown => true,
            })
        })
        .unwrap_or(true);

    let config = if fixed_supported {
        fixed
    } else {
        warn!(
            buffer_size = spec.buffer_size,
            "Buffer size not supported by device, using the default"
        );
        cpal::StreamConfig {
            buffer_size: cpal::BufferSize::Default,
            ..fixed
        }
    };

    let stream = device.build_output_stream(&config, data_callback, error_callback, None)?;
    // Streams may start playing on creation on some hosts.
    stream.pause()?;
    Ok(stream)
}

/// Owns the cpal stream until the control channel closes.
fn run_output_thread(
    device: cpal::Device,
    spec: AudioSpec,
    callback: RenderCallback,
    ready_tx: Sender<Result<(), AudioError>>,
    control_rx: Receiver<StreamControl>,
) {
    let span = span!(Level::INFO, "cpal output");
    let _enter = span.enter();

    let stream = match build_stream(&device, &spec, callback) {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    info!("CPAL output stream created");

    for control in control_rx.iter() {
        match control {
            StreamControl::Play(reply) => {
                let _ = reply.send(stream.play().map_err(AudioError::from));
            }
            StreamControl::Pause(reply) => {
                let _ = reply.send(stream.pause().map_err(AudioError::from));
            }
        }
    }

    info!("CPAL output stream closed");
}

impl super::Device for Device {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(
        &self,
        spec: &AudioSpec,
        callback: RenderCallback,
    ) -> Result<Box<dyn super::Stream>, AudioError> {
        spec.require_mono_f32()?;
        if !self.supports(spec)? {
            return Err(AudioError::UnsupportedConfig {
                device: self.name.clone(),
                sample_rate: spec.sample_rate,
            });
        }

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let (control_tx, control_rx) = crossbeam_channel::unbounded();
        let device = self.device.clone();
        let thread_spec = spec.clone();
        let output_thread = thread::Builder::new()
            .name("cpal-output".to_string())
            .spawn(move || run_output_thread(device, thread_spec, callback, ready_tx, control_rx))?;

        // Fail fast if the stream couldn't be built.
        ready_rx.recv().map_err(|_| AudioError::OutputThread)??;

        info!(
            device = self.name,
            sample_rate = spec.sample_rate,
            buffer_size = spec.buffer_size,
            "Opened output stream."
        );

        Ok(Box::new(Stream {
            control_tx: Some(control_tx),
            paused: AtomicBool::new(true),
            output_thread: Some(output_thread),
        }))
    }
}

impl super::Stream for Stream {
    fn set_paused(&self, paused: bool) -> Result<(), AudioError> {
        let control_tx = self.control_tx.as_ref().ok_or(AudioError::OutputThread)?;
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let control = if paused {
            StreamControl::Pause(reply_tx)
        } else {
            StreamControl::Play(reply_tx)
        };

        control_tx
            .send(control)
            .map_err(|_| AudioError::OutputThread)?;
        reply_rx.recv().map_err(|_| AudioError::OutputThread)??;
        self.paused.store(paused, Ordering::Relaxed);
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        // Close the control channel so the output thread exits and drops the stream.
        self.control_tx.take();
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}
