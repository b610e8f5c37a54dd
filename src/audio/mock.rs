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
use std::{fmt, sync::Arc, thread};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, span, Level};

use super::{AudioError, AudioSpec, RenderCallback};

/// A mock device. Doesn't produce any sound, but pulls buffers from the render callback
/// like a real device would.
#[derive(Clone)]
pub struct Device {
    name: String,
    /// When true, opening a stream spawns a thread that pulls one buffer per buffer
    /// period. Otherwise buffers are only pulled through `pull`.
    clocked: bool,
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    /// The callback of the open stream, if any.
    callback: Option<RenderCallback>,
    spec: Option<AudioSpec>,
    paused: bool,
    /// Number of pulls that reached the callback.
    pulls: usize,
}

/// A stream opened on the mock device.
struct Stream {
    state: Arc<Mutex<State>>,
    /// Dropping this stops the clock thread.
    _stop: Option<Sender<()>>,
}

impl Device {
    /// Gets the given mock device. Streams are clocked in real time.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            clocked: true,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Gets a mock device whose buffers are only pulled by calling `pull`.
    pub fn manual(name: &str) -> Device {
        Device {
            clocked: false,
            ..Device::get(name)
        }
    }

    /// Pulls one buffer from the open stream into `out`. Returns true if the render
    /// callback ran. A paused or closed stream yields silence.
    pub fn pull_into(&self, out: &mut [f32]) -> bool {
        pull(&self.state, out)
    }

    /// Pulls `samples` samples from the open stream.
    pub fn pull(&self, samples: usize) -> Vec<f32> {
        let mut out = vec![0.0; samples];
        self.pull_into(&mut out);
        out
    }

    /// Returns true if a stream is open and playing.
    pub fn is_playing(&self) -> bool {
        let state = self.state.lock();
        state.callback.is_some() && !state.paused
    }

    /// Returns true if a stream is open.
    pub fn is_open(&self) -> bool {
        self.state.lock().callback.is_some()
    }

    /// The number of pulls that reached the render callback.
    pub fn pulls(&self) -> usize {
        self.state.lock().pulls
    }

    /// The format of the open stream.
    pub fn spec(&self) -> Option<AudioSpec> {
        self.state.lock().spec.clone()
    }
}

fn pull(state: &Mutex<State>, out: &mut [f32]) -> bool {
    let mut state = state.lock();
    let state = &mut *state;
    match state.callback.as_mut() {
        Some(callback) if !state.paused => {
            callback(out);
            state.pulls += 1;
            true
        }
        _ => {
            out.fill(0.0);
            false
        }
    }
}

/// Pulls one buffer per period until the stream is dropped.
fn run_clock(state: Arc<Mutex<State>>, stop: Receiver<()>, spec: AudioSpec) {
    let span = span!(Level::DEBUG, "mock clock");
    let _enter = span.enter();

    let period = spec.buffer_duration();
    let mut buffer = vec![0.0; spec.buffer_size * spec.channels as usize];
    loop {
        match stop.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => {
                pull(&state, &mut buffer);
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Mock clock stopped");
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

        {
            let mut state = self.state.lock();
            state.callback = Some(callback);
            state.spec = Some(spec.clone());
            state.paused = true;
            state.pulls = 0;
        }
        info!(
            device = self.name,
            sample_rate = spec.sample_rate,
            buffer_size = spec.buffer_size,
            clocked = self.clocked,
            "Opened mock stream."
        );

        let stop = if self.clocked {
            let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
            let state = self.state.clone();
            let spec = spec.clone();
            thread::Builder::new()
                .name("mock-output".to_string())
                .spawn(move || run_clock(state, stop_rx, spec))?;
            Some(stop_tx)
        } else {
            None
        };

        Ok(Box::new(Stream {
            state: self.state.clone(),
            _stop: stop,
        }))
    }
}

impl super::Stream for Stream {
    fn set_paused(&self, paused: bool) -> Result<(), AudioError> {
        self.state.lock().paused = paused;
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.callback = None;
        state.spec = None;
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
