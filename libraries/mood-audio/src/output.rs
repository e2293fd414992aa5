//! Desktop audio output via cpal
//!
//! A dedicated thread owns the device and at most one `Stream`. Graphs are
//! attached to it over a command channel; attaching a new graph drops the
//! previous stream first, so two tracks never sound at once.

use crate::error::{AudioError, Result};
use crate::graph::SharedGraph;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

/// Identifies one attached graph; commands for stale ids are ignored
pub type AttachmentId = u64;

enum OutputCommand {
    Attach {
        id: AttachmentId,
        graph: SharedGraph,
        reply: Sender<Result<()>>,
    },
    Pause(AttachmentId),
    Resume {
        id: AttachmentId,
        reply: Sender<Result<()>>,
    },
    Detach(AttachmentId),
}

/// Handle to the output thread
///
/// Cheap to clone. The thread exits once every handle is dropped.
#[derive(Clone)]
pub struct CpalOutput {
    command_tx: Sender<OutputCommand>,
    sample_rate: u32,
    next_id: Arc<AtomicU64>,
}

impl CpalOutput {
    /// Open the default output device
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::DeviceNotFound)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::OutputRejected(e.to_string()))?;

        let sample_rate = config.sample_rate();
        let config = config.config();

        Self::with_device_and_config(device, config, sample_rate)
    }

    fn with_device_and_config(
        device: Device,
        config: StreamConfig,
        sample_rate: u32,
    ) -> Result<Self> {
        let (command_tx, command_rx) = bounded::<OutputCommand>(32);

        thread::Builder::new()
            .name("mood-audio-output".into())
            .spawn(move || Self::audio_thread_run(&device, &config, &command_rx))?;

        tracing::info!(sample_rate, "Audio output ready");

        Ok(Self {
            command_tx,
            sample_rate,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Device sample rate; graphs should be built at this rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Start playing `graph`, replacing whatever was attached
    pub fn attach(&self, graph: SharedGraph) -> Result<AttachmentId> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, response) = bounded(1);
        self.send(OutputCommand::Attach { id, graph, reply })?;
        Self::await_reply(&response)?;
        Ok(id)
    }

    pub fn pause(&self, id: AttachmentId) {
        let _ = self.send(OutputCommand::Pause(id));
    }

    pub fn resume(&self, id: AttachmentId) -> Result<()> {
        let (reply, response) = bounded(1);
        self.send(OutputCommand::Resume { id, reply })?;
        Self::await_reply(&response)
    }

    /// Stop and drop the stream if `id` is still the attached graph
    pub fn detach(&self, id: AttachmentId) {
        let _ = self.send(OutputCommand::Detach(id));
    }

    fn send(&self, command: OutputCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| AudioError::OutputRejected("output thread has exited".into()))
    }

    fn await_reply(response: &Receiver<Result<()>>) -> Result<()> {
        response
            .recv()
            .map_err(|_| AudioError::OutputRejected("output thread has exited".into()))?
    }

    fn audio_thread_run(device: &Device, config: &StreamConfig, command_rx: &Receiver<OutputCommand>) {
        let mut current: Option<(AttachmentId, Stream)> = None;

        while let Ok(cmd) = command_rx.recv() {
            match cmd {
                OutputCommand::Attach { id, graph, reply } => {
                    // Drop the old stream before the new one starts
                    current = None;
                    let result = Self::build_stream(device, config, graph).and_then(|stream| {
                        stream
                            .play()
                            .map_err(|e| AudioError::OutputRejected(e.to_string()))?;
                        current = Some((id, stream));
                        Ok(())
                    });
                    if let Err(e) = &result {
                        tracing::error!("Failed to start output stream: {}", e);
                    }
                    let _ = reply.send(result);
                }
                OutputCommand::Pause(id) => {
                    if let Some((_, stream)) = current.as_ref().filter(|(current_id, _)| *current_id == id) {
                        if let Err(e) = stream.pause() {
                            tracing::warn!("Failed to pause stream: {}", e);
                        }
                    }
                }
                OutputCommand::Resume { id, reply } => {
                    let result = match current.as_ref().filter(|(current_id, _)| *current_id == id) {
                        Some((_, stream)) => stream
                            .play()
                            .map_err(|e| AudioError::OutputRejected(e.to_string())),
                        None => Err(AudioError::OutputRejected("graph is no longer attached".into())),
                    };
                    let _ = reply.send(result);
                }
                OutputCommand::Detach(id) => {
                    if current.as_ref().is_some_and(|(current_id, _)| *current_id == id) {
                        current = None;
                    }
                }
            }
        }

        tracing::debug!("Audio output thread exiting");
    }

    fn build_stream(device: &Device, config: &StreamConfig, graph: SharedGraph) -> Result<Stream> {
        let channels = usize::from(config.channels);
        let mut stereo: Vec<f32> = Vec::new();

        device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    Self::audio_callback(data, channels, &graph, &mut stereo);
                },
                |err| tracing::error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::OutputRejected(e.to_string()))
    }

    /// Render the graph into a device buffer of any channel count
    fn audio_callback(data: &mut [f32], channels: usize, graph: &SharedGraph, stereo: &mut Vec<f32>) {
        let frames = data.len() / channels.max(1);
        stereo.resize(frames * 2, 0.0);

        // Never block the device thread on the control side
        match graph.try_lock() {
            Ok(mut graph) => {
                graph.render(stereo);
            }
            Err(_) => stereo.fill(0.0),
        }

        match channels {
            1 => {
                for (out, frame) in data.iter_mut().zip(stereo.chunks_exact(2)) {
                    *out = (frame[0] + frame[1]) * 0.5;
                }
            }
            _ => {
                for (out, frame) in data.chunks_exact_mut(channels).zip(stereo.chunks_exact(2)) {
                    out[0] = frame[0];
                    out[1] = frame[1];
                    out[2..].fill(0.0);
                }
            }
        }
    }
}

impl std::fmt::Debug for CpalOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalOutput")
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}
