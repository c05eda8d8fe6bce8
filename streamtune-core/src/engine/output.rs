use anyhow::Context;
use rodio::{
    DeviceTrait, OutputStream, OutputStreamBuilder, Sink,
    cpal::{self, traits::HostTrait},
};

use crate::{error::StreamError, source::BufferedSource};

/// The single audio sink owned by the engine.
///
/// Implementations are created on, and stay on, the player thread.
pub trait AudioOutput {
    /// Replace whatever is playing with `source`
    fn start(&mut self, source: BufferedSource, volume: f32, playing: bool)
    -> Result<(), StreamError>;
    fn play(&mut self);
    fn pause(&mut self);
    /// Drop the current source
    fn stop(&mut self);
    fn set_volume(&mut self, volume: f32);
}

/// Default output device via rodio.
///
/// The device is opened lazily: when none is available, [`AudioOutput::start`]
/// fails with [`StreamError::Output`] and the next start tries again.
pub struct RodioOutput {
    stream: Option<OutputStream>,
    sink: Option<Sink>,
}

impl RodioOutput {
    /// Try the default device now; a missing device is reported on first start
    pub fn new() -> Self {
        let stream = match open_default_stream() {
            Ok(stream) => Some(stream),
            Err(e) => {
                log::error!("No audio output yet: {:#}", e);
                None
            }
        };
        Self { stream, sink: None }
    }

    fn stream(&mut self) -> Result<&OutputStream, StreamError> {
        if self.stream.is_none() {
            let stream = open_default_stream()
                .map_err(|e| StreamError::Output(format!("no audio output device: {e:#}")))?;
            self.stream = Some(stream);
        }
        self.stream
            .as_ref()
            .ok_or_else(|| StreamError::Output("no audio output device".to_string()))
    }
}

impl Default for RodioOutput {
    fn default() -> Self {
        Self::new()
    }
}

fn open_default_stream() -> anyhow::Result<OutputStream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("No default output device found")?;

    let device_name = device.name().unwrap_or_else(|_| "(unknown)".to_string());

    let stream_builder = OutputStreamBuilder::from_device(device)
        .context("Cannot create output stream builder from device")?;

    let mut stream = stream_builder
        .open_stream()
        .context("Cannot create stream output")?;
    stream.log_on_drop(false);

    log::info!("Audio output opened on {}", device_name);
    Ok(stream)
}

impl AudioOutput for RodioOutput {
    fn start(
        &mut self,
        source: BufferedSource,
        volume: f32,
        playing: bool,
    ) -> Result<(), StreamError> {
        self.stop();
        let sink = Sink::connect_new(self.stream()?.mixer());
        sink.pause();
        sink.set_volume(volume);
        sink.append(source);
        if playing {
            sink.play();
        }
        self.sink = Some(sink);
        Ok(())
    }

    fn play(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn set_volume(&mut self, volume: f32) {
        if let Some(sink) = &self.sink {
            sink.set_volume(volume);
        }
    }
}

/// The output the player uses
pub fn default_output() -> Box<dyn AudioOutput> {
    Box::new(RodioOutput::new())
}
