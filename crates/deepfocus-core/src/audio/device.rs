//! Platform output through `cpal`.
//!
//! The graph itself lives in a shared [`Mixer`]; the device stream callback
//! renders from it. The stream is only opened on `activate`, which the
//! synthesizer calls from the first user-initiated play.
//!
//! Without the `device-audio` feature there is no stream to open, so
//! `activate` fails and the synthesizer stays silent.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[cfg(feature = "device-audio")]
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
#[cfg(feature = "device-audio")]
use tracing::{error, info};

use super::mixer::Mixer;
use super::port::{AudioPort, GainId, SourceId};
use crate::error::AudioError;

#[cfg(feature = "device-audio")]
type Stream = cpal::Stream;
#[cfg(not(feature = "device-audio"))]
type Stream = ();

pub struct DeviceOutput {
    mixer: Arc<Mutex<Mixer>>,
    stream: Option<Stream>,
}

impl DeviceOutput {
    pub fn new() -> Self {
        Self {
            mixer: Arc::new(Mutex::new(Mixer::default())),
            stream: None,
        }
    }

    fn mixer(&self) -> MutexGuard<'_, Mixer> {
        self.mixer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(not(feature = "device-audio"))]
    fn open_stream(&self) -> Result<(Stream, u32), AudioError> {
        Err(AudioError::Unavailable(
            "built without the device-audio feature".into(),
        ))
    }

    #[cfg(feature = "device-audio")]
    fn open_stream(&self) -> Result<(Stream, u32), AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::Unavailable("no default output device".into()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::Unavailable(e.to_string()))?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::Unavailable(format!(
                "unsupported sample format {:?}",
                supported.sample_format()
            )));
        }

        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();
        let channels = usize::from(config.channels);
        let mixer = Arc::clone(&self.mixer);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut mixer = mixer.lock().unwrap_or_else(|p| p.into_inner());
                    mixer.render_interleaved(data, channels);
                },
                |err| error!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| AudioError::Unavailable(e.to_string()))?;
        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        info!(sample_rate, channels, "audio output opened");
        Ok((stream, sample_rate))
    }
}

impl Default for DeviceOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPort for DeviceOutput {
    fn activate(&mut self) -> Result<(), AudioError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let (stream, sample_rate) = self.open_stream()?;
        {
            let mut mixer = self.mixer();
            mixer.set_sample_rate(sample_rate);
            mixer.activate()?;
        }
        self.stream = Some(stream);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    fn sample_rate(&self) -> u32 {
        self.mixer().sample_rate()
    }

    fn create_buffer_source(
        &mut self,
        samples: Arc<[f32]>,
        looped: bool,
    ) -> Result<SourceId, AudioError> {
        self.mixer().create_buffer_source(samples, looped)
    }

    fn create_gain(&mut self, value: f32) -> Result<GainId, AudioError> {
        self.mixer().create_gain(value)
    }

    fn connect(&mut self, source: SourceId, gain: GainId) -> Result<(), AudioError> {
        self.mixer().connect(source, gain)
    }

    fn start(&mut self, source: SourceId) -> Result<(), AudioError> {
        self.mixer().start(source)
    }

    fn stop(&mut self, source: SourceId) {
        self.mixer().stop(source)
    }

    fn disconnect_source(&mut self, source: SourceId) {
        self.mixer().disconnect_source(source)
    }

    fn disconnect_gain(&mut self, gain: GainId) {
        self.mixer().disconnect_gain(gain)
    }

    fn set_gain(&mut self, gain: GainId, value: f32) {
        self.mixer().set_gain(gain, value)
    }

    fn ramp_gain(&mut self, gain: GainId, target: f32, duration: Duration) {
        self.mixer().ramp_gain(gain, target, duration)
    }

    fn gain(&self, gain: GainId) -> Option<f32> {
        self.mixer().gain(gain)
    }

    fn live_nodes(&self) -> usize {
        self.mixer().live_nodes()
    }
}
