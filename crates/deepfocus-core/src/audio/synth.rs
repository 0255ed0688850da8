//! Ambient noise synthesizer.
//!
//! Owns the audio graph exclusively. At most one voice (buffer source plus
//! gain node) exists at a time; every sound switch releases the previous
//! voice before building the next one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::noise::{self, SoundId};
use super::port::{AudioPort, GainId, SourceId};
use crate::error::AudioError;

/// What the user chose to hear, and whether it is audible right now.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientConfig {
    pub sound_id: SoundId,
    pub volume: f32,
    pub is_playing: bool,
}

#[derive(Debug, Clone, Copy)]
struct Voice {
    source: SourceId,
    gain: GainId,
    sound: SoundId,
}

pub struct NoiseSynth<P: AudioPort> {
    port: P,
    sound: SoundId,
    volume: f32,
    voice: Option<Voice>,
    /// Set while a fade-out runs; the voice is stopped once it passes.
    fade_out_until: Option<Instant>,
}

impl<P: AudioPort> NoiseSynth<P> {
    pub fn new(port: P, volume: f32) -> Self {
        Self {
            port,
            sound: SoundId::Silent,
            volume: clamp_volume(volume),
            voice: None,
            fade_out_until: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.voice.is_some()
    }

    pub fn sound(&self) -> SoundId {
        self.sound
    }

    /// The sound actually audible, which differs from [`sound`](Self::sound)
    /// after a failed play.
    pub fn playing_sound(&self) -> Option<SoundId> {
        self.voice.map(|v| v.sound)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_fading_out(&self) -> bool {
        self.fade_out_until.is_some()
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Start looping `sound`, replacing whatever was playing.
    ///
    /// `Silent` only tears the graph down. If the output cannot be opened the
    /// synthesizer falls back to silence and the error is returned so a
    /// user-initiated call can be reported.
    pub fn play(&mut self, sound: SoundId) -> Result<(), AudioError> {
        self.release_voice();
        self.sound = sound;
        let Some(color) = sound.color() else {
            debug!("ambient sound set to silent");
            return Ok(());
        };

        if !self.port.is_active() {
            if let Err(e) = self.port.activate() {
                warn!("audio output unavailable, staying silent: {e}");
                self.sound = SoundId::Silent;
                return Err(e);
            }
        }

        let samples: Arc<[f32]> = noise::render_loop(
            color,
            self.port.sample_rate(),
            color.buffer_seconds(),
            &mut rand::thread_rng(),
        )
        .into();

        match self.build_voice(samples, sound) {
            Ok(voice) => {
                debug!(sound = %sound, volume = self.volume, "ambient sound started");
                self.voice = Some(voice);
                Ok(())
            }
            Err(e) => {
                warn!("failed to start ambient sound {sound}: {e}");
                self.sound = SoundId::Silent;
                Err(e)
            }
        }
    }

    /// Stop and release the current voice. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.voice.is_some() {
            debug!("ambient sound stopped");
        }
        self.release_voice();
    }

    /// Remembered for the next play; applied at once to a live voice.
    ///
    /// Overrides a fade-out in progress.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = clamp_volume(volume);
        self.fade_out_until = None;
        if let Some(voice) = self.voice {
            self.port.set_gain(voice.gain, self.volume);
        }
    }

    /// Ramp the live voice from silence up to the configured volume.
    pub fn fade_in(&mut self, duration: Duration) {
        let Some(voice) = self.voice else {
            return;
        };
        self.fade_out_until = None;
        self.port.set_gain(voice.gain, 0.0);
        self.port.ramp_gain(voice.gain, self.volume, duration);
    }

    /// Ramp the live voice down to silence; the voice is stopped by the first
    /// [`poll`](Self::poll) after the ramp ends.
    pub fn fade_out(&mut self, duration: Duration) {
        let Some(voice) = self.voice else {
            return;
        };
        if duration.is_zero() {
            self.stop();
            return;
        }
        self.port.ramp_gain(voice.gain, 0.0, duration);
        self.fade_out_until = Some(Instant::now() + duration);
    }

    /// Finish a completed fade-out.
    pub fn poll(&mut self, now: Instant) {
        if matches!(self.fade_out_until, Some(deadline) if now >= deadline) {
            self.stop();
        }
    }

    fn build_voice(&mut self, samples: Arc<[f32]>, sound: SoundId) -> Result<Voice, AudioError> {
        let source = self.port.create_buffer_source(samples, true)?;
        let gain = match self.port.create_gain(self.volume) {
            Ok(gain) => gain,
            Err(e) => {
                self.port.disconnect_source(source);
                return Err(e);
            }
        };
        let voice = Voice { source, gain, sound };
        let wired = self
            .port
            .connect(source, gain)
            .and_then(|()| self.port.start(source));
        if let Err(e) = wired {
            self.release(voice);
            return Err(e);
        }
        Ok(voice)
    }

    fn release_voice(&mut self) {
        self.fade_out_until = None;
        if let Some(voice) = self.voice.take() {
            self.release(voice);
        }
    }

    fn release(&mut self, voice: Voice) {
        self.port.stop(voice.source);
        self.port.disconnect_source(voice.source);
        self.port.disconnect_gain(voice.gain);
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        return 0.0;
    }
    volume.clamp(0.0, 1.0)
}
