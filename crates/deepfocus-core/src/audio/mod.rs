//! Procedural ambient audio: noise generation, the audio port abstraction
//! and the synthesizer that drives it.

mod device;
mod mixer;
pub mod noise;
mod port;
mod synth;

pub use device::DeviceOutput;
pub use mixer::{Mixer, DEFAULT_SAMPLE_RATE};
pub use noise::{NoiseColor, SoundId};
pub use port::{AudioPort, GainId, SourceId};
pub use synth::{AmbientConfig, NoiseSynth};

#[cfg(test)]
pub(crate) use synth::fake;
