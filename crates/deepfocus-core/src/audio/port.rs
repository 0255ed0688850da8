use std::sync::Arc;
use std::time::Duration;

use crate::error::AudioError;

/// Handle to a looping buffer source node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u64);

/// Handle to a gain node. Gain nodes feed the port's output directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GainId(pub u64);

/// The audio primitives the synthesizer needs from a platform.
///
/// The graph is deliberately tiny: `source -> gain -> output`. Keeping the
/// surface this small lets tests swap in a recording fake and lets the
/// software [`Mixer`](super::Mixer) stand in for a real device.
pub trait AudioPort {
    /// Bring the output up. Only called from a user-initiated play, since
    /// platforms commonly refuse to open audio before a user gesture.
    fn activate(&mut self) -> Result<(), AudioError>;

    fn is_active(&self) -> bool;

    fn sample_rate(&self) -> u32;

    fn create_buffer_source(
        &mut self,
        samples: Arc<[f32]>,
        looped: bool,
    ) -> Result<SourceId, AudioError>;

    fn create_gain(&mut self, value: f32) -> Result<GainId, AudioError>;

    fn connect(&mut self, source: SourceId, gain: GainId) -> Result<(), AudioError>;

    fn start(&mut self, source: SourceId) -> Result<(), AudioError>;

    /// Stop playback. Unknown handles are ignored.
    fn stop(&mut self, source: SourceId);

    /// Release the source node.
    fn disconnect_source(&mut self, source: SourceId);

    /// Release the gain node.
    fn disconnect_gain(&mut self, gain: GainId);

    /// Set gain immediately, cancelling any ramp in progress.
    fn set_gain(&mut self, gain: GainId, value: f32);

    /// Linear ramp from the current value to `target`.
    fn ramp_gain(&mut self, gain: GainId, target: f32, duration: Duration);

    /// Current gain value, `None` for a released node.
    fn gain(&self, gain: GainId) -> Option<f32>;

    /// Number of nodes (sources and gains) currently allocated.
    fn live_nodes(&self) -> usize;
}
