//! Software audio graph.
//!
//! `Mixer` implements [`AudioPort`] entirely in memory and renders mono
//! frames on demand. A device backend pulls from it inside its stream
//! callback; tests pull from it directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::port::{AudioPort, GainId, SourceId};
use crate::error::AudioError;

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

#[derive(Debug)]
struct SourceNode {
    samples: Arc<[f32]>,
    looped: bool,
    position: usize,
    playing: bool,
    gain: Option<u64>,
}

impl SourceNode {
    fn next_sample(&mut self) -> f32 {
        if self.samples.is_empty() {
            self.playing = false;
            return 0.0;
        }
        if self.position >= self.samples.len() {
            if !self.looped {
                self.playing = false;
                return 0.0;
            }
            self.position = 0;
        }
        let sample = self.samples[self.position];
        self.position += 1;
        sample
    }
}

#[derive(Debug, Clone, Copy)]
struct Ramp {
    from: f32,
    to: f32,
    total: u64,
    done: u64,
}

#[derive(Debug)]
struct GainNode {
    value: f32,
    ramp: Option<Ramp>,
}

impl GainNode {
    fn advance(&mut self) {
        let Some(ramp) = self.ramp.as_mut() else {
            return;
        };
        ramp.done += 1;
        if ramp.done >= ramp.total {
            self.value = ramp.to;
            self.ramp = None;
        } else {
            let t = ramp.done as f32 / ramp.total as f32;
            self.value = ramp.from + (ramp.to - ramp.from) * t;
        }
    }
}

#[derive(Debug)]
pub struct Mixer {
    sample_rate: u32,
    active: bool,
    next_id: u64,
    sources: HashMap<u64, SourceNode>,
    gains: HashMap<u64, GainNode>,
    /// Mono frames for `render_interleaved`, kept between device callbacks.
    scratch: Vec<f32>,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            active: false,
            next_id: 1,
            sources: HashMap::new(),
            gains: HashMap::new(),
            scratch: Vec::new(),
        }
    }

    pub(crate) fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate.max(1);
    }

    /// Mix every playing source into `out`, advancing gain ramps by one
    /// step per frame.
    pub fn render(&mut self, out: &mut [f32]) {
        let Mixer { sources, gains, .. } = self;
        for frame in out.iter_mut() {
            let mut acc = 0.0;
            for source in sources.values_mut().filter(|s| s.playing) {
                let Some(gain) = source.gain.and_then(|id| gains.get(&id)) else {
                    continue;
                };
                acc += source.next_sample() * gain.value;
            }
            for gain in gains.values_mut() {
                gain.advance();
            }
            *frame = acc.clamp(-1.0, 1.0);
        }
    }

    /// Render into an interleaved buffer, copying the mono signal to every
    /// channel.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let mut mono = std::mem::take(&mut self.scratch);
        mono.clear();
        mono.resize(out.len() / channels, 0.0);
        self.render(&mut mono);
        for (frame, sample) in out.chunks_mut(channels).zip(&mono) {
            frame.fill(*sample);
        }
        self.scratch = mono;
    }

    /// Sources that are currently producing sound.
    pub fn playing_sources(&self) -> usize {
        self.sources.values().filter(|s| s.playing).count()
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl AudioPort for Mixer {
    fn activate(&mut self) -> Result<(), AudioError> {
        self.active = true;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn create_buffer_source(
        &mut self,
        samples: Arc<[f32]>,
        looped: bool,
    ) -> Result<SourceId, AudioError> {
        let id = self.alloc_id();
        self.sources.insert(
            id,
            SourceNode {
                samples,
                looped,
                position: 0,
                playing: false,
                gain: None,
            },
        );
        Ok(SourceId(id))
    }

    fn create_gain(&mut self, value: f32) -> Result<GainId, AudioError> {
        let id = self.alloc_id();
        self.gains.insert(id, GainNode { value, ramp: None });
        Ok(GainId(id))
    }

    fn connect(&mut self, source: SourceId, gain: GainId) -> Result<(), AudioError> {
        if !self.gains.contains_key(&gain.0) {
            return Err(AudioError::UnknownNode(gain.0));
        }
        let node = self
            .sources
            .get_mut(&source.0)
            .ok_or(AudioError::UnknownNode(source.0))?;
        node.gain = Some(gain.0);
        Ok(())
    }

    fn start(&mut self, source: SourceId) -> Result<(), AudioError> {
        let node = self
            .sources
            .get_mut(&source.0)
            .ok_or(AudioError::UnknownNode(source.0))?;
        node.playing = true;
        Ok(())
    }

    fn stop(&mut self, source: SourceId) {
        if let Some(node) = self.sources.get_mut(&source.0) {
            node.playing = false;
        }
    }

    fn disconnect_source(&mut self, source: SourceId) {
        self.sources.remove(&source.0);
    }

    fn disconnect_gain(&mut self, gain: GainId) {
        self.gains.remove(&gain.0);
        for source in self.sources.values_mut() {
            if source.gain == Some(gain.0) {
                source.gain = None;
            }
        }
    }

    fn set_gain(&mut self, gain: GainId, value: f32) {
        if let Some(node) = self.gains.get_mut(&gain.0) {
            node.value = value;
            node.ramp = None;
        }
    }

    fn ramp_gain(&mut self, gain: GainId, target: f32, duration: Duration) {
        let total = (duration.as_secs_f64() * f64::from(self.sample_rate)).round() as u64;
        let Some(node) = self.gains.get_mut(&gain.0) else {
            return;
        };
        if total == 0 {
            node.value = target;
            node.ramp = None;
            return;
        }
        node.ramp = Some(Ramp {
            from: node.value,
            to: target,
            total,
            done: 0,
        });
    }

    fn gain(&self, gain: GainId) -> Option<f32> {
        self.gains.get(&gain.0).map(|g| g.value)
    }

    fn live_nodes(&self) -> usize {
        self.sources.len() + self.gains.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_buffer(len: usize) -> Arc<[f32]> {
        (0..len).map(|i| i as f32 / len as f32).collect::<Vec<_>>().into()
    }

    fn playing_mixer(samples: Arc<[f32]>, gain_value: f32) -> (Mixer, SourceId, GainId) {
        let mut mixer = Mixer::new(100);
        mixer.activate().unwrap();
        let source = mixer.create_buffer_source(samples, true).unwrap();
        let gain = mixer.create_gain(gain_value).unwrap();
        mixer.connect(source, gain).unwrap();
        mixer.start(source).unwrap();
        (mixer, source, gain)
    }

    #[test]
    fn looped_source_wraps_without_gap() {
        let (mut mixer, _, _) = playing_mixer(vec![0.1, 0.2, 0.3].into(), 1.0);
        let mut out = [0.0; 7];
        mixer.render(&mut out);
        assert_eq!(out, [0.1, 0.2, 0.3, 0.1, 0.2, 0.3, 0.1]);
    }

    #[test]
    fn unconnected_source_is_silent() {
        let mut mixer = Mixer::new(100);
        let source = mixer.create_buffer_source(vec![0.5; 4].into(), true).unwrap();
        mixer.start(source).unwrap();
        let mut out = [1.0; 4];
        mixer.render(&mut out);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn gain_change_keeps_playback_position() {
        let samples = ramp_buffer(100);
        let (mut mixer, _, gain) = playing_mixer(samples.clone(), 1.0);
        let mut first = [0.0; 10];
        mixer.render(&mut first);
        mixer.set_gain(gain, 0.5);
        let mut second = [0.0; 10];
        mixer.render(&mut second);
        assert!((second[0] - samples[10] * 0.5).abs() < 1e-6);
        assert_eq!(mixer.playing_sources(), 1);
    }

    #[test]
    fn linear_ramp_reaches_target() {
        let (mut mixer, _, gain) = playing_mixer(vec![1.0].into(), 0.0);
        mixer.ramp_gain(gain, 1.0, Duration::from_millis(100)); // 10 frames at 100 Hz
        let mut out = [0.0; 10];
        mixer.render(&mut out);
        assert!(out.windows(2).all(|w| w[1] >= w[0]));
        assert!((out[5] - 0.5).abs() < 1e-6);
        assert_eq!(mixer.gain(gain), Some(1.0));
    }

    #[test]
    fn zero_length_ramp_is_immediate() {
        let (mut mixer, _, gain) = playing_mixer(vec![1.0].into(), 1.0);
        mixer.ramp_gain(gain, 0.25, Duration::ZERO);
        assert_eq!(mixer.gain(gain), Some(0.25));
    }

    #[test]
    fn disconnect_releases_nodes() {
        let (mut mixer, source, gain) = playing_mixer(vec![1.0].into(), 1.0);
        assert_eq!(mixer.live_nodes(), 2);
        mixer.stop(source);
        mixer.disconnect_source(source);
        mixer.disconnect_gain(gain);
        assert_eq!(mixer.live_nodes(), 0);
        assert_eq!(mixer.gain(gain), None);
    }

    #[test]
    fn connect_rejects_unknown_nodes() {
        let mut mixer = Mixer::new(100);
        let source = mixer.create_buffer_source(vec![1.0].into(), true).unwrap();
        assert_eq!(
            mixer.connect(source, GainId(99)),
            Err(AudioError::UnknownNode(99))
        );
    }

    #[test]
    fn interleaved_render_duplicates_channels() {
        let (mut mixer, _, _) = playing_mixer(vec![0.1, 0.2].into(), 1.0);
        let mut out = [0.0; 4];
        mixer.render_interleaved(&mut out, 2);
        assert_eq!(out, [0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn interleaved_render_reuses_its_scratch_buffer() {
        let (mut mixer, _, _) = playing_mixer(vec![0.1, 0.2, 0.3].into(), 1.0);
        let mut out = [0.0; 6];
        mixer.render_interleaved(&mut out, 2);
        let capacity = mixer.scratch.capacity();
        let ptr = mixer.scratch.as_ptr();

        mixer.render_interleaved(&mut out, 2);
        assert_eq!(out, [0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
        assert_eq!(mixer.scratch.capacity(), capacity);
        assert_eq!(mixer.scratch.as_ptr(), ptr);
    }
}
