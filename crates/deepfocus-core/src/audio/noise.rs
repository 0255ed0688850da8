//! Procedural colored-noise buffers.
//!
//! Every ambient sound is rendered from random samples at play time; there
//! are no audio assets. Buffers are short and looped, so each one is rendered
//! with a crossfaded seam: the tail of the generated stream is blended into
//! the head, which makes the last sample flow straight into the first.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Leaky-integrator coefficients for brown noise: `0.98 * prev + 0.02 * white`.
pub const BROWN_LEAK: f32 = 0.98;
pub const BROWN_INPUT: f32 = 0.02;
/// Brings the integrator's small steady-state amplitude back to a useful level.
pub const BROWN_MAKEUP_GAIN: f32 = 3.5;

/// Length of the loop seam crossfade.
const SEAM_SECS: f32 = 0.01;

/// Ambient sound selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundId {
    #[default]
    Silent,
    White,
    Pink,
    Brown,
    Rain,
    Ocean,
}

impl SoundId {
    pub const ALL: [SoundId; 6] = [
        SoundId::Silent,
        SoundId::White,
        SoundId::Pink,
        SoundId::Brown,
        SoundId::Rain,
        SoundId::Ocean,
    ];

    /// Noise texture for this sound; `None` for silence.
    ///
    /// Rain and ocean have no dedicated generator and use brown noise.
    pub fn color(self) -> Option<NoiseColor> {
        match self {
            SoundId::Silent => None,
            SoundId::White => Some(NoiseColor::White),
            SoundId::Pink => Some(NoiseColor::Pink),
            SoundId::Brown | SoundId::Rain | SoundId::Ocean => Some(NoiseColor::Brown),
        }
    }

    pub fn is_silent(self) -> bool {
        self == SoundId::Silent
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SoundId::Silent => "silent",
            SoundId::White => "white",
            SoundId::Pink => "pink",
            SoundId::Brown => "brown",
            SoundId::Rain => "rain",
            SoundId::Ocean => "ocean",
        }
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SoundId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        SoundId::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| format!("unknown sound '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseColor {
    White,
    Pink,
    Brown,
}

impl NoiseColor {
    /// Loop length. Low-frequency weighted colors get a longer loop so the
    /// repetition is harder to hear.
    pub fn buffer_seconds(self) -> f32 {
        match self {
            NoiseColor::White => 1.0,
            NoiseColor::Pink | NoiseColor::Brown => 2.0,
        }
    }
}

/// Render one loopable buffer of `color` noise.
pub fn render_loop<R: Rng + ?Sized>(
    color: NoiseColor,
    sample_rate: u32,
    seconds: f32,
    rng: &mut R,
) -> Vec<f32> {
    let len = ((sample_rate as f32 * seconds) as usize).max(1);
    let seam = ((sample_rate as f32 * SEAM_SECS) as usize).min(len / 2);

    let mut generator = Generator::new(color);
    let mut samples: Vec<f32> = (0..len + seam).map(|_| generator.next(rng)).collect();

    for i in 0..seam {
        let t = i as f32 / seam as f32;
        samples[i] = samples[i] * t + samples[len + i] * (1.0 - t);
    }
    samples.truncate(len);
    samples
}

struct Generator {
    color: NoiseColor,
    brown_last: f32,
    pink: [f32; 7],
}

impl Generator {
    fn new(color: NoiseColor) -> Self {
        Self {
            color,
            brown_last: 0.0,
            pink: [0.0; 7],
        }
    }

    fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> f32 {
        let white: f32 = rng.gen_range(-1.0..=1.0);
        match self.color {
            NoiseColor::White => white,
            NoiseColor::Brown => {
                self.brown_last = BROWN_LEAK * self.brown_last + BROWN_INPUT * white;
                (self.brown_last * BROWN_MAKEUP_GAIN).clamp(-1.0, 1.0)
            }
            NoiseColor::Pink => {
                // Paul Kellet's refined pink filter.
                let b = &mut self.pink;
                b[0] = 0.99886 * b[0] + white * 0.055_517_9;
                b[1] = 0.99332 * b[1] + white * 0.075_075_9;
                b[2] = 0.96900 * b[2] + white * 0.153_852;
                b[3] = 0.86650 * b[3] + white * 0.310_485_6;
                b[4] = 0.55000 * b[4] + white * 0.532_952_2;
                b[5] = -0.7616 * b[5] - white * 0.016_898;
                let out = b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362;
                b[6] = white * 0.115_926;
                (out * 0.11).clamp(-1.0, 1.0)
            }
        }
    }
}
