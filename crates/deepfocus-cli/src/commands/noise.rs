use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::Subcommand;
use deepfocus_core::audio::DEFAULT_SAMPLE_RATE;
use deepfocus_core::{Mixer, NoiseSynth, SoundId};

use super::CliResult;

#[derive(Subcommand)]
pub enum NoiseAction {
    /// List available ambient sounds
    List,
    /// Render a sound to raw mono f32le samples
    /// (play with `ffplay -f f32le -ar 44100 -ac 1 FILE`)
    Render {
        /// Sound to render
        sound: SoundId,
        /// Output file
        #[arg(long, short)]
        output: PathBuf,
        /// Length in seconds
        #[arg(long, default_value = "10")]
        seconds: u32,
        /// Volume between 0 and 1
        #[arg(long, default_value = "0.5")]
        volume: f32,
        #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
        sample_rate: u32,
    },
}

pub fn run(action: NoiseAction) -> CliResult {
    match action {
        NoiseAction::List => {
            for sound in SoundId::ALL {
                match sound.color() {
                    Some(color) => println!("{sound:<8} {color:?} noise"),
                    None => println!("{sound:<8} no sound"),
                }
            }
        }
        NoiseAction::Render {
            sound,
            output,
            seconds,
            volume,
            sample_rate,
        } => {
            let mut synth = NoiseSynth::new(Mixer::new(sample_rate), volume);
            synth.play(sound)?;
            let frames = sample_rate as usize * seconds as usize;
            let mut samples = vec![0.0f32; frames];
            synth.port_mut().render(&mut samples);

            let mut writer = BufWriter::new(File::create(&output)?);
            for sample in &samples {
                writer.write_all(&sample.to_le_bytes())?;
            }
            writer.flush()?;

            let rms = if samples.is_empty() {
                0.0
            } else {
                (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
            };
            println!(
                "wrote {frames} samples of {sound} to {} (rms {rms:.3})",
                output.display()
            );
        }
    }
    Ok(())
}
