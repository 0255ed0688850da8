use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use deepfocus_core::audio::{AmbientConfig, DeviceOutput};
use deepfocus_core::{
    AudioPort, DesktopNotifier, Event, FocusController, FocusTarget, NoticeBoard, NoticeLevel,
    SettingsRepository, SoundId, SystemClock,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use super::{clock, open_api, CliResult};

const HELP: &str = "commands: start | pause | resume | skip | reset | status | \
sound <name> | mute | volume <0-1> | fade-in <secs> | fade-out <secs> | dismiss | quit";

#[derive(Args)]
pub struct RunArgs {
    /// Task to attach focus sessions to
    #[arg(long)]
    task: Option<String>,
    /// Goal to attach focus sessions to
    #[arg(long)]
    goal: Option<String>,
    /// Ambient sound (silent, white, pink, brown, rain, ocean)
    #[arg(long)]
    sound: Option<SoundId>,
    /// Wait for a `start` command instead of starting right away
    #[arg(long)]
    no_start: bool,
    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Input {
    Start,
    Pause,
    Resume,
    Skip,
    Reset,
    Status,
    Sound(SoundId),
    Mute,
    Volume(f32),
    FadeIn(u64),
    FadeOut(u64),
    Dismiss,
    Help,
    Quit,
}

impl Input {
    /// `Ok(None)` for a blank line.
    fn parse(line: &str) -> Result<Option<Input>, String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        let input = match command.to_ascii_lowercase().as_str() {
            "start" | "go" => Input::Start,
            "pause" | "p" => Input::Pause,
            "resume" | "r" => Input::Resume,
            "skip" | "s" => Input::Skip,
            "reset" | "x" => Input::Reset,
            "status" | "?" => Input::Status,
            "sound" => {
                let name = arg.ok_or("usage: sound <name>")?;
                Input::Sound(name.parse()?)
            }
            "mute" => Input::Mute,
            "volume" | "vol" => {
                let value = arg.ok_or("usage: volume <0-1>")?;
                Input::Volume(value.parse().map_err(|_| format!("not a number: {value}"))?)
            }
            "fade-in" => {
                let secs = arg.unwrap_or("3");
                Input::FadeIn(secs.parse().map_err(|_| format!("not a number: {secs}"))?)
            }
            "fade-out" | "fade" => {
                let secs = arg.unwrap_or("3");
                Input::FadeOut(secs.parse().map_err(|_| format!("not a number: {secs}"))?)
            }
            "dismiss" => Input::Dismiss,
            "help" | "h" => Input::Help,
            "quit" | "q" | "exit" => Input::Quit,
            other => return Err(format!("unknown command: {other} ({HELP})")),
        };
        Ok(Some(input))
    }
}

struct Printer {
    json: bool,
    last_notice: u64,
}

impl Printer {
    fn event(&self, event: &Event) -> CliResult {
        if self.json {
            println!("{}", serde_json::to_string(event)?);
            return Ok(());
        }
        match event {
            Event::TimerStarted {
                phase,
                duration_secs,
                ..
            } => println!("{phase} started ({})", clock(*duration_secs)),
            Event::TimerPaused { remaining_secs, .. } => {
                println!("paused at {}", clock(*remaining_secs))
            }
            Event::TimerResumed { remaining_secs, .. } => {
                println!("resumed at {}", clock(*remaining_secs))
            }
            Event::PhaseCompleted {
                finished,
                next,
                session_count,
                auto_started,
                skipped,
                ..
            } => {
                let verb = if *skipped { "skipped" } else { "complete" };
                let then = if *auto_started { "starting" } else { "up next" };
                println!("{finished} {verb} (#{session_count}), {next} {then}");
            }
            Event::TimerReset { .. } => println!("reset"),
            Event::StateSnapshot {
                status,
                phase,
                seconds_remaining,
                session_count,
                ..
            } => println!(
                "{status:?} {phase} {} (sessions: {session_count})",
                clock(*seconds_remaining)
            ),
        }
        Ok(())
    }

    fn ambient(&self, ambient: &AmbientConfig) {
        if self.json {
            return;
        }
        let state = if ambient.is_playing { "playing" } else { "off" };
        println!(
            "sound {} ({state}, volume {:.0}%)",
            ambient.sound_id,
            ambient.volume * 100.0
        );
    }

    fn notices(&mut self, board: &NoticeBoard) {
        for notice in board.since(self.last_notice) {
            match notice.level {
                NoticeLevel::Info => eprintln!("{}", notice.message),
                NoticeLevel::Warning => eprintln!("warning: {}", notice.message),
            }
            self.last_notice = notice.id;
        }
    }
}

fn apply<P: AudioPort>(
    controller: &mut FocusController<P>,
    input: Input,
    out: &Printer,
) -> CliResult {
    let result = match input {
        Input::Start => controller.start(),
        Input::Pause => controller.pause(),
        Input::Resume => controller.resume(),
        Input::Skip => controller.skip(),
        Input::Reset => Ok(controller.reset()),
        Input::Status => {
            out.event(&controller.snapshot())?;
            out.ambient(&controller.ambient());
            return Ok(());
        }
        Input::Sound(sound) => {
            // Failures surface as notices.
            let _ = controller.select_sound(sound);
            return Ok(());
        }
        Input::Volume(volume) => {
            controller.set_volume(volume)?;
            return Ok(());
        }
        Input::Mute => {
            controller.stop_sound();
            return Ok(());
        }
        Input::FadeIn(secs) => {
            controller.fade_in_sound(Duration::from_secs(secs));
            return Ok(());
        }
        Input::FadeOut(secs) => {
            controller.fade_out_sound(Duration::from_secs(secs));
            return Ok(());
        }
        Input::Dismiss => {
            let ids: Vec<u64> = controller.notices().active().iter().map(|n| n.id).collect();
            for id in ids {
                controller.dismiss_notice(id);
            }
            return Ok(());
        }
        Input::Help => {
            println!("{HELP}");
            return Ok(());
        }
        Input::Quit => return Ok(()),
    };
    match result {
        Ok(event) => out.event(&event),
        Err(e) => {
            eprintln!("{e}");
            Ok(())
        }
    }
}

pub async fn run(args: RunArgs) -> CliResult {
    let settings = SettingsRepository::open_default()?;
    let api = open_api(settings.settings())?;
    if api.is_none() {
        info!("no api.base_url configured, sessions are not recorded");
    }

    let mut controller = FocusController::new(
        settings,
        DeviceOutput::default(),
        api,
        Box::new(DesktopNotifier::new()),
        Arc::new(SystemClock),
    );
    controller.set_target(FocusTarget {
        task_id: args.task,
        goal_id: args.goal,
    });

    let mut out = Printer {
        json: args.json,
        last_notice: 0,
    };
    if let Some(sound) = args.sound {
        let _ = controller.select_sound(sound);
    }
    if !args.no_start {
        out.event(&controller.start()?)?;
    }
    if !args.json {
        eprintln!("{HELP}");
    }

    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(event) = controller.tick() {
                    out.event(&event)?;
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line? {
                    Some(line) => match Input::parse(&line) {
                        Ok(Some(Input::Quit)) => break,
                        Ok(Some(input)) => apply(&mut controller, input, &out)?,
                        Ok(None) => {}
                        Err(message) => eprintln!("{message}"),
                    },
                    None => stdin_open = false,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
        out.notices(controller.notices());
    }

    controller.leave();
    controller.settle().await;
    out.notices(controller.notices());
    Ok(())
}
