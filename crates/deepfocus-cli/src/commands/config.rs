use clap::Subcommand;
use deepfocus_core::storage::KEYS;
use deepfocus_core::SettingsRepository;

use super::CliResult;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "pomodoro.work_minutes", "ambient.sound")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// List every settable key
    Keys,
    /// Print the settings file location
    Path,
}

pub fn run(action: ConfigAction) -> CliResult {
    let mut repo = SettingsRepository::open_default()?;
    match action {
        ConfigAction::Get { key } => match repo.get(&key) {
            Some(value) => println!("{value}"),
            None => {
                eprintln!("unknown key: {key}");
                std::process::exit(1);
            }
        },
        ConfigAction::Set { key, value } => {
            repo.set(&key, &value)?;
            repo.flush()?;
            println!("ok");
        }
        ConfigAction::List => {
            let mut settings = repo.settings().clone();
            if settings.api.token.is_some() {
                settings.api.token = Some("********".to_string());
            }
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        ConfigAction::Keys => {
            for key in KEYS {
                println!("{key}");
            }
        }
        ConfigAction::Path => println!("{}", repo.path().display()),
    }
    Ok(())
}
