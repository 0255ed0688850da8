use chrono::Local;
use clap::Subcommand;
use deepfocus_core::session::{daily_stats, weekly_stats};
use deepfocus_core::{ApiError, SessionManager, SettingsRepository};

use super::{open_api, CliResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Focus minutes per day over the last week
    Daily,
    /// Totals over the last week
    Weekly,
    /// All-time totals reported by the backend
    Remote,
    /// Recent sessions
    History {
        /// Show at most this many sessions
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

pub async fn run(action: StatsAction) -> CliResult {
    let settings = SettingsRepository::open_default()?;
    let api = open_api(settings.settings())?.ok_or(ApiError::NotConfigured)?;
    let mut sessions = SessionManager::new(Some(api));
    let today = Local::now().date_naive();

    match action {
        StatsAction::Daily => {
            let history = sessions.load_history().await?;
            let days = daily_stats(history, today, &Local);
            println!("{}", serde_json::to_string_pretty(&days)?);
        }
        StatsAction::Weekly => {
            let history = sessions.load_history().await?;
            let week = weekly_stats(history, today, &Local);
            println!("{}", serde_json::to_string_pretty(&week)?);
        }
        StatsAction::Remote => {
            let stats = sessions.remote_stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::History { limit } => {
            let history = sessions.load_history().await?;
            let skip = history.len().saturating_sub(limit);
            println!("{}", serde_json::to_string_pretty(&history[skip..])?);
        }
    }
    Ok(())
}
