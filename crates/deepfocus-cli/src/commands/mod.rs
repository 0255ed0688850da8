pub mod config;
pub mod noise;
pub mod run;
pub mod stats;

use std::future::Future;
use std::sync::Arc;

use deepfocus_core::{FocusApi, HttpFocusApi, Settings};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Everything runs on one thread; the timer tick is the only periodic work.
pub fn block_on<F>(future: F) -> CliResult
where
    F: Future<Output = CliResult>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(future)
}

/// The configured session backend, if any.
pub fn open_api(settings: &Settings) -> Result<Option<Arc<dyn FocusApi>>, Box<dyn std::error::Error>> {
    let api = HttpFocusApi::from_settings(&settings.api)?;
    Ok(api.map(|api| Arc::new(api) as Arc<dyn FocusApi>))
}

/// `mm:ss`
pub fn clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
