pub mod activity;
pub mod app;
pub mod capture;
mod cli;
pub mod export;
pub mod journal;
pub mod models;
pub mod observer;
pub mod replay;
pub mod settings;
pub mod tracker;
mod utils;

use std::fs;

use anyhow::{Context, Result};
use clap::Parser;

pub use app::AppState;
pub use models::{DetectionSession, Frame};
pub use observer::{LogLevel, LogSink};
pub use tracker::{PresenceEvent, PresenceListener, PresenceTracker, TrackerSnapshot};

use cli::{Cli, Commands};

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::info!("posewatch starting up...");

    let app = AppState::new(cli.settings.clone())?;

    match cli.command {
        Commands::Replay {
            trace,
            fps,
            context,
            no_export,
        } => {
            let contents = fs::read_to_string(&trace)
                .with_context(|| format!("failed to read trace {}", trace.display()))?;
            let samples = replay::parse_trace(&contents)
                .with_context(|| format!("invalid trace {}", trace.display()))?;

            app.journal
                .record(&format!("Replay started: {}", trace.display()))?;
            let recorded = replay::replay(&app.tracker, &samples, fps, &context);
            log::info!(
                "Replayed {} samples from {}: {} session(s)",
                samples.len(),
                trace.display(),
                recorded
            );

            if no_export {
                println!("{}", serde_json::to_string_pretty(&app.tracker.history())?);
            } else {
                let report = app.export();
                println!("{}", report.message);
            }
        }
        Commands::Settings => {
            println!("{}", serde_json::to_string_pretty(&app.settings.get())?);
        }
        Commands::Journal => {
            print!("{}", app.journal.read_all()?);
        }
    }

    Ok(())
}
