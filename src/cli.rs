use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "posewatch")]
#[command(about = "Presence sessions from pose detection traces", long_about = None)]
pub struct Cli {
    /// Settings file; created with defaults when missing
    #[arg(long, global = true, default_value = "settings.json")]
    pub settings: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a recorded detection trace and export the sessions it contains
    Replay {
        /// Text file with one 0/1 sample per frame
        trace: PathBuf,
        /// Frame rate of the trace; timestamps follow frame positions when set
        #[arg(long)]
        fps: Option<f64>,
        /// Context label written into every session
        #[arg(long, default_value = "video")]
        context: String,
        /// Print the sessions as JSON instead of writing export files
        #[arg(long)]
        no_export: bool,
    },
    /// Print the effective settings
    Settings,
    /// Print the action journal
    Journal,
}
