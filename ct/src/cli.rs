//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// coursetable - timetable import with self-correcting extraction
#[derive(Parser)]
#[command(
    name = "ct",
    about = "Import timetables from text or screenshots and check them for conflicts",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract courses from pasted timetable text
    Import {
        /// Timetable text (read from --file or stdin when omitted)
        text: Option<String>,

        /// Read the timetable text from a file
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },

    /// Extract courses from timetable screenshots
    Image {
        /// Image files (png, jpg, webp, ...)
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
    },

    /// Check a course JSON file for time conflicts
    Check {
        /// Course list, bare or wrapped in {"courses": [...]}
        path: PathBuf,
    },

    /// Expand a week specification like "1-16(单),18"
    Weeks {
        #[arg(value_name = "SPEC")]
        spec: String,
    },

    /// Print the resolved configuration
    Config,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coursetable")
        .join("logs")
        .join("coursetable.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Generate the after_help text with the log location
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    format!("Logs are written to: {}\n", get_log_path().display())
}
