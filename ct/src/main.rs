//! coursetable CLI
//!
//! Entry point for text and image imports and for offline conflict checks.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::Engine;
use clap::{CommandFactory, FromArgMatches};
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use coursetable::cli::{Cli, Command, generate_after_help};
use coursetable::config::Config;
use coursetable::conflict::detect;
use coursetable::domain::WeekSet;
use coursetable::llm::create_client;
use coursetable::pipeline::{Pipeline, PipelineError, PipelineResult, decode_courses};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coursetable")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(log_dir.join("coursetable.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "coursetable loaded config: model={} max-retries={}",
        config.llm.model, config.pipeline.max_retries
    );

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Import { text, file } => {
            debug!("main: matched Import command");
            cmd_import(&config, text, file).await
        }
        Command::Image { paths } => {
            debug!(count = paths.len(), "main: matched Image command");
            cmd_image(&config, &paths).await
        }
        Command::Check { path } => {
            debug!(?path, "main: matched Check command");
            cmd_check(&path)
        }
        Command::Weeks { spec } => {
            debug!(%spec, "main: matched Weeks command");
            cmd_weeks(&spec)
        }
        Command::Config => {
            debug!("main: matched Config command");
            cmd_config(&config)
        }
    }
}

/// Build a pipeline backed by the configured provider
fn build_pipeline(config: &Config) -> Result<Pipeline> {
    debug!("build_pipeline: called");
    config.validate()?;
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    Ok(Pipeline::new(llm, config))
}

/// Run the text pipeline on an argument, a file or stdin
async fn cmd_import(config: &Config, text: Option<String>, file: Option<PathBuf>) -> Result<()> {
    debug!(has_text = text.is_some(), ?file, "cmd_import: called");
    let input = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => {
            fs::read_to_string(&path).context(format!("Failed to read input from {}", path.display()))?
        }
        (None, None) => {
            debug!("cmd_import: reading stdin");
            io::read_to_string(io::stdin()).context("Failed to read input from stdin")?
        }
    };

    let pipeline = build_pipeline(config)?;
    let outcome = pipeline.run_text(&input).await;
    print_outcome(outcome)
}

/// Encode image files as data URLs and run the image pipeline
async fn cmd_image(config: &Config, paths: &[PathBuf]) -> Result<()> {
    debug!(count = paths.len(), "cmd_image: called");
    let images = paths
        .iter()
        .map(|path| encode_image(path))
        .collect::<Result<Vec<_>>>()?;

    let pipeline = build_pipeline(config)?;
    let outcome = pipeline.run_image(&images).await;
    print_outcome(outcome)
}

fn encode_image(path: &Path) -> Result<String> {
    let bytes = fs::read(path).context(format!("Failed to read image {}", path.display()))?;
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "image/jpeg",
    };
    debug!(?path, mime, size = bytes.len(), "encode_image: encoded");
    Ok(format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    ))
}

/// Print a pipeline outcome as JSON; exits non-zero unless it succeeded
fn print_outcome(outcome: Result<PipelineResult, PipelineError>) -> Result<()> {
    match outcome {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            if result.success {
                eprintln!("{} Imported {} course(s)", "✓".green(), result.courses.len());
                Ok(())
            } else {
                eprintln!("{} Conflicts remain after automatic correction", "✗".red());
                std::process::exit(2);
            }
        }
        Err(e) => {
            debug!(error = %e, status = e.status_code(), "print_outcome: pipeline error");
            println!("{}", serde_json::to_string_pretty(&e.to_body())?);
            eprintln!("{} {} (status {})", "✗".red(), e, e.status_code());
            std::process::exit(1);
        }
    }
}

/// Check a course file for conflicts
fn cmd_check(path: &Path) -> Result<()> {
    debug!(?path, "cmd_check: called");
    let content = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    let courses = decode_courses(&content).context(format!("Failed to decode courses from {}", path.display()))?;

    let report = detect(&courses);
    if !report.has_conflict() {
        println!("{} No conflicts among {} course(s)", "✓".green(), courses.len());
        return Ok(());
    }

    println!("{}", report.render());
    println!();
    for (pair, cell) in report.details() {
        println!(
            "  {} {} / {}: first overlap at {}",
            "•".yellow(),
            pair.first().bold(),
            pair.second().bold(),
            cell
        );
    }
    println!("\n{} {} conflicting pair(s)", "✗".red(), report.len());
    std::process::exit(1);
}

/// Print the weeks a specification expands to
fn cmd_weeks(spec: &str) -> Result<()> {
    debug!(%spec, "cmd_weeks: called");
    let weeks = WeekSet::parse(spec);
    if weeks.is_empty() {
        println!("{}", "(no weeks)".dimmed());
    } else {
        println!("{}", weeks);
    }
    Ok(())
}

/// Print the resolved configuration as YAML
fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", serde_yaml::to_string(config).context("Failed to serialize config")?);
    Ok(())
}
