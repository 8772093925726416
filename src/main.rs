use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use wkbar::clock::SystemClock;
use wkbar::config::Config;
use wkbar::credentials::{API_KEY_ENV, discover_api_key};
use wkbar::source::HttpReviewSource;
use wkbar::tracker::fetch_announcement;
use wkbar::{Announcement, ReviewTracker};

mod cli;

use cli::Cli;
use cli::commands::Commands;

fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wkbar")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("wkbar.log");

    // Log to a file so stdout carries only status lines
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn print_announcement(announcement: &Announcement, json: bool) {
    if json {
        match serde_json::to_string(announcement) {
            Ok(line) => println!("{}", line),
            Err(e) => log::error!("Failed to serialize announcement: {}", e),
        }
    } else if announcement.has_reviews() {
        println!("{}", announcement.text.green().bold());
    } else {
        println!("{}", announcement.text);
    }
}

fn http_source(config: &Config) -> Result<HttpReviewSource> {
    let key = discover_api_key(&config.api.key_paths);
    if key.is_none() {
        eprintln!(
            "{} no API key found; set ${} or create ~/.wanikani-api-key",
            "warning:".yellow(),
            API_KEY_ENV
        );
    }
    HttpReviewSource::new(&config.api, key.as_ref()).context("Failed to build HTTP client")
}

async fn run_watch(cli: &Cli, config: &Config) -> Result<()> {
    let source = http_source(config)?;
    let tracker = ReviewTracker::new(config.tracker_config(), Arc::new(source), Arc::new(SystemClock));

    let json = cli.json;
    tracker.enable_updates(move |announcement: Announcement| print_announcement(&announcement, json));

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;

    tracker.disable_updates();
    info!("Interrupted, stopping");
    Ok(())
}

async fn run_status(cli: &Cli, config: &Config) -> Result<()> {
    let source = http_source(config)?;
    let announcement = fetch_announcement(&source, &config.tracker_config(), &SystemClock)
        .await
        .context("Failed to read review queue")?;

    print_announcement(&announcement, cli.json);
    Ok(())
}

fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => runtime.block_on(run_watch(cli, config)),
        Commands::Status => runtime.block_on(run_status(cli, config)),
    }
}

fn main() -> Result<()> {
    // Parse first: --verbose picks the log level
    let cli = Cli::parse();

    setup_logging(cli.is_verbose()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).context("Application failed")?;

    Ok(())
}
