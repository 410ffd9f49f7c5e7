
use crate::config::{Config, load_config};
use crate::dispatch::{Dispatcher, SystemClock};
use crate::gateway::GatewayState;
use crate::line::LineClient;
use crate::schedule::{format_schedule, next_month_schedule};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "shiftline")]
#[command(about = "LINE shift assistant", version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the callback endpoint
    Serve {
        /// Config file (default ~/.shiftline/config.json)
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print next month's schedule
    Schedule {
        /// Reference date (YYYY-MM-DD); defaults to today in the configured timezone
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Write a default config file
    Init {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Overwrite an existing file without asking
        #[arg(long)]
        force: bool,
    },
    /// Load and validate the config file
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            serve(config, host, port).await?;
        }
        Commands::Schedule { date } => {
            schedule(date)?;
        }
        Commands::Init { config, force } => {
            init(config, force)?;
        }
        Commands::CheckConfig { config } => {
            check_config(config)?;
        }
    }

    Ok(())
}

async fn serve(path: Option<PathBuf>, host: Option<String>, port: Option<u16>) -> Result<()> {
    info!("Loading configuration...");
    let mut config = load_config(path.as_deref())?;
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }
    config.validate_for_serving()?;
    let tz = config.gateway.tz()?;
    info!(
        "Configuration loaded: search={}, recording={}, timezone={}",
        config.search.enabled,
        config.recording_enabled(),
        tz
    );

    let config = Arc::new(config);
    let sender = Arc::new(LineClient::new(&config.line));
    let dispatcher = Arc::new(Dispatcher::from_config(&config, sender));
    let state = GatewayState::new(
        &config.line.channel_secret,
        dispatcher,
        Arc::new(SystemClock::new(tz)),
    );

    println!(
        "Starting shiftline on {}:{}...",
        config.gateway.host, config.gateway.port
    );
    crate::gateway::start(&config.gateway.host, config.gateway.port, state).await
}

fn schedule(date: Option<NaiveDate>) -> Result<()> {
    let today = match date {
        Some(date) => date,
        None => {
            let tz = load_config(None)?.gateway.tz()?;
            Utc::now().with_timezone(&tz).date_naive()
        }
    };
    println!("{}", render_schedule(today));
    Ok(())
}

pub(crate) fn render_schedule(today: NaiveDate) -> String {
    format_schedule(&next_month_schedule(today))
}

fn init(path: Option<PathBuf>, force: bool) -> Result<()> {
    let config_path = match path {
        Some(path) => path,
        None => crate::config::get_config_path()?,
    };
    if config_path.exists() && !force {
        println!(
            "\u{26a0}\u{fe0f}  Config already exists at {}",
            config_path.display()
        );
        println!("Overwrite? (y/N): ");
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            return Ok(());
        }
    }

    write_default_config(&config_path)?;
    println!("\u{2713} Created config at {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Set line.channelSecret and line.channelAccessToken");
    println!("     (or SHIFTLINE_LINE_CHANNEL_SECRET / SHIFTLINE_LINE_CHANNEL_ACCESS_TOKEN)");
    println!("  2. Point the LINE webhook URL at https://<host>/callback");
    println!("  3. Run: shiftline serve");
    Ok(())
}

pub(crate) fn write_default_config(path: &std::path::Path) -> Result<()> {
    crate::config::save_config(&Config::default(), Some(path))
        .with_context(|| format!("Failed to write config to {}", path.display()))
}

fn check_config(path: Option<PathBuf>) -> Result<()> {
    let config = load_config(path.as_deref())?;
    for line in summarize(&config) {
        println!("{}", line);
    }
    config.validate_for_serving()?;
    println!("\u{2713} Config is ready to serve");
    Ok(())
}

pub(crate) fn summarize(config: &Config) -> Vec<String> {
    let state = |on: bool| if on { "enabled" } else { "disabled" };
    let set = |value: &str| if value.is_empty() { "missing" } else { "set" };
    vec![
        format!(
            "gateway:    {}:{} ({})",
            config.gateway.host, config.gateway.port, config.gateway.timezone
        ),
        format!(
            "line:       secret {}, access token {}",
            set(&config.line.channel_secret),
            set(&config.line.channel_access_token)
        ),
        format!("search:     {}", state(config.search.enabled)),
        format!("recording:  {}", state(config.recording_enabled())),
        format!(
            "policy:     timeout {}s, {} retr{}, reply budget {}s (worst case {}s)",
            config.collaborators.timeout_secs,
            config.collaborators.max_retries,
            if config.collaborators.max_retries == 1 {
                "y"
            } else {
                "ies"
            },
            config.collaborators.reply_budget_secs,
            config
                .collaborators
                .chain_secs(config.longest_call_chain())
        ),
    ]
}
