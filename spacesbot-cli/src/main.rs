use anyhow::{Context, Result};
use clap::Parser;
use spacesbot_core::config::BotConfig;
use spacesbot_core::logging::{init_logging_with_config, LogConfig};
use spacesbot_core::rooms::RoomId;
use spacesbot_core::SpacesBot;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "spacesbot")]
#[command(author, version, long_about = None)]
#[command(about = "Joins every room reachable from a root space and marks them as read")]
struct Args {
    /// Path to a TOML configuration file (environment variables are used
    /// when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Homeserver base URL, e.g. https://matrix.example.org
    #[arg(long)]
    homeserver: Option<String>,

    /// Fully-qualified account id, e.g. @bot:example.org
    #[arg(long)]
    user: Option<String>,

    /// Root space to walk, e.g. !space:example.org
    #[arg(long)]
    root_space: Option<String>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BotConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => BotConfig::from_env().context("loading configuration from environment")?,
    };

    // CLI flags win over file and environment. The access token is
    // deliberately not a flag; pass it via SPACESBOT_ACCESS_TOKEN or the
    // config file.
    if let Some(homeserver) = args.homeserver {
        config.homeserver = homeserver;
    }
    if let Some(user) = args.user {
        config.user_id = user;
    }
    if let Some(root) = args.root_space {
        config.root_space_id = RoomId::new(root);
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    config.validate().context("invalid configuration")?;

    let log_config = LogConfig::new(config.logging.level.as_str())
        .with_target(config.logging.with_target)
        .json_format(config.logging.json_format);
    init_logging_with_config(log_config)?;
    spacesbot_core::metrics::describe_metrics();

    info!(
        homeserver = %config.homeserver,
        root = %config.root_space_id,
        "spacesbot starting"
    );

    let bot = SpacesBot::new(config)?;
    let summary = bot.run().await?;

    info!(
        spaces_joined = summary.traversal.spaces_joined,
        rooms_joined = summary.traversal.rooms_joined,
        abandoned = summary.traversal.abandoned.len(),
        rooms_marked = summary.sweep.rooms_marked,
        "spacesbot finished"
    );

    Ok(())
}
