//! CLI definitions and dispatch.

mod config;
mod request;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use replayfetch::{Config, Fetcher, Method};

#[derive(Debug, Parser)]
#[command(name = "replayfetch", version, about = "Keyed, cached HTTP requests from the command line")]
pub(crate) struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Override the configured base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Override the configured timeout (milliseconds)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// GET an entity (endpoint from the config table, else the plural name)
    Get {
        entity: String,
        #[command(flatten)]
        args: RequestArgs,
    },
    /// POST to an entity
    Post {
        entity: String,
        #[command(flatten)]
        args: RequestArgs,
    },
    /// PUT to an entity
    Put {
        entity: String,
        #[command(flatten)]
        args: RequestArgs,
    },
    /// DELETE an entity
    Delete {
        entity: String,
        #[command(flatten)]
        args: RequestArgs,
    },
    /// Send a request to an explicit path
    Request {
        /// Path joined onto the base URL
        #[arg(long, default_value = "")]
        path: String,
        /// HTTP method (GET, POST, PUT, DELETE)
        #[arg(long, default_value = "GET")]
        method: String,
        #[command(flatten)]
        args: RequestArgs,
    },
    /// Print the effective configuration
    Config,
}

/// Options shared by every request-sending command.
#[derive(Debug, Clone, Args)]
pub(crate) struct RequestArgs {
    /// Query parameter as name=value (repeatable)
    #[arg(long = "param", short = 'p')]
    pub params: Vec<String>,

    /// Header as "Name: value" (repeatable)
    #[arg(long = "header", short = 'H')]
    pub headers: Vec<String>,

    /// Request body (sent as-is)
    #[arg(long, short = 'd')]
    pub data: Option<String>,

    /// Request key to cache the response under
    #[arg(long)]
    pub key: Option<String>,

    /// Comma-separated fields to keep from the response ("" keeps none)
    #[arg(long)]
    pub pick: Option<String>,

    /// Do not cache the response
    #[arg(long)]
    pub no_cache: bool,
}

/// Load config and apply the global CLI overrides.
fn effective_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load().with_context(|| "Failed to load configuration")?;
    if let Some(ref base_url) = cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_ms = timeout;
    }
    config.validate()?;
    Ok(config)
}

pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = effective_config(&cli)?;

    if let Command::Config = cli.command {
        return config::cmd_config(&config);
    }

    let fetcher = Fetcher::builder()
        .config(config)
        .build()
        .with_context(|| "Failed to build client")?;

    match cli.command {
        Command::Get { entity, args } => request::cmd_entity(&fetcher, Method::Get, &entity, args).await,
        Command::Post { entity, args } => request::cmd_entity(&fetcher, Method::Post, &entity, args).await,
        Command::Put { entity, args } => request::cmd_entity(&fetcher, Method::Put, &entity, args).await,
        Command::Delete { entity, args } => {
            request::cmd_entity(&fetcher, Method::Delete, &entity, args).await
        }
        Command::Request { path, method, args } => {
            let method: Method = method.parse()?;
            request::cmd_request(&fetcher, method, &path, args).await
        }
        Command::Config => Ok(()),
    }
}
