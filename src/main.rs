//! Agent Dispatch - command line entry point
//!
//! Builds a dispatcher from configuration, registers a built-in echo agent for
//! every configured identifier and exposes dispatch, listing and health checks.

use agent_dispatch::observability::{init_default_logging, init_logging, LogFormat};
use agent_dispatch::{
    DispatchContext, DispatchError, Dispatcher, DispatcherBuilder, DispatcherConfig, EchoAgent,
};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Duration, Instant};
use tracing::{error, info, warn, Level};

/// Default locations searched when `--config` is not given
const DEFAULT_CONFIG_PATHS: &[&str] = &["dispatcher.toml", "config/dispatcher.toml"];

/// Upper bound on waiting for background reports before exiting
const MAX_REPORT_WAIT: Duration = Duration::from_secs(5);

/// Keyword-routed agent dispatcher
#[derive(Parser)]
#[command(name = "agent-dispatch")]
#[command(about = "Route requests to agents by trigger phrase")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "AGENT_DISPATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch a request and print the result
    Dispatch {
        /// Request text
        text: String,
        /// Context entry passed to agents; values are parsed as JSON when possible
        #[arg(long = "context", value_name = "KEY=VALUE", value_parser = parse_context_entry)]
        context: Vec<(String, Value)>,
        /// Fail instead of returning a clarification when nothing matches
        #[arg(long)]
        require_match: bool,
    },
    /// List registered agents and their trigger phrases
    Agents,
    /// Run health checks across all agents
    Health,
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.verbose {
        0 => init_default_logging(),
        n => {
            let level = if n == 1 { Level::DEBUG } else { Level::TRACE };
            let format = std::env::var("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(LogFormat::Compact);
            init_logging(level, format, false);
        }
    }

    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Dispatch {
            text,
            context,
            require_match,
        } => run_dispatch(config, &text, context, require_match).await,
        Commands::Agents => list_agents(config),
        Commands::Health => run_health(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(path: Option<&Path>) -> Result<DispatcherConfig, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        info!("Loading configuration from: {}", path.display());
        return Ok(DispatcherConfig::load_from_file(path)?);
    }

    for candidate in DEFAULT_CONFIG_PATHS {
        let path = Path::new(candidate);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(DispatcherConfig::load_from_file(path)?);
        }
    }

    info!("No configuration file found; using built-in routing tables");
    Ok(DispatcherConfig::default())
}

fn parse_context_entry(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn builder_for(config: &DispatcherConfig) -> DispatcherBuilder {
    config
        .agent_ids()
        .into_iter()
        .fold(DispatcherBuilder::new(config.clone()), |builder, id| {
            let agent = match config.agents.get(&id) {
                Some(section) => EchoAgent::from_section(id.clone(), section),
                None => EchoAgent::new(id.clone()),
            };
            builder.register(id, Arc::new(agent))
        })
}

fn build_dispatcher(config: &DispatcherConfig) -> Result<Dispatcher, DispatchError> {
    builder_for(config).build()
}

async fn run_dispatch(
    config: DispatcherConfig,
    text: &str,
    entries: Vec<(String, Value)>,
    require_match: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (report_tx, mut report_rx) = mpsc::channel(64);
    let dispatcher = builder_for(&config)
        .with_background_reports(report_tx)
        .build()?;

    let context = entries
        .into_iter()
        .fold(DispatchContext::new(), |ctx, (k, v)| ctx.with(k, v));

    let result = if require_match {
        dispatcher.try_dispatch(text, context).await?
    } else {
        dispatcher.dispatch(text, context).await
    };
    println!("{}", serde_json::to_string_pretty(&result)?);

    let expected = result.background_agents.len();
    if expected > 0 {
        let wait = Duration::from_millis(config.dispatcher.background_timeout_ms).min(MAX_REPORT_WAIT);
        let deadline = Instant::now() + wait;
        let mut received = 0;
        while received < expected {
            match timeout_at(deadline, report_rx.recv()).await {
                Ok(Some(report)) => {
                    received += 1;
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Stopped waiting for background agents ({}/{} reported)",
                        received, expected
                    );
                    break;
                }
            }
        }
    }

    Ok(())
}

fn list_agents(config: DispatcherConfig) -> Result<(), Box<dyn std::error::Error>> {
    let dispatcher = build_dispatcher(&config)?;
    println!("{}", serde_json::to_string_pretty(&dispatcher.catalog())?);
    Ok(())
}

async fn run_health(config: DispatcherConfig) -> Result<(), Box<dyn std::error::Error>> {
    let dispatcher = build_dispatcher(&config)?;
    let health = dispatcher.health_check().await;
    println!("{}", serde_json::to_string_pretty(&health)?);
    Ok(())
}

fn handle_config_command(
    config: &DispatcherConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    build_dispatcher(config)?;

    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_context_entry() {
        assert_eq!(
            parse_context_entry("user_id=7").unwrap(),
            ("user_id".to_string(), json!(7))
        );
        assert_eq!(
            parse_context_entry("username=ana").unwrap(),
            ("username".to_string(), json!("ana"))
        );
        assert_eq!(
            parse_context_entry("note=a=b").unwrap(),
            ("note".to_string(), json!("a=b"))
        );
        assert!(parse_context_entry("novalue").is_err());
        assert!(parse_context_entry("=x").is_err());
    }

    #[test]
    fn test_default_config_builds() {
        let dispatcher = build_dispatcher(&DispatcherConfig::default()).unwrap();
        assert_eq!(dispatcher.registry().len(), 8);
    }

    #[test]
    fn test_cli_parses_dispatch() {
        let cli = Cli::try_parse_from([
            "agent-dispatch",
            "dispatch",
            "send email",
            "--context",
            "user_id=1",
            "--require-match",
        ])
        .unwrap();
        match cli.command {
            Commands::Dispatch {
                text,
                context,
                require_match,
            } => {
                assert_eq!(text, "send email");
                assert_eq!(context.len(), 1);
                assert!(require_match);
            }
            _ => panic!("Expected dispatch command"),
        }
    }
}
