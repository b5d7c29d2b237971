//! Config command - inspect configuration.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use pipefetch_core::FetcherConfig;
use serde::Serialize;

use crate::output::{JsonFormatter, TextFormatter};
use crate::settings::{self, default_config_path};
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the resolved configuration.
    Show,

    /// Show the config file path.
    Path,
}

/// Runs the config command.
pub fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli),
        ConfigAction::Path => show_path(cli),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedOutput {
    fetcher: FetcherConfig,
    transport: pipefetch_fetch::TransportSettings,
}

fn show_config(cli: &Cli) -> Result<()> {
    let settings = settings::load(cli.config.as_deref())?;
    let fetcher = FetcherConfig::resolve(settings.fetcher);
    fetcher.validate().context("invalid configuration")?;

    let resolved = ResolvedOutput {
        fetcher,
        transport: settings.transport,
    };

    match cli.format {
        OutputFormat::Text => {
            let text = TextFormatter::new();
            let config = &resolved.fetcher;
            println!("Pipefetch Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Base URL:       {}", config.base_url.as_deref().unwrap_or("(none)"));
            println!("Throw on error: {}", config.throw_on_error);
            println!("Retry:          {}", enabled(config.retry.is_some()));
            println!("Cache:          {}", enabled(config.cache.is_some()));
            if !config.headers.is_empty() {
                println!();
                println!("Headers:");
                for line in text.format_headers(&config.headers) {
                    println!("  {line}");
                }
            }
            println!();
            println!("Transport:");
            let transport = &resolved.transport;
            println!("  Connections:     {}", transport.connections);
            println!("  Keep-alive:      {}ms", transport.keep_alive_timeout_ms);
            println!("  Connect timeout: {}ms", transport.connect_timeout_ms);
            println!("  Request timeout: {}ms", transport.request_timeout_ms);
            println!("  HTTP/2:          {}", enabled(transport.allow_http2));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&resolved)?);
        }
    }

    Ok(())
}

fn show_path(cli: &Cli) -> Result<()> {
    let path = cli.config.clone().unwrap_or_else(default_config_path);

    match cli.format {
        OutputFormat::Text => {
            println!("Config file: {}", path.display());
            if !path.exists() {
                println!("(not found, defaults are used)");
            }
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_file": path.display().to_string(),
                "exists": path.exists(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}

fn enabled(flag: bool) -> &'static str {
    if flag { "enabled" } else { "disabled" }
}
