// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Pipefetch CLI - issue one HTTP request through the Pipefetch pipeline.
//!
//! # Examples
//!
//! ```bash
//! # GET a URL and print the decoded body
//! pipefetch request https://httpbin.org/get
//!
//! # POST JSON against a base URL
//! pipefetch request --base-url http://127.0.0.1:3000 -X POST \
//!     -H 'content-type: application/json' -d '{"name":"x"}' /items
//!
//! # Retry and cache, JSON output
//! pipefetch request --retry --cache --format json https://example.com
//!
//! # Show the resolved configuration
//! pipefetch config show
//! ```

mod commands;
mod output;
mod settings;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use pipefetch_core::{FetchError, TransportError};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{config, request};
use output::TextFormatter;

// ============================================================================
// CLI Definition
// ============================================================================

/// Pipefetch CLI - HTTP requests through a retry/cache/error pipeline.
#[derive(Parser)]
#[command(name = "pipefetch")]
#[command(about = "HTTP request client with a composable retry/cache/error pipeline")]
#[command(long_about = r"
Pipefetch sends one HTTP request and prints the response body, decoded as
JSON when possible and as text otherwise.

Exit codes:
  0  success
  1  general error (bad arguments, invalid config or URL)
  2  the server answered with an error status
  3  network or protocol failure

Examples:
  pipefetch request https://example.com
  pipefetch request --base-url http://127.0.0.1:3000 -X POST /items
  pipefetch config show
")]
#[command(version)]
#[command(author = "Pipefetch Contributors")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Path to a JSON config file.
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (request log and debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Quiet mode (no logging, no error messages).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Send a request and print the response.
    #[command(visible_alias = "r")]
    Request(request::RequestArgs),

    /// Inspect configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// The server answered with an error status.
    StatusError = 2,
    /// Network or protocol failure.
    TransportError = 3,
}

impl ExitCode {
    /// Picks the exit code for a failed command.
    pub fn for_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(fetch) = cause.downcast_ref::<FetchError>() {
                return match fetch {
                    FetchError::Status(_) => Self::StatusError,
                    FetchError::Transport(_) => Self::TransportError,
                    _ => Self::Error,
                };
            }
            if cause.downcast_ref::<TransportError>().is_some() {
                return Self::TransportError;
            }
        }
        Self::Error
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("pipefetch=debug,info")
    } else {
        EnvFilter::new("pipefetch=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Request(args) => request::run(args, &cli).await,
        Commands::Config(args) => config::run(args, &cli),
    };

    if let Err(e) = result {
        let code = ExitCode::for_error(&e);
        if !cli.quiet {
            eprintln!("Error: {e}");
            if let Some(status) = e.downcast_ref::<FetchError>().and_then(FetchError::as_status) {
                if !status.body.is_null() {
                    eprintln!("{}", TextFormatter::new().format_body(&status.body));
                }
            }
        }
        std::process::exit(code as i32);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipefetch_core::{StatusError, TransportErrorKind};

    #[test]
    fn test_cli_parses_request() {
        let cli = Cli::try_parse_from([
            "pipefetch", "request", "-X", "POST", "-H", "a: 1", "-H", "b: 2", "-d", "{}", "/x",
        ])
        .unwrap();

        let Commands::Request(args) = cli.command else {
            panic!("expected request command");
        };
        assert_eq!(args.method, "POST");
        assert_eq!(args.headers, vec!["a: 1", "b: 2"]);
        assert_eq!(args.data.as_deref(), Some("{}"));
        assert_eq!(args.url, "/x");
    }

    #[test]
    fn test_exit_code_for_status_error() {
        let err = anyhow::Error::from(FetchError::from(StatusError::new("Response Error", 404)));
        assert_eq!(ExitCode::for_error(&err), ExitCode::StatusError);
    }

    #[test]
    fn test_exit_code_for_transport_error() {
        let err = anyhow::Error::from(FetchError::from(TransportError::new(
            TransportErrorKind::Connect,
            "refused",
        )));
        assert_eq!(ExitCode::for_error(&err), ExitCode::TransportError);

        let build = anyhow::Error::from(TransportError::new(TransportErrorKind::Build, "tls"))
            .context("failed to build transport");
        assert_eq!(ExitCode::for_error(&build), ExitCode::TransportError);
    }

    #[test]
    fn test_exit_code_for_other_errors() {
        let err = anyhow::anyhow!("bad header");
        assert_eq!(ExitCode::for_error(&err), ExitCode::Error);
        assert_eq!(ExitCode::Success as i32, 0);
    }
}
