//! Request command - send one request and print the response.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use pipefetch_core::{
    CacheOptions, FetcherConfig, FetcherOptions, HeaderRecord, RetryOptions, TracingLogger,
};
use pipefetch_fetch::{Fetcher, Method, RequestInit, TransportProvider, TransportSettings};
use tracing::debug;

use crate::output::{JsonFormatter, ResponseOutput, TextFormatter};
use crate::settings;
use crate::{Cli, OutputFormat};

/// Arguments for the request command.
#[derive(Args, Debug, Default)]
pub struct RequestArgs {
    /// URL or path (resolved against the base URL).
    pub url: String,

    /// HTTP method.
    #[arg(long = "request", short = 'X', default_value = "GET")]
    pub method: String,

    /// Request header as 'Name: value'. Repeatable.
    #[arg(long = "header", short = 'H')]
    pub headers: Vec<String>,

    /// Request body.
    #[arg(long, short = 'd')]
    pub data: Option<String>,

    /// Base URL relative inputs are resolved against.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Enable the retry step with default options.
    #[arg(long)]
    pub retry: bool,

    /// Enable the in-memory cache step with default options.
    #[arg(long)]
    pub cache: bool,

    /// Return error statuses as responses instead of failing.
    #[arg(long)]
    pub no_throw: bool,

    /// Whole-request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print status line and headers before the body.
    #[arg(long, short = 'i')]
    pub include: bool,
}

/// Runs the request command.
pub async fn run(args: &RequestArgs, cli: &Cli) -> Result<()> {
    let settings = settings::load(cli.config.as_deref())?;
    let options = apply_args(settings.fetcher, args);

    FetcherConfig::resolve(options.clone())
        .validate()
        .context("invalid configuration")?;

    let transport = transport_settings(settings.transport, args);
    let provider = TransportProvider::from_settings(&transport)
        .context("failed to build HTTP transport")?;
    let fetcher = Fetcher::with_provider(options, Arc::new(provider));

    let init = build_init(args)?;
    debug!(init = ?init, "Sending request");

    let response = fetcher.fetch(&args.url, Some(init)).await?;
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let headers = response.header_record();
    let body = fetcher.parse_body(response).await?;

    let output = ResponseOutput {
        status,
        url,
        headers,
        body,
    };

    match cli.format {
        OutputFormat::Text => {
            println!(
                "{}",
                TextFormatter::new().format_response(&output, args.include || cli.verbose)
            );
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&output)?);
        }
    }

    Ok(())
}

/// Applies command-line overrides on top of the file options.
fn apply_args(mut options: FetcherOptions, args: &RequestArgs) -> FetcherOptions {
    if let Some(base_url) = &args.base_url {
        options = options.base_url(base_url.clone());
    }
    if args.retry {
        options = options.retry(RetryOptions::default());
    }
    if args.cache {
        options = options.cache(CacheOptions::default());
    }
    if args.no_throw {
        options = options.throw_on_error(false);
    }
    options.logger(Arc::new(TracingLogger))
}

fn transport_settings(settings: TransportSettings, args: &RequestArgs) -> TransportSettings {
    match args.timeout {
        Some(secs) => settings.with_request_timeout(Duration::from_secs(secs)),
        None => settings,
    }
}

fn build_init(args: &RequestArgs) -> Result<RequestInit> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid method {:?}", args.method))?;

    let headers = args
        .headers
        .iter()
        .map(|raw| parse_header(raw))
        .collect::<Result<HeaderRecord>>()?;

    let mut init = RequestInit::new().method(method).headers(headers);
    if let Some(data) = &args.data {
        init = init.body(data.clone());
    }
    Ok(init)
}

/// Parses a `Name: value` header argument.
fn parse_header(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("invalid header {raw:?}, expected 'Name: value'");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("invalid header {raw:?}, name is empty");
    }
    Ok((name.to_string(), value.trim().to_string()))
}
