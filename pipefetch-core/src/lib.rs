// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Pipefetch Core
//!
//! Foundational types shared by the Pipefetch crates:
//!
//! - Header representations and the normalizer every header merge uses
//! - Fetcher options and the configuration resolver
//! - The error taxonomy surfaced to callers
//! - The request log sink trait
//!
//! ## Key Types
//!
//! - [`HeadersInit`] - Any accepted header representation
//! - [`HeaderRecord`] - The plain name → value mapping they normalize to
//! - [`FetcherOptions`] - Caller-supplied options
//! - [`FetcherConfig`] - Options resolved over defaults
//! - [`FetchError`] - Normalized failure returned by the client
//! - [`DispatchError`] - Failure shape between transports and interceptors
//! - [`FetchLogger`] - Request log sink

pub mod error;
pub mod headers;
pub mod logger;
pub mod options;

pub use error::{
    ConfigError, DispatchError, FetchError, StatusError, TransportError, TransportErrorKind,
};
pub use headers::{
    header_map_to_record, headers_init_to_record, merge_headers, HeaderRecord, HeadersInit,
};
pub use logger::{FetchLogger, TracingLogger, REQUEST_LOG_TARGET};
pub use options::{CacheOptions, FetcherConfig, FetcherOptions, RetryOptions, Toggle};
