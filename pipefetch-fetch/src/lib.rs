// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Pipefetch Fetch
//!
//! Request execution for Pipefetch.
//!
//! ## Transport
//!
//! - [`transport::Transport`] - Puts a resolved request on the wire
//! - [`transport::ReqwestTransport`] - Pooled default built from [`TransportSettings`]
//! - [`provider::TransportProvider`] - Shared, replaceable holder of the default transport
//!
//! ## Interceptor Pipeline
//!
//! - [`interceptor::RetryInterceptor`] - Backoff retries for idempotent requests
//! - [`interceptor::CacheInterceptor`] - In-memory response cache
//! - [`interceptor::ResponseErrorInterceptor`] - Turns error statuses into failures
//! - [`interceptor::InterceptorChain`] - Fixed-order composition of the above
//!
//! ## Client
//!
//! - [`Fetcher`] - Resolves URLs, merges headers, logs and normalizes failures
//!
//! ## Example
//!
//! ```ignore
//! use pipefetch_fetch::{Fetcher, RequestInit};
//! use pipefetch_core::FetcherOptions;
//!
//! let fetcher = Fetcher::new(FetcherOptions::new().base_url("http://127.0.0.1:3000"));
//!
//! let data = fetcher
//!     .fetch_data("/", Some(RequestInit::new().method(Method::POST)))
//!     .await?;
//! ```

pub mod body;
pub mod fetcher;
pub mod interceptor;
pub mod provider;
pub mod response;
pub mod transport;

#[cfg(test)]
mod test_support;

// Client
pub use fetcher::{Fetcher, HeaderMergeOptions, RequestInit};

// Pipeline
pub use interceptor::{
    CacheInterceptor, Interceptor, InterceptorChain, MemoryCacheStore, ResponseErrorInterceptor,
    RetryInterceptor,
};

// Transport
pub use body::ParsedBody;
pub use provider::TransportProvider;
pub use response::{ResponseBody, ResponseEnvelope};
pub use transport::{ReqwestTransport, RequestDescriptor, Transport, TransportSettings};

// Commonly used HTTP types
pub use http::{HeaderMap, Method, StatusCode};
