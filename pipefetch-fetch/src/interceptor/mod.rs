//! Interceptor pipeline.
//!
//! An [`Interceptor`] wraps a transport in another transport. The chain a
//! fetcher uses is built once from its configuration, always in the order
//! retry → cache → throw-on-error, and composed over the shared transport on
//! each call. Composition folds left, so the first step ends up closest to
//! the transport and the last step sees the final response.

mod cache;
mod response_error;
mod retry;

use std::fmt;
use std::sync::Arc;

use pipefetch_core::FetcherConfig;

use crate::transport::Transport;

pub use cache::{CacheInterceptor, MemoryCacheStore};
pub use response_error::ResponseErrorInterceptor;
pub use retry::RetryInterceptor;

// ============================================================================
// Interceptor Trait
// ============================================================================

/// A composable request/response step.
pub trait Interceptor: Send + Sync + fmt::Debug {
    /// Short identifier for logs and introspection.
    fn name(&self) -> &'static str;

    /// Wraps `next` so requests pass through this step first.
    fn wrap(&self, next: Arc<dyn Transport>) -> Arc<dyn Transport>;
}

// ============================================================================
// Interceptor Chain
// ============================================================================

/// Ordered list of interceptors.
#[derive(Debug, Clone, Default)]
pub struct InterceptorChain {
    steps: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Builds the chain for a resolved configuration.
    ///
    /// Steps are appended retry, cache, throw-on-error; disabled ones are skipped.
    pub fn from_config(config: &FetcherConfig) -> Self {
        let mut chain = Self::new();

        if let Some(retry) = &config.retry {
            chain.push(Arc::new(RetryInterceptor::new(retry.clone())));
        }
        if let Some(cache) = &config.cache {
            chain.push(Arc::new(CacheInterceptor::new(cache.clone())));
        }
        if config.throw_on_error {
            chain.push(Arc::new(ResponseErrorInterceptor::new()));
        }

        chain
    }

    /// Appends a step.
    pub fn push(&mut self, step: Arc<dyn Interceptor>) {
        self.steps.push(step);
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the chain has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the step names in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Wraps `base` with every step, first step innermost.
    pub fn compose(&self, base: Arc<dyn Transport>) -> Arc<dyn Transport> {
        self.steps
            .iter()
            .fold(base, |next, step| step.wrap(next))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponseEnvelope;
    use crate::test_support::{ok_response, ScriptedTransport};
    use crate::transport::RequestDescriptor;
    use async_trait::async_trait;
    use http::{Method, StatusCode};
    use pipefetch_core::{CacheOptions, DispatchError, RetryOptions};
    use std::sync::Mutex;
    use url::Url;

    /// Records the order in which wrapped transports are entered.
    #[derive(Debug)]
    struct Tracer {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    struct TracerTransport {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        next: Arc<dyn Transport>,
    }

    #[async_trait]
    impl Transport for TracerTransport {
        async fn dispatch(
            &self,
            request: RequestDescriptor,
        ) -> Result<ResponseEnvelope, DispatchError> {
            self.log.lock().unwrap().push(self.label);
            self.next.dispatch(request).await
        }
    }

    impl Interceptor for Tracer {
        fn name(&self) -> &'static str {
            self.label
        }

        fn wrap(&self, next: Arc<dyn Transport>) -> Arc<dyn Transport> {
            Arc::new(TracerTransport {
                label: self.label,
                log: self.log.clone(),
                next,
            })
        }
    }

    #[test]
    fn test_default_config_has_only_throw_step() {
        let chain = InterceptorChain::from_config(&FetcherConfig::default());
        assert_eq!(chain.names(), vec!["response_error"]);
    }

    #[test]
    fn test_all_steps_in_fixed_order() {
        let config = FetcherConfig {
            retry: Some(RetryOptions::default()),
            cache: Some(CacheOptions::default()),
            ..FetcherConfig::default()
        };
        let chain = InterceptorChain::from_config(&config);
        assert_eq!(chain.names(), vec!["retry", "cache", "response_error"]);
    }

    #[test]
    fn test_disabled_steps_are_skipped() {
        let config = FetcherConfig {
            cache: Some(CacheOptions::default()),
            throw_on_error: false,
            ..FetcherConfig::default()
        };
        assert_eq!(InterceptorChain::from_config(&config).names(), vec!["cache"]);

        let empty = FetcherConfig {
            throw_on_error: false,
            ..FetcherConfig::default()
        };
        assert!(InterceptorChain::from_config(&empty).is_empty());
    }

    #[tokio::test]
    async fn test_last_step_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = InterceptorChain::new();
        for label in ["first", "second", "third"] {
            chain.push(Arc::new(Tracer {
                label,
                log: log.clone(),
            }));
        }

        let base = Arc::new(ScriptedTransport::always(|req| ok_response(req, StatusCode::OK, "")));
        let composed = chain.compose(base.clone());
        composed
            .dispatch(RequestDescriptor::new(
                Method::GET,
                Url::parse("http://127.0.0.1:3000/").unwrap(),
            ))
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["third", "second", "first"]);
        assert_eq!(base.calls(), 1);
    }
}
