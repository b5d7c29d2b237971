//! Cache step.
//!
//! Keeps successful, cacheable responses in memory keyed by method and URL,
//! and answers later requests from the store while the entry is fresh.
//! An entry only answers requests whose `Vary`-listed headers match the
//! request that stored it. Responses to credentialed requests are stored only
//! when marked `public` or given an `s-maxage`. Unsafe methods invalidate
//! what is stored for their URL.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CACHE_CONTROL, VARY};
use http::{HeaderMap, Method, StatusCode};
use lru::LruCache;
use pipefetch_core::{CacheOptions, DispatchError, HeaderRecord};
use tracing::debug;
use url::Url;

use super::Interceptor;
use crate::response::{ResponseBody, ResponseEnvelope};
use crate::transport::{RequestDescriptor, Transport};

/// Statuses a shared cache may store without explicit freshness information.
const CACHEABLE_STATUSES: [u16; 12] = [200, 203, 204, 206, 300, 301, 308, 404, 405, 410, 414, 501];

// ============================================================================
// Memory Cache Store
// ============================================================================

#[derive(Debug, Clone)]
struct CachedResponse {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    body: Bytes,
    stored_at: Instant,
    ttl: Duration,
    /// Request values of the `Vary`-listed headers, by lower-case name.
    vary: Vec<(String, Option<String>)>,
}

impl CachedResponse {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }

    fn matches(&self, request_headers: &HeaderRecord) -> bool {
        self.vary
            .iter()
            .all(|(name, value)| request_header(request_headers, name) == value.as_deref())
    }

    fn to_envelope(&self) -> ResponseEnvelope {
        ResponseEnvelope::new(
            self.status,
            self.headers.clone(),
            self.url.clone(),
            ResponseBody::from_bytes(self.body.clone()),
        )
    }
}

/// Bounded in-memory response store. Evicts the least recently used entry
/// when full; a capacity of zero stores nothing.
#[derive(Debug)]
pub struct MemoryCacheStore {
    entries: Mutex<LruCache<String, CachedResponse>>,
    enabled: bool,
}

impl MemoryCacheStore {
    /// Creates a store holding at most `max_entries` responses.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries);
        Self {
            entries: Mutex::new(LruCache::new(capacity.unwrap_or(NonZeroUsize::MIN))),
            enabled: capacity.is_some(),
        }
    }

    /// Returns the number of stored responses, fresh or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops every stored response.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, CachedResponse>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, key: &str, request_headers: &HeaderRecord) -> Option<ResponseEnvelope> {
        let mut entries = self.lock();
        let entry = entries.get(key)?;
        if entry.is_fresh(Instant::now()) {
            return entry
                .matches(request_headers)
                .then(|| entry.to_envelope());
        }
        entries.pop(key);
        None
    }

    fn store(&self, key: String, response: CachedResponse) {
        if self.enabled {
            self.lock().put(key, response);
        }
    }

    fn invalidate_url(&self, url: &Url) {
        let suffix = format!(" {url}");
        let mut entries = self.lock();
        let stale = entries
            .iter()
            .filter(|(key, _)| key.ends_with(&suffix))
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        for key in stale {
            entries.pop(&key);
        }
    }
}

// ============================================================================
// Cache Interceptor
// ============================================================================

/// Serves fresh stored responses and stores cacheable new ones.
///
/// The store lives as long as the interceptor, i.e. for the lifetime of the
/// fetcher that built it.
#[derive(Debug)]
pub struct CacheInterceptor {
    options: CacheOptions,
    store: Arc<MemoryCacheStore>,
}

impl CacheInterceptor {
    /// Creates the step with a fresh store.
    pub fn new(options: CacheOptions) -> Self {
        let store = Arc::new(MemoryCacheStore::new(options.max_entries));
        Self { options, store }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<MemoryCacheStore> {
        &self.store
    }
}

impl Interceptor for CacheInterceptor {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn wrap(&self, next: Arc<dyn Transport>) -> Arc<dyn Transport> {
        Arc::new(CacheTransport {
            next,
            options: self.options.clone(),
            store: self.store.clone(),
        })
    }
}

struct CacheTransport {
    next: Arc<dyn Transport>,
    options: CacheOptions,
    store: Arc<MemoryCacheStore>,
}

impl CacheTransport {
    /// Freshness lifetime for a response, or `None` if it must not be stored.
    fn freshness(&self, directives: &[String], credentialed: bool) -> Option<Duration> {
        if directives
            .iter()
            .any(|d| d == "no-store" || d == "private" || d == "no-cache")
        {
            return None;
        }

        let max_age = |name: &str| {
            directives.iter().find_map(|d| {
                d.strip_prefix(name)
                    .and_then(|rest| rest.strip_prefix('='))
                    .and_then(|secs| secs.trim_matches('"').parse::<u64>().ok())
            })
        };
        let shared_max_age = max_age("s-maxage");

        if credentialed && shared_max_age.is_none() && !directives.iter().any(|d| d == "public") {
            return None;
        }

        let ttl = shared_max_age
            .or_else(|| max_age("max-age"))
            .map_or_else(|| self.options.default_ttl(), Duration::from_secs);

        (!ttl.is_zero()).then_some(ttl)
    }
}

fn cache_directives(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|d| d.trim().to_ascii_lowercase())
        .collect()
}

/// Lower-case names listed in `Vary`, or `None` for `Vary: *`.
fn vary_names(headers: &HeaderMap) -> Option<Vec<String>> {
    let mut names = Vec::new();
    for name in headers
        .get_all(VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|n| n.trim().to_ascii_lowercase())
        .filter(|n| !n.is_empty())
    {
        if name == "*" {
            return None;
        }
        names.push(name);
    }
    Some(names)
}

fn request_header<'a>(headers: &'a HeaderRecord, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .rev()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn is_safe(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn request_forbids_store(headers: &HeaderRecord) -> bool {
    request_header(headers, CACHE_CONTROL.as_str())
        .is_some_and(|value| value.to_ascii_lowercase().contains("no-store"))
}

#[async_trait]
impl Transport for CacheTransport {
    async fn dispatch(
        &self,
        request: RequestDescriptor,
    ) -> Result<ResponseEnvelope, DispatchError> {
        if !self.options.allows_method(request.method.as_str()) {
            let unsafe_method = !is_safe(&request.method);
            let url = request.url.clone();
            let response = self.next.dispatch(request).await?;
            if unsafe_method && response.status().as_u16() < 400 {
                debug!(url = %url, "Invalidating cached responses");
                self.store.invalidate_url(&url);
            }
            return Ok(response);
        }

        let key = request.name();
        let request_headers = request.headers.clone();
        let bypass = request_forbids_store(&request_headers);
        if !bypass {
            if let Some(cached) = self.store.lookup(&key, &request_headers) {
                debug!(request = %key, "Cache hit");
                return Ok(cached);
            }
        }

        let response = self.next.dispatch(request).await?;
        if bypass || !CACHEABLE_STATUSES.contains(&response.status().as_u16()) {
            return Ok(response);
        }
        let credentialed = request_header(&request_headers, AUTHORIZATION.as_str()).is_some();
        let Some(ttl) = self.freshness(&cache_directives(response.headers()), credentialed) else {
            return Ok(response);
        };
        let Some(vary) = vary_names(response.headers()) else {
            return Ok(response);
        };
        let vary = vary
            .into_iter()
            .map(|name| {
                let value = request_header(&request_headers, &name).map(str::to_string);
                (name, value)
            })
            .collect();

        let (status, headers, url, body) = response.into_parts();
        let body = body.bytes().await?;

        debug!(request = %key, ttl_secs = ttl.as_secs(), "Storing response");
        self.store.store(
            key,
            CachedResponse {
                status,
                headers: headers.clone(),
                url: url.clone(),
                body: body.clone(),
                stored_at: Instant::now(),
                ttl,
                vary,
            },
        );

        Ok(ResponseEnvelope::new(
            status,
            headers,
            url,
            ResponseBody::from_bytes(body),
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
