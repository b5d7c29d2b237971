//! Shared transport provider.
//!
//! Every fetcher dispatches through the transport its provider currently
//! holds. Fetchers constructed with the same provider share one transport
//! (and therefore one connection pool); replacing it affects all of them
//! except calls that carry their own transport override.

use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::debug;

use crate::transport::{Transport, TransportSettings};
use pipefetch_core::TransportError;

static GLOBAL: OnceLock<Arc<TransportProvider>> = OnceLock::new();

/// Holds the shared default transport.
pub struct TransportProvider {
    current: RwLock<Arc<dyn Transport>>,
}

impl TransportProvider {
    /// Creates a provider holding `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            current: RwLock::new(transport),
        }
    }

    /// Builds the pooled transport from `settings` and wraps it.
    pub fn from_settings(settings: &TransportSettings) -> Result<Self, TransportError> {
        Ok(Self::new(Arc::new(settings.build()?)))
    }

    /// Process-wide provider, built from default settings on first use.
    ///
    /// Applications that want an explicit shared resource should build a
    /// provider at startup and pass it to each fetcher instead.
    ///
    /// # Panics
    ///
    /// Panics if the default HTTP client cannot be built. This only happens
    /// when the system's TLS configuration is broken, in which case no
    /// request could succeed anyway.
    pub fn global() -> Arc<Self> {
        GLOBAL
            .get_or_init(|| {
                let provider = Self::from_settings(&TransportSettings::default())
                    .unwrap_or_else(|e| {
                        panic!(
                            "Failed to create default transport: {e}. \
                            This usually indicates a broken TLS/SSL configuration."
                        )
                    });
                Arc::new(provider)
            })
            .clone()
    }

    /// Returns the current transport.
    pub fn get(&self) -> Arc<dyn Transport> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the current transport.
    pub fn set(&self, transport: Arc<dyn Transport>) {
        self.replace(transport);
    }

    /// Replaces the current transport and returns the previous one, so a
    /// test can put it back afterwards.
    pub fn replace(&self, transport: Arc<dyn Transport>) -> Arc<dyn Transport> {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        debug!("Replacing shared transport");
        std::mem::replace(&mut *current, transport)
    }
}

impl std::fmt::Debug for TransportProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportProvider").finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
