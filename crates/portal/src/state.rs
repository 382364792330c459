//! Application state shared across handlers.

use std::sync::Arc;

use submissions_hub_core::AccessPolicy;

use crate::config::PortalConfig;
use crate::services::{IdentityClient, IdentityError, RelayClient, RelayError};

/// Error creating the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("identity client: {0}")]
    Identity(#[from] IdentityError),
    #[error("relay client: {0}")]
    Relay(#[from] RelayError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Everything in it is immutable
/// for the lifetime of the process.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: PortalConfig,
    identity: IdentityClient,
    relay: RelayClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built from the configuration.
    pub fn new(config: PortalConfig) -> Result<Self, StateError> {
        let identity = IdentityClient::new(&config.identity)?;
        let relay = RelayClient::new(&config.relay)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                identity,
                relay,
            }),
        })
    }

    /// Get a reference to the portal configuration.
    #[must_use]
    pub fn config(&self) -> &PortalConfig {
        &self.inner.config
    }

    /// Get a reference to the access policy.
    #[must_use]
    pub fn access(&self) -> &AccessPolicy {
        &self.inner.config.access
    }

    /// Get a reference to the identity provider client.
    #[must_use]
    pub fn identity(&self) -> &IdentityClient {
        &self.inner.identity
    }

    /// Get a reference to the workflow webhook client.
    #[must_use]
    pub fn relay(&self) -> &RelayClient {
        &self.inner.relay
    }
}
