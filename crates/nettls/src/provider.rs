//! The provider facade: the stable capability surface the rest of the
//! world sees, and the process-wide default slot.
//!
//! Higher layers program against [`TlsProvider`]; code that needs the
//! concrete type recovers it through the tagged [`ProviderImpl`] instead
//! of downcasting.

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::config::{Config, ConfigBuilder};
use crate::credentials::{Credentials, X509CredentialsBuilder};
use crate::endpoint::{Endpoint, StashedEndpoint};
use crate::engine::Engine;
use crate::transport::Transport;
use nettls_types::{sentinel_message, ErrorCode, Role, TlsError};

/// Identity of a concrete provider, for callers that must reach past the
/// trait surface.
#[non_exhaustive]
pub enum ProviderImpl<'a> {
    Nettls(&'a NettlsProvider),
}

/// The capability surface of a TLS provider.
pub trait TlsProvider: Send + Sync {
    /// The implementation name (the engine's own, e.g. its library name).
    fn name(&self) -> &str;

    /// The concrete implementation behind this provider.
    fn implementation(&self) -> ProviderImpl<'_>;

    /// Build an X.509 credential set.
    fn create_x509_credentials(
        &self,
        builder: X509CredentialsBuilder,
    ) -> Result<Arc<Credentials>, TlsError>;

    /// Build a configuration.
    fn create_config(&self, builder: ConfigBuilder) -> Result<Arc<Config>, TlsError>;

    /// Create an endpoint in `Start` bound to `transport`.
    fn create_endpoint(
        &self,
        role: Role,
        transport: Box<dyn Transport>,
        peer_name: Option<String>,
        config: Arc<Config>,
    ) -> Result<Endpoint, TlsError>;

    /// Create a client endpoint pre-loaded for an abbreviated handshake.
    fn resume_client(
        &self,
        transport: Box<dyn Transport>,
        peer_name: Option<String>,
        config: Arc<Config>,
        session_blob: &[u8],
    ) -> Result<Endpoint, TlsError>;

    /// Detach an endpoint from its transport, capturing the session for a
    /// later [`restore_endpoint`](Self::restore_endpoint).
    fn stash_endpoint(&self, endpoint: Endpoint) -> StashedEndpoint;

    /// Reattach a stashed endpoint to a new transport.
    fn restore_endpoint(&self, token: StashedEndpoint, transport: Box<dyn Transport>) -> Endpoint;

    /// Human text for an error code: fixed for the `NETTLS_*` sentinels,
    /// the engine's own otherwise.
    fn error_message(&self, code: &ErrorCode) -> String;
}

/// The concrete provider over an injected engine.
pub struct NettlsProvider {
    engine: Arc<dyn Engine>,
}

impl NettlsProvider {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }
}

impl TlsProvider for NettlsProvider {
    fn name(&self) -> &str {
        self.engine.name()
    }

    fn implementation(&self) -> ProviderImpl<'_> {
        ProviderImpl::Nettls(self)
    }

    fn create_x509_credentials(
        &self,
        builder: X509CredentialsBuilder,
    ) -> Result<Arc<Credentials>, TlsError> {
        builder.build(self.engine.as_ref()).map(Arc::new)
    }

    fn create_config(&self, builder: ConfigBuilder) -> Result<Arc<Config>, TlsError> {
        builder.build(self.engine.as_ref()).map(Arc::new)
    }

    fn create_endpoint(
        &self,
        role: Role,
        transport: Box<dyn Transport>,
        peer_name: Option<String>,
        config: Arc<Config>,
    ) -> Result<Endpoint, TlsError> {
        Endpoint::create(self.engine.as_ref(), role, transport, peer_name, config)
    }

    fn resume_client(
        &self,
        transport: Box<dyn Transport>,
        peer_name: Option<String>,
        config: Arc<Config>,
        session_blob: &[u8],
    ) -> Result<Endpoint, TlsError> {
        Endpoint::resume_client(
            self.engine.as_ref(),
            transport,
            peer_name,
            config,
            session_blob,
        )
    }

    fn stash_endpoint(&self, endpoint: Endpoint) -> StashedEndpoint {
        endpoint.stash()
    }

    fn restore_endpoint(&self, token: StashedEndpoint, transport: Box<dyn Transport>) -> Endpoint {
        Endpoint::restore(token, transport)
    }

    fn error_message(&self, code: &ErrorCode) -> String {
        match code {
            ErrorCode::Sentinel(sentinel) => sentinel_message(sentinel)
                .unwrap_or("unknown error condition")
                .to_string(),
            ErrorCode::Engine(engine_code) => self.engine.describe_code(*engine_code),
        }
    }
}

static DEFAULT_PROVIDER: OnceLock<Arc<dyn TlsProvider>> = OnceLock::new();

/// Register the process-wide default provider. Fails once a default is
/// set; the slot is write-once.
pub fn set_default_provider(provider: Arc<dyn TlsProvider>) -> Result<(), TlsError> {
    let name = provider.name().to_string();
    DEFAULT_PROVIDER
        .set(provider)
        .map_err(|_| TlsError::ConfigError("a default TLS provider is already registered".into()))?;
    debug!(provider = %name, "default TLS provider registered");
    Ok(())
}

/// The process-wide default provider, if one was registered.
pub fn default_provider() -> Option<Arc<dyn TlsProvider>> {
    DEFAULT_PROVIDER.get().map(Arc::clone)
}
