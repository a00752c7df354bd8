#![forbid(unsafe_code)]
#![doc = "Transport-agnostic TLS provider layer over a native TLS engine."]
//!
//! The crate decomposes into a PEM/DER decoder ([`pem`]), a credential
//! store ([`credentials`]), an immutable configuration ([`config`]), the
//! endpoint state machine ([`endpoint`]), the session resumption envelope
//! and cache ([`session`]), and the provider facade ([`provider`]). The
//! cryptographic engine itself stays behind the trait pair in [`engine`];
//! the byte transport behind the trait in [`transport`].
//!
//! Everything is strictly non-blocking: any call that exchanges bytes may
//! return [`TlsError::WantRead`] or [`TlsError::WantWrite`], and the caller
//! re-drives the same call once the transport is ready in that direction.

pub mod config;
pub mod credentials;
pub mod endpoint;
pub mod engine;
pub mod pem;
pub mod provider;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{Config, ConfigBuilder, DhSource, VerifyHook};
pub use credentials::{
    CertSource, Credentials, CrlSource, Identity, KeyMaterial, KeySource, Password,
    X509CredentialsBuilder,
};
pub use endpoint::{Endpoint, StashedEndpoint};
pub use engine::{Alert, Engine, EngineError, EngineSession, EngineSessionCache};
pub use nettls_types::{
    AddressedServer, CloseMethod, Der, Direction, EngineCode, ErrorCode, PeerAuth, RawCredentials,
    Role, State, TlsError,
};
pub use provider::{
    default_provider, set_default_provider, NettlsProvider, ProviderImpl, TlsProvider,
};
pub use session::{FnSessionCache, InMemorySessionCache, SerializedSession, SessionCache};
pub use transport::{CallbackTransport, StreamTransport, Transport};
