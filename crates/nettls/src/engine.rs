//! The interface to the native TLS engine.
//!
//! The engine is an external collaborator; only its surface is fixed here.
//! [`Engine`] is the process-level factory (priority parsing, DH parameter
//! generation, identity validation, session creation), [`EngineSession`]
//! one handshake/record machine bound to the provider's [`Transport`].
//! Engine outcomes are never surfaced raw; the endpoint runs every result
//! through its error translator.

use std::io;
use std::sync::Arc;

use crate::config::Config;
use crate::credentials::KeyMaterial;
use crate::transport::Transport;
use nettls_types::{AddressedServer, CloseMethod, Der, Direction, EngineCode, Role};

/// A TLS alert description, as far as this layer needs to name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    CloseNotify,
    UserCanceled,
    NoRenegotiation,
    Other(u8),
}

impl Alert {
    /// The RFC 8446 description code.
    pub fn code(&self) -> u8 {
        match self {
            Alert::CloseNotify => 0,
            Alert::UserCanceled => 90,
            Alert::NoRenegotiation => 100,
            Alert::Other(code) => *code,
        }
    }
}

/// Outcome of an engine call that did not plainly succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The transport blocked in the given direction; same call again later.
    Again(Direction),
    /// A signal raced the call; same call again immediately.
    Interrupted,
    /// The peer started (or answered) a renegotiation.
    Rehandshake,
    /// A warning-level alert arrived instead of data.
    WarningAlertReceived { code: EngineCode, alert: Alert },
    /// An enumeration query ran past the last element.
    RequestedDataNotAvailable(EngineCode),
    /// A non-fatal engine condition.
    NonFatal(EngineCode),
    /// A fatal engine condition; the session is dead.
    Fatal(EngineCode),
}

/// Engine code reported when the transport fails hard underneath the engine.
pub const TRANSPORT_FAILURE: EngineCode = EngineCode(-1000);

impl EngineError {
    /// Map a transport-level I/O error observed while moving bytes in
    /// `direction`. Engines call this at the pull/push boundary.
    pub fn from_io(direction: Direction, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock => EngineError::Again(direction),
            io::ErrorKind::Interrupted => EngineError::Interrupted,
            _ => EngineError::Fatal(TRANSPORT_FAILURE),
        }
    }
}

/// The engine-facing side of a session cache.
///
/// Installed on a session by the endpoint; `store` additionally receives
/// the certificate the engine presented, because the engine will not
/// re-emit it when the session is later resumed.
pub trait EngineSessionCache: Send {
    fn store(&self, key: &[u8], data: &[u8], our_cert: Option<&[u8]>);
    fn remove(&self, key: &[u8]);
    fn retrieve(&self, key: &[u8]) -> Option<Vec<u8>>;
}

/// One TLS session inside the engine.
///
/// All byte-moving calls take the transport as an argument so that a
/// session can be detached from one transport and reattached to another
/// (stash/restore) without the engine noticing.
pub trait EngineSession: Send {
    /// Drive the handshake one step further.
    fn handshake(&mut self, io: &mut dyn Transport) -> Result<(), EngineError>;
    /// Decrypt application data into `buf`; `Ok(0)` means close-notify.
    fn recv(&mut self, io: &mut dyn Transport, buf: &mut [u8]) -> Result<usize, EngineError>;
    /// Encrypt and push application data; returns bytes accepted.
    fn send(&mut self, io: &mut dyn Transport, buf: &[u8]) -> Result<usize, EngineError>;
    /// Send close-notify for the indicated directions.
    fn close_notify(&mut self, io: &mut dyn Transport, how: CloseMethod) -> Result<(), EngineError>;
    /// Ask the peer for a new handshake.
    fn request_rehandshake(&mut self, io: &mut dyn Transport) -> Result<(), EngineError>;
    /// Send a warning-level alert.
    fn send_warning_alert(&mut self, io: &mut dyn Transport, alert: Alert)
        -> Result<(), EngineError>;

    /// Swap the configuration used by the next handshake.
    fn replace_config(&mut self, config: &Arc<Config>) -> Result<(), EngineError>;
    /// Bytes of decrypted plaintext already buffered inside the engine.
    fn pending_plaintext(&self) -> usize;

    fn session_id(&self) -> Result<Vec<u8>, EngineError>;
    /// Serialize the session for later resumption.
    fn session_data(&self) -> Result<Vec<u8>, EngineError>;
    /// Pre-load serialized session state so the next handshake can resume.
    fn set_session_data(&mut self, blob: &[u8]) -> Result<(), EngineError>;
    /// Install the cache callbacks used during handshakes.
    fn set_cache(&mut self, cache: Box<dyn EngineSessionCache>);

    fn cipher_suite_type(&self) -> String;
    fn cipher_algo(&self) -> String;
    fn kx_algo(&self) -> String;
    fn mac_algo(&self) -> String;
    fn compression_algo(&self) -> String;
    fn cert_type(&self) -> String;
    fn protocol(&self) -> String;

    /// The `index`-th SNI entry of the client hello;
    /// `RequestedDataNotAvailable` past the end.
    fn addressed_server(&self, index: usize) -> Result<AddressedServer, EngineError>;
    /// The certificate this side actually presented, if the engine still
    /// knows it.
    fn our_certificate(&self) -> Option<Der>;
    /// The peer's certificate chain, leaf first; empty when none came.
    fn peer_certificates(&self) -> Vec<Der>;
    /// Run the engine's chain validation; `0` means no complaint flags.
    fn verify_peer(&self) -> Result<u32, EngineError>;
    /// DNS-style match of the first peer certificate against `name`.
    fn peer_matches_name(&self, name: &str) -> bool;
}

/// The engine factory.
pub trait Engine: Send + Sync {
    /// The engine's self-chosen implementation name.
    fn name(&self) -> &str;
    /// Validate a priority/algorithms string.
    fn check_priority(&self, priority: &str) -> Result<(), EngineError>;
    /// Generate fresh DH parameters of the given bit length.
    fn generate_dh_params(&self, bits: u32) -> Result<Der, EngineError>;
    /// Whether the engine can load the platform trust store itself.
    fn supports_system_trust(&self) -> bool;
    /// Check that a certificate chain and private key belong together.
    fn validate_identity(&self, chain: &[Der], key: &KeyMaterial) -> Result<(), EngineError>;
    /// Create a fresh session for `role` under `config`.
    fn create_session(
        &self,
        role: Role,
        config: &Arc<Config>,
    ) -> Result<Box<dyn EngineSession>, EngineError>;
    /// Human text for one of the engine's own codes.
    fn describe_code(&self, code: EngineCode) -> String;
}
