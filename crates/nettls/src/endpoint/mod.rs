//! The TLS endpoint: one session bound to one transport, driven through a
//! state machine.
//!
//! Every byte-moving operation may suspend with `WantRead` / `WantWrite`;
//! the caller re-drives the same call once the transport is ready. Each
//! operation is legal only in the states of the transition table; anywhere
//! else it fails with `UnexpectedState` without touching the endpoint.

mod translate;


use std::fmt;
use std::io;
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::config::Config;
use crate::engine::{Alert, Engine, EngineError, EngineSession, EngineSessionCache};
use crate::session::{SerializedSession, SessionCache};
use crate::transport::Transport;
use nettls_types::{
    AddressedServer, CloseMethod, PeerAuth, RawCredentials, Role, State, TlsError,
};

use self::translate::translate;

/// The certificate this endpoint presented, shared with the cache adapter
/// which must update it during resumption.
type CertCell = Arc<Mutex<Option<RawCredentials>>>;

/// Transport wrapper latching end-of-file: once the underlying `recv`
/// returns 0 for a non-empty buffer, the endpoint reports transport EOF
/// forever.
struct Monitored {
    inner: Box<dyn Transport>,
    eof: bool,
}

impl Transport for Monitored {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.recv(buf)?;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        Ok(n)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.send(buf)
    }
}

/// A TLS session bound to one peer.
pub struct Endpoint {
    role: Role,
    transport: Monitored,
    config: Arc<Config>,
    session: Box<dyn EngineSession>,
    peer_name: Option<String>,
    our_cert: CertCell,
    state: State,
    cache: Option<Arc<dyn SessionCache>>,
}

impl Endpoint {
    /// Create an endpoint in `Start`, bound to `transport`.
    ///
    /// Fails closed: a client whose configuration demands peer
    /// authentication with name checking must know the peer name up front.
    pub fn create(
        engine: &dyn Engine,
        role: Role,
        transport: Box<dyn Transport>,
        peer_name: Option<String>,
        config: Arc<Config>,
    ) -> Result<Self, TlsError> {
        if role == Role::Client
            && config.peer_auth() != PeerAuth::None
            && !config.peer_name_unchecked()
            && peer_name.is_none()
        {
            return Err(TlsError::ConfigError(
                "client endpoint needs a peer name when peer authentication is enabled".into(),
            ));
        }
        let session = engine
            .create_session(role, &config)
            .map_err(|e| translate(e, State::Start, false))?;
        Ok(Self {
            role,
            transport: Monitored {
                inner: transport,
                eof: false,
            },
            config,
            session,
            peer_name,
            our_cert: Arc::new(Mutex::new(None)),
            state: State::Start,
            cache: None,
        })
    }

    /// Create a client endpoint pre-loaded with a serialized session, so
    /// the next `hello` attempts an abbreviated handshake.
    pub fn resume_client(
        engine: &dyn Engine,
        transport: Box<dyn Transport>,
        peer_name: Option<String>,
        config: Arc<Config>,
        session_blob: &[u8],
    ) -> Result<Self, TlsError> {
        let mut ep = Self::create(engine, Role::Client, transport, peer_name, config)?;
        ep.session
            .set_session_data(session_blob)
            .map_err(|e| translate(e, State::Start, false))?;
        Ok(ep)
    }

    fn check_state(&self, op: &'static str, allowed: &[State]) -> Result<(), TlsError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(TlsError::UnexpectedState {
                op,
                state: self.state,
            })
        }
    }

    fn set_state(&mut self, to: State) {
        if self.state != to {
            trace!(from = ?self.state, to = ?to, "endpoint state");
            self.state = to;
        }
    }

    /// Recompute the presented certificate from the session, without
    /// clobbering a value recovered from the session cache: the engine
    /// reports nothing after a resumed handshake.
    fn refresh_our_cert(&self) {
        let mut cell = self.our_cert.lock().unwrap();
        match self.session.our_certificate() {
            Some(der) => *cell = Some(RawCredentials::X509(der)),
            None => {
                if cell.is_none() {
                    *cell = Some(RawCredentials::Anonymous);
                }
            }
        }
    }

    /// Drive the handshake. Suspends with `WantRead` / `WantWrite`;
    /// non-fatal engine conditions surface as `Warning` and the call can
    /// be repeated.
    pub fn hello(&mut self) -> Result<(), TlsError> {
        self.check_state("hello", &[State::Start, State::Handshake, State::Switching])?;
        if self.state == State::Start {
            self.set_state(State::Handshake);
        }
        match self.session.handshake(&mut self.transport) {
            Ok(()) => {
                self.refresh_our_cert();
                self.set_state(State::DataRw);
                debug!(role = ?self.role, protocol = %self.session.protocol(), "handshake complete");
                Ok(())
            }
            Err(e) => Err(translate(e, self.state, true)),
        }
    }

    /// Close the indicated directions. `Receive` is a no-op: a peer cannot
    /// be driven to stop sending. `Send` in `DataR` is likewise a no-op:
    /// the write side is already closed there.
    pub fn bye(&mut self, how: CloseMethod) -> Result<(), TlsError> {
        self.check_state("bye", &[State::DataRw, State::DataR, State::DataW])?;
        if how == CloseMethod::Receive {
            return Ok(());
        }
        if how == CloseMethod::Send && self.state == State::DataR {
            return Ok(());
        }
        match self.session.close_notify(&mut self.transport, how) {
            Ok(()) => {
                let next = match (how, self.state) {
                    (CloseMethod::All, _) => State::End,
                    (_, State::DataRw) => State::DataR,
                    (_, _) => State::End,
                };
                self.set_state(next);
                Ok(())
            }
            Err(e) => Err(translate(e, self.state, true)),
        }
    }

    /// Verify the peer according to the configured policy: certificate
    /// presence, chain validation, name match, then the user hook.
    pub fn verify(&self) -> Result<(), TlsError> {
        let peer_certs = self.session.peer_certificates();
        let policy = self.config.peer_auth();
        if peer_certs.is_empty() {
            if policy == PeerAuth::Required {
                return Err(TlsError::NoCertificate);
            }
        } else {
            if policy != PeerAuth::None {
                let status = self
                    .session
                    .verify_peer()
                    .map_err(|e| translate(e, self.state, false))?;
                if status != 0 {
                    return Err(TlsError::CertVerificationFailed);
                }
            }
            if !self.config.peer_name_unchecked() {
                if let Some(name) = &self.peer_name {
                    if !self.session.peer_matches_name(name) {
                        return Err(TlsError::NameVerificationFailed);
                    }
                }
            }
        }
        if let Some(hook) = self.config.verify_hook().cloned() {
            if !hook(self) {
                return Err(TlsError::UserVerificationFailed);
            }
        }
        Ok(())
    }

    /// Initiate a renegotiation under `new_config`. On success the
    /// endpoint is in `DataRs` (read-only until the peer answers).
    pub fn switch(&mut self, new_config: Arc<Config>) -> Result<(), TlsError> {
        self.check_state("switch", &[State::DataRw, State::DataW, State::Switching])?;
        self.set_state(State::Switching);
        match self.session.request_rehandshake(&mut self.transport) {
            Ok(()) => {
                self.session
                    .replace_config(&new_config)
                    .map_err(|e| translate(e, self.state, false))?;
                self.config = new_config;
                self.set_state(State::DataRs);
                Ok(())
            }
            Err(e) => Err(translate(e, self.state, true)),
        }
    }

    /// Answer a `SwitchRequest` by running the new handshake under
    /// `new_config`. On a retry after suspension the configuration given
    /// to the first call stays in effect.
    pub fn accept_switch(&mut self, new_config: Arc<Config>) -> Result<(), TlsError> {
        self.check_state(
            "accept_switch",
            &[State::DataRw, State::DataW, State::Accepting],
        )?;
        if self.state != State::Accepting {
            self.session
                .replace_config(&new_config)
                .map_err(|e| translate(e, self.state, false))?;
            self.config = new_config;
            self.set_state(State::Accepting);
        }
        match self.session.handshake(&mut self.transport) {
            Ok(()) => {
                self.refresh_our_cert();
                self.set_state(State::DataRw);
                debug!(role = ?self.role, "switch accepted, rehandshake complete");
                Ok(())
            }
            Err(e) => Err(translate(e, self.state, true)),
        }
    }

    /// Answer a `SwitchRequest` with a `no_renegotiation` warning alert.
    ///
    /// A failure other than a suspension leaves the endpoint in
    /// `Refusing`: the channel did not deliver the refusal, so it is no
    /// longer trustworthy for renegotiation control flow.
    pub fn refuse_switch(&mut self) -> Result<(), TlsError> {
        self.check_state(
            "refuse_switch",
            &[State::DataRw, State::DataW, State::Refusing],
        )?;
        self.set_state(State::Refusing);
        match self
            .session
            .send_warning_alert(&mut self.transport, Alert::NoRenegotiation)
        {
            Ok(()) => {
                self.set_state(State::DataRw);
                Ok(())
            }
            Err(e) => Err(translate(e, State::Refusing, true)),
        }
    }

    /// Send up to `n` bytes of `buf`; returns how many the engine
    /// accepted.
    pub fn send(&mut self, buf: &[u8], n: usize) -> Result<usize, TlsError> {
        self.check_state("send", &[State::DataRw, State::DataW])?;
        let n = n.min(buf.len());
        self.session
            .send(&mut self.transport, &buf[..n])
            .map_err(|e| translate(e, self.state, false))
    }

    /// Receive into `buf`. `Ok(0)` on a non-empty buffer is the TLS-level
    /// end of stream (the peer sent close-notify).
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        self.check_state("recv", &[State::DataRw, State::DataR, State::DataRs])?;
        match self.session.recv(&mut self.transport, buf) {
            Ok(0) if !buf.is_empty() => {
                let next = match self.state {
                    State::DataR => State::End,
                    _ => State::DataW,
                };
                self.set_state(next);
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                let signal = translate(e, self.state, false);
                match &signal {
                    // the peer answered our switch: ready for `hello`
                    TlsError::SwitchResponse(true) => self.set_state(State::Switching),
                    // the peer refused our switch: back to plain duplex
                    TlsError::SwitchResponse(false) => self.set_state(State::DataRw),
                    _ => {}
                }
                Err(signal)
            }
        }
    }

    /// True when decrypted plaintext is already buffered inside the
    /// engine, so the next `recv` cannot suspend.
    pub fn recv_will_not_block(&self) -> bool {
        self.session.pending_plaintext() > 0
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn peer_name(&self) -> Option<&str> {
        self.peer_name.as_deref()
    }

    pub fn get_state(&self) -> State {
        self.state
    }

    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Whether the transport ever reported end-of-file. Latched.
    pub fn at_transport_eof(&self) -> bool {
        self.transport.eof
    }

    pub fn get_session_id(&self) -> Result<Vec<u8>, TlsError> {
        self.session
            .session_id()
            .map_err(|e| translate(e, self.state, false))
    }

    /// The engine's serialized session, suitable for
    /// [`resume_client`](Self::resume_client).
    pub fn get_session_data(&self) -> Result<Vec<u8>, TlsError> {
        self.session
            .session_data()
            .map_err(|e| translate(e, self.state, false))
    }

    pub fn get_cipher_suite_type(&self) -> String {
        self.session.cipher_suite_type()
    }

    pub fn get_cipher_algo(&self) -> String {
        self.session.cipher_algo()
    }

    pub fn get_kx_algo(&self) -> String {
        self.session.kx_algo()
    }

    pub fn get_mac_algo(&self) -> String {
        self.session.mac_algo()
    }

    pub fn get_compression_algo(&self) -> String {
        self.session.compression_algo()
    }

    pub fn get_cert_type(&self) -> String {
        self.session.cert_type()
    }

    pub fn get_protocol(&self) -> String {
        self.session.protocol()
    }

    /// The SNI names the client addressed, in hello order.
    pub fn get_addressed_servers(&self) -> Result<Vec<AddressedServer>, TlsError> {
        let mut servers = Vec::new();
        loop {
            match self.session.addressed_server(servers.len()) {
                Ok(server) => servers.push(server),
                Err(EngineError::RequestedDataNotAvailable(_)) => return Ok(servers),
                Err(e) => return Err(translate(e, self.state, false)),
            }
        }
    }

    /// The credentials this endpoint presented; computed lazily after the
    /// handshake.
    pub fn get_endpoint_creds(&self) -> RawCredentials {
        self.refresh_our_cert();
        self.our_cert
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(RawCredentials::Anonymous)
    }

    /// The peer's leaf credentials.
    pub fn get_peer_creds(&self) -> RawCredentials {
        self.session
            .peer_certificates()
            .into_iter()
            .next()
            .map(RawCredentials::X509)
            .unwrap_or(RawCredentials::Anonymous)
    }

    /// The peer's full chain, leaf first; empty when none was presented.
    pub fn get_peer_creds_list(&self) -> Vec<RawCredentials> {
        self.session
            .peer_certificates()
            .into_iter()
            .map(RawCredentials::X509)
            .collect()
    }

    /// Install a session cache. Stored entries are the serialized-session
    /// envelope (engine blob plus the certificate this side presented);
    /// retrieval restores `our_cert` before handing the engine its blob.
    pub fn set_session_cache(&mut self, cache: Arc<dyn SessionCache>) {
        self.cache = Some(Arc::clone(&cache));
        let adapter = CacheAdapter {
            user: cache,
            our_cert: Arc::clone(&self.our_cert),
        };
        self.session.set_cache(Box::new(adapter));
    }

    /// Detach from the transport, capturing everything needed to continue
    /// the session elsewhere. The transport is dropped here; the state the
    /// token carries is the state at the time of the call.
    pub fn stash(self) -> StashedEndpoint {
        debug!(role = ?self.role, state = ?self.state, "endpoint stashed");
        StashedEndpoint {
            role: self.role,
            config: self.config,
            session: self.session,
            peer_name: self.peer_name,
            our_cert: self.our_cert,
            prior_state: self.state,
            trans_eof: self.transport.eof,
            cache: self.cache,
        }
    }

    /// Reattach a stashed session to a new transport. Role, configuration,
    /// peer name, presented certificate, state, and the transport-EOF
    /// latch all carry over.
    pub fn restore(token: StashedEndpoint, transport: Box<dyn Transport>) -> Self {
        Self {
            role: token.role,
            transport: Monitored {
                inner: transport,
                eof: token.trans_eof,
            },
            config: token.config,
            session: token.session,
            peer_name: token.peer_name,
            our_cert: token.our_cert,
            state: token.prior_state,
            cache: token.cache,
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("peer_name", &self.peer_name)
            .field("trans_eof", &self.transport.eof)
            .finish_non_exhaustive()
    }
}

/// An opaque capture of a detached endpoint, produced by
/// [`Endpoint::stash`] and consumed by [`Endpoint::restore`].
pub struct StashedEndpoint {
    role: Role,
    config: Arc<Config>,
    session: Box<dyn EngineSession>,
    peer_name: Option<String>,
    our_cert: CertCell,
    prior_state: State,
    trans_eof: bool,
    cache: Option<Arc<dyn SessionCache>>,
}

impl fmt::Debug for StashedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StashedEndpoint")
            .field("role", &self.role)
            .field("prior_state", &self.prior_state)
            .field("trans_eof", &self.trans_eof)
            .finish_non_exhaustive()
    }
}

/// Engine-facing cache shim: wraps the user cache in the envelope codec
/// and keeps the endpoint's `our_cert` in sync during store and retrieve.
struct CacheAdapter {
    user: Arc<dyn SessionCache>,
    our_cert: CertCell,
}

impl EngineSessionCache for CacheAdapter {
    fn store(&self, key: &[u8], data: &[u8], engine_cert: Option<&[u8]>) {
        let mut cell = self.our_cert.lock().unwrap();
        match engine_cert {
            Some(der) => *cell = Some(RawCredentials::X509(der.to_vec())),
            None => {
                if cell.is_none() {
                    *cell = Some(RawCredentials::Anonymous);
                }
            }
        }
        let our_cert = match cell.as_ref() {
            Some(RawCredentials::X509(der)) => Some(der.clone()),
            _ => None,
        };
        drop(cell);
        let envelope = SerializedSession {
            native_blob: data.to_vec(),
            our_cert,
        };
        trace!(key_len = key.len(), "session cache store");
        self.user.store(key, &envelope.encode());
    }

    fn remove(&self, key: &[u8]) {
        trace!(key_len = key.len(), "session cache remove");
        self.user.remove(key);
    }

    fn retrieve(&self, key: &[u8]) -> Option<Vec<u8>> {
        let blob = self.user.retrieve(key)?;
        match SerializedSession::decode(&blob) {
            Ok(session) => {
                trace!(key_len = key.len(), "session cache hit");
                *self.our_cert.lock().unwrap() = Some(match session.our_cert {
                    Some(der) => RawCredentials::X509(der),
                    None => RawCredentials::Anonymous,
                });
                Some(session.native_blob)
            }
            // a corrupt entry is a miss, not an error
            Err(_) => None,
        }
    }
}
