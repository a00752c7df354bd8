//! In-process test doubles: a scripted engine speaking a tiny framed
//! protocol, and paired memory transports, so both sides of a connection
//! can be driven step by step inside one test.
//!
//! Frame tags: `C`/`c` hello (plain / with resumption id), `S` hello
//! answer followed by the session id, `D` a length-prefixed data record,
//! `F` close-notify, `R` a rehandshake request, `N` the no_renegotiation
//! warning alert, `w` any other warning alert.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::credentials::KeyMaterial;
use crate::engine::{Alert, Engine, EngineError, EngineSession, EngineSessionCache};
use crate::transport::Transport;
use nettls_types::{AddressedServer, CloseMethod, Der, Direction, EngineCode, Role};

const CODE_PREMATURE: EngineCode = EngineCode(-110);
const CODE_BAD_FRAME: EngineCode = EngineCode(-100);
const CODE_BAD_BLOB: EngineCode = EngineCode(-120);
const CODE_WARNING_ALERT: EngineCode = EngineCode(-16);
const CODE_NOT_AVAILABLE: EngineCode = EngineCode(-56);
const CODE_BAD_PRIORITY: EngineCode = EngineCode(-50);
const CODE_BAD_IDENTITY: EngineCode = EngineCode(-901);

/// A scripted engine. Per-session behavior (peer chain, verification
/// flags, matching names, SNI list) is configured up front.
pub struct MockEngine {
    system_trust: bool,
    priority_rejection: Option<String>,
    identity_rejection: Option<String>,
    peer_certs: Vec<Der>,
    verify_status: u32,
    names: Vec<String>,
    sni: Vec<String>,
    next_id: AtomicU32,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            system_trust: false,
            priority_rejection: None,
            identity_rejection: None,
            peer_certs: Vec::new(),
            verify_status: 0,
            names: Vec::new(),
            sni: Vec::new(),
            next_id: AtomicU32::new(1),
        }
    }

    pub fn with_system_trust(mut self, supported: bool) -> Self {
        self.system_trust = supported;
        self
    }

    pub fn with_priority_rejection(mut self, message: &str) -> Self {
        self.priority_rejection = Some(message.to_string());
        self
    }

    pub fn with_identity_rejection(mut self, message: &str) -> Self {
        self.identity_rejection = Some(message.to_string());
        self
    }

    /// The chain sessions report as the peer's.
    pub fn with_peer_certs(mut self, certs: Vec<Der>) -> Self {
        self.peer_certs = certs;
        self
    }

    /// Flags the chain validation returns; non-zero means invalid.
    pub fn with_verify_status(mut self, status: u32) -> Self {
        self.verify_status = status;
        self
    }

    /// Names the peer certificate matches.
    pub fn with_matching_names(mut self, names: &[&str]) -> Self {
        self.names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// The SNI entries sessions report.
    pub fn with_sni(mut self, names: &[&str]) -> Self {
        self.sni = names.iter().map(|n| n.to_string()).collect();
        self
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for MockEngine {
    fn name(&self) -> &str {
        "mock-engine"
    }

    fn check_priority(&self, _priority: &str) -> Result<(), EngineError> {
        if self.priority_rejection.is_some() {
            return Err(EngineError::Fatal(CODE_BAD_PRIORITY));
        }
        Ok(())
    }

    fn generate_dh_params(&self, bits: u32) -> Result<Der, EngineError> {
        Ok(vec![0x30, (bits >> 8) as u8, bits as u8])
    }

    fn supports_system_trust(&self) -> bool {
        self.system_trust
    }

    fn validate_identity(&self, _chain: &[Der], _key: &KeyMaterial) -> Result<(), EngineError> {
        if self.identity_rejection.is_some() {
            return Err(EngineError::Fatal(CODE_BAD_IDENTITY));
        }
        Ok(())
    }

    fn create_session(
        &self,
        role: Role,
        config: &Arc<Config>,
    ) -> Result<Box<dyn EngineSession>, EngineError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MockSession {
            role,
            config: Arc::clone(config),
            session_id: format!("sess-{id}").into_bytes(),
            in_handshake: false,
            step: 0,
            established: false,
            resumed: false,
            resume_id: None,
            pending_hello: false,
            pending_resume: None,
            plain: Vec::new(),
            cache: None,
            peer_certs: self.peer_certs.clone(),
            verify_status: self.verify_status,
            names: self.names.clone(),
            sni: self.sni.clone(),
        }))
    }

    fn describe_code(&self, code: EngineCode) -> String {
        match code {
            CODE_BAD_PRIORITY => self
                .priority_rejection
                .clone()
                .unwrap_or_else(|| "priority rejected".into()),
            CODE_BAD_IDENTITY => self
                .identity_rejection
                .clone()
                .unwrap_or_else(|| "identity rejected".into()),
            EngineCode(n) => format!("mock engine error {n}"),
        }
    }
}

/// A scripted session speaking the framed test protocol.
pub struct MockSession {
    role: Role,
    config: Arc<Config>,
    session_id: Vec<u8>,
    in_handshake: bool,
    step: u8,
    established: bool,
    resumed: bool,
    resume_id: Option<Vec<u8>>,
    pending_hello: bool,
    pending_resume: Option<Vec<u8>>,
    plain: Vec<u8>,
    cache: Option<Box<dyn EngineSessionCache>>,
    peer_certs: Vec<Der>,
    verify_status: u32,
    names: Vec<String>,
    sni: Vec<String>,
}

impl MockSession {
    fn local_cert(&self) -> Option<Der> {
        let creds = self.config.credentials()?;
        let x509 = creds.as_x509()?;
        let identity = x509.identities().first()?;
        identity.chain.first().cloned()
    }

    fn native_blob(&self) -> Vec<u8> {
        let mut blob = b"native:".to_vec();
        blob.extend_from_slice(&self.session_id);
        blob
    }

    fn read_byte(io: &mut dyn Transport) -> Result<u8, EngineError> {
        let mut byte = [0u8; 1];
        match io.recv(&mut byte) {
            Ok(0) => Err(EngineError::Fatal(CODE_PREMATURE)),
            Ok(_) => Ok(byte[0]),
            Err(e) => Err(EngineError::from_io(Direction::Read, &e)),
        }
    }

    fn read_id_frame(io: &mut dyn Transport) -> Result<Vec<u8>, EngineError> {
        let len = Self::read_byte(io)? as usize;
        let mut id = Vec::with_capacity(len);
        for _ in 0..len {
            id.push(Self::read_byte(io)?);
        }
        Ok(id)
    }

    fn write_all(io: &mut dyn Transport, bytes: &[u8]) -> Result<(), EngineError> {
        let mut off = 0;
        while off < bytes.len() {
            match io.send(&bytes[off..]) {
                Ok(0) => return Err(EngineError::Fatal(CODE_PREMATURE)),
                Ok(n) => off += n,
                Err(e) => return Err(EngineError::from_io(Direction::Write, &e)),
            }
        }
        Ok(())
    }

    fn client_handshake(&mut self, io: &mut dyn Transport) -> Result<(), EngineError> {
        if self.step == 0 {
            let mut frame = Vec::new();
            match &self.resume_id {
                Some(id) => {
                    frame.push(b'c');
                    frame.push(id.len() as u8);
                    frame.extend_from_slice(id);
                }
                None => frame.push(b'C'),
            }
            Self::write_all(io, &frame)?;
            self.step = 1;
        }
        if self.step == 1 {
            let tag = Self::read_byte(io)?;
            if tag != b'S' {
                return Err(EngineError::Fatal(CODE_BAD_FRAME));
            }
            self.step = 2;
        }
        // step 2: the server's session id
        let id = Self::read_id_frame(io)?;
        self.resumed = self.resume_id.as_deref() == Some(id.as_slice());
        self.resume_id = None;
        self.session_id = id;
        Ok(())
    }

    fn server_handshake(&mut self, io: &mut dyn Transport) -> Result<(), EngineError> {
        if self.step == 0 {
            if self.pending_hello {
                self.pending_hello = false;
            } else {
                match Self::read_byte(io)? {
                    b'C' => {}
                    b'c' => self.pending_resume = Some(Self::read_id_frame(io)?),
                    _ => return Err(EngineError::Fatal(CODE_BAD_FRAME)),
                }
            }
            if let Some(id) = self.pending_resume.take() {
                if let Some(cache) = &self.cache {
                    if cache.retrieve(&id).is_some() {
                        self.resumed = true;
                        self.session_id = id;
                    }
                }
            }
            self.step = 1;
        }
        // step 1: answer with our session id
        let mut frame = vec![b'S', self.session_id.len() as u8];
        frame.extend_from_slice(&self.session_id);
        Self::write_all(io, &frame)?;
        if !self.resumed {
            if let Some(cache) = &self.cache {
                cache.store(
                    &self.session_id,
                    &self.native_blob(),
                    self.local_cert().as_deref(),
                );
            }
        }
        Ok(())
    }
}

impl EngineSession for MockSession {
    fn handshake(&mut self, io: &mut dyn Transport) -> Result<(), EngineError> {
        if !self.in_handshake {
            self.in_handshake = true;
            self.step = 0;
            if self.established {
                // renegotiation runs a full exchange
                self.resumed = false;
            }
        }
        let result = match self.role {
            Role::Client => self.client_handshake(io),
            Role::Server => self.server_handshake(io),
        };
        match result {
            Ok(()) => {
                self.in_handshake = false;
                self.step = 0;
                self.established = true;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn recv(&mut self, io: &mut dyn Transport, buf: &mut [u8]) -> Result<usize, EngineError> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.plain.is_empty() {
            match Self::read_byte(io) {
                Ok(b'D') => {
                    let hi = Self::read_byte(io)? as usize;
                    let lo = Self::read_byte(io)? as usize;
                    let len = (hi << 8) | lo;
                    for _ in 0..len {
                        self.plain.push(Self::read_byte(io)?);
                    }
                }
                Ok(b'F') => return Ok(0),
                Ok(b'R') => return Err(EngineError::Rehandshake),
                Ok(b'C') => {
                    self.pending_hello = true;
                    return Err(EngineError::Rehandshake);
                }
                Ok(b'c') => {
                    self.pending_resume = Some(Self::read_id_frame(io)?);
                    self.pending_hello = true;
                    return Err(EngineError::Rehandshake);
                }
                Ok(b'N') => {
                    return Err(EngineError::WarningAlertReceived {
                        code: CODE_WARNING_ALERT,
                        alert: Alert::NoRenegotiation,
                    })
                }
                Ok(b'w') => {
                    return Err(EngineError::WarningAlertReceived {
                        code: CODE_WARNING_ALERT,
                        alert: Alert::UserCanceled,
                    })
                }
                Ok(_) => return Err(EngineError::Fatal(CODE_BAD_FRAME)),
                Err(e) => return Err(e),
            }
        }
        let n = buf.len().min(self.plain.len());
        buf[..n].copy_from_slice(&self.plain[..n]);
        self.plain.drain(..n);
        Ok(n)
    }

    fn send(&mut self, io: &mut dyn Transport, buf: &[u8]) -> Result<usize, EngineError> {
        let n = buf.len().min(0xFFFF);
        let mut frame = vec![b'D', (n >> 8) as u8, (n & 0xFF) as u8];
        frame.extend_from_slice(&buf[..n]);
        Self::write_all(io, &frame)?;
        Ok(n)
    }

    fn close_notify(
        &mut self,
        io: &mut dyn Transport,
        _how: CloseMethod,
    ) -> Result<(), EngineError> {
        Self::write_all(io, &[b'F'])
    }

    fn request_rehandshake(&mut self, io: &mut dyn Transport) -> Result<(), EngineError> {
        Self::write_all(io, &[b'R'])
    }

    fn send_warning_alert(
        &mut self,
        io: &mut dyn Transport,
        alert: Alert,
    ) -> Result<(), EngineError> {
        let tag = if alert == Alert::NoRenegotiation {
            b'N'
        } else {
            b'w'
        };
        Self::write_all(io, &[tag])
    }

    fn replace_config(&mut self, config: &Arc<Config>) -> Result<(), EngineError> {
        self.config = Arc::clone(config);
        Ok(())
    }

    fn pending_plaintext(&self) -> usize {
        self.plain.len()
    }

    fn session_id(&self) -> Result<Vec<u8>, EngineError> {
        Ok(self.session_id.clone())
    }

    fn session_data(&self) -> Result<Vec<u8>, EngineError> {
        Ok(self.native_blob())
    }

    fn set_session_data(&mut self, blob: &[u8]) -> Result<(), EngineError> {
        match blob.strip_prefix(b"native:".as_slice()) {
            Some(id) => {
                self.resume_id = Some(id.to_vec());
                Ok(())
            }
            None => Err(EngineError::Fatal(CODE_BAD_BLOB)),
        }
    }

    fn set_cache(&mut self, cache: Box<dyn EngineSessionCache>) {
        self.cache = Some(cache);
    }

    fn cipher_suite_type(&self) -> String {
        "X509".into()
    }

    fn cipher_algo(&self) -> String {
        "AES-256-GCM".into()
    }

    fn kx_algo(&self) -> String {
        "ECDHE-RSA".into()
    }

    fn mac_algo(&self) -> String {
        "AEAD".into()
    }

    fn compression_algo(&self) -> String {
        "NULL".into()
    }

    fn cert_type(&self) -> String {
        "X.509".into()
    }

    fn protocol(&self) -> String {
        "TLS1.3".into()
    }

    fn addressed_server(&self, index: usize) -> Result<AddressedServer, EngineError> {
        match self.sni.get(index) {
            Some(name) => Ok(AddressedServer::Domain(name.clone())),
            None => Err(EngineError::RequestedDataNotAvailable(CODE_NOT_AVAILABLE)),
        }
    }

    fn our_certificate(&self) -> Option<Der> {
        if !self.established || self.resumed {
            return None;
        }
        self.local_cert()
    }

    fn peer_certificates(&self) -> Vec<Der> {
        if self.established {
            self.peer_certs.clone()
        } else {
            Vec::new()
        }
    }

    fn verify_peer(&self) -> Result<u32, EngineError> {
        Ok(self.verify_status)
    }

    fn peer_matches_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// One end of an in-memory duplex pipe. Reading from an empty pipe
/// reports would-block, never EOF.
pub struct PipeTransport {
    rx: Arc<Mutex<VecDeque<u8>>>,
    tx: Arc<Mutex<VecDeque<u8>>>,
}

/// Two crossed pipe ends.
pub fn pipe_pair() -> (PipeTransport, PipeTransport) {
    let a = Arc::new(Mutex::new(VecDeque::new()));
    let b = Arc::new(Mutex::new(VecDeque::new()));
    (
        PipeTransport {
            rx: Arc::clone(&a),
            tx: Arc::clone(&b),
        },
        PipeTransport { rx: b, tx: a },
    )
}

impl Transport for PipeTransport {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut rx = self.rx.lock().unwrap();
        if rx.is_empty() {
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }
        let mut n = 0;
        while n < buf.len() {
            match rx.pop_front() {
                Some(byte) => {
                    buf[n] = byte;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx.lock().unwrap().extend(buf.iter().copied());
        Ok(buf.len())
    }
}

/// Wrapper that rejects the first `recv_blocks` reads and `send_blocks`
/// writes with would-block before delegating.
pub struct FlakyTransport<T> {
    inner: T,
    recv_blocks: usize,
    send_blocks: usize,
}

impl<T: Transport> FlakyTransport<T> {
    pub fn new(inner: T, recv_blocks: usize, send_blocks: usize) -> Self {
        Self {
            inner,
            recv_blocks,
            send_blocks,
        }
    }
}

impl<T: Transport> Transport for FlakyTransport<T> {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.recv_blocks > 0 {
            self.recv_blocks -= 1;
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }
        self.inner.recv(buf)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.send_blocks > 0 {
            self.send_blocks -= 1;
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }
        self.inner.send(buf)
    }
}

/// A transport that is already at end-of-file.
pub struct EofTransport;

impl Transport for EofTransport {
    fn recv(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Ok(0)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }
}
