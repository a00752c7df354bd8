//! Session resumption support: the serialized-session envelope and the
//! cache interface.
//!
//! The engine's own session blob does not carry the certificate this side
//! presented, so the envelope stores both. The layout is self-describing
//! and versioned; it must round-trip across releases.

use std::collections::HashMap;
use std::sync::Mutex;

use nettls_types::{Der, TlsError};

const MAGIC: &[u8; 4] = b"NTLS";
const VERSION: u8 = 1;
const FLAG_OUR_CERT: u8 = 0b0000_0001;

/// A session as persisted by the cache adapter.
///
/// `our_cert` is absent when the handshake ran an anonymous suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedSession {
    /// The engine's opaque resumption blob.
    pub native_blob: Vec<u8>,
    /// The DER certificate this endpoint presented.
    pub our_cert: Option<Der>,
}

impl SerializedSession {
    /// Encode as `magic | version | flags | len(native) | native
    /// [| len(cert) | cert]`, lengths big-endian u32.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            10 + self.native_blob.len() + self.our_cert.as_ref().map_or(0, |c| 4 + c.len()),
        );
        out.extend_from_slice(MAGIC);
        out.push(VERSION);
        out.push(if self.our_cert.is_some() {
            FLAG_OUR_CERT
        } else {
            0
        });
        out.extend_from_slice(&(self.native_blob.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.native_blob);
        if let Some(cert) = &self.our_cert {
            out.extend_from_slice(&(cert.len() as u32).to_be_bytes());
            out.extend_from_slice(cert);
        }
        out
    }

    pub fn decode(blob: &[u8]) -> Result<Self, TlsError> {
        let mut rd = Reader(blob);
        let magic = rd.take(4)?;
        if magic != MAGIC {
            return Err(TlsError::ParseError(
                "serialized session: bad magic".into(),
            ));
        }
        let version = rd.take(1)?[0];
        if version != VERSION {
            return Err(TlsError::ParseError(format!(
                "serialized session: unsupported version {version}"
            )));
        }
        let flags = rd.take(1)?[0];
        let native_blob = rd.take_vec()?;
        let our_cert = if flags & FLAG_OUR_CERT != 0 {
            Some(rd.take_vec()?)
        } else {
            None
        };
        if !rd.0.is_empty() {
            return Err(TlsError::ParseError(
                "serialized session: trailing bytes".into(),
            ));
        }
        Ok(Self {
            native_blob,
            our_cert,
        })
    }
}

struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], TlsError> {
        if self.0.len() < n {
            return Err(TlsError::ParseError("serialized session: truncated".into()));
        }
        let (head, tail) = self.0.split_at(n);
        self.0 = tail;
        Ok(head)
    }

    fn take_vec(&mut self) -> Result<Vec<u8>, TlsError> {
        let len_bytes = self.take(4)?;
        let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]);
        Ok(self.take(len as usize)?.to_vec())
    }
}

/// Where serialized sessions live between connections.
///
/// `retrieve` returns `None` for an unknown key; lookup failure is not an
/// error at this level.
pub trait SessionCache: Send + Sync {
    fn store(&self, key: &[u8], data: &[u8]);
    fn remove(&self, key: &[u8]);
    fn retrieve(&self, key: &[u8]) -> Option<Vec<u8>>;
}

/// The stock cache: a mutex-wrapped map.
#[derive(Debug, Default)]
pub struct InMemorySessionCache {
    entries: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl InMemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionCache for InMemorySessionCache {
    fn store(&self, key: &[u8], data: &[u8]) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_vec(), data.to_vec());
    }

    fn remove(&self, key: &[u8]) {
        self.entries.lock().unwrap().remove(key);
    }

    fn retrieve(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

/// A cache assembled from a store/remove/retrieve callback triple.
pub struct FnSessionCache<S, R, G> {
    store: S,
    remove: R,
    retrieve: G,
}

impl<S, R, G> FnSessionCache<S, R, G>
where
    S: Fn(&[u8], &[u8]) + Send + Sync,
    R: Fn(&[u8]) + Send + Sync,
    G: Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync,
{
    pub fn new(store: S, remove: R, retrieve: G) -> Self {
        Self {
            store,
            remove,
            retrieve,
        }
    }
}

impl<S, R, G> SessionCache for FnSessionCache<S, R, G>
where
    S: Fn(&[u8], &[u8]) + Send + Sync,
    R: Fn(&[u8]) + Send + Sync,
    G: Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync,
{
    fn store(&self, key: &[u8], data: &[u8]) {
        (self.store)(key, data)
    }

    fn remove(&self, key: &[u8]) {
        (self.remove)(key)
    }

    fn retrieve(&self, key: &[u8]) -> Option<Vec<u8>> {
        (self.retrieve)(key)
    }
}
