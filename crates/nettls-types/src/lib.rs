#![forbid(unsafe_code)]
#![doc = "Common types, endpoint states, and the error taxonomy for the nettls provider."]

pub mod error;

pub use error::*;

/// DER-encoded bytes (a certificate, CRL, key, or DH parameter blob).
pub type Der = Vec<u8>;

/// The role of a TLS endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Peer-authentication policy recorded in a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerAuth {
    /// The peer is never asked for a certificate.
    None,
    /// A certificate is requested but its absence is tolerated.
    Optional,
    /// A certificate must be presented and must validate.
    Required,
}

/// Endpoint state.
///
/// `DataRw` is the ordinary full-duplex state after a handshake. `DataR` and
/// `DataW` are the half-closed states, `DataRs` is read-only while a switch
/// request is in flight, and `Switching` / `Accepting` / `Refusing` are the
/// in-progress states of the renegotiation operations, kept across
/// suspensions so the same call can be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Start,
    Handshake,
    DataRw,
    DataR,
    DataW,
    DataRs,
    Switching,
    Accepting,
    Refusing,
    End,
}

/// Which directions a `bye` closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMethod {
    /// Nothing to do: a peer cannot be driven to stop sending.
    Receive,
    /// Send close-notify, keep reading.
    Send,
    /// Close both directions.
    All,
}

/// The transport direction an engine was blocked on when it suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// Raw credentials an endpoint presented or received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawCredentials {
    /// A DER-encoded X.509 certificate.
    X509(Der),
    /// No certificate (anonymous suite, or none presented).
    Anonymous,
}

/// One name a client addressed via SNI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressedServer {
    Domain(String),
}
