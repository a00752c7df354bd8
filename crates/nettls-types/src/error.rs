use std::fmt;

use crate::{Direction, State};

/// A status code of the native TLS engine.
///
/// The numeric space belongs to the engine; this layer only transports the
/// value and asks the engine for a description when a message is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineCode(pub i32);

impl fmt::Display for EngineCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine code {}", self.0)
    }
}

/// Stable identity of an error condition.
///
/// Conditions detected by this layer carry one of the `NETTLS_*` sentinel
/// strings; everything else is an engine code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Sentinel(&'static str),
    Engine(EngineCode),
}

/// Sentinel identity: the peer's certificate chain failed validation.
pub const CERT_VERIFICATION_FAILED: &str = "NETTLS_CERT_VERIFICATION_FAILED";
/// Sentinel identity: the peer's certificate does not match the expected name.
pub const NAME_VERIFICATION_FAILED: &str = "NETTLS_NAME_VERIFICATION_FAILED";
/// Sentinel identity: the user verify hook rejected the peer.
pub const USER_VERIFICATION_FAILED: &str = "NETTLS_USER_VERIFICATION_FAILED";
/// Sentinel identity: an operation was invoked in a state that forbids it.
pub const UNEXPECTED_STATE: &str = "NETTLS_UNEXPECTED_STATE";
/// Sentinel identity: authentication was required but no certificate came.
pub const NO_CERTIFICATE_FOUND: &str = "NETTLS_NO_CERTIFICATE_FOUND";

/// Human text for a sentinel code, or `None` for engine codes.
pub fn sentinel_message(code: &str) -> Option<&'static str> {
    match code {
        CERT_VERIFICATION_FAILED => Some("certificate verification failed"),
        NAME_VERIFICATION_FAILED => Some("peer name does not match the certificate"),
        USER_VERIFICATION_FAILED => Some("user verification hook rejected the peer"),
        UNEXPECTED_STATE => Some("operation not permitted in the current endpoint state"),
        NO_CERTIFICATE_FOUND => Some("peer did not present a certificate"),
        _ => None,
    }
}

/// The error taxonomy of the provider layer.
///
/// Suspensions and `Interrupted` are recoverable by retrying the same call.
/// The switch signals are not errors at all; they carry renegotiation
/// control flow through the error channel. Everything else is fatal for the
/// session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TlsError {
    // Suspension signals
    #[error("operation would block; retry once the transport is readable")]
    WantRead,
    #[error("operation would block; retry once the transport is writable")]
    WantWrite,
    #[error("operation interrupted before any progress; retry")]
    Interrupted,

    // Switch signals
    #[error("peer requests a configuration switch")]
    SwitchRequest,
    #[error("configuration switch answered (accepted: {0})")]
    SwitchResponse(bool),

    // Non-fatal engine conditions
    #[error("non-fatal engine condition ({0})")]
    Warning(EngineCode),

    // Programmer error
    #[error("operation `{op}` not permitted in state {state:?}")]
    UnexpectedState { op: &'static str, state: State },

    // Verification failures
    #[error("certificate verification failed")]
    CertVerificationFailed,
    #[error("peer name does not match the certificate")]
    NameVerificationFailed,
    #[error("user verification hook rejected the peer")]
    UserVerificationFailed,
    #[error("peer did not present a certificate")]
    NoCertificate,

    // Credential and configuration construction
    #[error("encrypted private key needs a password")]
    PasswordRequired,
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("no PEM block of an accepted kind found")]
    EmptyPem,
    #[error("invalid configuration: {0}")]
    ConfigError(String),
    #[error("credential rejected: {0}")]
    CredentialError(String),

    // Everything else from the engine
    #[error("fatal engine error ({0})")]
    Fatal(EngineCode),
}

impl TlsError {
    /// The stable code identity, if this condition has one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            TlsError::CertVerificationFailed => Some(ErrorCode::Sentinel(CERT_VERIFICATION_FAILED)),
            TlsError::NameVerificationFailed => Some(ErrorCode::Sentinel(NAME_VERIFICATION_FAILED)),
            TlsError::UserVerificationFailed => Some(ErrorCode::Sentinel(USER_VERIFICATION_FAILED)),
            TlsError::UnexpectedState { .. } => Some(ErrorCode::Sentinel(UNEXPECTED_STATE)),
            TlsError::NoCertificate => Some(ErrorCode::Sentinel(NO_CERTIFICATE_FOUND)),
            TlsError::Warning(code) | TlsError::Fatal(code) => Some(ErrorCode::Engine(*code)),
            _ => None,
        }
    }

    /// True for `WantRead` / `WantWrite`.
    pub fn is_suspension(&self) -> bool {
        matches!(self, TlsError::WantRead | TlsError::WantWrite)
    }

    /// True for the renegotiation control-flow signals.
    pub fn is_switch_signal(&self) -> bool {
        matches!(self, TlsError::SwitchRequest | TlsError::SwitchResponse(_))
    }

    /// True when retrying the same call is the correct reaction.
    pub fn is_retryable(&self) -> bool {
        self.is_suspension() || matches!(self, TlsError::Interrupted)
    }

    /// The suspension signal for a blocked direction.
    pub fn want(direction: Direction) -> Self {
        match direction {
            Direction::Read => TlsError::WantRead,
            Direction::Write => TlsError::WantWrite,
        }
    }
}
