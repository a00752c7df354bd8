//! Translation of engine outcomes into the provider taxonomy.
//!
//! Every engine call made by the endpoint funnels its error through
//! [`translate`], exactly once, at the moment the engine returns. The
//! direction hint inside `Again` is only valid at that moment.

use crate::engine::{Alert, EngineError};
use nettls_types::{State, TlsError};

/// `state` is the endpoint state at the time of the call; `warnings`
/// selects whether non-fatal engine conditions surface as retryable
/// warnings or harden into fatal errors.
pub(crate) fn translate(err: EngineError, state: State, warnings: bool) -> TlsError {
    match err {
        EngineError::Again(direction) => TlsError::want(direction),
        EngineError::Interrupted => TlsError::Interrupted,
        EngineError::Rehandshake => {
            // On the switching side a rehandshake signal is the peer's
            // answer; anywhere else it is the peer's question.
            if matches!(state, State::Switching | State::DataRs) {
                TlsError::SwitchResponse(true)
            } else {
                TlsError::SwitchRequest
            }
        }
        EngineError::WarningAlertReceived {
            alert: Alert::NoRenegotiation,
            ..
        } => TlsError::SwitchResponse(false),
        EngineError::WarningAlertReceived { code, .. }
        | EngineError::NonFatal(code)
        | EngineError::RequestedDataNotAvailable(code) => {
            if warnings {
                TlsError::Warning(code)
            } else {
                TlsError::Fatal(code)
            }
        }
        EngineError::Fatal(code) => TlsError::Fatal(code),
    }
}
