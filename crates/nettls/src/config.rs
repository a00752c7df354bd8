//! Endpoint configuration: priority string, DH parameters, peer
//! authentication policy, credentials, and the user verify hook.
//!
//! A configuration is immutable once built and may back any number of
//! endpoints. An endpoint replaces its configuration only through the
//! switch operations.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::credentials::Credentials;
use crate::endpoint::Endpoint;
use crate::engine::{Engine, EngineError};
use crate::pem;
use nettls_types::{Der, PeerAuth, TlsError};

/// Called after chain and name validation; returning `false` fails the
/// verification with `UserVerificationFailed`.
pub type VerifyHook = Arc<dyn Fn(&Endpoint) -> bool + Send + Sync>;

/// Where Diffie-Hellman parameters come from.
#[derive(Debug, Clone)]
pub enum DhSource {
    /// An armored file carrying a `DH PARAMETERS` block.
    PemFile(PathBuf),
    /// A ready DER blob.
    Der(Der),
    /// Generate fresh parameters of this bit length.
    Generate(u32),
}

/// An immutable endpoint configuration.
pub struct Config {
    priority: String,
    dh_params: Option<Der>,
    peer_auth: PeerAuth,
    credentials: Option<Arc<Credentials>>,
    verify_hook: Option<VerifyHook>,
    peer_name_unchecked: bool,
}

impl Config {
    pub fn builder(priority: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder {
            priority: priority.into(),
            dh: None,
            peer_auth: PeerAuth::None,
            credentials: None,
            verify_hook: None,
            peer_name_unchecked: false,
        }
    }

    /// The engine priority/algorithms string.
    pub fn priority(&self) -> &str {
        &self.priority
    }

    pub fn dh_params(&self) -> Option<&Der> {
        self.dh_params.as_ref()
    }

    pub fn peer_auth(&self) -> PeerAuth {
        self.peer_auth
    }

    pub fn credentials(&self) -> Option<&Arc<Credentials>> {
        self.credentials.as_ref()
    }

    pub fn verify_hook(&self) -> Option<&VerifyHook> {
        self.verify_hook.as_ref()
    }

    /// When set, the expected peer name is not matched against the
    /// certificate.
    pub fn peer_name_unchecked(&self) -> bool {
        self.peer_name_unchecked
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("priority", &self.priority)
            .field("dh_params", &self.dh_params.as_ref().map(|d| d.len()))
            .field("peer_auth", &self.peer_auth)
            .field("credentials", &self.credentials.is_some())
            .field("verify_hook", &self.verify_hook.as_ref().map(|_| "<hook>"))
            .field("peer_name_unchecked", &self.peer_name_unchecked)
            .finish()
    }
}

/// Builder for [`Config`].
pub struct ConfigBuilder {
    priority: String,
    dh: Option<DhSource>,
    peer_auth: PeerAuth,
    credentials: Option<Arc<Credentials>>,
    verify_hook: Option<VerifyHook>,
    peer_name_unchecked: bool,
}

impl ConfigBuilder {
    pub fn dh_params(mut self, source: DhSource) -> Self {
        self.dh = Some(source);
        self
    }

    pub fn peer_auth(mut self, policy: PeerAuth) -> Self {
        self.peer_auth = policy;
        self
    }

    pub fn credentials(mut self, credentials: Arc<Credentials>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn verify(mut self, hook: VerifyHook) -> Self {
        self.verify_hook = Some(hook);
        self
    }

    pub fn peer_name_unchecked(mut self, unchecked: bool) -> Self {
        self.peer_name_unchecked = unchecked;
        self
    }

    /// Validate the priority string and materialize DH parameters.
    pub fn build(self, engine: &dyn Engine) -> Result<Config, TlsError> {
        engine
            .check_priority(&self.priority)
            .map_err(|e| config_error(engine, e))?;

        let dh_params = match self.dh {
            None => None,
            Some(DhSource::Der(der)) => Some(der),
            Some(DhSource::PemFile(path)) => {
                let mut blocks = pem::decode_file(&path, pem::DH_TAGS, false)?;
                Some(blocks.remove(0).der)
            }
            Some(DhSource::Generate(bits)) => Some(
                engine
                    .generate_dh_params(bits)
                    .map_err(|e| config_error(engine, e))?,
            ),
        };

        Ok(Config {
            priority: self.priority,
            dh_params,
            peer_auth: self.peer_auth,
            credentials: self.credentials,
            verify_hook: self.verify_hook,
            peer_name_unchecked: self.peer_name_unchecked,
        })
    }
}

fn config_error(engine: &dyn Engine, err: EngineError) -> TlsError {
    let detail = match err {
        EngineError::Fatal(code) | EngineError::NonFatal(code) => engine.describe_code(code),
        other => format!("{other:?}"),
    };
    TlsError::ConfigError(detail)
}
