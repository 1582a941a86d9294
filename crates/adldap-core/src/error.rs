//! Error types for directory connection operations.
//!
//! Every stage of the connection lifecycle (probe, open, bind, root entry read, suffix
//! derivation) reports through a single [`Error`] enum so callers can match on the stage
//! that failed.

use thiserror::Error;

/// Main error type for directory connection operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No server in the pool answered the reachability probe
    #[error("No available domain controllers: {0}")]
    TransportUnreachable(String),

    /// Session construction failed against a reachable server
    #[error("Connection to {server} failed: {message}")]
    ConnectError {
        /// Server the session was opened against
        server: String,
        /// Last transport-reported diagnostic
        message: String,
    },

    /// The server rejected the bind
    #[error("Bind failed: {message}. Diagnostic: {diagnostic}")]
    BindError {
        /// Generic last-error text for the session
        message: String,
        /// Server-supplied diagnostic message (may be empty)
        diagnostic: String,
    },

    /// An operation that requires an authenticated session ran on an unbound one
    #[error("LDAP bind not established")]
    NotBound,

    /// The base DN yields no domain components
    #[error("Could not determine account suffix from base DN `{0}`")]
    SuffixDerivation(String),

    /// Configuration key or value rejected
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// Reading the directory root entry failed
    #[error("RootDSE read failed: {0}")]
    ReadError(String),

    /// Unbinding or releasing a session failed
    #[error("LDAP unbind failed: {0}")]
    UnbindError(String),

    /// Operation timed out
    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Specialized result type for directory connection operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::TransportUnreachable(_) => "TRANSPORT_UNREACHABLE",
            Self::ConnectError { .. } => "CONNECT_ERROR",
            Self::BindError { .. } => "BIND_ERROR",
            Self::NotBound => "NOT_BOUND",
            Self::SuffixDerivation(_) => "SUFFIX_DERIVATION_ERROR",
            Self::InvalidOption(_) => "INVALID_OPTION",
            Self::ReadError(_) => "READ_ERROR",
            Self::UnbindError(_) => "UNBIND_ERROR",
            Self::Timeout(_) => "TIMEOUT",
        }
    }

    /// Returns true if this error should be logged as a serious error.
    ///
    /// Caller mistakes (`NotBound`, `InvalidOption`) are not.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::TransportUnreachable(_)
                | Self::ConnectError { .. }
                | Self::ReadError(_)
                | Self::Timeout(_)
        )
    }
}

// Conversions from external error types
impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::InvalidOption(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidOption(err.to_string())
    }
}
