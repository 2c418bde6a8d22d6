//! Link error types.
//!
//! [`LinkError`] is the single error type returned by every fallible
//! operation in this crate. Connection failures are split into
//! *retryable* (transient network trouble) and *fatal* (bad credentials,
//! bad filter, closed link); see [`LinkError::is_retryable`].

use aprsbot_models::ModelError;

/// Error type for all link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Invalid configuration (bad filter coordinates, bad callsign).
    #[error("configuration error: {0}")]
    Config(String),

    /// A required credential was not supplied.
    #[error("missing credentials: {0} is not set")]
    MissingCredentials(String),

    /// The server resolved but no address accepted the connection, or the
    /// name did not resolve.
    #[error("could not reach {server}: {reason}")]
    Unreachable {
        /// `host:port` that was dialled.
        server: String,
        /// Underlying cause.
        reason: String,
    },

    /// The server did not answer in time.
    #[error("timed out while {0}")]
    Timeout(String),

    /// The server refused the login (passcode not verified).
    #[error("login rejected by server: {0}")]
    LoginRejected(String),

    /// The link was closed; nothing more can be sent.
    #[error("link is closed")]
    Closed,

    /// Socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Model validation failure.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl LinkError {
    /// `true` when retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::Timeout(_) | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_are_retryable() {
        assert!(LinkError::Timeout("logging in".into()).is_retryable());
        assert!(
            LinkError::Unreachable {
                server: "rotate.aprs2.net:14580".into(),
                reason: "connection refused".into(),
            }
            .is_retryable()
        );
        assert!(LinkError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset)).is_retryable());
    }

    #[test]
    fn credential_and_config_failures_are_fatal() {
        assert!(!LinkError::LoginRejected("unverified".into()).is_retryable());
        assert!(!LinkError::MissingCredentials("APRS_PASSWORD".into()).is_retryable());
        assert!(!LinkError::Config("latitude out of range".into()).is_retryable());
        assert!(!LinkError::Closed.is_retryable());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            LinkError::MissingCredentials("APRS_CALLSIGN".into()).to_string(),
            "missing credentials: APRS_CALLSIGN is not set"
        );
        assert_eq!(
            LinkError::Timeout("logging in".into()).to_string(),
            "timed out while logging in"
        );
    }
}
