use thiserror::Error;

use farview_shared::{DeviceId, DeviceIdError};

#[derive(Error, Debug)]
pub enum NetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Device id error: {0}")]
    DeviceId(#[from] DeviceIdError),

    #[error("Protocol error: {0}")]
    Proto(#[from] farview_proto::ProtoError),

    #[error("Invalid connection target: {0}")]
    InvalidTarget(String),

    #[error("Certificate file contains no certificate")]
    NoCertificate,

    #[error("Key file contains no private key")]
    NoPrivateKey,

    #[error("Peer authentication failed: expected {expected}, got {actual}")]
    PeerAuthFailed {
        expected: DeviceId,
        actual: DeviceId,
    },

    #[error("Relay authentication failed: expected {expected}, got {actual}")]
    RelayAuthFailed {
        expected: DeviceId,
        actual: DeviceId,
    },

    #[error("Relay session failed with code {code}: {message}")]
    RelaySessionFailed { code: i32, message: String },

    #[error("Handshake step timed out")]
    HandshakeTimeout,

    #[error("Connection idle timeout")]
    IdleTimeout,

    #[error("Target is 'dynamic' but no discovery resolver is configured")]
    ResolverUnavailable,

    #[error("Discovery returned no usable address")]
    NoAddresses,
}

pub type Result<T> = std::result::Result<T, NetError>;
