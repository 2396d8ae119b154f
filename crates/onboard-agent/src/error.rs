//! The two error classes of the agent.
//!
//! [`FatalError`] stops the process. [`AttemptError`] only ends one attempt
//! of a controller request and is absorbed by the retry executor; it never
//! reaches `main`.

use crate::config::ConfigError;
use crate::endpoint::EndpointError;
use onboard_identity::{LoadError, SignError};
use onboard_revocation::RevocationStatus;
use std::path::PathBuf;
use thiserror::Error;

/// Conditions the agent cannot recover from by waiting.
#[derive(Debug, Error)]
pub enum FatalError {
    /// The configuration file could not be loaded.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// A credential or the trust anchor could not be loaded.
    #[error("identity store: {0}")]
    Load(#[from] LoadError),

    /// The server file is missing or malformed.
    #[error("controller endpoint: {0}")]
    Endpoint(#[from] EndpointError),

    /// The TLS client could not be configured from the loaded material.
    #[error("TLS setup: {0}")]
    TlsSetup(String),

    /// The device key cannot produce the attestation signature.
    #[error("attestation: {0}")]
    Sign(#[from] SignError),

    /// The persisted device UUID exists but cannot be parsed.
    #[error("corrupt device UUID in {}: {reason}", .path.display())]
    CorruptDeviceId { path: PathBuf, reason: String },

    /// An input file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An output file could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A status file does not hold the expected JSON.
    #[error("invalid status document {}: {reason}", .path.display())]
    StatusDocument { path: PathBuf, reason: String },

    /// The network configuration artifact could not be serialized.
    #[error("failed to encode network configuration: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Why a single controller request attempt failed.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// Connecting, handshaking or sending failed.
    #[error("transport: {0}")]
    Transport(#[source] reqwest::Error),

    /// The response arrived without a recorded TLS handshake.
    #[error("no TLS handshake recorded for the response")]
    NoHandshake,

    /// The controller's certificate is not vouched for by a fresh staple.
    #[error("revocation check failed: {0}")]
    Revocation(RevocationStatus),

    /// The response body could not be read.
    #[error("reading response body: {0}")]
    Body(#[source] reqwest::Error),

    /// The controller reports the request conflicts with existing state.
    #[error("conflict: {body}")]
    Conflict { body: String },

    /// Any other status outside the accepted set.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response is not JSON.
    #[error("unexpected content type {0:?}")]
    ContentType(String),

    /// The JSON body does not match the expected schema.
    #[error("decoding response: {0}")]
    Decode(#[source] serde_json::Error),
}
