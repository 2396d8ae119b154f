//! Identity store and attestation signing for the onboarding agent.
//!
//! Credentials (certificate chain + private key) and the trust anchor are read
//! from PEM files once at startup and are immutable afterwards. The device
//! credential's private key also signs the attestation challenge derived from
//! the controller's device parameters.

pub mod attestation;
pub mod credential;
pub mod trust;

use std::path::PathBuf;
use thiserror::Error;

pub use attestation::{challenge, AttestationSignature, DeviceSigner, SignError};
pub use credential::{load_certificate_pem, load_credential, Credential, CredentialPaths};
pub use trust::{issuer_among, load_trust_anchor, TrustAnchor};

/// Errors produced while loading credentials or the trust anchor.
///
/// Every variant is fatal for the agent: nothing on disk changes between
/// retries, so there is nothing to wait for.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid PEM.
    #[error("malformed PEM in {}: {reason}", .path.display())]
    Pem { path: PathBuf, reason: String },

    /// The file holds no certificate.
    #[error("no certificate found in {}", .path.display())]
    NoCertificate { path: PathBuf },

    /// The file holds no private key.
    #[error("no private key found in {}", .path.display())]
    NoPrivateKey { path: PathBuf },

    /// The private key is not the one certified by the certificate.
    #[error("private key {} does not match certificate {}", .key.display(), .cert.display())]
    KeyMismatch { cert: PathBuf, key: PathBuf },

    /// The private key could not be loaded by the TLS provider.
    #[error("unusable private key in {}: {reason}", .path.display())]
    UnusableKey { path: PathBuf, reason: String },

    /// A root certificate could not be added to the trust store.
    #[error("invalid root certificate in {}: {reason}", .path.display())]
    InvalidRoot { path: PathBuf, reason: String },
}

pub(crate) fn read_file(path: &std::path::Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}
