//! Certificate + private key pairs used for mutual TLS.

use crate::{read_file, LoadError};
use rustls::crypto::ring;
use rustls::pki_types::pem::{self, PemObject};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use std::path::{Path, PathBuf};

/// Locations of a certificate and its private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl CredentialPaths {
    pub fn new(cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        Self {
            cert: cert.into(),
            key: key.into(),
        }
    }
}

/// A loaded certificate chain with the matching private key.
#[derive(Debug)]
pub struct Credential {
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    cert_pem: Vec<u8>,
}

impl Credential {
    /// The certificate chain, leaf first.
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    pub fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.key
    }

    /// The certificate file exactly as it was read from disk.
    pub fn certificate_pem(&self) -> &[u8] {
        &self.cert_pem
    }
}

/// Loads a credential and checks that the key belongs to the leaf certificate.
///
/// # Errors
///
/// Returns [`LoadError`] if either file is missing or malformed, if the key
/// type is not supported by the TLS provider, or if the key does not match.
pub fn load_credential(paths: &CredentialPaths) -> Result<Credential, LoadError> {
    let cert_pem = read_file(&paths.cert)?;
    let chain = parse_chain(&paths.cert, &cert_pem)?;

    let key_pem = read_file(&paths.key)?;
    let key = PrivateKeyDer::from_pem_slice(&key_pem).map_err(|e| match e {
        pem::Error::NoItemsFound => LoadError::NoPrivateKey {
            path: paths.key.clone(),
        },
        other => LoadError::Pem {
            path: paths.key.clone(),
            reason: other.to_string(),
        },
    })?;

    let provider = ring::default_provider();
    CertifiedKey::from_der(chain.clone(), key.clone_key(), &provider).map_err(|e| match e {
        rustls::Error::InconsistentKeys(_) => LoadError::KeyMismatch {
            cert: paths.cert.clone(),
            key: paths.key.clone(),
        },
        other => LoadError::UnusableKey {
            path: paths.key.clone(),
            reason: other.to_string(),
        },
    })?;

    tracing::debug!(
        cert = %paths.cert.display(),
        chain_len = chain.len(),
        "loaded credential"
    );

    Ok(Credential {
        chain,
        key,
        cert_pem,
    })
}

/// Reads a PEM certificate file and returns its raw bytes after checking it
/// holds at least one certificate.
///
/// # Errors
///
/// Returns [`LoadError`] if the file is missing, malformed or empty.
pub fn load_certificate_pem(path: &Path) -> Result<Vec<u8>, LoadError> {
    let pem_bytes = read_file(path)?;
    parse_chain(path, &pem_bytes)?;
    Ok(pem_bytes)
}

pub(crate) fn parse_chain(
    path: &Path,
    pem_bytes: &[u8],
) -> Result<Vec<CertificateDer<'static>>, LoadError> {
    let chain = CertificateDer::pem_slice_iter(pem_bytes)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LoadError::Pem {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if chain.is_empty() {
        return Err(LoadError::NoCertificate {
            path: path.to_path_buf(),
        });
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_certificate_file_is_a_read_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = CredentialPaths::new(dir.path().join("absent.pem"), dir.path().join("key"));
        let err = load_credential(&paths).expect_err("must fail");
        assert!(matches!(err, LoadError::Read { .. }), "got {err:?}");
    }

    #[test]
    fn pem_without_certificates_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("empty.pem");
        std::fs::write(&path, "just some text\n").expect("write");
        let err = load_certificate_pem(&path).expect_err("must fail");
        assert!(matches!(err, LoadError::NoCertificate { .. }), "got {err:?}");
    }
}
