//! Root certificates used to authenticate the controller.

use crate::credential::parse_chain;
use crate::{read_file, LoadError};
use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;
use std::path::Path;
use std::sync::Arc;
use x509_cert::der::Decode;
use x509_cert::name::Name;
use x509_cert::Certificate;

/// The set of roots every controller connection is validated against.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    store: Arc<RootCertStore>,
    roots: Vec<(Name, CertificateDer<'static>)>,
}

impl TrustAnchor {
    /// The roots in the form the TLS verifier consumes.
    pub fn root_store(&self) -> Arc<RootCertStore> {
        Arc::clone(&self.store)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Finds the root that issued `leaf`, by subject/issuer name.
    ///
    /// Used when the peer presents only its end-entity certificate and the
    /// issuer has to come from the local trust store.
    pub fn issuer_of(&self, leaf: &CertificateDer<'_>) -> Option<CertificateDer<'static>> {
        let issuer = issuer_name(leaf)?;
        self.roots
            .iter()
            .find(|(subject, _)| *subject == issuer)
            .map(|(_, der)| der.clone())
    }
}

/// Finds the certificate in `candidates` whose subject is the issuer named
/// by `leaf`.
///
/// Peers may present extra or reordered intermediates, so position in the
/// presented chain says nothing about which one signed the leaf.
pub fn issuer_among(
    leaf: &CertificateDer<'_>,
    candidates: &[CertificateDer<'_>],
) -> Option<CertificateDer<'static>> {
    let issuer = issuer_name(leaf)?;
    candidates
        .iter()
        .find(|candidate| {
            Certificate::from_der(candidate.as_ref())
                .map(|c| c.tbs_certificate.subject == issuer)
                .unwrap_or(false)
        })
        .map(|der| der.clone().into_owned())
}

fn issuer_name(cert: &CertificateDer<'_>) -> Option<Name> {
    Certificate::from_der(cert.as_ref())
        .ok()
        .map(|c| c.tbs_certificate.issuer)
}

/// Loads every certificate in a PEM bundle as a trust root.
///
/// # Errors
///
/// Returns [`LoadError`] if the file is missing, holds no certificate, or
/// holds a certificate that cannot serve as a trust anchor.
pub fn load_trust_anchor(path: &Path) -> Result<TrustAnchor, LoadError> {
    let pem_bytes = read_file(path)?;
    let certs = parse_chain(path, &pem_bytes)?;

    let mut store = RootCertStore::empty();
    let mut roots = Vec::with_capacity(certs.len());
    for cert in certs {
        let invalid = |reason: String| LoadError::InvalidRoot {
            path: path.to_path_buf(),
            reason,
        };
        let parsed = Certificate::from_der(cert.as_ref()).map_err(|e| invalid(e.to_string()))?;
        store
            .add(cert.clone())
            .map_err(|e| invalid(e.to_string()))?;
        roots.push((parsed.tbs_certificate.subject, cert));
    }

    tracing::info!(path = %path.display(), roots = roots.len(), "loaded trust anchor");

    Ok(TrustAnchor {
        store: Arc::new(store),
        roots,
    })
}
