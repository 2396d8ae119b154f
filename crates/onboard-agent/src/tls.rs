//! Mutual-TLS client configuration for controller connections.
//!
//! The server certificate is validated by the standard WebPKI verifier against
//! the trust anchor. The verifier wrapper then records what the revocation
//! check needs (the stapled OCSP response and the leaf plus its issuer) so the
//! transport can judge each response after the handshake.

use onboard_identity::{issuer_among, Credential, TrustAnchor};
use onboard_revocation::HandshakeSession;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{Resumption, WebPkiServerVerifier};
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, Error, SignatureScheme};
use std::sync::{Arc, Mutex};

/// Cryptography offered to the controller.
///
/// TLS 1.2 is limited to ECDHE-ECDSA-AES256-GCM-SHA384 and
/// ECDHE-RSA-AES128-GCM-SHA256; TLS 1.3 is limited to its AES-GCM suites.
pub fn controller_provider() -> CryptoProvider {
    use rustls::crypto::ring::cipher_suite;

    CryptoProvider {
        cipher_suites: vec![
            cipher_suite::TLS13_AES_256_GCM_SHA384,
            cipher_suite::TLS13_AES_128_GCM_SHA256,
            cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
            cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        ],
        ..ring::default_provider()
    }
}

/// The most recent handshake seen by a client.
///
/// Connections are never pooled, so each request performs exactly one
/// handshake and the recorder holds that request's session.
#[derive(Debug, Clone, Default)]
pub struct HandshakeRecorder {
    last: Arc<Mutex<Option<HandshakeSession>>>,
}

impl HandshakeRecorder {
    fn record(&self, session: HandshakeSession) {
        let mut slot = self.last.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(session);
    }

    /// Removes and returns the recorded session.
    pub fn take(&self) -> Option<HandshakeSession> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    pub fn clear(&self) {
        self.take();
    }
}

#[derive(Debug)]
struct StaplingVerifier {
    inner: Arc<WebPkiServerVerifier>,
    anchor: TrustAnchor,
    recorder: HandshakeRecorder,
}

impl StaplingVerifier {
    fn new(
        anchor: &TrustAnchor,
        provider: Arc<CryptoProvider>,
        recorder: HandshakeRecorder,
    ) -> Result<Self, String> {
        let inner = WebPkiServerVerifier::builder_with_provider(anchor.root_store(), provider)
            .build()
            .map_err(|e| format!("server verifier: {e}"))?;
        Ok(Self {
            inner,
            anchor: anchor.clone(),
            recorder,
        })
    }
}

impl ServerCertVerifier for StaplingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        let verified = self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        )?;

        let issuer = issuer_among(end_entity, intermediates)
            .or_else(|| self.anchor.issuer_of(end_entity));
        if issuer.is_none() {
            tracing::warn!("no issuer for the server certificate among intermediates or roots");
        }
        let mut verified_chain = vec![end_entity.clone().into_owned()];
        verified_chain.extend(issuer);

        self.recorder.record(HandshakeSession {
            stapled_response: (!ocsp_response.is_empty()).then(|| ocsp_response.to_vec()),
            verified_chain,
        });
        Ok(verified)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Builds a client configuration presenting `credential` and trusting
/// `anchor`, recording every handshake into `recorder`.
///
/// # Errors
///
/// Returns a description of the failure if the verifier or the client
/// certificate cannot be set up.
pub fn client_config(
    credential: &Credential,
    anchor: &TrustAnchor,
    recorder: HandshakeRecorder,
) -> Result<ClientConfig, String> {
    let provider = Arc::new(controller_provider());
    let verifier = Arc::new(StaplingVerifier::new(anchor, provider.clone(), recorder)?);

    let mut config = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .map_err(|e| format!("protocol versions: {e}"))?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_client_auth_cert(credential.chain().to_vec(), credential.private_key().clone_key())
        .map_err(|e| format!("client certificate: {e}"))?;

    // A resumed session skips certificate verification and carries no staple.
    config.resumption = Resumption::disabled();
    Ok(config)
}
