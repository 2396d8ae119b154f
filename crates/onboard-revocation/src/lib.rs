//! Revocation checking for controller connections.
//!
//! Every controller connection must carry a stapled OCSP response for the
//! controller's certificate. [`RevocationValidator::validate`] turns a
//! completed handshake into a [`RevocationStatus`]; only
//! [`RevocationStatus::Good`] lets a request count as authenticated. Anything
//! that prevents a trustworthy verdict (no staple, unparsable or badly signed
//! staple, expired freshness window) yields [`RevocationStatus::Unavailable`].

pub mod asn1;
mod parse;
#[cfg(feature = "responder")]
pub mod responder;

use rustls::crypto::{ring, WebPkiSupportedAlgorithms};
use rustls::pki_types::CertificateDer;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub use parse::StapledAttestation;

/// Outcome of a revocation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationStatus {
    /// The responder vouches for the certificate and the statement is fresh.
    Good,
    /// The responder does not know the certificate.
    Unknown,
    /// The certificate has been revoked.
    Revoked,
    /// No trustworthy statement could be obtained.
    Unavailable,
}

impl fmt::Display for RevocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Good => "good",
            Self::Unknown => "unknown",
            Self::Revoked => "revoked",
            Self::Unavailable => "unavailable",
        })
    }
}

/// What a finished handshake exposes to the validator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeSession {
    /// The OCSP response stapled by the server, if any.
    pub stapled_response: Option<Vec<u8>>,
    /// The verified peer chain, leaf first; index 1 is the leaf's issuer.
    pub verified_chain: Vec<CertificateDer<'static>>,
}

/// Reasons a stapled response could not be turned into a verdict.
///
/// These never reach callers of [`RevocationValidator::validate`]; they are
/// logged and folded into [`RevocationStatus::Unavailable`].
#[derive(Debug, Error)]
pub enum RevocationError {
    #[error("malformed DER: {0}")]
    Der(#[from] der::Error),

    #[error("responder returned status {0:?}")]
    NotSuccessful(asn1::OcspResponseStatus),

    #[error("response carries no body")]
    MissingBody,

    #[error("unsupported response type {0}")]
    UnsupportedType(der::asn1::ObjectIdentifier),

    #[error("no verification algorithm for the response signature")]
    UnsupportedSignatureAlgorithm,

    #[error("response signature does not verify")]
    BadSignature,

    #[error("delegated responder certificate is not signed by the issuer")]
    UntrustedResponder,

    #[error("delegated responder certificate lacks the OCSP signing usage")]
    ResponderNotAuthorized,

    #[error("no response for the certificate's serial number")]
    NoMatchingResponse,
}

/// Checks stapled OCSP responses.
#[derive(Debug, Clone, Copy)]
pub struct RevocationValidator {
    algorithms: WebPkiSupportedAlgorithms,
}

impl Default for RevocationValidator {
    fn default() -> Self {
        Self::new(ring::default_provider().signature_verification_algorithms)
    }
}

impl RevocationValidator {
    /// A validator that verifies response signatures with `algorithms`.
    pub fn new(algorithms: WebPkiSupportedAlgorithms) -> Self {
        Self { algorithms }
    }

    /// Validates the session against the current time.
    pub fn validate(&self, session: &HandshakeSession) -> RevocationStatus {
        self.validate_at(session, SystemTime::now())
    }

    /// Validates the session as of `now`.
    pub fn validate_at(&self, session: &HandshakeSession, now: SystemTime) -> RevocationStatus {
        let Some(stapled) = session.stapled_response.as_deref() else {
            tracing::warn!("no stapled revocation response in handshake");
            return RevocationStatus::Unavailable;
        };
        let (Some(leaf), Some(issuer)) =
            (session.verified_chain.first(), session.verified_chain.get(1))
        else {
            tracing::warn!(
                chain_len = session.verified_chain.len(),
                "verified chain has no issuer to check the stapled response against"
            );
            return RevocationStatus::Unavailable;
        };

        let attestation = match parse::parse_stapled(&self.algorithms, stapled, leaf, issuer) {
            Ok(attestation) => attestation,
            Err(e) => {
                tracing::warn!(error = %e, "stapled revocation response rejected");
                return RevocationStatus::Unavailable;
            }
        };

        let Some(next_update) = attestation.next_update else {
            tracing::warn!("stapled revocation response has no next update time");
            return RevocationStatus::Unavailable;
        };

        let now_secs = unix_seconds(now);
        let age = now_secs - unix_seconds(attestation.produced_at);
        let remaining = unix_seconds(next_update) - now_secs;
        tracing::debug!(
            status = %attestation.status,
            age_secs = age,
            remaining_secs = remaining,
            "stapled revocation response"
        );

        if remaining < 0 {
            tracing::warn!(
                expired_secs = -remaining,
                "stapled revocation response has expired"
            );
            return RevocationStatus::Unavailable;
        }

        attestation.status
    }
}

fn unix_seconds(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}
