//! Minimal OCSP responder producing stapleable responses.
//!
//! Signs with a P-256 key, either the issuer's own or a delegate's whose
//! certificate is embedded in the response.

use crate::asn1::{
    BasicOcspResponse, CertId, CertStatus, OcspResponse, OcspResponseStatus, ResponderId,
    ResponseBytes, ResponseData, RevokedInfo, SingleResponse, ID_PKIX_OCSP_BASIC,
};
use crate::RevocationStatus;
use der::asn1::{BitString, GeneralizedTime, Null, ObjectIdentifier, OctetString};
use der::{Decode, Encode};
use p256::ecdsa::signature::Signer;
use p256::pkcs8::DecodePrivateKey;
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use x509_cert::spki::AlgorithmIdentifierOwned;
use x509_cert::Certificate;

const ID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");

#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("DER error: {0}")]
    Der(#[from] der::Error),

    #[error("invalid signing key: {0}")]
    Key(String),
}

/// What a single response should say about a certificate.
#[derive(Debug, Clone, Copy)]
pub struct Statement {
    pub status: RevocationStatus,
    pub this_update: SystemTime,
    pub next_update: Option<SystemTime>,
}

impl Statement {
    /// A good statement valid from `now - 1h` to `now + validity`.
    pub fn good_for(validity: Duration) -> Self {
        let now = SystemTime::now();
        Self {
            status: RevocationStatus::Good,
            this_update: now - Duration::from_secs(3600),
            next_update: Some(now + validity),
        }
    }

    /// A statement with `status` whose window closed `ago` in the past.
    pub fn expired(status: RevocationStatus, ago: Duration) -> Self {
        let now = SystemTime::now();
        Self {
            status,
            this_update: now - ago - Duration::from_secs(3600),
            next_update: Some(now - ago),
        }
    }
}

pub struct OcspResponder {
    issuer: Certificate,
    signer_subject: Certificate,
    delegate: Option<Certificate>,
    key: p256::ecdsa::SigningKey,
}

impl OcspResponder {
    /// A responder signing as the issuer itself.
    pub fn for_issuer(issuer_der: &[u8], issuer_key_pkcs8: &[u8]) -> Result<Self, ResponderError> {
        let issuer = Certificate::from_der(issuer_der)?;
        Ok(Self {
            signer_subject: issuer.clone(),
            issuer,
            delegate: None,
            key: signing_key(issuer_key_pkcs8)?,
        })
    }

    /// A responder signing with a delegated certificate, embedded in every
    /// response.
    pub fn delegated(
        issuer_der: &[u8],
        delegate_der: &[u8],
        delegate_key_pkcs8: &[u8],
    ) -> Result<Self, ResponderError> {
        let issuer = Certificate::from_der(issuer_der)?;
        let delegate = Certificate::from_der(delegate_der)?;
        Ok(Self {
            issuer,
            signer_subject: delegate.clone(),
            delegate: Some(delegate),
            key: signing_key(delegate_key_pkcs8)?,
        })
    }

    /// Encodes a complete `OCSPResponse` about `leaf_der`.
    pub fn respond(&self, leaf_der: &[u8], statement: Statement) -> Result<Vec<u8>, ResponderError> {
        let leaf = Certificate::from_der(leaf_der)?;
        let issuer_tbs = &self.issuer.tbs_certificate;
        let name_hash = Sha256::digest(issuer_tbs.subject.to_der()?);
        let key_hash = Sha256::digest(
            issuer_tbs
                .subject_public_key_info
                .subject_public_key
                .raw_bytes(),
        );

        let cert_status = match statement.status {
            RevocationStatus::Good => CertStatus::Good(Null),
            RevocationStatus::Revoked => CertStatus::Revoked(RevokedInfo {
                revocation_time: generalized(statement.this_update)?,
                revocation_reason: None,
            }),
            RevocationStatus::Unknown | RevocationStatus::Unavailable => {
                CertStatus::Unknown(Null)
            }
        };

        let single = SingleResponse {
            cert_id: CertId {
                hash_algorithm: AlgorithmIdentifierOwned {
                    oid: ID_SHA256,
                    parameters: None,
                },
                issuer_name_hash: OctetString::new(name_hash.to_vec())?,
                issuer_key_hash: OctetString::new(key_hash.to_vec())?,
                serial_number: leaf.tbs_certificate.serial_number.clone(),
            },
            cert_status,
            this_update: generalized(statement.this_update)?,
            next_update: statement.next_update.map(generalized).transpose()?,
            single_extensions: None,
        };

        let data = ResponseData {
            version: None,
            responder_id: ResponderId::ByName(self.signer_subject.tbs_certificate.subject.clone()),
            produced_at: generalized(statement.this_update)?,
            responses: vec![single],
            response_extensions: None,
        };

        let tbs = data.to_der()?;
        let signature: p256::ecdsa::DerSignature = self.key.sign(&tbs);
        let basic = BasicOcspResponse {
            tbs_response_data: data,
            signature_algorithm: AlgorithmIdentifierOwned {
                oid: ECDSA_WITH_SHA256,
                parameters: None,
            },
            signature: BitString::from_bytes(signature.as_bytes())?,
            certs: self.delegate.clone().map(|cert| vec![cert]),
        };

        let response = OcspResponse {
            response_status: OcspResponseStatus::Successful,
            response_bytes: Some(ResponseBytes {
                response_type: ID_PKIX_OCSP_BASIC,
                response: OctetString::new(basic.to_der()?)?,
            }),
        };
        Ok(response.to_der()?)
    }
}

/// An `OCSPResponse` carrying only an error status.
pub fn error_response(status: OcspResponseStatus) -> Result<Vec<u8>, ResponderError> {
    let response = OcspResponse {
        response_status: status,
        response_bytes: None,
    };
    Ok(response.to_der()?)
}

fn signing_key(pkcs8: &[u8]) -> Result<p256::ecdsa::SigningKey, ResponderError> {
    p256::ecdsa::SigningKey::from_pkcs8_der(pkcs8).map_err(|e| ResponderError::Key(e.to_string()))
}

fn generalized(t: SystemTime) -> Result<GeneralizedTime, der::Error> {
    let secs = t
        .duration_since(UNIX_EPOCH)
        .map_err(|_| der::Error::from(der::ErrorKind::DateTime))?
        .as_secs();
    GeneralizedTime::from_unix_duration(Duration::from_secs(secs))
}
