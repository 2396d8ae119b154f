//! Liveness attestation: the device signs a challenge derived from the
//! parameters the controller assigned to it.
//!
//! The challenge is `"[<instance>]<EID>"` with the EID in its canonical
//! textual form (RFC 5952 for IPv6). Its SHA-256 digest is signed with the
//! device key and the two ECDSA scalars are concatenated, `r` then `s`, and
//! base64 encoded.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use p256::elliptic_curve::ALGORITHM_OID;
use p256::pkcs8::{AssociatedOid, DecodePrivateKey, ObjectIdentifier, PrivateKeyInfo};
use rustls::pki_types::PrivateKeyDer;
use sha2::{Digest, Sha256};
use std::net::IpAddr;
use thiserror::Error;

/// Errors produced while preparing or using the signing key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignError {
    /// The device key is not an elliptic-curve key on a supported curve.
    #[error("unsupported device key algorithm: {0}")]
    UnsupportedKeyAlgorithm(String),

    /// The key bytes could not be decoded.
    #[error("invalid device key: {0}")]
    InvalidKey(String),

    /// The signing primitive rejected the digest.
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Builds the challenge string for an instance and EID.
pub fn challenge(instance_id: u32, eid: &IpAddr) -> String {
    format!("[{instance_id}]{eid}")
}

/// Raw `r || s` signature bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationSignature(Vec<u8>);

impl AttestationSignature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

/// Signing key for the attestation challenge.
///
/// Only NIST P-256 and P-384 keys are accepted.
pub enum DeviceSigner {
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

impl std::fmt::Debug for DeviceSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::P256(_) => "DeviceSigner::P256",
            Self::P384(_) => "DeviceSigner::P384",
        })
    }
}

impl DeviceSigner {
    /// Prepares a signer from the device credential's private key.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::UnsupportedKeyAlgorithm`] for RSA, Ed25519 or
    /// other non-NIST-curve keys, and [`SignError::InvalidKey`] when the
    /// encoding cannot be decoded.
    pub fn from_private_key(key: &PrivateKeyDer<'_>) -> Result<Self, SignError> {
        match key {
            PrivateKeyDer::Pkcs8(pkcs8) => Self::from_pkcs8(pkcs8.secret_pkcs8_der()),
            PrivateKeyDer::Sec1(sec1) => Self::from_sec1(sec1.secret_sec1_der()),
            PrivateKeyDer::Pkcs1(_) => {
                Err(SignError::UnsupportedKeyAlgorithm("RSA".to_string()))
            }
            _ => Err(SignError::UnsupportedKeyAlgorithm(
                "unrecognized key encoding".to_string(),
            )),
        }
    }

    fn from_pkcs8(der: &[u8]) -> Result<Self, SignError> {
        let info =
            PrivateKeyInfo::try_from(der).map_err(|e| SignError::InvalidKey(e.to_string()))?;
        if info.algorithm.oid != ALGORITHM_OID {
            return Err(SignError::UnsupportedKeyAlgorithm(algorithm_name(
                info.algorithm.oid,
            )));
        }
        let curve = info
            .algorithm
            .parameters_oid()
            .map_err(|e| SignError::InvalidKey(e.to_string()))?;

        if curve == p256::NistP256::OID {
            p256::ecdsa::SigningKey::from_pkcs8_der(der)
                .map(Self::P256)
                .map_err(|e| SignError::InvalidKey(e.to_string()))
        } else if curve == p384::NistP384::OID {
            p384::ecdsa::SigningKey::from_pkcs8_der(der)
                .map(Self::P384)
                .map_err(|e| SignError::InvalidKey(e.to_string()))
        } else {
            Err(SignError::UnsupportedKeyAlgorithm(format!(
                "EC curve {curve}"
            )))
        }
    }

    fn from_sec1(der: &[u8]) -> Result<Self, SignError> {
        if let Ok(secret) = p256::SecretKey::from_sec1_der(der) {
            return Ok(Self::P256(secret.into()));
        }
        if let Ok(secret) = p384::SecretKey::from_sec1_der(der) {
            return Ok(Self::P384(secret.into()));
        }
        Err(SignError::InvalidKey(
            "SEC1 key is not on a supported curve".to_string(),
        ))
    }

    /// Signs `SHA-256(challenge)`.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::Signing`] if the underlying primitive fails.
    pub fn sign_challenge(&self, challenge: &str) -> Result<AttestationSignature, SignError> {
        use p256::ecdsa::signature::hazmat::PrehashSigner;

        let digest = Sha256::digest(challenge.as_bytes());
        tracing::debug!(
            challenge,
            digest = %hex::encode(digest),
            "signing attestation challenge"
        );

        let bytes = match self {
            Self::P256(key) => {
                let signature: p256::ecdsa::Signature = key
                    .sign_prehash(&digest)
                    .map_err(|e| SignError::Signing(e.to_string()))?;
                signature.to_bytes().to_vec()
            }
            Self::P384(key) => {
                let signature: p384::ecdsa::Signature = key
                    .sign_prehash(&digest)
                    .map_err(|e| SignError::Signing(e.to_string()))?;
                signature.to_bytes().to_vec()
            }
        };
        Ok(AttestationSignature(bytes))
    }
}

fn algorithm_name(oid: ObjectIdentifier) -> String {
    match oid.to_string().as_str() {
        "1.2.840.113549.1.1.1" => "RSA".to_string(),
        "1.3.101.112" => "Ed25519".to_string(),
        "1.3.101.113" => "Ed448".to_string(),
        other => other.to_string(),
    }
}
