use crate::asn1::{
    CertStatus, OcspResponse, OcspResponseStatus, ResponseData, SignedResponse,
    ID_KP_OCSP_SIGNING, ID_PKIX_OCSP_BASIC,
};
use crate::{RevocationError, RevocationStatus};
use der::{Decode, Encode};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::CertificateDer;
use std::time::SystemTime;
use x509_cert::ext::pkix::ExtendedKeyUsage;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::Certificate;

/// A stapled response whose signature has been verified, reduced to the
/// entry for the peer's certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StapledAttestation {
    pub status: RevocationStatus,
    pub produced_at: SystemTime,
    pub this_update: SystemTime,
    pub next_update: Option<SystemTime>,
}

pub(crate) fn parse_stapled(
    algorithms: &WebPkiSupportedAlgorithms,
    stapled: &[u8],
    leaf: &CertificateDer<'_>,
    issuer: &CertificateDer<'_>,
) -> Result<StapledAttestation, RevocationError> {
    let leaf = Certificate::from_der(leaf.as_ref())?;
    let issuer_der = issuer.as_ref();
    let issuer = Certificate::from_der(issuer_der)?;

    let response = OcspResponse::from_der(stapled)?;
    if response.response_status != OcspResponseStatus::Successful {
        return Err(RevocationError::NotSuccessful(response.response_status));
    }
    let body = response.response_bytes.ok_or(RevocationError::MissingBody)?;
    if body.response_type != ID_PKIX_OCSP_BASIC {
        return Err(RevocationError::UnsupportedType(body.response_type));
    }

    let signed = SignedResponse::from_der(body.response.as_bytes())?;
    let tbs = signed.tbs_response_data.to_der()?;
    let data = ResponseData::from_der(&tbs)?;

    // Responses are signed either by the issuer itself or by a delegate the
    // issuer certified for OCSP signing.
    let delegate = signed
        .certs
        .as_deref()
        .and_then(|certs| certs.first())
        .filter(|cert| cert.to_der().map(|d| d != issuer_der).unwrap_or(true));
    let signer = match delegate {
        Some(responder) => {
            authorize_responder(algorithms, responder, &issuer)?;
            &responder.tbs_certificate.subject_public_key_info
        }
        None => &issuer.tbs_certificate.subject_public_key_info,
    };
    verify_signature(
        algorithms,
        signer,
        &signed.signature_algorithm,
        &tbs,
        signed.signature.raw_bytes(),
    )?;

    let serial = &leaf.tbs_certificate.serial_number;
    let single = data
        .responses
        .iter()
        .find(|r| &r.cert_id.serial_number == serial)
        .ok_or(RevocationError::NoMatchingResponse)?;

    let status = match single.cert_status {
        CertStatus::Good(_) => RevocationStatus::Good,
        CertStatus::Revoked(_) => RevocationStatus::Revoked,
        CertStatus::Unknown(_) => RevocationStatus::Unknown,
    };

    Ok(StapledAttestation {
        status,
        produced_at: data.produced_at.to_system_time(),
        this_update: single.this_update.to_system_time(),
        next_update: single.next_update.map(|t| t.to_system_time()),
    })
}

fn authorize_responder(
    algorithms: &WebPkiSupportedAlgorithms,
    responder: &Certificate,
    issuer: &Certificate,
) -> Result<(), RevocationError> {
    let tbs = responder.tbs_certificate.to_der()?;
    verify_signature(
        algorithms,
        &issuer.tbs_certificate.subject_public_key_info,
        &responder.signature_algorithm,
        &tbs,
        responder.signature.raw_bytes(),
    )
    .map_err(|e| match e {
        RevocationError::BadSignature => RevocationError::UntrustedResponder,
        other => other,
    })?;

    match responder.tbs_certificate.get::<ExtendedKeyUsage>()? {
        Some((_, usage)) if usage.0.contains(&ID_KP_OCSP_SIGNING) => Ok(()),
        _ => Err(RevocationError::ResponderNotAuthorized),
    }
}

fn verify_signature(
    algorithms: &WebPkiSupportedAlgorithms,
    key: &SubjectPublicKeyInfoOwned,
    signature_algorithm: &AlgorithmIdentifierOwned,
    message: &[u8],
    signature: &[u8],
) -> Result<(), RevocationError> {
    let key_alg = algorithm_id_contents(&key.algorithm)?;
    let sig_alg = algorithm_id_contents(signature_algorithm)?;
    let public_key = key.subject_public_key.raw_bytes();

    let mut candidates = algorithms
        .all
        .iter()
        .filter(|alg| {
            alg.public_key_alg_id().as_ref() == key_alg.as_slice()
                && alg.signature_alg_id().as_ref() == sig_alg.as_slice()
        })
        .peekable();
    if candidates.peek().is_none() {
        return Err(RevocationError::UnsupportedSignatureAlgorithm);
    }
    if candidates.any(|alg| alg.verify_signature(public_key, message, signature).is_ok()) {
        Ok(())
    } else {
        Err(RevocationError::BadSignature)
    }
}

/// The content octets of an AlgorithmIdentifier SEQUENCE, which is the form
/// the verification algorithms advertise.
fn algorithm_id_contents(alg: &AlgorithmIdentifierOwned) -> Result<Vec<u8>, der::Error> {
    let mut out = alg.oid.to_der()?;
    if let Some(params) = &alg.parameters {
        out.extend(params.to_der()?);
    }
    Ok(out)
}
