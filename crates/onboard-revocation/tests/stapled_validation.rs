use onboard_revocation::asn1::OcspResponseStatus;
use onboard_revocation::responder::{error_response, OcspResponder, Statement};
use onboard_revocation::{HandshakeSession, RevocationStatus, RevocationValidator};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose,
    IsCa, KeyPair, SerialNumber, PKCS_ECDSA_P256_SHA256,
};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

struct Authority {
    cert: rcgen::Certificate,
    key: KeyPair,
}

impl Authority {
    fn new(common_name: &str) -> Self {
        let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).expect("keygen");
        let mut params = CertificateParams::new(Vec::<String>::new()).expect("params");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.distinguished_name = dn(common_name);
        let cert = params.self_signed(&key).expect("self-sign");
        Self { cert, key }
    }

    fn issue(&self, host: &str, serial: u64, usages: Vec<ExtendedKeyUsagePurpose>) -> (rcgen::Certificate, KeyPair) {
        let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).expect("keygen");
        let mut params = CertificateParams::new(vec![host.to_string()]).expect("params");
        params.distinguished_name = dn(host);
        params.serial_number = Some(SerialNumber::from(serial));
        params.extended_key_usages = usages;
        let cert = params
            .signed_by(&key, &self.cert, &self.key)
            .expect("sign");
        (cert, key)
    }

    fn responder(&self) -> OcspResponder {
        OcspResponder::for_issuer(self.cert.der(), &self.key.serialize_der()).expect("responder")
    }
}

fn dn(common_name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    dn
}

fn session(staple: Option<Vec<u8>>, leaf: &rcgen::Certificate, ca: &Authority) -> HandshakeSession {
    HandshakeSession {
        stapled_response: staple,
        verified_chain: vec![leaf.der().clone(), ca.cert.der().clone()],
    }
}

fn at_second(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[test]
fn fresh_good_response_is_good() {
    let ca = Authority::new("Controller Root");
    let (leaf, _) = ca.issue("controller.example.net", 1001, Vec::new());
    let staple = ca
        .responder()
        .respond(leaf.der(), Statement::good_for(Duration::from_secs(3600)))
        .expect("respond");

    let status = RevocationValidator::default().validate(&session(Some(staple), &leaf, &ca));
    assert_eq!(status, RevocationStatus::Good);
}

#[test]
fn expired_good_response_is_unavailable() {
    let ca = Authority::new("Controller Root");
    let (leaf, _) = ca.issue("controller.example.net", 1002, Vec::new());
    let staple = ca
        .responder()
        .respond(
            leaf.der(),
            Statement::expired(RevocationStatus::Good, Duration::from_secs(60)),
        )
        .expect("respond");

    let status = RevocationValidator::default().validate(&session(Some(staple), &leaf, &ca));
    assert_eq!(status, RevocationStatus::Unavailable);
}

#[test]
fn freshness_boundary_is_inclusive() {
    let ca = Authority::new("Controller Root");
    let (leaf, _) = ca.issue("controller.example.net", 1003, Vec::new());
    let statement = Statement {
        status: RevocationStatus::Good,
        this_update: at_second(1_700_000_000),
        next_update: Some(at_second(1_700_003_600)),
    };
    let staple = ca.responder().respond(leaf.der(), statement).expect("respond");
    let session = session(Some(staple), &leaf, &ca);
    let validator = RevocationValidator::default();

    assert_eq!(
        validator.validate_at(&session, at_second(1_700_003_600)),
        RevocationStatus::Good
    );
    assert_eq!(
        validator.validate_at(&session, at_second(1_700_003_601)),
        RevocationStatus::Unavailable
    );
}

#[test]
fn revoked_and_unknown_are_reported_verbatim() {
    let ca = Authority::new("Controller Root");
    let (leaf, _) = ca.issue("controller.example.net", 1004, Vec::new());
    let validator = RevocationValidator::default();

    for expected in [RevocationStatus::Revoked, RevocationStatus::Unknown] {
        let mut statement = Statement::good_for(Duration::from_secs(600));
        statement.status = expected;
        let staple = ca.responder().respond(leaf.der(), statement).expect("respond");
        assert_eq!(validator.validate(&session(Some(staple), &leaf, &ca)), expected);
    }
}

#[test]
fn missing_staple_is_unavailable() {
    let ca = Authority::new("Controller Root");
    let (leaf, _) = ca.issue("controller.example.net", 1005, Vec::new());
    let status = RevocationValidator::default().validate(&session(None, &leaf, &ca));
    assert_eq!(status, RevocationStatus::Unavailable);
}

#[test]
fn chain_without_issuer_is_unavailable() {
    let ca = Authority::new("Controller Root");
    let (leaf, _) = ca.issue("controller.example.net", 1006, Vec::new());
    let staple = ca
        .responder()
        .respond(leaf.der(), Statement::good_for(Duration::from_secs(600)))
        .expect("respond");
    let session = HandshakeSession {
        stapled_response: Some(staple),
        verified_chain: vec![leaf.der().clone()],
    };
    assert_eq!(
        RevocationValidator::default().validate(&session),
        RevocationStatus::Unavailable
    );
}

#[test]
fn response_signed_by_another_authority_is_unavailable() {
    let ca = Authority::new("Controller Root");
    let impostor = Authority::new("Controller Root");
    let (leaf, _) = ca.issue("controller.example.net", 1007, Vec::new());
    let staple = impostor
        .responder()
        .respond(leaf.der(), Statement::good_for(Duration::from_secs(600)))
        .expect("respond");

    let status = RevocationValidator::default().validate(&session(Some(staple), &leaf, &ca));
    assert_eq!(status, RevocationStatus::Unavailable);
}

#[test]
fn response_for_another_certificate_is_unavailable() {
    let ca = Authority::new("Controller Root");
    let (leaf, _) = ca.issue("controller.example.net", 1008, Vec::new());
    let (other, _) = ca.issue("other.example.net", 2008, Vec::new());
    let staple = ca
        .responder()
        .respond(other.der(), Statement::good_for(Duration::from_secs(600)))
        .expect("respond");

    let status = RevocationValidator::default().validate(&session(Some(staple), &leaf, &ca));
    assert_eq!(status, RevocationStatus::Unavailable);
}

#[test]
fn response_without_next_update_is_unavailable() {
    let ca = Authority::new("Controller Root");
    let (leaf, _) = ca.issue("controller.example.net", 1009, Vec::new());
    let mut statement = Statement::good_for(Duration::from_secs(600));
    statement.next_update = None;
    let staple = ca.responder().respond(leaf.der(), statement).expect("respond");

    let status = RevocationValidator::default().validate(&session(Some(staple), &leaf, &ca));
    assert_eq!(status, RevocationStatus::Unavailable);
}

#[test]
fn malformed_or_unsuccessful_responses_are_unavailable() {
    let ca = Authority::new("Controller Root");
    let (leaf, _) = ca.issue("controller.example.net", 1010, Vec::new());
    let validator = RevocationValidator::default();

    let garbage = vec![0x30, 0x03, 0x0a, 0x01];
    assert_eq!(
        validator.validate(&session(Some(garbage), &leaf, &ca)),
        RevocationStatus::Unavailable
    );

    let try_later = error_response(OcspResponseStatus::TryLater).expect("encode");
    assert_eq!(
        validator.validate(&session(Some(try_later), &leaf, &ca)),
        RevocationStatus::Unavailable
    );
}

#[test]
fn delegated_responder_needs_ocsp_signing_usage() {
    let ca = Authority::new("Controller Root");
    let (leaf, _) = ca.issue("controller.example.net", 1011, Vec::new());
    let validator = RevocationValidator::default();
    let statement = Statement::good_for(Duration::from_secs(600));

    let (delegate, delegate_key) = ca.issue(
        "ocsp.example.net",
        3001,
        vec![ExtendedKeyUsagePurpose::OcspSigning],
    );
    let responder =
        OcspResponder::delegated(ca.cert.der(), delegate.der(), &delegate_key.serialize_der())
            .expect("responder");
    let staple = responder.respond(leaf.der(), statement).expect("respond");
    assert_eq!(
        validator.validate(&session(Some(staple), &leaf, &ca)),
        RevocationStatus::Good
    );

    let (plain, plain_key) = ca.issue("plain.example.net", 3002, Vec::new());
    let responder =
        OcspResponder::delegated(ca.cert.der(), plain.der(), &plain_key.serialize_der())
            .expect("responder");
    let staple = responder.respond(leaf.der(), statement).expect("respond");
    assert_eq!(
        validator.validate(&session(Some(staple), &leaf, &ca)),
        RevocationStatus::Unavailable
    );
}
