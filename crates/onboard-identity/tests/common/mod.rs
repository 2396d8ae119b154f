use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    PKCS_ECDSA_P256_SHA256,
};
use std::path::{Path, PathBuf};

pub struct Issued {
    pub cert_pem: String,
    pub key_pem: String,
}

pub struct TestPki {
    pub root: rcgen::Certificate,
    pub root_key: KeyPair,
}

impl TestPki {
    pub fn new(common_name: &str) -> Self {
        let root_key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).expect("root keygen");
        let mut params = CertificateParams::new(Vec::<String>::new()).expect("root params");
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.distinguished_name = name(common_name);
        let root = params.self_signed(&root_key).expect("self-sign root");
        Self { root, root_key }
    }

    pub fn issue(&self, common_name: &str) -> Issued {
        let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).expect("leaf keygen");
        let mut params =
            CertificateParams::new(vec![common_name.to_string()]).expect("leaf params");
        params.distinguished_name = name(common_name);
        let cert = params
            .signed_by(&key, &self.root, &self.root_key)
            .expect("sign leaf");
        Issued {
            cert_pem: cert.pem(),
            key_pem: key.serialize_pem(),
        }
    }
}

pub fn name(common_name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    dn
}

pub fn write(dir: &Path, file: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(file);
    std::fs::write(&path, contents).expect("write fixture");
    path
}
