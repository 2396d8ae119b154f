#![allow(dead_code)]

use onboard_agent::config::Config;
use onboard_agent::retry::Sleeper;
use onboard_revocation::responder::{OcspResponder, Statement};
use onboard_revocation::RevocationStatus;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    PKCS_ECDSA_P256_SHA256,
};
use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use rustls::{RootCertStore, ServerConfig};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

pub struct Issued {
    pub cert: rcgen::Certificate,
    pub key: KeyPair,
}

impl Issued {
    pub fn der(&self) -> CertificateDer<'static> {
        self.cert.der().clone()
    }

    fn private_key(&self) -> PrivateKeyDer<'static> {
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key.serialize_der()))
    }
}

/// A root CA issuing the controller, onboarding and device certificates.
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

    pub fn issue(&self, common_name: &str, alt_names: &[&str]) -> Issued {
        let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).expect("leaf keygen");
        let names: Vec<String> = alt_names.iter().map(|n| n.to_string()).collect();
        let mut params = CertificateParams::new(names).expect("leaf params");
        params.distinguished_name = name(common_name);
        let cert = params
            .signed_by(&key, &self.root, &self.root_key)
            .expect("sign leaf");
        Issued { cert, key }
    }

    fn responder(&self) -> OcspResponder {
        OcspResponder::for_issuer(self.root.der(), &self.root_key.serialize_der())
            .expect("responder")
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

/// A device directory populated with credentials and the trust anchor.
pub struct DeviceDir {
    pub dir: TempDir,
    pub onboard: Issued,
    pub device: Issued,
}

impl DeviceDir {
    pub fn new(pki: &TestPki) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let onboard = pki.issue("onboard", &["onboard.example.net"]);
        let device = pki.issue("device-1", &["device-1.example.net"]);

        write(dir.path(), "root-certificate.pem", pki.root.pem());
        write(dir.path(), "onboard.cert.pem", onboard.cert.pem());
        write(dir.path(), "onboard.key.pem", onboard.key.serialize_pem());
        write(dir.path(), "device.cert.pem", device.cert.pem());
        write(dir.path(), "device.key.pem", device.key.serialize_pem());

        Self {
            dir,
            onboard,
            device,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Points the server file at `controller`.
    pub fn use_controller(&self, controller: &MockController) {
        write(self.path(), "server", format!("{}\n", controller.server_line()));
    }

    /// Agent configuration for this directory, with geolocation disabled.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.device.base_dir = self.path().to_path_buf();
        config.geolocation.enabled = false;
        config
    }
}

/// Records every backoff delay instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper(pub Vec<Duration>);

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, delay: Duration) {
        self.0.push(delay);
    }
}

pub fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_secs).collect()
}

/// What the controller staples on a connection.
#[derive(Debug, Clone, Copy)]
pub enum Staple {
    Good,
    Expired,
    Revoked,
    Missing,
}

/// One scripted connection: the staple and the HTTP response.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub staple: Staple,
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Exchange {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            staple: Staple::Good,
            status,
            content_type: "application/json",
            body: body.to_string().into_bytes(),
        }
    }

    pub fn with_staple(mut self, staple: Staple) -> Self {
        self.staple = staple;
        self
    }

    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = content_type;
        self
    }
}

/// A request as the controller received it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
    pub client_cert: Option<CertificateDer<'static>>,
}

/// A TLS controller serving one scripted exchange per connection.
///
/// Runs on its own thread and runtime so the agent's blocking client can be
/// driven from a plain test.
pub struct MockController {
    addr: SocketAddr,
    handle: JoinHandle<Vec<Recorded>>,
}

impl MockController {
    pub fn start(pki: &TestPki, script: Vec<Exchange>) -> Self {
        let server = pki.issue("controller", &["127.0.0.1", "localhost"]);
        let provider = Arc::new(ring::default_provider());

        let mut roots = RootCertStore::empty();
        roots.add(pki.root.der().clone()).expect("add root");
        let client_verifier =
            WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
                .build()
                .expect("client verifier");

        // One server config per connection, each stapling its own response.
        let responder = pki.responder();
        let connections: Vec<(Arc<ServerConfig>, Exchange)> = script
            .into_iter()
            .map(|exchange| {
                let ocsp = staple_for(&responder, &server, exchange.staple);
                let config = ServerConfig::builder_with_provider(provider.clone())
                    .with_safe_default_protocol_versions()
                    .expect("protocol versions")
                    .with_client_cert_verifier(client_verifier.clone())
                    .with_single_cert_with_ocsp(vec![server.der()], server.private_key(), ocsp)
                    .expect("server config");
                (Arc::new(config), exchange)
            })
            .collect();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.set_nonblocking(true).expect("nonblocking listener");
        let addr = listener.local_addr().expect("local addr");
        let handle = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("controller runtime");
            runtime.block_on(async move {
                let listener = TcpListener::from_std(listener).expect("tokio listener");
                let mut recorded = Vec::with_capacity(connections.len());
                for (config, exchange) in connections {
                    recorded.push(serve_one(&listener, config, exchange).await);
                }
                recorded
            })
        });

        Self { addr, handle }
    }

    /// Content for the device's server file.
    pub fn server_line(&self) -> String {
        format!("127.0.0.1:{}", self.addr.port())
    }

    /// Waits for every scripted exchange and returns the requests.
    pub fn finish(self) -> Vec<Recorded> {
        self.handle.join().expect("controller thread")
    }
}

fn staple_for(responder: &OcspResponder, server: &Issued, staple: Staple) -> Vec<u8> {
    let statement = match staple {
        Staple::Good => Statement::good_for(Duration::from_secs(3600)),
        Staple::Expired => Statement::expired(RevocationStatus::Good, Duration::from_secs(60)),
        Staple::Revoked => Statement {
            status: RevocationStatus::Revoked,
            ..Statement::good_for(Duration::from_secs(3600))
        },
        Staple::Missing => return Vec::new(),
    };
    responder
        .respond(server.cert.der(), statement)
        .expect("ocsp response")
}

async fn serve_one(
    listener: &TcpListener,
    config: Arc<ServerConfig>,
    exchange: Exchange,
) -> Recorded {
    let (tcp, _) = listener.accept().await.expect("accept");
    let mut tls = TlsAcceptor::from(config)
        .accept(tcp)
        .await
        .expect("tls accept");
    let client_cert = tls
        .get_ref()
        .1
        .peer_certificates()
        .and_then(|certs| certs.first())
        .map(|cert| cert.clone().into_owned());

    let seen: Arc<Mutex<Option<(String, String, Vec<u8>)>>> = Arc::default();
    let slot = Arc::clone(&seen);
    let service = service_fn(move |request: Request<Incoming>| {
        let slot = Arc::clone(&slot);
        let exchange = exchange.clone();
        async move {
            let method = request.method().to_string();
            let path = request.uri().path().to_string();
            let body = request.into_body().collect().await?.to_bytes().to_vec();
            *slot.lock().expect("request slot") = Some((method, path, body));

            let response = Response::builder()
                .status(exchange.status)
                .header(CONTENT_TYPE, exchange.content_type)
                .body(Full::new(Bytes::from(exchange.body)))
                .expect("scripted response");
            Ok::<_, hyper::Error>(response)
        }
    });

    http1::Builder::new()
        .keep_alive(false)
        .serve_connection(TokioIo::new(&mut tls), service)
        .await
        .expect("serve exchange");

    // Wait for the client to hang up so the close is not a reset.
    let mut sink = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), tls.read_to_end(&mut sink)).await;

    let (method, path, body) = seen
        .lock()
        .expect("request slot")
        .take()
        .expect("controller received a request");
    Recorded {
        method,
        path,
        body,
        client_cert,
    }
}
