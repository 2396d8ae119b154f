//! One authenticated request to the controller.
//!
//! A response only counts once every gate has passed, in this order: the
//! request went through, a handshake was recorded, the stapled revocation
//! response says good, the body was read, the status is accepted, and the
//! content type is JSON.

use crate::endpoint::ServerEndpoint;
use crate::error::{AttemptError, FatalError};
use crate::tls::{client_config, HandshakeRecorder};
use onboard_identity::{Credential, TrustAnchor};
use onboard_revocation::{RevocationStatus, RevocationValidator};
use onboard_types::JSON_MEDIA_TYPE;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// HTTPS client bound to one controller and one client credential.
#[derive(Debug)]
pub struct ControllerClient {
    http: Client,
    endpoint: ServerEndpoint,
    recorder: HandshakeRecorder,
    validator: RevocationValidator,
}

impl ControllerClient {
    /// Builds a client presenting `credential`.
    ///
    /// Connections are not kept alive between requests, so every request
    /// performs a full handshake with a fresh stapled response. No per-request
    /// timeout is set.
    pub fn new(
        credential: &Credential,
        anchor: &TrustAnchor,
        endpoint: ServerEndpoint,
    ) -> Result<Self, FatalError> {
        let recorder = HandshakeRecorder::default();
        let tls = client_config(credential, anchor, recorder.clone()).map_err(FatalError::TlsSetup)?;
        let http = Client::builder()
            .use_preconfigured_tls(tls)
            .pool_max_idle_per_host(0)
            .timeout(None::<Duration>)
            .no_proxy()
            .build()
            .map_err(|e| FatalError::TlsSetup(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            recorder,
            validator: RevocationValidator::default(),
        })
    }

    pub fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    /// GETs `path` and returns the body if the status is in `accepted`.
    pub fn get(&self, path: &str, accepted: &[u16]) -> Result<Vec<u8>, AttemptError> {
        self.send(self.http.get(self.endpoint.url(path)), accepted)
    }

    /// POSTs `body` as JSON to `path` and returns the response body if the
    /// status is in `accepted`.
    pub fn post_json(
        &self,
        path: &str,
        body: Vec<u8>,
        accepted: &[u16],
    ) -> Result<Vec<u8>, AttemptError> {
        let request = self
            .http
            .post(self.endpoint.url(path))
            .header(CONTENT_TYPE, JSON_MEDIA_TYPE)
            .body(body);
        self.send(request, accepted)
    }

    fn send(&self, request: RequestBuilder, accepted: &[u16]) -> Result<Vec<u8>, AttemptError> {
        self.recorder.clear();
        let response = request.send().map_err(AttemptError::Transport)?;

        let session = self.recorder.take().ok_or(AttemptError::NoHandshake)?;
        match self.validator.validate(&session) {
            RevocationStatus::Good => {}
            status => return Err(AttemptError::Revocation(status)),
        }

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();
        let body = response.bytes().map_err(AttemptError::Body)?.to_vec();

        if !accepted.contains(&status) {
            let body = String::from_utf8_lossy(&body).into_owned();
            return Err(if status == 409 {
                AttemptError::Conflict { body }
            } else {
                AttemptError::Status { status, body }
            });
        }
        if !is_json(&content_type) {
            return Err(AttemptError::ContentType(content_type));
        }
        Ok(body)
    }
}

/// Whether a Content-Type header value names JSON, ignoring parameters.
fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|essence| essence.eq_ignore_ascii_case(JSON_MEDIA_TYPE))
}
