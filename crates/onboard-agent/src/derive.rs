//! Attestation and derivation of the persisted network configuration.
//!
//! Runs once per lookup, without network I/O. Outputs are written in a fixed
//! order: device UUID, endpoint map, client IP, then the artifact.

use crate::device_id;
use crate::error::FatalError;
use crate::layout::DeviceLayout;
use crate::nat;
use onboard_identity::{challenge, DeviceSigner};
use onboard_types::{
    AccessPolicy, AdditionalInfoDevice, DeviceIdentity, DeviceParameters, NameToEid,
    NetworkConfigArtifact, OverlayNetwork,
};
use std::fmt::Write as _;
use std::path::Path;

/// Everything derivation needs besides the parameters.
#[derive(Debug)]
pub struct Derivation<'a> {
    pub signer: &'a DeviceSigner,
    pub layout: &'a DeviceLayout,
    pub policy: AccessPolicy,
    pub additional_info: Option<AdditionalInfoDevice>,
}

/// What derivation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationOutcome {
    pub identity: DeviceIdentity,
    /// Base64 of the fixed-width `r || s` signature.
    pub signature: String,
    /// `None` when the client address could not be resolved.
    pub behind_nat: Option<bool>,
}

impl Derivation<'_> {
    /// Signs the challenge for `params` and writes every output file.
    pub fn derive_and_persist(
        &self,
        params: &DeviceParameters,
    ) -> Result<DerivationOutcome, FatalError> {
        let challenge = challenge(params.instance_id, &params.eid);
        let signature = self.signer.sign_challenge(&challenge)?.to_base64();
        tracing::debug!(%challenge, "signed attestation challenge");

        let identity = device_id::resolve_or_create(&self.layout.uuid)?;

        write_file(
            &self.layout.endpoint_map,
            format_endpoint_map(&params.directory.entries).as_bytes(),
        )?;

        let behind_nat = self.record_client_ip(&params.client_addr)?;

        let overlay = OverlayNetwork {
            instance_id: params.instance_id,
            eid: params.eid,
            signature: signature.clone(),
            additional_info: self.additional_info.clone(),
            name_to_eid: params.directory.entries.clone(),
            acls: vec![self.policy.entry()],
        };
        let artifact = NetworkConfigArtifact::for_manager(identity.clone(), overlay);
        write_file(
            &self.layout.network_config,
            &serde_json::to_vec(&artifact)?,
        )?;

        Ok(DerivationOutcome {
            identity,
            signature,
            behind_nat,
        })
    }

    fn record_client_ip(&self, client_addr: &str) -> Result<Option<bool>, FatalError> {
        let path = &self.layout.client_ip;
        match nat::resolve_client_addr(client_addr) {
            Ok(ip) => {
                let behind_nat = nat::is_behind_nat(ip, &nat::local_addresses());
                tracing::info!(client_ip = %ip, behind_nat, "controller-observed address");
                write_file(path, format!("{ip}\n").as_bytes())?;
                Ok(Some(behind_nat))
            }
            Err(e) => {
                tracing::warn!(client_addr, error = %e, "could not resolve client address");
                if std::fs::remove_file(path).is_ok() {
                    tracing::info!(path = %path.display(), "removed stale client address");
                }
                Ok(None)
            }
        }
    }
}

/// One line per `(EID, hostname)` pair, EID left-justified to 46 columns.
pub fn format_endpoint_map(entries: &[NameToEid]) -> String {
    let mut out = String::new();
    for entry in entries {
        for eid in &entry.eids {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "{:<46} {}", eid, entry.host_name);
        }
    }
    out
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), FatalError> {
    std::fs::write(path, contents).map_err(|source| FatalError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), bytes = contents.len(), "wrote file");
    Ok(())
}
