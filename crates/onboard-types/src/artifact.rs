//! The network configuration artifact handed to the local router agent.

use crate::wire::{AdditionalInfoDevice, NameToEid};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

/// Display name of the management application the artifact configures.
pub const MANAGER_DISPLAY_NAME: &str = "zedmanager";

/// Persistent identity of this device: a UUID plus a configuration version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    #[serde(rename = "UUID")]
    pub uuid: Uuid,
    #[serde(rename = "Version")]
    pub version: String,
}

impl DeviceIdentity {
    /// Identity at the initial configuration version.
    pub fn initial(uuid: Uuid) -> Self {
        Self {
            uuid,
            version: "0".to_string(),
        }
    }
}

/// Which access-control rule the overlay gets.
///
/// Decided once per run from the presence of the promiscuous marker file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Accept traffic from any IPv6 source.
    Promiscuous,
    /// Accept traffic only from the controller-provided endpoint set.
    EndpointSet,
}

impl AccessPolicy {
    /// Picks the policy from the marker file's presence.
    pub fn from_marker(present: bool) -> Self {
        if present {
            Self::Promiscuous
        } else {
            Self::EndpointSet
        }
    }

    /// The single access-control entry for this policy.
    pub fn entry(self) -> AccessControlEntry {
        let matcher = match self {
            Self::Promiscuous => AceMatch {
                match_type: "ip".to_string(),
                value: "::/0".to_string(),
            },
            Self::EndpointSet => AceMatch {
                match_type: "eidset".to_string(),
                value: String::new(),
            },
        };
        AccessControlEntry {
            matches: vec![matcher],
            actions: vec![AceAction::default()],
        }
    }
}

/// Top-level document written for the router agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfigArtifact {
    #[serde(rename = "UUIDandVersion")]
    pub identity: DeviceIdentity,
    #[serde(rename = "DisplayName")]
    pub display_name: String,
    #[serde(rename = "IsZedmanager")]
    pub is_manager: bool,
    #[serde(rename = "OverlayNetworkList")]
    pub overlays: Vec<OverlayNetwork>,
}

impl NetworkConfigArtifact {
    /// Builds the management application's artifact around a single overlay.
    pub fn for_manager(identity: DeviceIdentity, overlay: OverlayNetwork) -> Self {
        Self {
            identity,
            display_name: MANAGER_DISPLAY_NAME.to_string(),
            is_manager: true,
            overlays: vec![overlay],
        }
    }
}

/// Overlay network attachment for the device's EID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayNetwork {
    #[serde(rename = "IID")]
    pub instance_id: u32,
    #[serde(rename = "EID")]
    pub eid: IpAddr,
    /// Base64 of the challenge signature.
    #[serde(rename = "LispSignature")]
    pub signature: String,
    #[serde(rename = "AdditionalInfoDevice")]
    pub additional_info: Option<AdditionalInfoDevice>,
    #[serde(rename = "NameToEidList")]
    pub name_to_eid: Vec<NameToEid>,
    #[serde(rename = "ACLs")]
    pub acls: Vec<AccessControlEntry>,
}

/// An access-control entry: all matches must hold, then all actions apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlEntry {
    #[serde(rename = "Matches")]
    pub matches: Vec<AceMatch>,
    #[serde(rename = "Actions")]
    pub actions: Vec<AceAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AceMatch {
    #[serde(rename = "Type")]
    pub match_type: String,
    #[serde(rename = "Value")]
    pub value: String,
}

/// Action applied on match. The default value means "allow".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AceAction {
    #[serde(rename = "Drop", default)]
    pub drop: bool,
    #[serde(rename = "Limit", default)]
    pub limit: bool,
    #[serde(rename = "LimitRate", default)]
    pub limit_rate: i32,
    #[serde(rename = "LimitUnit", default)]
    pub limit_unit: String,
    #[serde(rename = "LimitBurst", default)]
    pub limit_burst: i32,
    #[serde(rename = "PortMap", default)]
    pub port_map: bool,
    #[serde(rename = "TargetPort", default)]
    pub target_port: i32,
}
