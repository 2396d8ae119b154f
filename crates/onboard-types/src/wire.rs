//! Payloads exchanged with the controller.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Body of a self-registration request.
///
/// The certificate is the raw PEM file content; on the wire it is carried as
/// a standard base64 string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    #[serde(rename = "PemCert", with = "base64_bytes")]
    pub pem_cert: Vec<u8>,
}

impl RegistrationRequest {
    /// Wraps the PEM bytes of the device certificate.
    pub fn new(pem_cert: impl Into<Vec<u8>>) -> Self {
        Self {
            pem_cert: pem_cert.into(),
        }
    }
}

/// Per-device parameters returned by the controller's parameter lookup.
///
/// Only `EID` is mandatory; every other field defaults when absent or `null`.
/// Unknown fields are ignored so that controller-side additions do not break
/// older agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceParameters {
    /// Overlay instance identifier.
    #[serde(rename = "LispInstance", default)]
    pub instance_id: u32,

    /// Endpoint identifier assigned to this device.
    #[serde(rename = "EID")]
    pub eid: IpAddr,

    /// Number of hash bits embedded in the EID.
    #[serde(rename = "EIDHashLen", default)]
    pub eid_hash_len: u8,

    /// Hostname to EID mappings for controller-side services.
    #[serde(rename = "ZedServers", default, deserialize_with = "null_as_default")]
    pub directory: EndpointDirectory,

    /// The address the controller observed this device connecting from, as
    /// `ip:port`.
    #[serde(rename = "ClientAddr", default)]
    pub client_addr: String,

    /// Identity the controller associates with this device.
    #[serde(rename = "UserName", default)]
    pub user_name: String,

    /// Map servers and their credentials.
    #[serde(
        rename = "LispMapServers",
        default,
        deserialize_with = "null_as_default"
    )]
    pub map_servers: Vec<MapServer>,
}

/// Collection of named endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDirectory {
    #[serde(
        rename = "NameToEidList",
        default,
        deserialize_with = "null_as_default"
    )]
    pub entries: Vec<NameToEid>,
}

/// One hostname and the EIDs it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameToEid {
    #[serde(rename = "HostName")]
    pub host_name: String,

    #[serde(rename = "EIDs", default, deserialize_with = "null_as_default")]
    pub eids: Vec<IpAddr>,
}

/// A map server entry. The credential never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapServer {
    #[serde(rename = "NameOrIp", default)]
    pub name_or_ip: String,

    #[serde(rename = "Credential", default)]
    pub credential: String,
}

impl fmt::Debug for MapServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapServer")
            .field("name_or_ip", &self.name_or_ip)
            .field("credential", &"[REDACTED]")
            .finish()
    }
}

/// Location and network details about the device's underlay, obtained from a
/// public IP information service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalInfoDevice {
    #[serde(rename = "UnderlayIP", default)]
    pub underlay_ip: String,
    #[serde(rename = "Hostname", default)]
    pub hostname: String,
    #[serde(rename = "City", default)]
    pub city: String,
    #[serde(rename = "Region", default)]
    pub region: String,
    #[serde(rename = "Country", default)]
    pub country: String,
    #[serde(rename = "Loc", default)]
    pub loc: String,
    #[serde(rename = "Org", default)]
    pub org: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}
