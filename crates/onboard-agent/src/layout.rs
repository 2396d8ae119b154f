//! Absolute paths of the device's persisted files.

use crate::config::FileNames;
use onboard_identity::CredentialPaths;
use std::path::{Path, PathBuf};

/// Every file the agent touches, resolved against the base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLayout {
    base_dir: PathBuf,
    pub onboard: CredentialPaths,
    pub device: CredentialPaths,
    pub root_cert: PathBuf,
    pub server: PathBuf,
    pub promiscuous_marker: PathBuf,
    pub endpoint_map: PathBuf,
    pub network_config: PathBuf,
    pub uuid: PathBuf,
    pub client_ip: PathBuf,
    pub hw_status: PathBuf,
    pub sw_status: PathBuf,
}

impl DeviceLayout {
    pub fn new(base_dir: impl Into<PathBuf>, names: &FileNames) -> Self {
        let base_dir = base_dir.into();
        let at = |name: &str| base_dir.join(name);
        Self {
            onboard: CredentialPaths::new(at(&names.onboard_cert), at(&names.onboard_key)),
            device: CredentialPaths::new(at(&names.device_cert), at(&names.device_key)),
            root_cert: at(&names.root_cert),
            server: at(&names.server),
            promiscuous_marker: at(&names.promiscuous_marker),
            endpoint_map: at(&names.endpoint_map),
            network_config: at(&names.network_config),
            uuid: at(&names.uuid),
            client_ip: at(&names.client_ip),
            hw_status: at(&names.hw_status),
            sw_status: at(&names.sw_status),
            base_dir,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}
