//! Shared wire and artifact types for the onboarding agent.
//!
//! This crate holds the data exchanged with the controller (registration
//! payload, device parameters, additional device info), the network
//! configuration artifact consumed by the local router agent, and the phase
//! selection passed to the agent at startup.
//!
//! Field names on the wire are PascalCase and fixed by the controller and the
//! downstream agents; the Rust names are free to differ.

pub mod artifact;
pub mod phase;
pub mod wire;

pub use artifact::{
    AccessControlEntry, AccessPolicy, AceAction, AceMatch, DeviceIdentity, NetworkConfigArtifact,
    OverlayNetwork, MANAGER_DISPLAY_NAME,
};
pub use phase::{Phase, PhaseParseError, PhaseSet};
pub use wire::{
    AdditionalInfoDevice, DeviceParameters, EndpointDirectory, MapServer, NameToEid,
    RegistrationRequest,
};

/// Fixed controller paths.
pub mod paths {
    /// POST target for device certificate self-registration.
    pub const SELF_REGISTER: &str = "/rest/self-register";
    /// GET target for per-device parameters.
    pub const DEVICE_PARAM: &str = "/rest/device-param";
    /// POST target for hardware status uploads.
    pub const UPDATE_HW_STATUS: &str = "/rest/update-hw-status";
    /// POST target for software status uploads.
    pub const UPDATE_SW_STATUS: &str = "/rest/update-sw-status";
}

/// The only media type the controller is allowed to answer with.
pub const JSON_MEDIA_TYPE: &str = "application/json";
