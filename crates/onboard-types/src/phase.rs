//! Selection of the phases the agent runs.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One step of the onboarding pipeline.
///
/// The derived ordering is the execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Register the device certificate under the onboarding identity.
    SelfRegister,
    /// Fetch device parameters and derive the persisted configuration.
    LookupParam,
    /// Upload hardware status.
    UpdateHwStatus,
    /// Upload software status.
    UpdateSwStatus,
}

impl Phase {
    /// Kebab-case name used on the command line and in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfRegister => "self-register",
            Self::LookupParam => "lookup-param",
            Self::UpdateHwStatus => "update-hw-status",
            Self::UpdateSwStatus => "update-sw-status",
        }
    }

    /// Whether this phase authenticates with the device credential.
    pub fn uses_device_identity(self) -> bool {
        !matches!(self, Self::SelfRegister)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a phase name is not recognized.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown phase: {0}")]
pub struct PhaseParseError(pub String);

impl FromStr for Phase {
    type Err = PhaseParseError;

    /// Accepts both the kebab-case names and the camelCase names older
    /// provisioning scripts pass.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "self-register" | "selfRegister" => Ok(Self::SelfRegister),
            "lookup-param" | "lookupParam" => Ok(Self::LookupParam),
            "update-hw-status" | "updateHwStatus" => Ok(Self::UpdateHwStatus),
            "update-sw-status" | "updateSwStatus" => Ok(Self::UpdateSwStatus),
            other => Err(PhaseParseError(other.to_string())),
        }
    }
}

/// The set of phases selected for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSet(BTreeSet<Phase>);

impl PhaseSet {
    /// Builds a set from explicit phases. An empty input selects the default
    /// pair (register + lookup).
    pub fn from_phases(phases: impl IntoIterator<Item = Phase>) -> Self {
        let set: BTreeSet<Phase> = phases.into_iter().collect();
        if set.is_empty() {
            Self::default()
        } else {
            Self(set)
        }
    }

    pub fn contains(&self, phase: Phase) -> bool {
        self.0.contains(&phase)
    }

    /// Phases in execution order.
    pub fn iter(&self) -> impl Iterator<Item = Phase> + '_ {
        self.0.iter().copied()
    }

    /// Whether any selected phase needs the device credential.
    pub fn needs_device_identity(&self) -> bool {
        self.iter().any(Phase::uses_device_identity)
    }

    /// Whether additional device info should be collected.
    pub fn needs_additional_info(&self) -> bool {
        self.contains(Phase::LookupParam) || self.contains(Phase::UpdateHwStatus)
    }
}

impl Default for PhaseSet {
    fn default() -> Self {
        Self([Phase::SelfRegister, Phase::LookupParam].into_iter().collect())
    }
}

impl fmt::Display for PhaseSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Phase::as_str).collect();
        f.write_str(&names.join(","))
    }
}
