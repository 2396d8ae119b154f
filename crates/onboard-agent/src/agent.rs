//! The onboarding pipeline.

use crate::config::Config;
use crate::derive::{Derivation, DerivationOutcome};
use crate::endpoint::ServerEndpoint;
use crate::error::FatalError;
use crate::layout::DeviceLayout;
use crate::retry::{RetryExecutor, Sleeper};
use crate::transport::ControllerClient;
use crate::{geo, lookup, register, status};
use onboard_identity::{
    load_certificate_pem, load_credential, load_trust_anchor, Credential, DeviceSigner,
};
use onboard_types::{AccessPolicy, DeviceParameters, Phase, PhaseSet};

/// Which phases completed, and what they produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub registered: bool,
    pub parameters: Option<DeviceParameters>,
    pub derivation: Option<DerivationOutcome>,
    pub hw_status_uploaded: bool,
    pub sw_status_uploaded: bool,
}

/// Runs the selected phases against the controller.
#[derive(Debug)]
pub struct Agent<S> {
    config: Config,
    layout: DeviceLayout,
    phases: PhaseSet,
    executor: RetryExecutor<S>,
}

/// Material loaded before any network I/O.
struct Loaded {
    onboarding: Option<(ControllerClient, Vec<u8>)>,
    device: Option<(ControllerClient, Credential)>,
}

impl<S: Sleeper> Agent<S> {
    pub fn new(config: Config, phases: PhaseSet, sleeper: S) -> Self {
        let layout = DeviceLayout::new(config.device.base_dir.clone(), &config.files);
        let executor = RetryExecutor::from_config(&config.retry, sleeper);
        Self {
            config,
            layout,
            phases,
            executor,
        }
    }

    /// Runs every selected phase in order.
    ///
    /// Returns only once each phase has succeeded, or with the first fatal
    /// error. Files written before a fatal error are left in place.
    pub fn run(&mut self) -> Result<RunSummary, FatalError> {
        tracing::info!(
            base_dir = %self.layout.base_dir().display(),
            phases = %self.phases,
            "starting onboarding"
        );

        let policy = AccessPolicy::from_marker(self.layout.promiscuous_marker.exists());
        tracing::info!(?policy, "access policy selected");
        let loaded = self.load()?;
        let mut summary = RunSummary::default();

        if let Some((client, device_pem)) = &loaded.onboarding {
            tracing::info!(phase = %Phase::SelfRegister, "phase started");
            register::self_register(&mut self.executor, client, device_pem)?;
            summary.registered = true;
        }

        let additional_info = if self.phases.needs_additional_info() {
            geo::lookup_additional_info(&self.config.geolocation)
        } else {
            None
        };

        let Some((client, credential)) = &loaded.device else {
            return Ok(summary);
        };

        if self.phases.contains(Phase::LookupParam) {
            tracing::info!(phase = %Phase::LookupParam, "phase started");
            let params = lookup::lookup_parameters(&mut self.executor, client);
            let signer = DeviceSigner::from_private_key(credential.private_key())?;
            let outcome = Derivation {
                signer: &signer,
                layout: &self.layout,
                policy,
                additional_info: additional_info.clone(),
            }
            .derive_and_persist(&params)?;
            tracing::info!(uuid = %outcome.identity.uuid, "network configuration written");
            summary.parameters = Some(params);
            summary.derivation = Some(outcome);
        }

        if self.phases.contains(Phase::UpdateHwStatus) {
            tracing::info!(phase = %Phase::UpdateHwStatus, "phase started");
            let body = status::hw_status_body(&self.layout.hw_status, additional_info.as_ref())?;
            status::upload_hw_status(&mut self.executor, client, &body);
            summary.hw_status_uploaded = true;
        }

        if self.phases.contains(Phase::UpdateSwStatus) {
            tracing::info!(phase = %Phase::UpdateSwStatus, "phase started");
            let body = status::sw_status_body(&self.layout.sw_status)?;
            status::upload_sw_status(&mut self.executor, client, &body);
            summary.sw_status_uploaded = true;
        }

        tracing::info!("onboarding finished");
        Ok(summary)
    }

    fn load(&self) -> Result<Loaded, FatalError> {
        let anchor = load_trust_anchor(&self.layout.root_cert)?;
        let endpoint = ServerEndpoint::load(&self.layout.server)?;

        let onboarding = if self.phases.contains(Phase::SelfRegister) {
            let credential = load_credential(&self.layout.onboard)?;
            let device_pem = load_certificate_pem(&self.layout.device.cert)?;
            let client = ControllerClient::new(&credential, &anchor, endpoint.clone())?;
            Some((client, device_pem))
        } else {
            None
        };

        let device = if self.phases.needs_device_identity() {
            let credential = load_credential(&self.layout.device)?;
            let client = ControllerClient::new(&credential, &anchor, endpoint)?;
            Some((client, credential))
        } else {
            None
        };

        Ok(Loaded { onboarding, device })
    }
}

