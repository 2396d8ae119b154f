//! Self-registration of the device certificate under the onboarding identity.

use crate::error::{AttemptError, FatalError};
use crate::retry::{RetryExecutor, Sleeper};
use crate::transport::ControllerClient;
use onboard_types::{paths, RegistrationRequest};

const ACCEPTED: &[u16] = &[200, 201];

/// One registration attempt with an already encoded request body.
pub fn register_once(client: &ControllerClient, body: &[u8]) -> Result<(), AttemptError> {
    client.post_json(paths::SELF_REGISTER, body.to_vec(), ACCEPTED)?;
    Ok(())
}

/// Registers `device_pem` and retries until the controller accepts it.
///
/// A 409 from the controller is retried like any other failure.
pub fn self_register<S: Sleeper>(
    executor: &mut RetryExecutor<S>,
    client: &ControllerClient,
    device_pem: &[u8],
) -> Result<(), FatalError> {
    let body = serde_json::to_vec(&RegistrationRequest::new(device_pem))?;
    tracing::info!(server = %client.endpoint(), "registering device certificate");
    executor.execute("self-register", || register_once(client, &body));
    Ok(())
}
