//! Retrieval of the per-device parameters.

use crate::error::AttemptError;
use crate::retry::{RetryExecutor, Sleeper};
use crate::transport::ControllerClient;
use onboard_types::{paths, DeviceParameters};

/// One lookup attempt. A body that does not decode is retryable.
pub fn lookup_once(client: &ControllerClient) -> Result<DeviceParameters, AttemptError> {
    let body = client.get(paths::DEVICE_PARAM, &[200])?;
    serde_json::from_slice(&body).map_err(AttemptError::Decode)
}

/// Fetches the device parameters, retrying until they arrive.
pub fn lookup_parameters<S: Sleeper>(
    executor: &mut RetryExecutor<S>,
    client: &ControllerClient,
) -> DeviceParameters {
    let params = executor.execute("lookup-param", || lookup_once(client));
    tracing::info!(
        user = %params.user_name,
        instance_id = params.instance_id,
        eid = %params.eid,
        eid_hash_len = params.eid_hash_len,
        endpoints = params.directory.entries.len(),
        map_servers = params.map_servers.len(),
        "received device parameters"
    );
    params
}
