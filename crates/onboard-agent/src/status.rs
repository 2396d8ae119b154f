//! Hardware and software status uploads.
//!
//! Both documents are produced by other agents. The hardware status gets the
//! additional device info injected; the software status is forwarded as is.

use crate::error::{AttemptError, FatalError};
use crate::retry::{RetryExecutor, Sleeper};
use crate::transport::ControllerClient;
use onboard_types::{paths, AdditionalInfoDevice};
use std::path::Path;

const ADDITIONAL_INFO_KEY: &str = "AdditionalInfoDevice";

/// Builds the hardware status body from the file at `path`.
///
/// The file must hold a JSON object.
pub fn hw_status_body(
    path: &Path,
    additional_info: Option<&AdditionalInfoDevice>,
) -> Result<Vec<u8>, FatalError> {
    let raw = read_status(path)?;
    let mut document: serde_json::Value =
        serde_json::from_slice(&raw).map_err(|e| FatalError::StatusDocument {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let object = document
        .as_object_mut()
        .ok_or_else(|| FatalError::StatusDocument {
            path: path.to_path_buf(),
            reason: "not a JSON object".to_string(),
        })?;
    if let Some(info) = additional_info {
        object.insert(ADDITIONAL_INFO_KEY.to_string(), serde_json::to_value(info)?);
    }
    Ok(serde_json::to_vec(&document)?)
}

/// Reads the software status bytes from `path`.
pub fn sw_status_body(path: &Path) -> Result<Vec<u8>, FatalError> {
    read_status(path)
}

/// POSTs `body` to `target` until the controller answers 200.
pub fn upload<S: Sleeper>(
    executor: &mut RetryExecutor<S>,
    client: &ControllerClient,
    label: &str,
    target: &str,
    body: &[u8],
) {
    tracing::info!(operation = label, bytes = body.len(), "uploading status");
    executor.execute(label, || upload_once(client, target, body));
}

fn upload_once(client: &ControllerClient, target: &str, body: &[u8]) -> Result<(), AttemptError> {
    client.post_json(target, body.to_vec(), &[200])?;
    Ok(())
}

/// Uploads the hardware status.
pub fn upload_hw_status<S: Sleeper>(
    executor: &mut RetryExecutor<S>,
    client: &ControllerClient,
    body: &[u8],
) {
    upload(executor, client, "update-hw-status", paths::UPDATE_HW_STATUS, body);
}

/// Uploads the software status.
pub fn upload_sw_status<S: Sleeper>(
    executor: &mut RetryExecutor<S>,
    client: &ControllerClient,
    body: &[u8],
) {
    upload(executor, client, "update-sw-status", paths::UPDATE_SW_STATUS, body);
}

fn read_status(path: &Path) -> Result<Vec<u8>, FatalError> {
    std::fs::read(path).map_err(|source| FatalError::Read {
        path: path.to_path_buf(),
        source,
    })
}
