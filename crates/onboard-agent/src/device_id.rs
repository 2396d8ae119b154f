//! The persisted device UUID.

use crate::error::FatalError;
use onboard_types::DeviceIdentity;
use std::io::ErrorKind;
use std::path::Path;
use uuid::Uuid;

/// Reads the UUID stored at `path`, or generates and stores a new one.
///
/// A newly generated UUID is written before the caller writes anything else,
/// so it survives a crash later in the run. An existing file that does not
/// hold a UUID is fatal; it is never replaced.
pub fn resolve_or_create(path: &Path) -> Result<DeviceIdentity, FatalError> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let uuid = Uuid::parse_str(text.trim()).map_err(|e| FatalError::CorruptDeviceId {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            tracing::info!(%uuid, "reusing persisted device UUID");
            Ok(DeviceIdentity::initial(uuid))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            let uuid = Uuid::new_v4();
            std::fs::write(path, format!("{uuid}\n")).map_err(|source| FatalError::Write {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!(%uuid, path = %path.display(), "created device UUID");
            Ok(DeviceIdentity::initial(uuid))
        }
        Err(source) => Err(FatalError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
