//! Public IP information for the additional device info record.

use crate::config::GeolocationConfig;
use onboard_types::AdditionalInfoDevice;
use serde::Deserialize;
use std::time::Duration;

/// Response of an ipinfo-compatible service.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IpInfo {
    ip: String,
    hostname: String,
    city: String,
    region: String,
    country: String,
    loc: String,
    org: String,
}

impl From<IpInfo> for AdditionalInfoDevice {
    fn from(info: IpInfo) -> Self {
        Self {
            underlay_ip: info.ip,
            hostname: info.hostname,
            city: info.city,
            region: info.region,
            country: info.country,
            loc: info.loc,
            org: info.org,
        }
    }
}

/// Queries the configured service once. Any failure is logged and yields
/// `None`.
pub fn lookup_additional_info(config: &GeolocationConfig) -> Option<AdditionalInfoDevice> {
    if !config.enabled {
        return None;
    }
    match fetch(config) {
        Ok(info) => {
            tracing::info!(
                underlay_ip = %info.underlay_ip,
                city = %info.city,
                country = %info.country,
                "collected additional device info"
            );
            Some(info)
        }
        Err(e) => {
            tracing::warn!(url = %config.url, error = %e, "additional device info unavailable");
            None
        }
    }
}

fn fetch(config: &GeolocationConfig) -> Result<AdditionalInfoDevice, reqwest::Error> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    let info: IpInfo = client
        .get(&config.url)
        .header(reqwest::header::ACCEPT, onboard_types::JSON_MEDIA_TYPE)
        .send()?
        .error_for_status()?
        .json()?;
    Ok(info.into())
}
