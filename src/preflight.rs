//! Reachability check for the site under test, run once before capturing.

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{Result, VrcError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreflightStatus {
    Reachable(u16),
    /// The server answered with a non-success status.
    Unhealthy(u16),
    Unreachable(String),
}

/// GETs `base_url`. Problems are logged as warnings; only an invalid client
/// configuration is an error.
pub async fn check_base_url(base_url: &str, timeout: Duration) -> Result<PreflightStatus> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(VrcError::Network)?;

    let status = match client.get(base_url).send().await {
        Ok(response) if response.status().is_success() => {
            PreflightStatus::Reachable(response.status().as_u16())
        }
        Ok(response) => PreflightStatus::Unhealthy(response.status().as_u16()),
        Err(err) => PreflightStatus::Unreachable(err.to_string()),
    };

    match &status {
        PreflightStatus::Reachable(code) => debug!(base_url, code, "site under test is reachable"),
        PreflightStatus::Unhealthy(code) => {
            warn!(base_url, code, "site under test answered with a non-success status")
        }
        PreflightStatus::Unreachable(reason) => {
            warn!(base_url, %reason, "site under test is unreachable; captures will likely fail")
        }
    }
    Ok(status)
}
