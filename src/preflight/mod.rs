use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;

/// Startup connectivity failures. Any of these stops the bot from starting.
#[derive(thiserror::Error, Debug)]
pub enum PreflightError {
    #[error("no network connection: {address} unreachable ({reason})")]
    NetworkUnreachable { address: String, reason: String },

    #[error("{url} is not reachable: {reason}")]
    ApiUnreachable { url: String, reason: String },

    #[error("{url} answered with HTTP {status}")]
    ApiStatus { url: String, status: u16 },
}

/// Targets and bounds for the startup probes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreflightConfig {
    /// Well-known public address for the TCP reachability probe
    pub probe_address: String,

    /// TCP probe timeout in seconds
    pub probe_timeout_secs: u64,

    /// Messaging platform API root for the HTTP probe
    pub api_url: String,

    /// HTTP probe timeout in seconds
    pub api_timeout_secs: u64,
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            probe_address: "8.8.8.8:53".to_string(),
            probe_timeout_secs: 3,
            api_url: "https://api.telegram.org".to_string(),
            api_timeout_secs: 5,
        }
    }
}

/// Check low-level reachability by opening a TCP connection
pub async fn check_network(address: &str, timeout: Duration) -> Result<(), PreflightError> {
    let unreachable = |reason: String| PreflightError::NetworkUnreachable {
        address: address.to_string(),
        reason,
    };

    match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => {
            tracing::info!("Internet connection is available");
            Ok(())
        }
        Ok(Err(e)) => Err(unreachable(e.to_string())),
        Err(_) => Err(unreachable(format!("timed out after {}s", timeout.as_secs()))),
    }
}

/// Check that the messaging API root answers `200 OK`
pub async fn check_api(url: &str, timeout: Duration) -> Result<(), PreflightError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PreflightError::ApiUnreachable {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PreflightError::ApiUnreachable {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(PreflightError::ApiStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    tracing::info!("{} is accessible", url);
    Ok(())
}

/// Run both probes in order; the first failure aborts
pub async fn run(config: &PreflightConfig) -> Result<(), PreflightError> {
    check_network(&config.probe_address, Duration::from_secs(config.probe_timeout_secs)).await?;
    check_api(&config.api_url, Duration::from_secs(config.api_timeout_secs)).await?;
    Ok(())
}
