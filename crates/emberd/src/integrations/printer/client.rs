use async_trait::async_trait;
use serde_json::Value;

use crate::poll::FetchError;

/// Webcam descriptor reported by the printer controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebcamSettings {
    pub enabled: bool,
    pub stream_url: Option<String>,
    pub snapshot_url: Option<String>,
}

/// Trait for printer controller client operations
///
/// This trait allows for mocking the controller client for testing purposes
#[async_trait]
pub trait PrinterClient: Send + Sync {
    /// Fetch the webcam descriptor once. `None` when the controller has no
    /// webcam section at all.
    async fn webcam_settings(&self) -> Result<Option<WebcamSettings>, FetchError>;
}

/// Real client for an OctoPrint-compatible controller API
pub struct OctoPrintClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OctoPrintClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl PrinterClient for OctoPrintClient {
    async fn webcam_settings(&self) -> Result<Option<WebcamSettings>, FetchError> {
        let url = format!("{}/api/settings", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => {
                return Err(FetchError::Auth(format!(
                    "controller rejected API key ({})",
                    response.status()
                )));
            }
            429 => {
                return Err(FetchError::Quota("controller rate limit hit".to_string()));
            }
            s if !(200..300).contains(&s) => {
                return Err(FetchError::Unknown(format!(
                    "settings request failed with status {}",
                    response.status()
                )));
            }
            _ => {}
        }

        let body: Value = response.json().await?;
        Ok(parse_webcam_settings(&self.base_url, &body))
    }
}

/// Pull the webcam section out of a controller settings document.
fn parse_webcam_settings(base_url: &str, body: &Value) -> Option<WebcamSettings> {
    let webcam = body.get("webcam")?;
    Some(WebcamSettings {
        enabled: webcam
            .get("webcamEnabled")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        stream_url: webcam
            .get("streamUrl")
            .and_then(|v| v.as_str())
            .map(|u| resolve_url(base_url, u)),
        snapshot_url: webcam
            .get("snapshotUrl")
            .and_then(|v| v.as_str())
            .map(|u| resolve_url(base_url, u)),
    })
}

/// Controllers commonly report webcam URLs relative to their own host
/// (e.g. "/webcam/?action=stream"); resolve those against the base URL.
fn resolve_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if url.starts_with('/') {
        format!("{}{}", base_url, url)
    } else {
        format!("{}/{}", base_url, url)
    }
}
