use async_trait::async_trait;
use serde_json::Value;

use crate::poll::FetchError;

/// A station returned by a keyword search.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub uid: i64,
    pub name: String,
}

/// Trait for air-quality vendor client operations
///
/// This trait allows for mocking the vendor client for testing purposes
#[async_trait]
pub trait AirQualityClient: Send + Sync {
    /// Fetch the latest feed for a station. Returns the feed's data object.
    async fn feed(&self, station_id: i64) -> Result<Value, FetchError>;

    /// Search stations by keyword.
    async fn search(&self, keyword: &str) -> Result<Vec<Station>, FetchError>;
}

/// Real client for the World Air Quality Index HTTP API
pub struct WaqiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

const DEFAULT_BASE_URL: &str = "https://api.waqi.info";

impl WaqiClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(token: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            token,
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .query(query)
            .send()
            .await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl AirQualityClient for WaqiClient {
    async fn feed(&self, station_id: i64) -> Result<Value, FetchError> {
        let body = self
            .get_json(&format!("/feed/@{}/", station_id), &[])
            .await?;
        parse_feed_response(body)
    }

    async fn search(&self, keyword: &str) -> Result<Vec<Station>, FetchError> {
        let body = self.get_json("/search/", &[("keyword", keyword)]).await?;
        parse_search_response(body)
    }
}

/// Unwrap the vendor's `{status, data}` envelope into the data object.
fn parse_feed_response(body: Value) -> Result<Value, FetchError> {
    match body.get("status").and_then(|s| s.as_str()) {
        Some("ok") => body
            .get("data")
            .cloned()
            .ok_or_else(|| FetchError::Unknown("response missing data".to_string())),
        Some("error") => Err(classify_vendor_error(&body)),
        _ => Err(FetchError::Unknown("malformed vendor response".to_string())),
    }
}

fn parse_search_response(body: Value) -> Result<Vec<Station>, FetchError> {
    let data = parse_feed_response(body)?;
    let entries = data
        .as_array()
        .ok_or_else(|| FetchError::Unknown("search data is not an array".to_string()))?;

    let stations = entries
        .iter()
        .filter_map(|entry| {
            let uid = entry.get("uid")?.as_i64()?;
            let name = entry.get("station")?.get("name")?.as_str()?.to_string();
            Some(Station { uid, name })
        })
        .collect();
    Ok(stations)
}

/// Map the vendor's error strings onto the fetch taxonomy.
///
/// The WAQI API reports errors as `{"status": "error", "data": "<message>"}`
/// with well-known message strings.
fn classify_vendor_error(body: &Value) -> FetchError {
    let message = body
        .get("data")
        .and_then(|d| d.as_str())
        .or_else(|| body.get("message").and_then(|m| m.as_str()))
        .unwrap_or("unspecified vendor error")
        .to_string();

    let lowered = message.to_lowercase();
    if lowered.contains("invalid key") || lowered.contains("invalid token") {
        FetchError::Auth(message)
    } else if lowered.contains("quota") {
        FetchError::Quota(message)
    } else if lowered.contains("unknown station") || lowered.contains("unknown id") {
        FetchError::NotFound(message)
    } else {
        FetchError::Unknown(message)
    }
}
