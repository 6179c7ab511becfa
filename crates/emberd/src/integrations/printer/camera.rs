use serde_json::Value;
use serde_json::json;

use super::client::WebcamSettings;
use crate::engine::DeviceInfo;
use crate::engine::Entity;

/// MJPEG camera entity wrapping a printer controller's webcam stream.
///
/// Created at most once per entry, from a single settings fetch at setup;
/// the stream URL is exposed unchanged and never re-polled.
pub struct MjpegCamera {
    entity_id: String,
    name: String,
    stream_url: String,
    snapshot_url: Option<String>,
    device: DeviceInfo,
}

impl MjpegCamera {
    /// Build the camera entity if the descriptor allows one: the webcam
    /// must be enabled and carry a stream URL, otherwise no entity exists.
    pub fn from_settings(
        entry_id: &str,
        name: String,
        settings: &WebcamSettings,
        device: DeviceInfo,
    ) -> Option<Self> {
        if !settings.enabled {
            return None;
        }
        let stream_url = settings.stream_url.clone()?;

        Some(Self {
            entity_id: format!("camera.{}", entry_id),
            name,
            stream_url,
            snapshot_url: settings.snapshot_url.clone(),
            device,
        })
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }
}

impl Entity for MjpegCamera {
    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn platform(&self) -> &'static str {
        "camera"
    }

    fn state_json(&self) -> Value {
        json!({
            "platform": "camera",
            "name": self.name,
            "stream_url": self.stream_url,
            "snapshot_url": self.snapshot_url,
            "device": self.device,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceInfo {
        DeviceInfo::new("printer", "workshop", "Workshop printer".to_string())
    }

    #[test]
    fn test_disabled_webcam_creates_no_entity() {
        let settings = WebcamSettings {
            enabled: false,
            stream_url: Some("http://x/mjpg".to_string()),
            snapshot_url: None,
        };
        assert!(
            MjpegCamera::from_settings("workshop", "Camera".to_string(), &settings, device())
                .is_none()
        );
    }

    #[test]
    fn test_enabled_webcam_exposes_the_stream_url_unchanged() {
        let settings = WebcamSettings {
            enabled: true,
            stream_url: Some("http://x/mjpg".to_string()),
            snapshot_url: Some("http://x/snap".to_string()),
        };

        let camera =
            MjpegCamera::from_settings("workshop", "Camera".to_string(), &settings, device())
                .unwrap();
        assert_eq!(camera.entity_id(), "camera.workshop");
        assert_eq!(camera.stream_url(), "http://x/mjpg");

        let state = camera.state_json();
        assert_eq!(state["stream_url"], "http://x/mjpg");
        assert_eq!(state["snapshot_url"], "http://x/snap");
    }

    #[test]
    fn test_enabled_webcam_without_stream_url_creates_no_entity() {
        let settings = WebcamSettings {
            enabled: true,
            stream_url: None,
            snapshot_url: None,
        };
        assert!(
            MjpegCamera::from_settings("workshop", "Camera".to_string(), &settings, device())
                .is_none()
        );
    }
}
