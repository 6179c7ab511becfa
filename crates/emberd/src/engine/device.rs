use serde::Serialize;

/// A device in the emberd system.
///
/// A device represents a physical or logical device that one or more
/// entities attach to. The engine treats it as an opaque pass-through value
/// embedded in each entity's serialized state.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    /// (domain, id) pairs identifying the device
    pub identifiers: Vec<(String, String)>,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,

    /// "service" for devices that are remote services rather than hardware
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<&'static str>,
}

impl DeviceInfo {
    pub fn new(domain: &str, id: &str, name: String) -> Self {
        Self {
            identifiers: vec![(domain.to_string(), id.to_string())],
            name,
            manufacturer: None,
            model: None,
            sw_version: None,
            entry_type: None,
        }
    }

    pub fn service(domain: &str, id: &str, name: String) -> Self {
        Self {
            entry_type: Some("service"),
            ..Self::new(domain, id, name)
        }
    }
}
