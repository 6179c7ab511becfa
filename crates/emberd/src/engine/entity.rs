/// Entity abstraction for emberd
///
/// Integrations expose their views (sensors, cameras) to the engine through
/// this trait rather than by subclassing anything host-side: an entity is an
/// adapter over the integration's own state.
pub trait Entity: Send + Sync {
    /// Stable entity identifier (e.g. "sensor.beijing_aqi")
    fn entity_id(&self) -> &str;

    /// Return the platform type of this entity (e.g. "sensor", "camera")
    fn platform(&self) -> &'static str;

    /// Serialize current state to JSON for Engine storage
    fn state_json(&self) -> serde_json::Value;
}
