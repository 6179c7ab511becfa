use std::collections::HashMap;

use serde::Serialize;

/// Serialized state of one entity as reported by its integration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    /// Platform type ("sensor", "camera", ...)
    pub platform: String,

    /// Entity-specific state document (value, unit, URLs, device metadata)
    pub state: serde_json::Value,
}

/// Centralized snapshot of the entire engine state.
///
/// Readers load the whole snapshot; the engine replaces it wholesale on
/// every update.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    pub entities: HashMap<String, EntityState>,
}
