//! Type-safe message system for emberd
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug, Clone)]
pub enum FromIntegrationMessage {
    /// An entity was discovered and registered
    EntityDiscovered {
        entity_id: String,
        integration_name: String,
        platform: &'static str,
    },

    /// An entity's state changed; `state` is the entity's serialized view
    EntityStateChanged {
        entity_id: String,
        state: serde_json::Value,
    },

    /// A steady-state poll cycle failed. Non-fatal: previously reported
    /// entity state is left untouched.
    PollFailed {
        integration_name: String,
        error: String,
    },
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone)]
pub enum ToIntegrationMessage {
    /// Request one out-of-schedule poll cycle
    Refresh,
}
