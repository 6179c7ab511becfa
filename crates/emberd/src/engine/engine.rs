use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::Integration;
use super::integration::IntegrationContext;
use super::integration::ToIntegrationSender;
use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use super::state::EntityState;
use super::state::State;

/// emberd engine
///
/// Hosts integration tasks, receives their events, and maintains a view of
/// the world with State. Each integration entry owns its own poller; the
/// engine only sees discovery, state-change, and poll-failure events.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Map of entity_id -> integration name for bookkeeping
    entity_integration_map: std::sync::Mutex<HashMap<String, String>>,

    /// Communication channels to integrations (for commands)
    integration_channels: std::sync::Mutex<HashMap<String, ToIntegrationSender>>,

    /// Receive messages from integrations (events)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Handles for integration tasks
    integration_handles: Vec<JoinHandle<()>>,
}

/// Capacity for the integration→engine message channel
/// Provides backpressure when integrations send faster than the engine can process
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no integration named '{0}'")]
    UnknownIntegration(String),

    #[error("no entity with id '{0}'")]
    UnknownEntity(String),

    #[error("integration '{0}' is no longer running")]
    IntegrationStopped(String),
}

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            entity_integration_map: std::sync::Mutex::new(HashMap::new()),
            integration_channels: std::sync::Mutex::new(HashMap::new()),
            message_rx: Mutex::new(message_rx),
            message_tx,
            integration_handles: Vec::new(),
        }
    }

    /// Register integrations from configuration
    ///
    /// Runs every registered factory against the config; each factory
    /// produces one integration instance per enabled entry.
    pub fn register_integrations_from_config(&mut self, cfg: &crate::config::Config) {
        let ctx = IntegrationContext { config: cfg };
        for constr in super::integration::REGISTRY {
            let integrations = match constr(&ctx) {
                Ok(integrations) => integrations,
                Err(e) => {
                    error!("failed to construct integration: {}", e);
                    continue;
                }
            };
            for integration in integrations {
                let name = integration.name().to_string();
                self.register_integration(name, integration);
            }
        }
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&mut self, name: String, mut integration: Box<dyn Integration>) {
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let from_integration_tx = self.message_tx.clone();

        if let Ok(mut channels) = self.integration_channels.lock() {
            channels.insert(name.clone(), to_integration_tx);
        }

        // Spawn integration task
        let handle = tokio::spawn(async move {
            // Setup integration (gives it the sender for events)
            if let Err(e) = integration.setup(from_integration_tx).await {
                warn!("Integration '{}' setup failed: {}", name, e);
                return;
            }

            // Process commands from engine
            while let Some(msg) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_message(msg).await {
                    warn!("Integration '{}' failed to handle message: {}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {}", name, e);
            }
        });

        self.integration_handles.push(handle);
    }

    /// Ask an integration for one out-of-schedule poll cycle
    pub fn request_refresh(&self, integration_name: &str) -> Result<(), EngineError> {
        let channels = self
            .integration_channels
            .lock()
            .map_err(|_| EngineError::IntegrationStopped(integration_name.to_string()))?;

        let tx = channels
            .get(integration_name)
            .ok_or_else(|| EngineError::UnknownIntegration(integration_name.to_string()))?;

        tx.send(ToIntegrationMessage::Refresh)
            .map_err(|_| EngineError::IntegrationStopped(integration_name.to_string()))
    }

    /// Ask the integration owning an entity for one out-of-schedule poll
    /// cycle. Resolves the owner through the discovery bookkeeping.
    pub fn request_entity_refresh(&self, entity_id: &str) -> Result<(), EngineError> {
        let integration_name = {
            let map = self
                .entity_integration_map
                .lock()
                .map_err(|_| EngineError::UnknownEntity(entity_id.to_string()))?;
            map.get(entity_id)
                .cloned()
                .ok_or_else(|| EngineError::UnknownEntity(entity_id.to_string()))?
        };

        self.request_refresh(&integration_name)
    }

    /// Run the engine's main event loop
    ///
    /// Processes incoming events from integrations and updates state.
    pub async fn run(&self) {
        info!("Engine starting");

        // Main event loop - only receives FromIntegration messages
        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            self.handle_event(msg);
        }

        info!("Engine shutting down");
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Drop the command channels so every integration task finishes its
    /// receive loop and runs shutdown.
    pub fn stop_integrations(&self) {
        if let Ok(mut channels) = self.integration_channels.lock() {
            channels.clear();
        }
    }

    /// Handle an event from an integration
    pub(crate) fn handle_event(&self, msg: FromIntegrationMessage) {
        match msg {
            FromIntegrationMessage::EntityDiscovered {
                entity_id,
                integration_name,
                platform,
            } => {
                info!(
                    "Entity discovered: {} ({} from {})",
                    entity_id, platform, integration_name
                );

                // Record which integration owns this entity.
                // State is not populated until the first state-change message arrives.
                if let Ok(mut map) = self.entity_integration_map.lock() {
                    map.insert(entity_id, integration_name);
                }
            }
            FromIntegrationMessage::EntityStateChanged { entity_id, state } => {
                let platform = state
                    .get("platform")
                    .and_then(|p| p.as_str())
                    .unwrap_or("sensor")
                    .to_string();

                let mut snapshot = State::clone(&self.state.load());
                snapshot
                    .entities
                    .insert(entity_id, EntityState { platform, state });
                self.state.store(Arc::new(snapshot));
            }
            FromIntegrationMessage::PollFailed {
                integration_name,
                error,
            } => {
                // Non-fatal: entities keep their last reported state.
                warn!("Poll failed for '{}': {}", integration_name, error);
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
