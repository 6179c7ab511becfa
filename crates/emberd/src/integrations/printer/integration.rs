use std::error::Error;

use async_trait::async_trait;
use tracing::debug;
use tracing::info;

use super::camera::MjpegCamera;
use super::client::PrinterClient;
use crate::config::PrinterEntry;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::ToIntegrationMessage;
use crate::poll::SetupError;

/// Printer webcam integration for emberd
///
/// A degenerate instance of the initialization gate: one settings fetch at
/// setup decides whether the single camera entity exists, and there is no
/// steady-state polling afterwards.
pub struct PrinterIntegration<C: PrinterClient> {
    name: String,
    entry_id: String,
    entry: PrinterEntry,
    client: C,
}

impl<C: PrinterClient> PrinterIntegration<C> {
    pub fn new(client: C, entry_id: String, entry: PrinterEntry) -> Self {
        Self {
            name: format!("printer/{}", entry_id),
            entry_id,
            entry,
            client,
        }
    }
}

#[async_trait]
impl<C: PrinterClient + 'static> Integration for PrinterIntegration<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        info!("[{}] fetching webcam settings from {}", self.name, self.entry.base_url);

        let settings = self
            .client
            .webcam_settings()
            .await
            .map_err(|e| Box::new(SetupError::from(e)) as Box<dyn Error + Send>)?;

        let Some(settings) = settings else {
            info!("[{}] controller reports no webcam, creating no entity", self.name);
            return Ok(());
        };

        let display_name = self
            .entry
            .name
            .clone()
            .unwrap_or_else(|| self.entry_id.clone());
        let device = DeviceInfo::new("printer", &self.entry_id, display_name.clone());

        match MjpegCamera::from_settings(&self.entry_id, display_name, &settings, device) {
            Some(camera) => {
                let _ = tx
                    .send(FromIntegrationMessage::EntityDiscovered {
                        entity_id: camera.entity_id().to_string(),
                        integration_name: self.name.clone(),
                        platform: camera.platform(),
                    })
                    .await;
                let _ = tx
                    .send(FromIntegrationMessage::EntityStateChanged {
                        entity_id: camera.entity_id().to_string(),
                        state: camera.state_json(),
                    })
                    .await;
                info!("[{}] camera entity created ({})", self.name, camera.stream_url());
            }
            None => {
                info!("[{}] webcam disabled or without stream URL, creating no entity", self.name);
            }
        }

        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        // The camera descriptor is fetched exactly once at setup.
        match msg {
            ToIntegrationMessage::Refresh => {
                debug!("[{}] refresh ignored, camera is one-shot", self.name);
                Ok(())
            }
        }
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("[{}] shutting down", self.name);
        Ok(())
    }
}
