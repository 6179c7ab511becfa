//! Printer webcam integration (OctoPrint-compatible controllers).

mod camera;
mod client;
mod integration;

pub use camera::MjpegCamera;
pub use client::OctoPrintClient;
pub use client::PrinterClient;
pub use client::WebcamSettings;
pub use integration::PrinterIntegration;

use linkme::distributed_slice;
use tracing::info;

use crate::engine;

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_printer(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let mut integrations: Vec<Box<dyn engine::Integration>> = Vec::new();

    for (entry_id, entry) in &ctx.config.integrations.printer {
        if !entry.enabled {
            info!("printer entry '{}' is disabled, skipping", entry_id);
            continue;
        }

        let client = OctoPrintClient::new(entry.base_url.clone(), entry.api_key.clone());
        integrations.push(Box::new(PrinterIntegration::new(
            client,
            entry_id.clone(),
            entry.clone(),
        )));
    }

    Ok(integrations)
}
