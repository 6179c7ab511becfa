//! Air-quality integration (World Air Quality Index).
//!
//! One shared poll per configured station fans out to a dynamic set of
//! pollutant sensors; which sensors exist depends on which fields the
//! station actually reports.

mod client;
pub mod flow;
mod integration;
mod sensor;

pub use client::AirQualityClient;
pub use client::Station;
pub use client::WaqiClient;
pub use integration::AirQualityIntegration;
pub use sensor::SENSOR_DESCRIPTIONS;

use linkme::distributed_slice;
use tracing::info;

use crate::engine;

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_airquality(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let mut integrations: Vec<Box<dyn engine::Integration>> = Vec::new();

    for (entry_id, entry) in &ctx.config.integrations.airquality {
        if !entry.enabled {
            info!("air-quality entry '{}' is disabled, skipping", entry_id);
            continue;
        }

        let client = WaqiClient::new(entry.token.clone());
        integrations.push(Box::new(AirQualityIntegration::new(
            client,
            entry_id.clone(),
            entry.clone(),
        )));
    }

    Ok(integrations)
}
