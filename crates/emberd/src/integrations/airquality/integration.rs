use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;

use super::client::AirQualityClient;
use super::sensor::AirQualitySensor;
use super::sensor::SENSOR_DESCRIPTIONS;
use crate::config::AirQualityEntry;
use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::Integration;
use crate::engine::ToIntegrationMessage;
use crate::poll::Fetcher;
use crate::poll::PollOutcome;
use crate::poll::Poller;
use crate::poll::ViewRegistry;
use crate::poll::initialize;

/// Fetcher adapter binding a vendor client to one station.
struct FeedFetcher<C: AirQualityClient> {
    client: Arc<C>,
    station_id: i64,
}

#[async_trait]
impl<C: AirQualityClient> Fetcher for FeedFetcher<C> {
    async fn fetch(&self) -> PollOutcome {
        self.client.feed(self.station_id).await
    }
}

/// Air-quality integration for emberd
///
/// One instance per configured station entry. Setup primes the vendor API
/// through the initialization gate, seeds the sensor set from the first
/// payload, then fans every later poll cycle out to the registered sensors.
pub struct AirQualityIntegration<C: AirQualityClient> {
    name: String,
    entry_id: String,
    entry: AirQualityEntry,
    client: Arc<C>,
    poller: Option<Arc<Poller>>,
    /// Handle to the background cycle-fanout task
    events_task: Option<JoinHandle<()>>,
}

impl<C: AirQualityClient + 'static> AirQualityIntegration<C> {
    pub fn new(client: C, entry_id: String, entry: AirQualityEntry) -> Self {
        Self {
            name: format!("airquality/{}", entry_id),
            entry_id,
            entry,
            client: Arc::new(client),
            poller: None,
            events_task: None,
        }
    }

    fn device_info(&self) -> DeviceInfo {
        let name = self
            .entry
            .name
            .clone()
            .unwrap_or_else(|| self.entry_id.clone());
        DeviceInfo::service("airquality", &self.entry_id, name)
    }

    /// Handle one successful poll cycle: register sensors for newly present
    /// fields, then push every sensor's current state to the engine.
    ///
    /// Never called for failed cycles; sensors keep their last good value.
    async fn handle_payload(
        payload: &Value,
        registry: &mut ViewRegistry,
        sensors: &mut Vec<AirQualitySensor>,
        entry_id: &str,
        device: &DeviceInfo,
        integration_name: &str,
        tx: &FromIntegrationSender,
    ) {
        for descriptor in registry.reconcile(payload) {
            let sensor = AirQualitySensor::new(entry_id, descriptor, device.clone());
            let _ = tx
                .send(FromIntegrationMessage::EntityDiscovered {
                    entity_id: sensor.entity_id().to_string(),
                    integration_name: integration_name.to_string(),
                    platform: sensor.platform(),
                })
                .await;
            sensors.push(sensor);
        }

        for sensor in sensors.iter_mut() {
            sensor.observe(payload);
            let _ = tx
                .send(FromIntegrationMessage::EntityStateChanged {
                    entity_id: sensor.entity_id().to_string(),
                    state: sensor.state_json(),
                })
                .await;
        }
    }

    /// Background task: waits for poll cycles and fans them out.
    async fn poll_events_task(
        poller: Arc<Poller>,
        mut cycle_rx: tokio::sync::watch::Receiver<u64>,
        mut registry: ViewRegistry,
        mut sensors: Vec<AirQualitySensor>,
        entry_id: String,
        device: DeviceInfo,
        integration_name: String,
        tx: FromIntegrationSender,
    ) {
        while cycle_rx.changed().await.is_ok() {
            match poller.latest() {
                Some(Ok(payload)) => {
                    Self::handle_payload(
                        &payload,
                        &mut registry,
                        &mut sensors,
                        &entry_id,
                        &device,
                        &integration_name,
                        &tx,
                    )
                    .await;
                }
                Some(Err(e)) => {
                    let _ = tx
                        .send(FromIntegrationMessage::PollFailed {
                            integration_name: integration_name.clone(),
                            error: e.to_string(),
                        })
                        .await;
                }
                None => {}
            }
        }
        debug!("[{}] cycle fanout task exiting", integration_name);
    }
}

#[async_trait]
impl<C: AirQualityClient + 'static> Integration for AirQualityIntegration<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&mut self, tx: FromIntegrationSender) -> Result<(), Box<dyn Error + Send>> {
        info!("[{}] setting up (station {})", self.name, self.entry.station_id);

        let fetcher = Arc::new(FeedFetcher {
            client: self.client.clone(),
            station_id: self.entry.station_id,
        });
        let poller = Arc::new(Poller::new(fetcher));
        let registry = ViewRegistry::new(SENSOR_DESCRIPTIONS);

        // Subscribe before priming so the seed cycle is never missed.
        let cycle_rx = poller.subscribe();

        let ctx = initialize(
            poller.clone(),
            registry,
            Duration::from_secs(self.entry.update_interval),
        )
        .await
        .map_err(|e| Box::new(e) as Box<dyn Error + Send>)?;

        info!(
            "[{}] primed with {} sensors, polling every {}s",
            self.name,
            ctx.registry.len(),
            self.entry.update_interval
        );

        // Materialize the seed views the gate registered. Later views are
        // materialized by the fanout task as they appear.
        let device = self.device_info();
        let mut sensors = Vec::new();
        for descriptor in ctx.registry.views() {
            let sensor = AirQualitySensor::new(&self.entry_id, descriptor, device.clone());
            let _ = tx
                .send(FromIntegrationMessage::EntityDiscovered {
                    entity_id: sensor.entity_id().to_string(),
                    integration_name: self.name.clone(),
                    platform: sensor.platform(),
                })
                .await;
            sensors.push(sensor);
        }

        self.poller = Some(poller.clone());
        self.events_task = Some(tokio::spawn(Self::poll_events_task(
            poller,
            cycle_rx,
            ctx.registry,
            sensors,
            self.entry_id.clone(),
            device,
            self.name.clone(),
            tx,
        )));

        Ok(())
    }

    async fn handle_message(
        &mut self,
        msg: ToIntegrationMessage,
    ) -> Result<(), Box<dyn Error + Send>> {
        match msg {
            ToIntegrationMessage::Refresh => {
                if let Some(poller) = &self.poller {
                    debug!("[{}] refresh requested", self.name);
                    poller.request_refresh();
                }
                Ok(())
            }
        }
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn Error + Send>> {
        info!("[{}] shutting down", self.name);
        if let Some(poller) = &self.poller {
            poller.stop();
        }
        if let Some(task) = self.events_task.take() {
            task.abort();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::super::client::mock::MockAirQualityClient;
    use super::*;
    use crate::poll::FetchError;
    use crate::poll::SetupError;

    fn entry() -> AirQualityEntry {
        AirQualityEntry {
            token: "secret".to_string(),
            station_id: 1451,
            name: Some("Beijing".to_string()),
            update_interval: 900,
            enabled: true,
        }
    }

    async fn drain(
        rx: &mut mpsc::Receiver<FromIntegrationMessage>,
    ) -> Vec<FromIntegrationMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            messages.push(msg);
        }
        messages
    }

    fn discovered_ids(messages: &[FromIntegrationMessage]) -> Vec<String> {
        messages
            .iter()
            .filter_map(|m| match m {
                FromIntegrationMessage::EntityDiscovered { entity_id, .. } => {
                    Some(entity_id.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn state_of(messages: &[FromIntegrationMessage], id: &str) -> Option<Value> {
        messages.iter().rev().find_map(|m| match m {
            FromIntegrationMessage::EntityStateChanged { entity_id, state } if entity_id == id => {
                Some(state.clone())
            }
            _ => None,
        })
    }

    #[tokio::test]
    async fn test_new_fields_across_cycles_grow_the_sensor_set() {
        let mut registry = ViewRegistry::new(SENSOR_DESCRIPTIONS);
        let mut sensors = Vec::new();
        let device = DeviceInfo::service("airquality", "beijing", "Beijing".to_string());
        let (tx, mut rx) = mpsc::channel(64);

        let first = json!({"aqi": 42, "iaqi": {"pm25": {"v": 10}}});
        AirQualityIntegration::<MockAirQualityClient>::handle_payload(
            &first,
            &mut registry,
            &mut sensors,
            "beijing",
            &device,
            "airquality/beijing",
            &tx,
        )
        .await;

        let messages = drain(&mut rx).await;
        assert_eq!(
            discovered_ids(&messages),
            vec!["sensor.beijing_aqi", "sensor.beijing_pm25"]
        );
        assert_eq!(
            state_of(&messages, "sensor.beijing_aqi").unwrap()["value"],
            42
        );

        let second = json!({"aqi": 43, "iaqi": {"pm25": {"v": 12}, "h": {"v": 55}}});
        AirQualityIntegration::<MockAirQualityClient>::handle_payload(
            &second,
            &mut registry,
            &mut sensors,
            "beijing",
            &device,
            "airquality/beijing",
            &tx,
        )
        .await;

        let messages = drain(&mut rx).await;
        assert_eq!(discovered_ids(&messages), vec!["sensor.beijing_humidity"]);
        assert_eq!(sensors.len(), 3);
        assert_eq!(
            state_of(&messages, "sensor.beijing_aqi").unwrap()["value"],
            43
        );
        assert_eq!(
            state_of(&messages, "sensor.beijing_humidity").unwrap()["value"],
            55
        );
    }

    #[tokio::test]
    async fn test_setup_discovers_seed_sensors_and_reports_state() {
        let client = MockAirQualityClient::new();
        client.push_feed(Ok(json!({"aqi": 42, "iaqi": {"pm25": {"v": 10}}})));

        let mut integration =
            AirQualityIntegration::new(client, "beijing".to_string(), entry());
        let (tx, mut rx) = mpsc::channel(64);

        integration.setup(tx).await.expect("setup should succeed");

        // Give the fanout task a chance to handle the primed cycle.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let messages = drain(&mut rx).await;
        assert_eq!(
            discovered_ids(&messages),
            vec!["sensor.beijing_aqi", "sensor.beijing_pm25"]
        );
        assert_eq!(
            state_of(&messages, "sensor.beijing_pm25").unwrap()["value"],
            10
        );

        integration.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_setup_aborts_on_quota_with_no_entities() {
        let client = MockAirQualityClient::new();
        client.push_feed(Err(FetchError::Quota("Over quota".to_string())));

        let mut integration =
            AirQualityIntegration::new(client, "beijing".to_string(), entry());
        let (tx, mut rx) = mpsc::channel(64);

        let err = integration.setup(tx).await.expect_err("setup should fail");
        assert_eq!(
            err.to_string(),
            SetupError::Quota("Over quota".to_string()).to_string()
        );

        assert!(drain(&mut rx).await.is_empty());
        assert!(integration.poller.is_none());
    }

    #[tokio::test]
    async fn test_steady_state_failure_reports_poll_failed_only() {
        let client = MockAirQualityClient::new();
        client.push_feed(Ok(json!({"aqi": 42, "iaqi": {}})));

        let mut integration =
            AirQualityIntegration::new(client, "beijing".to_string(), entry());
        let (tx, mut rx) = mpsc::channel(64);

        integration.setup(tx).await.expect("setup should succeed");
        tokio::time::sleep(Duration::from_millis(50)).await;
        drain(&mut rx).await;

        // Next cycle fails (mock queue exhausted -> Unknown error).
        integration
            .handle_message(ToIntegrationMessage::Refresh)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let messages = drain(&mut rx).await;
        assert!(messages.iter().all(|m| matches!(
            m,
            FromIntegrationMessage::PollFailed { .. }
        )));
        assert!(!messages.is_empty());

        integration.shutdown().await.unwrap();
    }
}
