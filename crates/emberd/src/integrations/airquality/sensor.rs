use serde_json::Value;
use serde_json::json;

use crate::engine::DeviceInfo;
use crate::engine::Entity;
use crate::poll::RegisteredView;
use crate::poll::ViewDescriptor;

pub const ATTRIBUTION: &str = "Data provided by the World Air Quality Index project.";

const CONCENTRATION_MICROGRAMS_PER_CUBIC_METER: &str = "µg/m³";
const PERCENTAGE: &str = "%";
const PRESSURE_HPA: &str = "hPa";
const TEMP_CELSIUS: &str = "°C";

/// Build a descriptor for a per-pollutant reading nested under
/// `iaqi.<field>.v` in the feed payload.
macro_rules! iaqi_sensor {
    ($key:literal, $field:literal, $name:literal, $unit:expr, $class:expr) => {
        ViewDescriptor {
            key: $key,
            name: $name,
            unit: Some($unit),
            device_class: $class,
            found_fn: |data| {
                data.get("iaqi")
                    .and_then(|iaqi| iaqi.get($field))
                    .is_some()
            },
            value_fn: |data| {
                data.get("iaqi")
                    .and_then(|iaqi| iaqi.get($field))
                    .and_then(|entry| entry.get("v"))
                    .cloned()
            },
        }
    };
}

/// Every sensor the integration can expose. Which of these materialize for
/// a given station depends on the fields present in its feed.
pub static SENSOR_DESCRIPTIONS: &[ViewDescriptor] = &[
    ViewDescriptor {
        key: "aqi",
        name: "AQI",
        unit: Some("AQI"),
        device_class: None,
        found_fn: |data| data.get("aqi").is_some(),
        value_fn: |data| data.get("aqi").cloned(),
    },
    iaqi_sensor!(
        "pm25",
        "pm25",
        "PM2.5",
        CONCENTRATION_MICROGRAMS_PER_CUBIC_METER,
        Some("pm25")
    ),
    iaqi_sensor!(
        "pm10",
        "pm10",
        "PM10",
        CONCENTRATION_MICROGRAMS_PER_CUBIC_METER,
        Some("pm10")
    ),
    iaqi_sensor!("humidity", "h", "Humidity", PERCENTAGE, Some("humidity")),
    iaqi_sensor!("pressure", "p", "Pressure", PRESSURE_HPA, Some("pressure")),
    iaqi_sensor!(
        "temperature",
        "t",
        "Temperature",
        TEMP_CELSIUS,
        Some("temperature")
    ),
    iaqi_sensor!(
        "co",
        "co",
        "CO",
        CONCENTRATION_MICROGRAMS_PER_CUBIC_METER,
        None
    ),
    iaqi_sensor!(
        "no2",
        "no2",
        "NO2",
        CONCENTRATION_MICROGRAMS_PER_CUBIC_METER,
        Some("nitrogen_dioxide")
    ),
    iaqi_sensor!(
        "so2",
        "so2",
        "SO2",
        CONCENTRATION_MICROGRAMS_PER_CUBIC_METER,
        Some("sulphur_dioxide")
    ),
    iaqi_sensor!(
        "o3",
        "o3",
        "O3",
        CONCENTRATION_MICROGRAMS_PER_CUBIC_METER,
        Some("ozone")
    ),
];

/// One air-quality sensor entity: a registered view plus the adapter glue
/// the engine expects. Holds no fetch state of its own; values come from
/// the shared poll via `observe`.
pub struct AirQualitySensor {
    entity_id: String,
    view: RegisteredView,
    device: DeviceInfo,
}

impl AirQualitySensor {
    pub fn new(entry_id: &str, descriptor: &'static ViewDescriptor, device: DeviceInfo) -> Self {
        Self {
            entity_id: format!("sensor.{}_{}", entry_id, descriptor.key),
            view: RegisteredView::new(descriptor),
            device,
        }
    }

    /// Apply the latest successful payload. The cached value is retained
    /// when the payload lacks this sensor's field.
    pub fn observe(&mut self, payload: &Value) -> Option<&Value> {
        self.view.observe(payload)
    }
}

impl Entity for AirQualitySensor {
    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn platform(&self) -> &'static str {
        "sensor"
    }

    fn state_json(&self) -> Value {
        let descriptor = self.view.descriptor();
        json!({
            "platform": "sensor",
            "name": descriptor.name,
            "value": self.view.value(),
            "unit": descriptor.unit,
            "device_class": descriptor.device_class,
            "attribution": ATTRIBUTION,
            "device": self.device,
        })
    }
}
