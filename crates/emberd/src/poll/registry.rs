use serde_json::Value;
use tracing::debug;

/// Sensor-style device class hint, passed through to the host as metadata.
pub type DeviceClass = &'static str;

/// Immutable descriptor for one derived view of a polled payload.
///
/// Descriptors form a static table compiled into each integration; which of
/// them materialize as views depends on `found_fn` against observed payloads.
pub struct ViewDescriptor {
    /// Stable identifier, unique within an integration entry.
    pub key: &'static str,

    /// Human-readable name.
    pub name: &'static str,

    /// Unit of measurement, if any.
    pub unit: Option<&'static str>,

    /// Device class hint, if any.
    pub device_class: Option<DeviceClass>,

    /// Whether the payload contains enough data to materialize this view.
    pub found_fn: fn(&Value) -> bool,

    /// Extract the view's value from a payload. Returns `None` when the
    /// payload lacks the field this cycle.
    pub value_fn: fn(&Value) -> Option<Value>,
}

/// A materialized view bound to one descriptor.
///
/// Caches the last extracted value; when a later payload lacks the field,
/// the cached value is retained rather than cleared.
pub struct RegisteredView {
    descriptor: &'static ViewDescriptor,
    last_value: Option<Value>,
}

impl RegisteredView {
    pub fn new(descriptor: &'static ViewDescriptor) -> Self {
        Self {
            descriptor,
            last_value: None,
        }
    }

    pub fn descriptor(&self) -> &'static ViewDescriptor {
        self.descriptor
    }

    /// Apply a new payload. Updates the cached value when the extractor
    /// yields one and returns the current value either way.
    pub fn observe(&mut self, payload: &Value) -> Option<&Value> {
        if let Some(value) = (self.descriptor.value_fn)(payload) {
            self.last_value = Some(value);
        }
        self.last_value.as_ref()
    }

    /// Current (last good) value.
    pub fn value(&self) -> Option<&Value> {
        self.last_value.as_ref()
    }
}

/// Tracks which descriptors have materialized as views so far.
///
/// Registration is monotonic: once a key has matched a payload it stays
/// registered for the lifetime of the registry, even if later payloads lack
/// the field. The host framework does not support removing entities, so the
/// registry never forgets a view.
pub struct ViewRegistry {
    descriptors: &'static [ViewDescriptor],
    registered: Vec<bool>,
}

impl ViewRegistry {
    pub fn new(descriptors: &'static [ViewDescriptor]) -> Self {
        Self {
            descriptors,
            registered: vec![false; descriptors.len()],
        }
    }

    /// Evaluate every not-yet-registered descriptor against a successful
    /// payload and register those whose presence predicate passes.
    ///
    /// Returns the newly registered descriptors in declaration order;
    /// idempotent for a given payload. Must not be called for failed
    /// cycles: no views are derived from a payload that does not exist.
    pub fn reconcile(&mut self, payload: &Value) -> Vec<&'static ViewDescriptor> {
        let mut added = Vec::new();
        for (i, descriptor) in self.descriptors.iter().enumerate() {
            if self.registered[i] {
                continue;
            }
            if (descriptor.found_fn)(payload) {
                self.registered[i] = true;
                debug!("registered view '{}'", descriptor.key);
                added.push(descriptor);
            }
        }
        added
    }

    /// All registered descriptors, in declaration order. Declaration order
    /// is stable across calls; downstream entity registration is
    /// order-sensitive for display purposes.
    pub fn views(&self) -> Vec<&'static ViewDescriptor> {
        self.descriptors
            .iter()
            .enumerate()
            .filter(|(i, _)| self.registered[*i])
            .map(|(_, d)| d)
            .collect()
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.descriptors
            .iter()
            .enumerate()
            .any(|(i, d)| d.key == key && self.registered[i])
    }

    pub fn len(&self) -> usize {
        self.registered.iter().filter(|r| **r).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
