//! Initialization gate: one synchronous priming fetch before steady-state
//! polling begins.
//!
//! Distinguishes configuration-time validation failures (bad credentials,
//! quota, no matching target) from steady-state fetch failures: a failed
//! prime aborts setup with a mapped `SetupError` before any view is
//! registered or any schedule started.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::error::SetupError;
use super::poller::Poller;
use super::registry::ViewRegistry;

/// The live poller/registry pair produced by a successful gate.
///
/// Owned by exactly one integration entry and threaded explicitly to every
/// consumer; there is no ambient per-entry lookup table.
pub struct PollContext {
    pub poller: Arc<Poller>,
    pub registry: ViewRegistry,
}

impl std::fmt::Debug for PollContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollContext").finish_non_exhaustive()
    }
}

/// Run the gate: prime once, seed the view set, start the schedule.
///
/// On a failed prime the error is mapped and returned; no view is ever
/// registered and the schedule is never started.
pub async fn initialize(
    poller: Arc<Poller>,
    mut registry: ViewRegistry,
    interval: Duration,
) -> Result<PollContext, SetupError> {
    let payload = poller.prime_once().await?;

    let seeded = registry.reconcile(&payload);
    info!(
        "priming fetch succeeded, seeded {} of {} views",
        seeded.len(),
        registry.len()
    );

    poller.start(interval);
    Ok(PollContext { poller, registry })
}
