//! Shared-poll coordination.
//!
//! One periodic fetch per integration entry fans out to a dynamic set of
//! derived views: the `Poller` owns the schedule and last-known result, the
//! `ViewRegistry` decides which views exist for the payloads seen so far,
//! and the initialization gate performs the priming fetch that validates
//! configuration before steady-state polling begins.

mod error;
mod gate;
mod poller;
mod registry;

pub use error::FetchError;
pub use error::SetupError;
pub use gate::PollContext;
pub use gate::initialize;
pub use poller::Fetcher;
pub use poller::PollOutcome;
pub use poller::Poller;
pub use registry::RegisteredView;
pub use registry::ViewDescriptor;
pub use registry::ViewRegistry;
