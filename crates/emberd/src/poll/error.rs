//! Error taxonomy for vendor fetches.
//!
//! `FetchError` classifies what a vendor fetch can fail with. During steady
//! state any variant is recorded as a non-fatal poll failure; at setup time
//! the same variants map one-to-one onto `SetupError` kinds that abort setup.

/// A classified failure from a vendor fetch.
///
/// Variants carry the vendor's message as a plain string so outcomes stay
/// cheaply cloneable for `Poller::latest()` consumers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The credential was rejected (invalid or expired token/key).
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The vendor's rate or volume limit was hit.
    #[error("quota exceeded: {0}")]
    Quota(String),

    /// No matching target exists (e.g. no station for a search keyword).
    #[error("no matching result: {0}")]
    NotFound(String),

    /// Anything else, including transport failures.
    #[error("fetch failed: {0}")]
    Unknown(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Unknown(e.to_string())
    }
}

/// A setup-time failure surfaced by the initialization gate.
///
/// Produced only from a failed priming fetch; steady-state poll failures
/// never become a `SetupError`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("authentication failed during setup: {0}")]
    Auth(String),

    #[error("quota exceeded during setup: {0}")]
    Quota(String),

    #[error("no matching target during setup: {0}")]
    NotFound(String),

    #[error("setup failed: {0}")]
    Unknown(String),
}

impl From<FetchError> for SetupError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Auth(msg) => SetupError::Auth(msg),
            FetchError::Quota(msg) => SetupError::Quota(msg),
            FetchError::NotFound(msg) => SetupError::NotFound(msg),
            FetchError::Unknown(msg) => SetupError::Unknown(msg),
        }
    }
}
