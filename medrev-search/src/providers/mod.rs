//! Provider adapters
//!
//! Each external review source is wrapped in one adapter exposing the
//! uniform `search(name, location)` capability. Adapters normalize raw
//! provider payloads into [`Review`] records and report failures as data
//! (`ProviderErrorKind`) rather than propagating errors: one provider's
//! failure must never abort the others.

pub mod google_places;
pub mod outscraper;

pub use google_places::GooglePlacesProvider;
pub use outscraper::OutscraperProvider;

use async_trait::async_trait;
use medrev_common::Review;
use std::time::Duration;
use thiserror::Error;

/// A single adapter call's failure, isolated to that provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderErrorKind {
    /// Call did not return within the provider's time bound
    #[error("timed out")]
    Timeout,

    /// Connection/transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Credentials rejected
    #[error("unauthorized")]
    Unauthorized,

    /// Provider-side rate limit hit
    #[error("rate limited")]
    RateLimited,

    /// Non-success HTTP status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Payload did not parse into the expected shape
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Result of one provider call.
///
/// `reviews` and `error` are not mutually exclusive: a provider may
/// return partial results before failing. `summary` carries free-form
/// text some providers produce even when no structured reviews exist.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub reviews: Vec<Review>,
    pub summary: Option<String>,
    pub error: Option<ProviderErrorKind>,
}

impl ProviderResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failed(kind: ProviderErrorKind) -> Self {
        Self {
            reviews: Vec::new(),
            summary: None,
            error: Some(kind),
        }
    }
}

/// Uniform capability over one external review source.
///
/// Implementations decide at construction time whether they are enabled
/// (credentials present); the aggregator skips disabled providers
/// without calling them.
#[async_trait]
pub trait ReviewProvider: Send + Sync {
    /// Short stable identifier used in logs and per-provider counts
    fn name(&self) -> &'static str;

    /// Whether this provider is configured and callable.
    /// Computed once at construction, never re-evaluated per call.
    fn enabled(&self) -> bool;

    /// Per-call time bound enforced by the aggregator's fan-out
    fn timeout(&self) -> Duration;

    /// Search for reviews of a doctor. Must not panic and must not
    /// return a Rust error; failures are reported in the response.
    async fn search(&self, doctor_name: &str, location: &str) -> ProviderResponse;
}
