//! Search aggregator
//!
//! Coordinates the full request path: fingerprint, cache probe, and on a
//! miss a concurrent fan-out to every enabled provider. Partial provider
//! failure is tolerated; a cache-write failure is logged and swallowed.
//! Absence of reviews is a valid outcome, not an error.

use futures::future::join_all;
use medrev_common::{Result, Review, TtlTier};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::cache::ReviewCache;
use crate::identity::fingerprint;
use crate::providers::{ProviderErrorKind, ProviderResponse, ReviewProvider};

/// A summary shorter than this is treated as trivial and does not turn
/// an empty result into a summary-only one
const MIN_SUMMARY_LEN: usize = 20;

/// Where the returned review set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Cache,
    Fresh,
}

/// Three-way aggregation outcome.
///
/// `SummaryOnly` is deliberately distinct from `Empty`: a provider may
/// produce usable free-text even when no structured reviews exist, and
/// the presentation layer formats the two differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Structured reviews were found (cached or fresh)
    Found,
    /// No reviews and no usable summary
    Empty,
    /// No structured reviews, but a non-trivial provider summary exists
    SummaryOnly,
}

/// Per-provider contribution to one aggregation
#[derive(Debug, Clone, Serialize)]
pub struct ProviderCount {
    pub provider: String,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Merged result of one search
#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub doctor_name: String,
    pub fingerprint: String,
    pub reviews: Vec<Review>,
    pub source: ResultSource,
    pub outcome: Outcome,
    /// Providers actually invoked, with their contributions.
    /// Empty on a cache hit: no provider is called then.
    pub provider_counts: Vec<ProviderCount>,
    pub summary: Option<String>,
    /// Human-readable outcome line for the messaging layer
    pub message: String,
}

/// Multi-provider review aggregator
pub struct ReviewAggregator {
    cache: Arc<ReviewCache>,
    providers: Vec<Arc<dyn ReviewProvider>>,
}

impl ReviewAggregator {
    pub fn new(cache: Arc<ReviewCache>, providers: Vec<Arc<dyn ReviewProvider>>) -> Self {
        Self { cache, providers }
    }

    /// Search for a doctor's reviews across all enabled providers.
    ///
    /// The cache is probed first; on a hit no provider is invoked. On a
    /// miss, enabled providers run concurrently, each bounded by its own
    /// timeout, and the merged set is written back best-effort under the
    /// given TTL tier.
    pub async fn search_doctor_reviews(
        &self,
        doctor_name: &str,
        location: &str,
        specialty: Option<&str>,
        tier: TtlTier,
    ) -> Result<AggregateResult> {
        let fp = fingerprint(doctor_name, "", location);
        info!(doctor = %doctor_name, fingerprint = %fp, "Searching for doctor reviews");

        // Cache probe. A probe failure degrades to a miss, never aborts
        // the request.
        match self.cache.get(&fp).await {
            Ok(Some(reviews)) => {
                let message = format!(
                    "Found {} cached reviews for {}",
                    reviews.len(),
                    doctor_name
                );
                return Ok(AggregateResult {
                    doctor_name: doctor_name.to_string(),
                    fingerprint: fp,
                    reviews,
                    source: ResultSource::Cache,
                    outcome: Outcome::Found,
                    provider_counts: Vec::new(),
                    summary: None,
                    message,
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!(fingerprint = %fp, error = %e, "Cache probe failed, treating as miss");
            }
        }

        let enabled: Vec<Arc<dyn ReviewProvider>> = self
            .providers
            .iter()
            .filter(|p| p.enabled())
            .cloned()
            .collect();

        if enabled.is_empty() {
            warn!("No review provider is enabled");
        }

        // The fetch and cache write run in their own task: if the caller
        // abandons this request, in-flight provider calls still complete
        // and their results still land in the cache.
        let cache = Arc::clone(&self.cache);
        let fp_task = fp.clone();
        let name_task = doctor_name.to_string();
        let location_task = location.to_string();
        let specialty_task = specialty.map(str::to_string);

        let handle = tokio::spawn(async move {
            fetch_and_cache(cache, enabled, fp_task, name_task, location_task, specialty_task, tier)
                .await
        });

        let (reviews, provider_counts, summary) = handle
            .await
            .map_err(|e| medrev_common::Error::Internal(format!("fan-out task failed: {}", e)))?;

        let (outcome, message) = shape_outcome(doctor_name, &reviews, summary.as_deref());

        Ok(AggregateResult {
            doctor_name: doctor_name.to_string(),
            fingerprint: fp,
            reviews,
            source: ResultSource::Fresh,
            outcome,
            provider_counts,
            summary,
            message,
        })
    }
}

/// Concurrent provider fan-out, merge, and best-effort cache write
async fn fetch_and_cache(
    cache: Arc<ReviewCache>,
    providers: Vec<Arc<dyn ReviewProvider>>,
    fp: String,
    doctor_name: String,
    location: String,
    specialty: Option<String>,
    tier: TtlTier,
) -> (Vec<Review>, Vec<ProviderCount>, Option<String>) {
    // All calls start together: wall-clock latency is bounded by the
    // slowest individual provider timeout, not the sum
    let calls = providers.iter().map(|provider| {
        let provider = Arc::clone(provider);
        let name = doctor_name.clone();
        let loc = location.clone();
        async move {
            let response = match timeout(provider.timeout(), provider.search(&name, &loc)).await {
                Ok(response) => response,
                Err(_) => {
                    warn!(provider = provider.name(), "Provider call timed out");
                    ProviderResponse::failed(ProviderErrorKind::Timeout)
                }
            };
            (provider.name(), response)
        }
    });

    let responses = join_all(calls).await;

    let mut merged: Vec<Review> = Vec::new();
    let mut counts = Vec::with_capacity(responses.len());
    let mut summary: Option<String> = None;

    for (name, response) in responses {
        if let Some(kind) = &response.error {
            warn!(provider = name, error = %kind, "Provider failed");
        }
        counts.push(ProviderCount {
            provider: name.to_string(),
            count: response.reviews.len(),
            error: response.error.as_ref().map(|k| k.to_string()),
        });

        if summary.is_none() {
            summary = response
                .summary
                .filter(|s| s.trim().len() >= MIN_SUMMARY_LEN);
        }

        merged.extend(response.reviews);
    }

    // Carry request context onto every merged review before caching
    for review in &mut merged {
        if review.location.is_none() && !location.is_empty() {
            review.location = Some(location.clone());
        }
        if review.specialty.is_none() {
            review.specialty = specialty.clone();
        }
    }

    info!(
        doctor = %doctor_name,
        total = merged.len(),
        providers = counts.len(),
        "Provider fan-out complete"
    );

    // Cross-provider duplicates collapse here via content hash, not in
    // the merge above. A write failure never reaches the caller, who
    // already holds the in-memory result.
    if !merged.is_empty() {
        if let Err(e) = cache.put(&fp, &doctor_name, &merged, tier).await {
            warn!(fingerprint = %fp, error = %e, "Cache write failed (best-effort, ignored)");
        }
    }

    (merged, counts, summary)
}

fn shape_outcome(
    doctor_name: &str,
    reviews: &[Review],
    summary: Option<&str>,
) -> (Outcome, String) {
    if !reviews.is_empty() {
        let message = format!("Found {} reviews for {}", reviews.len(), doctor_name);
        return (Outcome::Found, message);
    }

    if summary.is_some() {
        let message = format!(
            "No individual reviews found for {}, but a search summary is available",
            doctor_name
        );
        return (Outcome::SummaryOnly, message);
    }

    let message = format!(
        "No reviews found for {}. Try a different spelling or add a location",
        doctor_name
    );
    (Outcome::Empty, message)
}
