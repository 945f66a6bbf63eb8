//! Shared data models for the review aggregation pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One external review/testimonial, normalized from whatever shape the
/// originating provider returned.
///
/// Optional fields are explicit: `rating` of 0.0 means unknown, an absent
/// `review_date` means the provider did not report one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Provider or site that surfaced this review (e.g. "google_maps")
    pub source: String,
    /// Link to the review or the place it was found on
    pub url: Option<String>,
    /// Review text body
    pub snippet: String,
    /// Star rating; 0.0 means unknown/unset
    pub rating: f32,
    /// Reviewer display name
    pub author_name: String,
    /// ISO date the review was posted, if known
    pub review_date: Option<String>,
    /// Sentiment classification, populated by an external annotator
    pub sentiment: Option<Sentiment>,
    /// Hospital/clinic name the review was attached to, if known
    pub hospital_name: Option<String>,
    /// Location context the search ran with
    pub location: Option<String>,
    /// Specialty the caller supplied, carried through for display
    pub specialty: Option<String>,
}

impl Review {
    /// Create a review with the anonymous-author and unknown-field defaults.
    pub fn new(source: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            url: None,
            snippet: snippet.into(),
            rating: 0.0,
            author_name: "Anonymous".to_string(),
            review_date: None,
            sentiment: None,
            hospital_name: None,
            location: None,
            specialty: None,
        }
    }

    /// Deterministic content hash of (url, snippet).
    ///
    /// Two fetches of the same review, even from different providers,
    /// produce the same hash and collapse to one cached row.
    pub fn content_hash(&self) -> String {
        let content = format!(
            "{}|{}",
            self.url.as_deref().unwrap_or(""),
            self.snippet
        );
        format!("{:x}", Sha256::digest(content.as_bytes()))
    }
}

/// Review sentiment classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    /// Parse from the text stored in the database. Unknown values map to
    /// None so a bad row degrades to unclassified rather than an error.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Sentiment::Positive),
            "neutral" => Some(Sentiment::Neutral),
            "negative" => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

/// Named time-to-live policy for cached results.
///
/// Hot doctors are queried often and refresh sooner; cold doctors are
/// queried rarely, so staleness costs less than re-fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtlTier {
    #[default]
    Default,
    Hot,
    Cold,
}

/// Cache introspection result for one fingerprint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatus {
    /// Total cached rows, expired or not
    pub total: i64,
    /// Rows still within their valid_until window
    pub valid: i64,
    /// When the most recent row was fetched
    pub last_fetched: Option<DateTime<Utc>>,
}

/// Per-caller usage statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallerStats {
    pub caller_id: String,
    pub role: String,
    pub ceiling: i64,
    pub used: i64,
    pub remaining: i64,
    pub total_requests: i64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_active: Option<DateTime<Utc>>,
}
