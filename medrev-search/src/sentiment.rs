//! Sentiment annotator boundary
//!
//! Classification is pluggable and purely additive: the aggregation core
//! neither requires nor waits for it. Callers annotate between fan-out
//! and display; a cached row keeps whatever sentiment it was saved with.

use async_trait::async_trait;
use medrev_common::{Review, Sentiment};

/// Pluggable review sentiment annotator.
///
/// Implementations must be total: every input review comes back, with
/// sentiment populated where classification succeeded.
#[async_trait]
pub trait SentimentAnnotator: Send + Sync {
    async fn annotate(&self, reviews: Vec<Review>) -> Vec<Review>;
}

const POSITIVE_KEYWORDS: &[&str] = &[
    "excellent",
    "great",
    "good",
    "caring",
    "kind",
    "patient",
    "professional",
    "recommend",
    "thorough",
    "helpful",
    "friendly",
    "best",
    "amazing",
    "wonderful",
];

const NEGATIVE_KEYWORDS: &[&str] = &[
    "bad",
    "rude",
    "terrible",
    "worst",
    "horrible",
    "avoid",
    "unprofessional",
    "dismissive",
    "careless",
    "disappointed",
    "waste",
    "poor",
];

/// Keyword-count fallback classifier.
///
/// Deliberately simple: counts positive/negative keyword hits and calls
/// ties (and keyword-free text) neutral. Stands in wherever a real
/// model-backed annotator is not configured, and never fails.
#[derive(Debug, Default)]
pub struct KeywordAnnotator;

impl KeywordAnnotator {
    pub fn new() -> Self {
        Self
    }

    fn classify(text: &str) -> Sentiment {
        let lower = text.to_lowercase();
        let positive = POSITIVE_KEYWORDS.iter().filter(|k| lower.contains(**k)).count();
        let negative = NEGATIVE_KEYWORDS.iter().filter(|k| lower.contains(**k)).count();

        match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }
}

#[async_trait]
impl SentimentAnnotator for KeywordAnnotator {
    async fn annotate(&self, mut reviews: Vec<Review>) -> Vec<Review> {
        for review in &mut reviews {
            if review.sentiment.is_none() {
                review.sentiment = Some(Self::classify(&review.snippet));
            }
        }
        reviews
    }
}
