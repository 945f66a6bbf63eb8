//! # medrev-search
//!
//! Doctor-review aggregation core:
//! - Identity normalization and fingerprinting
//! - Provider adapters (uniform search capability over external sources)
//! - Concurrent multi-provider aggregation with partial-failure tolerance
//! - TTL'd, content-hash-deduplicated review cache
//! - Per-caller monthly quota state machine
//! - Sentiment annotator boundary

pub mod aggregator;
pub mod cache;
pub mod identity;
pub mod providers;
pub mod quota;
pub mod sentiment;

pub use aggregator::{AggregateResult, Outcome, ResultSource, ReviewAggregator};
pub use cache::{ReviewCache, TtlPolicy};
pub use identity::fingerprint;
pub use providers::{ProviderErrorKind, ProviderResponse, ReviewProvider};
pub use quota::{QuotaDecision, QuotaManager, QuotaPolicy};
pub use sentiment::{KeywordAnnotator, SentimentAnnotator};
