//! Shared test fixtures: in-memory stores and a scriptable mock provider

use async_trait::async_trait;
use medrev_common::Review;
use medrev_search::{ProviderResponse, ReviewCache, ReviewProvider, TtlPolicy};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scriptable provider returning a fixed response, counting its calls
pub struct MockProvider {
    pub name: &'static str,
    pub enabled: bool,
    pub timeout: Duration,
    /// Artificial latency before responding
    pub delay: Duration,
    pub response: ProviderResponse,
    pub calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn returning(name: &'static str, response: ProviderResponse) -> Self {
        Self {
            name,
            enabled: true,
            timeout: Duration::from_secs(5),
            delay: Duration::ZERO,
            response,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn disabled(name: &'static str) -> Self {
        let mut p = Self::returning(name, ProviderResponse::empty());
        p.enabled = false;
        p
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReviewProvider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn search(&self, _doctor_name: &str, _location: &str) -> ProviderResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.response.clone()
    }
}

/// In-memory pool with the review schema applied
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    medrev_common::db::create_doctor_reviews_table(&pool)
        .await
        .unwrap();
    pool
}

pub fn cache_on(pool: &SqlitePool) -> Arc<ReviewCache> {
    Arc::new(ReviewCache::new(pool.clone(), TtlPolicy::default()))
}

pub fn review(snippet: &str, rating: f32) -> Review {
    let mut r = Review::new("mock", snippet);
    r.rating = rating;
    r
}

pub fn response_with(reviews: Vec<Review>) -> ProviderResponse {
    ProviderResponse {
        reviews,
        summary: None,
        error: None,
    }
}
