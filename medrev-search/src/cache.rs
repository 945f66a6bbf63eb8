//! Review cache store
//!
//! Persists deduplicated reviews keyed by doctor fingerprint. Reads are
//! served before any provider is invoked; rows expire passively via
//! `valid_until` and are purged by an explicit sweep. Rows are never
//! updated in place: a review is either freshly inserted or left alone.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use medrev_common::models::CacheStatus;
use medrev_common::{config::Settings, Result, Review, Sentiment, TtlTier};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// TTL tier configuration, in days
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    pub default_days: i64,
    pub hot_days: i64,
    pub cold_days: i64,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            default_days: 7,
            hot_days: 2,
            cold_days: 30,
        }
    }
}

impl TtlPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default_days: settings.cache_default_ttl_days,
            hot_days: settings.cache_hot_ttl_days,
            cold_days: settings.cache_cold_ttl_days,
        }
    }

    /// Days of validity for a tier
    pub fn ttl_days(&self, tier: TtlTier) -> i64 {
        match tier {
            TtlTier::Default => self.default_days,
            TtlTier::Hot => self.hot_days,
            TtlTier::Cold => self.cold_days,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    source: String,
    url: Option<String>,
    snippet: String,
    rating: f32,
    author_name: String,
    review_date: Option<String>,
    sentiment: Option<String>,
    hospital_name: Option<String>,
    location: Option<String>,
    doctor_specialty: Option<String>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            source: row.source,
            url: row.url,
            snippet: row.snippet,
            rating: row.rating,
            author_name: row.author_name,
            review_date: row.review_date,
            sentiment: row.sentiment.as_deref().and_then(Sentiment::parse),
            hospital_name: row.hospital_name,
            location: row.location,
            specialty: row.doctor_specialty,
        }
    }
}

/// Cached doctor-review store backed by SQLite
pub struct ReviewCache {
    pool: SqlitePool,
    policy: TtlPolicy,
}

impl ReviewCache {
    pub fn new(pool: SqlitePool, policy: TtlPolicy) -> Self {
        Self { pool, policy }
    }

    /// Read the visible reviews for a fingerprint.
    ///
    /// Returns only rows whose `valid_until` is in the future and whose
    /// display policy is not `hidden`, ordered by the presentation
    /// contract: positive sentiment first (unset sorts as neutral), then
    /// rating descending, then review date descending.
    pub async fn get(&self, fingerprint: &str) -> Result<Option<Vec<Review>>> {
        let now = Utc::now();

        let rows: Vec<ReviewRow> = sqlx::query_as(
            r#"
            SELECT source, url, snippet, rating, author_name,
                   review_date, sentiment, hospital_name, location, doctor_specialty
            FROM doctor_reviews
            WHERE doctor_id = ?
              AND valid_until > ?
              AND display_policy != 'hidden'
            ORDER BY
                CASE sentiment
                    WHEN 'positive' THEN 1
                    WHEN 'negative' THEN 3
                    ELSE 2
                END,
                rating DESC,
                review_date DESC
            "#,
        )
        .bind(fingerprint)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            debug!(fingerprint = %fingerprint, "Cache miss");
            return Ok(None);
        }

        info!(
            fingerprint = %fingerprint,
            count = rows.len(),
            "Cache hit"
        );
        Ok(Some(rows.into_iter().map(Review::from).collect()))
    }

    /// Write a review set for a fingerprint.
    ///
    /// Each review's content hash is computed here; rows whose hash is
    /// already present for this fingerprint are silently skipped
    /// (insert-or-ignore). Returns how many rows were newly inserted.
    pub async fn put(
        &self,
        fingerprint: &str,
        doctor_name: &str,
        reviews: &[Review],
        tier: TtlTier,
    ) -> Result<u64> {
        if reviews.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let valid_until = now + ChronoDuration::days(self.policy.ttl_days(tier));
        let mut inserted = 0u64;

        for review in reviews {
            let hash = review.content_hash();

            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO doctor_reviews (
                    doctor_id, hash, doctor_name, doctor_specialty,
                    hospital_name, location, source, url, snippet,
                    sentiment, rating, review_date, author_name,
                    fetched_at, valid_until, display_policy
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'normal')
                "#,
            )
            .bind(fingerprint)
            .bind(&hash)
            .bind(doctor_name)
            .bind(&review.specialty)
            .bind(&review.hospital_name)
            .bind(&review.location)
            .bind(&review.source)
            .bind(&review.url)
            .bind(&review.snippet)
            .bind(review.sentiment.map(|s| s.as_str()))
            .bind(review.rating)
            // Empty string means unknown; store NULL
            .bind(review.review_date.as_deref().filter(|d| !d.is_empty()))
            .bind(&review.author_name)
            .bind(now)
            .bind(valid_until)
            .execute(&self.pool)
            .await?;

            inserted += result.rows_affected();
        }

        info!(
            fingerprint = %fingerprint,
            doctor = %doctor_name,
            inserted,
            offered = reviews.len(),
            "Saved reviews to cache"
        );
        Ok(inserted)
    }

    /// Cheap cache introspection for a fingerprint, no side effects
    pub async fn status(&self, fingerprint: &str) -> Result<CacheStatus> {
        let now = Utc::now();

        let (total, valid, last_fetched): (i64, Option<i64>, Option<DateTime<Utc>>) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*),
                       SUM(CASE WHEN valid_until > ? THEN 1 ELSE 0 END),
                       MAX(fetched_at)
                FROM doctor_reviews
                WHERE doctor_id = ?
                "#,
            )
            .bind(now)
            .bind(fingerprint)
            .fetch_one(&self.pool)
            .await?;

        Ok(CacheStatus {
            total,
            valid: valid.unwrap_or(0),
            last_fetched,
        })
    }

    /// Delete rows expired for longer than the retention grace period.
    /// A maintenance operation, not invoked per-request.
    pub async fn sweep_expired(&self, retention_days: i64) -> Result<u64> {
        let cutoff = Utc::now() - ChronoDuration::days(retention_days);

        let result = sqlx::query("DELETE FROM doctor_reviews WHERE valid_until < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        info!(deleted, retention_days, "Swept expired cache entries");
        Ok(deleted)
    }
}
