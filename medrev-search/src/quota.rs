//! Per-caller monthly quota state machine
//!
//! One row per caller, created lazily on first request. The counting
//! period resets when the wall-clock month/year differs from the stored
//! anchor, at most once per calendar month, with no background timer.
//! Any backend failure degrades to admission (fail-open): an unavailable
//! quota store must not block the primary feature.

use chrono::{Datelike, NaiveDate, Utc};
use medrev_common::models::CallerStats;
use medrev_common::{config::Settings, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Caller role, fixing the quota ceiling at row creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerRole {
    Standard,
    Elevated,
}

impl CallerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallerRole::Standard => "standard",
            CallerRole::Elevated => "elevated",
        }
    }
}

/// Monthly ceilings per role
#[derive(Debug, Clone, Copy)]
pub struct QuotaPolicy {
    pub standard_ceiling: i64,
    pub elevated_ceiling: i64,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            standard_ceiling: 50,
            elevated_ceiling: 500,
        }
    }
}

impl QuotaPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            standard_ceiling: settings.quota_standard_monthly,
            elevated_ceiling: settings.quota_elevated_monthly,
        }
    }

    fn ceiling_for(&self, role: CallerRole) -> i64 {
        match role {
            CallerRole::Standard => self.standard_ceiling,
            CallerRole::Elevated => self.elevated_ceiling,
        }
    }
}

/// Admission decision for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub remaining: i64,
    pub ceiling: i64,
    pub used: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct QuotaRow {
    quota_ceiling: i64,
    usage_count: i64,
    period_anchor: NaiveDate,
}

/// Per-caller quota manager backed by the shared SQLite pool
pub struct QuotaManager {
    pool: SqlitePool,
    policy: QuotaPolicy,
}

impl QuotaManager {
    pub fn new(pool: SqlitePool, policy: QuotaPolicy) -> Self {
        Self { pool, policy }
    }

    /// Check the caller's quota and, if admitted, count this request.
    ///
    /// Never fails: backend errors are logged and degrade to admission.
    pub async fn check_and_admit(&self, caller_id: &str) -> QuotaDecision {
        match self.try_admit(caller_id).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(caller = %caller_id, error = %e, "Quota backend unavailable, admitting (fail-open)");
                QuotaDecision {
                    allowed: true,
                    remaining: self.policy.standard_ceiling,
                    ceiling: self.policy.standard_ceiling,
                    used: 0,
                }
            }
        }
    }

    async fn try_admit(&self, caller_id: &str) -> Result<QuotaDecision> {
        let row = self.get_or_create(caller_id, CallerRole::Standard).await?;

        // Lazy monthly reset: first request of a new calendar month zeroes
        // the count and advances the anchor. The reset is guarded on the
        // anchor we just read, so two racing first-of-month requests zero
        // the count at most once; the loser picks up the winner's count
        // instead of wiping it.
        let today = Utc::now().date_naive();
        let usage = if today.month() != row.period_anchor.month()
            || today.year() != row.period_anchor.year()
        {
            if self.reset_period(caller_id, row.period_anchor, today).await? {
                0
            } else {
                self.fetch_row(caller_id)
                    .await?
                    .map(|r| r.usage_count)
                    .unwrap_or(0)
            }
        } else {
            row.usage_count
        };

        if usage >= row.quota_ceiling {
            return Ok(QuotaDecision {
                allowed: false,
                remaining: 0,
                ceiling: row.quota_ceiling,
                used: usage,
            });
        }

        // Guarded increment: the WHERE clause makes concurrent admissions
        // for the same caller race-safe without read-modify-write
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE caller_quotas
            SET usage_count = usage_count + 1,
                total_requests = total_requests + 1,
                last_active = ?
            WHERE caller_id = ? AND usage_count < quota_ceiling
            "#,
        )
        .bind(now)
        .bind(caller_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // A concurrent request consumed the last slot
            return Ok(QuotaDecision {
                allowed: false,
                remaining: 0,
                ceiling: row.quota_ceiling,
                used: row.quota_ceiling,
            });
        }

        let used = usage + 1;
        Ok(QuotaDecision {
            allowed: true,
            remaining: row.quota_ceiling - used,
            ceiling: row.quota_ceiling,
            used,
        })
    }

    async fn get_or_create(&self, caller_id: &str, role: CallerRole) -> Result<QuotaRow> {
        if let Some(row) = self.fetch_row(caller_id).await? {
            return Ok(row);
        }

        // INSERT OR IGNORE handles two first-requests racing
        let now = Utc::now();
        let today = now.date_naive();
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO caller_quotas (
                caller_id, role, quota_ceiling, usage_count, total_requests,
                period_anchor, first_seen, last_active
            ) VALUES (?, ?, ?, 0, 0, ?, ?, ?)
            "#,
        )
        .bind(caller_id)
        .bind(role.as_str())
        .bind(self.policy.ceiling_for(role))
        .bind(today)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(caller = %caller_id, role = role.as_str(), "Created caller quota row");

        self.fetch_row(caller_id).await?.ok_or_else(|| {
            medrev_common::Error::Internal(format!("quota row vanished for {}", caller_id))
        })
    }

    async fn fetch_row(&self, caller_id: &str) -> Result<Option<QuotaRow>> {
        let row: Option<QuotaRow> = sqlx::query_as(
            "SELECT quota_ceiling, usage_count, period_anchor FROM caller_quotas WHERE caller_id = ?",
        )
        .bind(caller_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Zero the count and advance the anchor, but only if the row still
    /// carries the anchor the caller read. Returns whether this call won
    /// the reset; a false return means a concurrent request got there
    /// first and the caller must re-read.
    async fn reset_period(
        &self,
        caller_id: &str,
        expected_anchor: NaiveDate,
        today: NaiveDate,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE caller_quotas
            SET usage_count = 0,
                period_anchor = ?,
                last_active = ?
            WHERE caller_id = ? AND period_anchor = ?
            "#,
        )
        .bind(today)
        .bind(Utc::now())
        .bind(caller_id)
        .bind(expected_anchor)
        .execute(&self.pool)
        .await?;

        let won = result.rows_affected() > 0;
        if won {
            info!(caller = %caller_id, "Monthly quota reset");
        }
        Ok(won)
    }

    /// Administrative provisioning: create or re-provision a caller with
    /// the given role and its ceiling. Not part of the per-request path.
    pub async fn register_caller(&self, caller_id: &str, role: CallerRole) -> Result<()> {
        let now = Utc::now();
        let today = now.date_naive();
        sqlx::query(
            r#"
            INSERT INTO caller_quotas (
                caller_id, role, quota_ceiling, usage_count, total_requests,
                period_anchor, first_seen, last_active
            ) VALUES (?, ?, ?, 0, 0, ?, ?, ?)
            ON CONFLICT(caller_id) DO UPDATE SET
                role = excluded.role,
                quota_ceiling = excluded.quota_ceiling
            "#,
        )
        .bind(caller_id)
        .bind(role.as_str())
        .bind(self.policy.ceiling_for(role))
        .bind(today)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(caller = %caller_id, role = role.as_str(), "Registered caller");
        Ok(())
    }

    /// Usage statistics for one caller, if known
    pub async fn stats(&self, caller_id: &str) -> Result<Option<CallerStats>> {
        #[derive(sqlx::FromRow)]
        struct StatsRow {
            caller_id: String,
            role: String,
            quota_ceiling: i64,
            usage_count: i64,
            total_requests: i64,
            first_seen: chrono::DateTime<Utc>,
            last_active: chrono::DateTime<Utc>,
        }

        let row: Option<StatsRow> = sqlx::query_as(
            r#"
            SELECT caller_id, role, quota_ceiling, usage_count, total_requests,
                   first_seen, last_active
            FROM caller_quotas
            WHERE caller_id = ?
            "#,
        )
        .bind(caller_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| CallerStats {
            caller_id: r.caller_id,
            role: r.role,
            ceiling: r.quota_ceiling,
            used: r.usage_count,
            remaining: (r.quota_ceiling - r.usage_count).max(0),
            total_requests: r.total_requests,
            first_seen: Some(r.first_seen),
            last_active: Some(r.last_active),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> QuotaManager {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        medrev_common::db::create_caller_quotas_table(&pool)
            .await
            .unwrap();
        QuotaManager::new(pool, QuotaPolicy::default())
    }

    #[tokio::test]
    async fn first_request_creates_row_and_admits() {
        let quota = setup().await;

        let decision = quota.check_and_admit("caller-1").await;
        assert!(decision.allowed);
        assert_eq!(decision.used, 1);
        assert_eq!(decision.ceiling, 50);
        assert_eq!(decision.remaining, 49);

        let stats = quota.stats("caller-1").await.unwrap().unwrap();
        assert_eq!(stats.role, "standard");
        assert_eq!(stats.used, 1);
        assert_eq!(stats.total_requests, 1);
    }

    #[tokio::test]
    async fn usage_counts_monotonically() {
        let quota = setup().await;

        for expected in 1..=5 {
            let d = quota.check_and_admit("caller-2").await;
            assert!(d.allowed);
            assert_eq!(d.used, expected);
        }
    }

    #[tokio::test]
    async fn denied_at_ceiling_without_increment() {
        let quota = setup().await;
        let policy = QuotaPolicy {
            standard_ceiling: 2,
            elevated_ceiling: 10,
        };
        let quota = QuotaManager::new(quota.pool.clone(), policy);

        assert!(quota.check_and_admit("caller-3").await.allowed);
        assert!(quota.check_and_admit("caller-3").await.allowed);

        let denied = quota.check_and_admit("caller-3").await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.used, 2);

        // Denials do not move the counter
        let stats = quota.stats("caller-3").await.unwrap().unwrap();
        assert_eq!(stats.used, 2);
        assert_eq!(stats.total_requests, 2);
    }

    #[tokio::test]
    async fn new_month_resets_usage() {
        let quota = setup().await;

        // Exhaust a tiny ceiling
        let tight = QuotaManager::new(
            quota.pool.clone(),
            QuotaPolicy {
                standard_ceiling: 1,
                elevated_ceiling: 10,
            },
        );
        assert!(tight.check_and_admit("caller-4").await.allowed);
        assert!(!tight.check_and_admit("caller-4").await.allowed);

        // Move the anchor into the previous month
        let last_month = Utc::now().date_naive() - chrono::Duration::days(32);
        sqlx::query("UPDATE caller_quotas SET period_anchor = ? WHERE caller_id = ?")
            .bind(last_month)
            .bind("caller-4")
            .execute(&tight.pool)
            .await
            .unwrap();

        // First request of the new month resets and admits
        let decision = tight.check_and_admit("caller-4").await;
        assert!(decision.allowed);
        assert_eq!(decision.used, 1);

        // Anchor advanced; a second reset must not happen this month
        assert!(!tight.check_and_admit("caller-4").await.allowed);
    }

    #[tokio::test]
    async fn reset_is_guarded_by_the_anchor_read() {
        let quota = setup().await;

        assert!(quota.check_and_admit("caller-7").await.allowed);
        assert!(quota.check_and_admit("caller-7").await.allowed);

        let today = Utc::now().date_naive();
        let last_month = today - chrono::Duration::days(32);
        sqlx::query("UPDATE caller_quotas SET period_anchor = ? WHERE caller_id = ?")
            .bind(last_month)
            .bind("caller-7")
            .execute(&quota.pool)
            .await
            .unwrap();

        // A reset carrying an anchor nobody holds must not zero the count
        let wrong_anchor = today - chrono::Duration::days(90);
        assert!(!quota
            .reset_period("caller-7", wrong_anchor, today)
            .await
            .unwrap());
        assert_eq!(quota.stats("caller-7").await.unwrap().unwrap().used, 2);

        // Guarded on the real anchor it wins exactly once; a racing
        // request replaying the same stale anchor loses
        assert!(quota
            .reset_period("caller-7", last_month, today)
            .await
            .unwrap());
        assert!(!quota
            .reset_period("caller-7", last_month, today)
            .await
            .unwrap());
        assert_eq!(quota.stats("caller-7").await.unwrap().unwrap().used, 0);
    }

    #[tokio::test]
    async fn backend_failure_fails_open() {
        let quota = setup().await;
        quota.pool.close().await;

        let decision = quota.check_and_admit("caller-5").await;
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn elevated_caller_gets_larger_ceiling() {
        let quota = setup().await;
        quota
            .register_caller("vip", CallerRole::Elevated)
            .await
            .unwrap();

        let decision = quota.check_and_admit("vip").await;
        assert!(decision.allowed);
        assert_eq!(decision.ceiling, 500);

        let stats = quota.stats("vip").await.unwrap().unwrap();
        assert_eq!(stats.role, "elevated");
    }
}
