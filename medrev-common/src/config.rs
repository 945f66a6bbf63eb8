//! Settings loaded from environment variables
//!
//! Every setting has a compiled default so the service (and its tests)
//! run without any environment at all. Provider API keys are genuinely
//! optional: a missing key disables that provider at construction time.

use std::env;
use tracing::warn;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path to the SQLite database file
    pub database_path: String,
    /// Location appended to searches when the caller supplies none
    pub default_location: String,

    // Cache TTL tiers, in days
    pub cache_default_ttl_days: i64,
    pub cache_hot_ttl_days: i64,
    pub cache_cold_ttl_days: i64,
    /// Grace period past expiry before sweep deletes a row
    pub cache_retention_days: i64,

    // Monthly quota ceilings per role
    pub quota_standard_monthly: i64,
    pub quota_elevated_monthly: i64,

    // Provider credentials; None disables the provider
    pub google_places_api_key: Option<String>,
    pub outscraper_api_key: Option<String>,

    // Per-provider call timeouts, in seconds
    pub google_places_timeout_secs: u64,
    pub outscraper_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: "medrev.db".to_string(),
            default_location: "Malaysia".to_string(),
            cache_default_ttl_days: 7,
            cache_hot_ttl_days: 2,
            cache_cold_ttl_days: 30,
            cache_retention_days: 30,
            quota_standard_monthly: 50,
            quota_elevated_monthly: 500,
            google_places_api_key: None,
            outscraper_api_key: None,
            google_places_timeout_secs: 30,
            outscraper_timeout_secs: 60,
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            database_path: env_or("MEDREV_DATABASE_PATH", &defaults.database_path),
            default_location: env_or("MEDREV_DEFAULT_LOCATION", &defaults.default_location),
            cache_default_ttl_days: env_parse_or(
                "MEDREV_CACHE_DEFAULT_TTL_DAYS",
                defaults.cache_default_ttl_days,
            ),
            cache_hot_ttl_days: env_parse_or(
                "MEDREV_CACHE_HOT_TTL_DAYS",
                defaults.cache_hot_ttl_days,
            ),
            cache_cold_ttl_days: env_parse_or(
                "MEDREV_CACHE_COLD_TTL_DAYS",
                defaults.cache_cold_ttl_days,
            ),
            cache_retention_days: env_parse_or(
                "MEDREV_CACHE_RETENTION_DAYS",
                defaults.cache_retention_days,
            ),
            quota_standard_monthly: env_parse_or(
                "MEDREV_QUOTA_STANDARD_MONTHLY",
                defaults.quota_standard_monthly,
            ),
            quota_elevated_monthly: env_parse_or(
                "MEDREV_QUOTA_ELEVATED_MONTHLY",
                defaults.quota_elevated_monthly,
            ),
            google_places_api_key: env_opt("GOOGLE_PLACES_API_KEY"),
            outscraper_api_key: env_opt("OUTSCRAPER_API_KEY"),
            google_places_timeout_secs: env_parse_or(
                "MEDREV_GOOGLE_PLACES_TIMEOUT_SECS",
                defaults.google_places_timeout_secs,
            ),
            outscraper_timeout_secs: env_parse_or(
                "MEDREV_OUTSCRAPER_TIMEOUT_SECS",
                defaults.outscraper_timeout_secs,
            ),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Optional variable: unset or empty both mean "not configured"
fn env_opt(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn env_parse_or<T: std::str::FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            warn!("Invalid value for {}: '{}', using default {}", key, v, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        // Hot refreshes sooner than default, cold later
        assert!(s.cache_hot_ttl_days < s.cache_default_ttl_days);
        assert!(s.cache_cold_ttl_days > s.cache_default_ttl_days);
        assert!(s.quota_elevated_monthly > s.quota_standard_monthly);
        assert!(s.google_places_api_key.is_none());
    }
}
