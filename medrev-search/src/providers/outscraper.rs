//! Outscraper adapter
//!
//! Keyword search over Google Maps reviews via the Outscraper API: one
//! request returns places matching the query together with the reviews
//! that mention the doctor (server-side `reviewsQuery` filter). Slower
//! than the Places API but reaches reviews a place lookup misses.

use medrev_common::Review;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use super::{ProviderErrorKind, ProviderResponse, ReviewProvider};

const OUTSCRAPER_BASE_URL: &str = "https://api.app.outscraper.com";
const USER_AGENT: &str = "medrev/0.1.0";

/// Maximum reviews requested per call
const REVIEWS_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
struct ReviewsResponse {
    #[serde(default)]
    data: Vec<PlaceReviews>,
}

#[derive(Debug, Deserialize)]
struct PlaceReviews {
    #[serde(default)]
    name: String,
    #[serde(default)]
    google_maps_url: String,
    #[serde(default)]
    reviews_data: Vec<RawReview>,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    #[serde(default)]
    review_text: String,
    #[serde(default)]
    review_rating: f32,
    #[serde(default)]
    author_title: String,
    #[serde(default)]
    review_datetime_utc: String,
}

/// Outscraper API adapter
pub struct OutscraperProvider {
    http_client: reqwest::Client,
    api_key: String,
    enabled: bool,
    timeout: Duration,
}

impl OutscraperProvider {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        let enabled = api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        if !enabled {
            warn!("Outscraper API key not configured, provider disabled");
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            http_client,
            api_key: api_key.unwrap_or_default(),
            enabled,
            timeout,
        }
    }

    fn shape_reviews(&self, body: ReviewsResponse, doctor_name: &str) -> Vec<Review> {
        let doctor_lower = doctor_name.to_lowercase();
        let mut shaped = Vec::new();

        for place in body.data {
            for raw in place.reviews_data {
                // The server-side reviewsQuery filter already narrowed the
                // stream; re-check the mention locally before caching
                if !raw.review_text.to_lowercase().contains(&doctor_lower) {
                    continue;
                }

                let mut review = Review::new("google_maps", raw.review_text);
                review.url = (!place.google_maps_url.is_empty())
                    .then(|| place.google_maps_url.clone());
                review.rating = raw.review_rating;
                if !raw.author_title.is_empty() {
                    review.author_name = raw.author_title;
                }
                review.review_date =
                    (!raw.review_datetime_utc.is_empty()).then_some(raw.review_datetime_utc);
                review.hospital_name =
                    (!place.name.is_empty()).then(|| place.name.clone());
                shaped.push(review);
            }
        }

        shaped
    }
}

#[async_trait::async_trait]
impl ReviewProvider for OutscraperProvider {
    fn name(&self) -> &'static str {
        "outscraper"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn search(&self, doctor_name: &str, location: &str) -> ProviderResponse {
        if !self.enabled {
            return ProviderResponse::empty();
        }

        let query = format!("{} {}", doctor_name, location);
        let url = format!("{}/maps/reviews-v3", OUTSCRAPER_BASE_URL);
        let limit = REVIEWS_LIMIT.to_string();

        let result = self
            .http_client
            .get(&url)
            .header("X-API-KEY", &self.api_key)
            .query(&[
                ("query", query.as_str()),
                ("reviewsLimit", limit.as_str()),
                // Server-side keyword filter: only reviews mentioning the doctor
                ("reviewsQuery", doctor_name),
                ("language", "en"),
                ("async", "false"),
            ])
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return ProviderResponse::failed(ProviderErrorKind::Timeout),
            Err(e) => {
                return ProviderResponse::failed(ProviderErrorKind::Transport(e.to_string()))
            }
        };

        let status = response.status().as_u16();
        match status {
            200 => {}
            401 | 403 => return ProviderResponse::failed(ProviderErrorKind::Unauthorized),
            429 => return ProviderResponse::failed(ProviderErrorKind::RateLimited),
            other => return ProviderResponse::failed(ProviderErrorKind::Status(other)),
        }

        let body: ReviewsResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                return ProviderResponse::failed(ProviderErrorKind::Malformed(e.to_string()))
            }
        };

        let reviews = self.shape_reviews(body, doctor_name);
        info!(
            doctor = %doctor_name,
            count = reviews.len(),
            "Outscraper keyword search complete"
        );

        ProviderResponse {
            reviews,
            summary: None,
            error: None,
        }
    }
}
