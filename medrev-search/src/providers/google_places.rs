//! Google Places adapter
//!
//! Two-step flow: a text search locates the doctor's place_id, then a
//! details request pulls the reviews attached to that place. Because a
//! place's review stream mixes doctor, clinic and staff feedback, the
//! adapter filters for reviews that are actually about the doctor.

use chrono::{TimeZone, Utc};
use medrev_common::Review;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ProviderErrorKind, ProviderResponse, ReviewProvider};

const PLACES_BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";
const USER_AGENT: &str = "medrev/0.1.0";

/// Review text containing at least this many policy keywords is judged
/// to be about the clinic, not the doctor
const POLICY_KEYWORD_THRESHOLD: usize = 2;

const POLICY_KEYWORDS: &[&str] = &[
    "clinic does not",
    "hospital policy",
    "they do not give",
    "clinic said",
    "hospital said",
    "policy",
    "procedure",
    "management",
    "appointment system",
    "waiting time",
    "queue",
];

const STAFF_KEYWORDS: &[&str] = &[
    "nurse",
    "nurses",
    "staff",
    "receptionist",
    "reception",
    "front desk",
    "secretary",
];

const DOCTOR_KEYWORDS: &[&str] = &["dr", "doctor", "physician", "specialist"];

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<TextSearchResult>,
}

#[derive(Debug, Deserialize)]
struct TextSearchResult {
    place_id: String,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    result: Option<PlaceDetails>,
}

#[derive(Debug, Deserialize)]
struct PlaceDetails {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    reviews: Vec<PlaceReview>,
}

#[derive(Debug, Deserialize)]
struct PlaceReview {
    #[serde(default)]
    author_name: String,
    #[serde(default)]
    rating: f32,
    #[serde(default)]
    text: String,
    /// Unix timestamp the review was posted
    time: Option<i64>,
}

/// Google Places API adapter
pub struct GooglePlacesProvider {
    http_client: reqwest::Client,
    api_key: String,
    enabled: bool,
    timeout: Duration,
}

impl GooglePlacesProvider {
    /// Build the adapter. A missing key disables the provider here, once;
    /// the aggregator never calls a disabled provider per-request.
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        let enabled = api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        if !enabled {
            warn!("Google Places API key not configured, provider disabled");
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

    /// Find the place_id for a doctor, trying a few query phrasings.
    /// Per-query failures are logged and the next phrasing is tried.
    async fn search_place(
        &self,
        doctor_name: &str,
        location: &str,
    ) -> Result<Option<String>, ProviderErrorKind> {
        let url = format!("{}/textsearch/json", PLACES_BASE_URL);

        let queries = [
            format!("Dr {} {}", doctor_name, location),
            format!("{} doctor {}", doctor_name, location),
            format!("{} clinic {}", doctor_name, location),
        ];

        let mut last_error = None;

        for query in &queries {
            let result = self
                .http_client
                .get(&url)
                .query(&[("query", query.as_str()), ("key", &self.api_key), ("language", "en")])
                .send()
                .await;

            let response = match result {
                Ok(r) => r,
                Err(e) => {
                    debug!(query = %query, error = %e, "Place search request failed");
                    last_error = Some(map_reqwest_error(&e));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                last_error = Some(map_http_status(status.as_u16()));
                continue;
            }

            let body: TextSearchResponse = match response.json().await {
                Ok(b) => b,
                Err(e) => {
                    last_error = Some(ProviderErrorKind::Malformed(e.to_string()));
                    continue;
                }
            };

            if body.status == "OK" {
                if let Some(first) = body.results.first() {
                    debug!(query = %query, place_id = %first.place_id, "Found place");
                    return Ok(Some(first.place_id.clone()));
                }
            }
        }

        match last_error {
            // Every phrasing failed outright
            Some(kind) => Err(kind),
            // Queries ran cleanly but nothing matched
            None => Ok(None),
        }
    }

    async fn place_details(
        &self,
        place_id: &str,
    ) -> Result<PlaceDetails, ProviderErrorKind> {
        let url = format!("{}/details/json", PLACES_BASE_URL);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("place_id", place_id),
                ("fields", "name,rating,user_ratings_total,reviews,formatted_address,url"),
                ("key", &self.api_key),
                ("language", "en"),
            ])
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_http_status(status.as_u16()));
        }

        let body: DetailsResponse = response
            .json()
            .await
            .map_err(|e| ProviderErrorKind::Malformed(e.to_string()))?;

        if body.status != "OK" {
            return Err(ProviderErrorKind::Malformed(format!(
                "details status {}",
                body.status
            )));
        }

        body.result
            .ok_or_else(|| ProviderErrorKind::Malformed("details missing result".to_string()))
    }

    /// Normalize the place's reviews, keeping only those about the doctor.
    fn shape_reviews(&self, details: &PlaceDetails, doctor_name: &str) -> Vec<Review> {
        let key_name = doctor_name
            .to_lowercase()
            .replace("dr.", "")
            .replace("dr", "")
            .trim()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();

        let raw_count = details.reviews.len();
        let mut shaped = Vec::new();

        for raw in &details.reviews {
            let text_lower = raw.text.to_lowercase();

            if !is_review_about_doctor(&text_lower, &key_name) {
                debug!("Filtered review not about the doctor");
                continue;
            }
            if is_clinic_policy_review(&text_lower) {
                debug!("Filtered clinic-policy review");
                continue;
            }
            if is_staff_review(&text_lower) {
                debug!("Filtered staff-focused review");
                continue;
            }

            let mut review = Review::new("google_maps", raw.text.clone());
            review.url = (!details.url.is_empty()).then(|| details.url.clone());
            review.rating = raw.rating;
            if !raw.author_name.is_empty() {
                review.author_name = raw.author_name.clone();
            }
            review.review_date = raw
                .time
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                .map(|dt| dt.format("%Y-%m-%d").to_string());
            review.hospital_name = (!details.name.is_empty()).then(|| details.name.clone());
            shaped.push(review);
        }

        info!(
            raw = raw_count,
            kept = shaped.len(),
            doctor = %doctor_name,
            "Filtered Google Maps reviews"
        );
        shaped
    }
}

#[async_trait::async_trait]
impl ReviewProvider for GooglePlacesProvider {
    fn name(&self) -> &'static str {
        "google_places"
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

        let place_id = match self.search_place(doctor_name, location).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                info!(doctor = %doctor_name, "No Google Maps place found");
                return ProviderResponse::empty();
            }
            Err(kind) => return ProviderResponse::failed(kind),
        };

        let details = match self.place_details(&place_id).await {
            Ok(d) => d,
            Err(kind) => return ProviderResponse::failed(kind),
        };

        ProviderResponse {
            reviews: self.shape_reviews(&details, doctor_name),
            summary: None,
            error: None,
        }
    }
}

fn map_reqwest_error(e: &reqwest::Error) -> ProviderErrorKind {
    if e.is_timeout() {
        ProviderErrorKind::Timeout
    } else {
        ProviderErrorKind::Transport(e.to_string())
    }
}

fn map_http_status(status: u16) -> ProviderErrorKind {
    match status {
        401 | 403 => ProviderErrorKind::Unauthorized,
        429 => ProviderErrorKind::RateLimited,
        other => ProviderErrorKind::Status(other),
    }
}

/// A review counts as being about the doctor when it mentions their name
/// or an explicit "dr" reference; very short reviews with only generic
/// doctor wording are dropped as too ambiguous.
fn is_review_about_doctor(text_lower: &str, key_name: &str) -> bool {
    if !key_name.is_empty() && !text_lower.contains(key_name) && !text_lower.contains("dr") {
        return false;
    }

    let generic = ["the doctor", "this doctor", "doctor"];
    if generic.iter().any(|t| text_lower.contains(t)) && text_lower.len() < 50 {
        return false;
    }

    true
}

/// Reviews dominated by policy complaints are about the clinic, not the
/// doctor
fn is_clinic_policy_review(text_lower: &str) -> bool {
    let hits = POLICY_KEYWORDS
        .iter()
        .filter(|k| text_lower.contains(**k))
        .count();
    hits >= POLICY_KEYWORD_THRESHOLD
}

/// Reviews primarily about nurses/reception rather than the doctor
fn is_staff_review(text_lower: &str) -> bool {
    let staff = STAFF_KEYWORDS
        .iter()
        .filter(|k| text_lower.contains(**k))
        .count();
    let doctor = DOCTOR_KEYWORDS
        .iter()
        .filter(|k| text_lower.contains(**k))
        .count();

    if staff > doctor && text_lower.len() < 80 {
        return true;
    }
    if staff >= 3 && doctor <= 1 && text_lower.len() < 150 {
        return true;
    }
    if staff >= 2 && doctor == 0 && text_lower.len() < 100 {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_disables_provider() {
        let p = GooglePlacesProvider::new(None, Duration::from_secs(30));
        assert!(!p.enabled());

        let p = GooglePlacesProvider::new(Some("  ".to_string()), Duration::from_secs(30));
        assert!(!p.enabled());

        let p = GooglePlacesProvider::new(Some("key".to_string()), Duration::from_secs(30));
        assert!(p.enabled());
    }

    #[tokio::test]
    async fn disabled_provider_short_circuits() {
        let p = GooglePlacesProvider::new(None, Duration::from_secs(30));
        let resp = p.search("Dr. Lee", "Malaysia").await;
        assert!(resp.reviews.is_empty());
        assert!(resp.error.is_none());
    }

    #[test]
    fn staff_review_filtered() {
        assert!(is_staff_review("the nurses and front desk staff were so rude"));
        // Doctor-focused review mentioning a nurse once passes
        assert!(!is_staff_review(
            "dr tan was thorough and kind, explained everything clearly, \
             the nurse helped too and the doctor followed up personally the next week"
        ));
    }

    #[test]
    fn policy_review_filtered() {
        assert!(is_clinic_policy_review(
            "terrible appointment system and the waiting time is crazy"
        ));
        assert!(!is_clinic_policy_review("dr lim is a wonderful physician"));
    }

    #[test]
    fn shaping_filters_and_normalizes() {
        let p = GooglePlacesProvider::new(Some("key".to_string()), Duration::from_secs(30));
        let details = PlaceDetails {
            name: "Gleneagles Hospital".to_string(),
            url: "https://maps.google.com/place".to_string(),
            reviews: vec![
                PlaceReview {
                    author_name: "Jane".to_string(),
                    rating: 5.0,
                    text: "Dr Tan was excellent, very patient with my mother".to_string(),
                    time: Some(1_700_000_000),
                },
                PlaceReview {
                    author_name: String::new(),
                    rating: 1.0,
                    text: "nurses were rude at the front desk".to_string(),
                    time: None,
                },
            ],
        };

        let shaped = p.shape_reviews(&details, "Dr. Tan");
        assert_eq!(shaped.len(), 1);
        assert_eq!(shaped[0].source, "google_maps");
        assert_eq!(shaped[0].hospital_name.as_deref(), Some("Gleneagles Hospital"));
        assert_eq!(shaped[0].author_name, "Jane");
        assert!(shaped[0].review_date.as_deref().unwrap().starts_with("2023-"));
    }
}
