//! medrev-search - one-shot doctor review search
//!
//! Wires the full request path the way the messaging layer would:
//! quota admission, cache-first aggregation across enabled providers,
//! sentiment annotation, and a printed outcome.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use medrev_common::config::Settings;
use medrev_common::TtlTier;
use medrev_search::providers::{GooglePlacesProvider, OutscraperProvider};
use medrev_search::{
    KeywordAnnotator, QuotaManager, QuotaPolicy, ReviewAggregator, ReviewCache, ReviewProvider,
    SentimentAnnotator, TtlPolicy,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TierArg {
    Default,
    Hot,
    Cold,
}

impl From<TierArg> for TtlTier {
    fn from(t: TierArg) -> Self {
        match t {
            TierArg::Default => TtlTier::Default,
            TierArg::Hot => TtlTier::Hot,
            TierArg::Cold => TtlTier::Cold,
        }
    }
}

#[derive(Parser)]
#[command(name = "medrev-search", about = "Search external sources for doctor reviews")]
struct Args {
    /// Doctor name to search for
    doctor_name: String,

    /// Location to search in (falls back to the configured default)
    #[arg(long)]
    location: Option<String>,

    /// Specialty hint, carried through to cached rows
    #[arg(long)]
    specialty: Option<String>,

    /// Caller identity for quota accounting
    #[arg(long, default_value = "cli")]
    caller: String,

    /// TTL tier for the cache write on a miss
    #[arg(long, value_enum, default_value_t = TierArg::Default)]
    tier: TierArg,

    /// Run the expired-row sweep before searching
    #[arg(long)]
    sweep: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let settings = Settings::from_env();

    info!("Starting medrev-search");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", settings.database_path);

    let pool = medrev_common::db::init_database(Path::new(&settings.database_path)).await?;

    let providers: Vec<Arc<dyn ReviewProvider>> = vec![
        Arc::new(GooglePlacesProvider::new(
            settings.google_places_api_key.clone(),
            Duration::from_secs(settings.google_places_timeout_secs),
        )),
        Arc::new(OutscraperProvider::new(
            settings.outscraper_api_key.clone(),
            Duration::from_secs(settings.outscraper_timeout_secs),
        )),
    ];
    let enabled = providers.iter().filter(|p| p.enabled()).count();
    info!(
        enabled,
        configured = providers.len(),
        "Provider adapters initialized"
    );

    let cache = Arc::new(ReviewCache::new(
        pool.clone(),
        TtlPolicy::from_settings(&settings),
    ));
    let aggregator = ReviewAggregator::new(Arc::clone(&cache), providers);
    let quota = QuotaManager::new(pool.clone(), QuotaPolicy::from_settings(&settings));

    if args.sweep {
        let deleted = cache.sweep_expired(settings.cache_retention_days).await?;
        info!(deleted, "Cache sweep complete");
    }

    // Admission check before any search work
    let decision = quota.check_and_admit(&args.caller).await;
    if !decision.allowed {
        println!(
            "Monthly quota exhausted for '{}' ({}/{}). Quota resets next month.",
            args.caller, decision.used, decision.ceiling
        );
        return Ok(());
    }
    info!(
        caller = %args.caller,
        used = decision.used,
        remaining = decision.remaining,
        "Request admitted"
    );

    let location = args
        .location
        .unwrap_or_else(|| settings.default_location.clone());

    let mut result = aggregator
        .search_doctor_reviews(
            &args.doctor_name,
            &location,
            args.specialty.as_deref(),
            args.tier.into(),
        )
        .await?;

    // Annotation is the caller's step, additive only
    let annotator = KeywordAnnotator::new();
    result.reviews = annotator.annotate(result.reviews).await;

    println!("{}", result.message);
    println!("source: {:?}, outcome: {:?}", result.source, result.outcome);
    for pc in &result.provider_counts {
        match &pc.error {
            Some(err) => println!("  {}: {} reviews (error: {})", pc.provider, pc.count, err),
            None => println!("  {}: {} reviews", pc.provider, pc.count),
        }
    }
    if let Some(summary) = &result.summary {
        println!("\nSummary: {}", summary);
    }
    for (i, review) in result.reviews.iter().enumerate() {
        let sentiment = review
            .sentiment
            .map(|s| s.as_str())
            .unwrap_or("unclassified");
        let rating = if review.rating > 0.0 {
            format!("{:.1}/5", review.rating)
        } else {
            "unrated".to_string()
        };
        println!(
            "\n{}. [{}] {} ({}, {})",
            i + 1,
            review.source,
            review.author_name,
            rating,
            sentiment
        );
        println!("   {}", review.snippet);
        if let Some(date) = &review.review_date {
            println!("   posted: {}", date);
        }
    }

    Ok(())
}
