//! # medrev Common Library
//!
//! Shared code for the medrev doctor-review aggregation service:
//! - Error type used across the workspace
//! - Settings loaded from environment variables
//! - SQLite schema initialization
//! - Shared data models (Review, Sentiment, TTL tiers, quota records)

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::{Review, Sentiment, TtlTier};
