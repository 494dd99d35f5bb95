#![allow(dead_code)]
//! Engine configuration.
//!
//! Provides strongly-typed configuration with validation, environment
//! variable parsing, and sensible defaults drawn straight from the engine's
//! algorithms: every default below equals the literal constant the
//! specification names, so behavior is unchanged unless explicitly
//! overridden by an operator.
//!
//! # Example
//! ```no_run
//! use recanthology::EngineConfig;
//! let config = EngineConfig::from_env().expect("failed to load config");
//! println!("shrinkage: {}", config.shrinkage);
//! ```

use std::time::Duration;
use tracing::info;

/// Tunables for the recommendation engine's algorithms.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Shrinkage term `λ` damping item-item cosine similarity (§4.5).
    pub shrinkage: f64,
    /// CF weight at or above `cf_weight_threshold` interactions (§4.9).
    pub cf_weight: f64,
    /// Rating-count threshold at which `alpha` reaches its floor (§4.9).
    pub cf_weight_threshold: f64,
    /// Below this many ratings, an item is eligible for the new-item boost (§4.7).
    pub min_ratings: u32,
    /// Boost multiplier applied to genre-overlap when boosting new items (§4.7).
    pub boost_factor: f64,
    /// Maximum number of new items injected by the boost pass (§4.7).
    pub max_boosted: usize,
    /// Cap on the feature-signal bonus (§4.8).
    pub max_signal_bonus: f64,
    /// TTL for cached item-similarity lists (§6 cache namespace).
    pub item_similarity_ttl: Duration,
    /// TTL for cached recommendation results (§6 cache namespace).
    pub recommendation_ttl: Duration,
    /// TTL for the optional cached preference vector (§6 cache namespace).
    pub preference_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shrinkage: 25.0,
            cf_weight: 0.4,
            cf_weight_threshold: 15.0,
            min_ratings: 5,
            boost_factor: 15.0,
            max_boosted: 10,
            max_signal_bonus: 30.0,
            item_similarity_ttl: Duration::from_secs(21_600),
            recommendation_ttl: Duration::from_secs(3_600),
            preference_ttl: Duration::from_secs(3_600),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to a
    /// `.env` file and then to spec-literal defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let config = Self {
            shrinkage: get_env_parsed("ENGINE_SHRINKAGE", 25.0),
            cf_weight: get_env_parsed("ENGINE_CF_WEIGHT", 0.4),
            cf_weight_threshold: get_env_parsed("ENGINE_CF_WEIGHT_THRESHOLD", 15.0),
            min_ratings: get_env_parsed("ENGINE_MIN_RATINGS", 5),
            boost_factor: get_env_parsed("ENGINE_BOOST_FACTOR", 15.0),
            max_boosted: get_env_parsed("ENGINE_MAX_BOOSTED", 10),
            max_signal_bonus: get_env_parsed("ENGINE_MAX_SIGNAL_BONUS", 30.0),
            item_similarity_ttl: Duration::from_secs(get_env_parsed(
                "ENGINE_ITEM_SIMILARITY_TTL_SECS",
                21_600,
            )),
            recommendation_ttl: Duration::from_secs(get_env_parsed(
                "ENGINE_RECOMMENDATION_TTL_SECS",
                3_600,
            )),
            preference_ttl: Duration::from_secs(get_env_parsed(
                "ENGINE_PREFERENCE_TTL_SECS",
                3_600,
            )),
        };

        config.log_summary();
        config
    }

    fn log_summary(&self) {
        info!(
            shrinkage = self.shrinkage,
            cf_weight = self.cf_weight,
            cf_weight_threshold = self.cf_weight_threshold,
            min_ratings = self.min_ratings,
            boost_factor = self.boost_factor,
            max_boosted = self.max_boosted,
            max_signal_bonus = self.max_signal_bonus,
            "engine configuration loaded"
        );
    }
}

/// Get and parse an environment variable, falling back to `default` when the
/// variable is absent or fails to parse.
fn get_env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_literal_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.shrinkage, 25.0);
        assert_eq!(config.cf_weight, 0.4);
        assert_eq!(config.cf_weight_threshold, 15.0);
        assert_eq!(config.min_ratings, 5);
        assert_eq!(config.boost_factor, 15.0);
        assert_eq!(config.max_boosted, 10);
        assert_eq!(config.max_signal_bonus, 30.0);
        assert_eq!(config.item_similarity_ttl, Duration::from_secs(21_600));
        assert_eq!(config.recommendation_ttl, Duration::from_secs(3_600));
    }
}
