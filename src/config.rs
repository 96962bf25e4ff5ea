//! Engine configuration.
//!
//! Every field carries a default matching the stock overlay setup, so a host
//! can deserialize a partial config (or none at all) and get sensible
//! behavior. Unknown providers in the maps are ignored.

use crate::providers::ProviderId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Per-origin scheduling limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum gap between a task's settlement and the next dequeue.
    pub interval_ms: u64,
    /// Cap on simultaneously running tasks for this origin.
    pub max_concurrent: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            interval_ms: 250,
            max_concurrent: 4,
        }
    }
}

/// Bounded exponential backoff parameters for a single logical call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 300,
            max_delay_ms: 2000,
        }
    }
}

/// Three ascending thresholds splitting 0-100 into four bands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ColorBands {
    pub red_max: i32,
    pub orange_max: i32,
    pub yg_max: i32,
}

impl Default for ColorBands {
    fn default() -> Self {
        Self {
            red_max: 50,
            orange_max: 69,
            yg_max: 79,
        }
    }
}

/// How an episode observation is rated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStrategy {
    /// Fold the episode into its parent series identity (default).
    #[default]
    Series,
    /// Rate the episode itself.
    Episode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Enable/disable per provider. Absent providers are enabled.
    pub sources: HashMap<ProviderId, bool>,
    /// Ascending display priority per provider.
    pub priorities: HashMap<ProviderId, i32>,
    /// Per-origin overrides; origins not listed use `default_rate_limit`.
    pub rate_limits: HashMap<String, RateLimitConfig>,
    pub default_rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    /// Score TTL per provider, in milliseconds.
    pub ttl_by_provider: HashMap<ProviderId, u64>,
    pub default_ttl_ms: u64,
    /// TTL for the primary aggregator feed, which carries many sub-source
    /// scores in one payload and so has no single provider key of its own.
    /// Unset falls back to `default_ttl_ms`.
    pub aggregator_ttl_ms: Option<u64>,
    /// Identifier mappings rarely change; they get their own long TTL.
    pub resolution_ttl_ms: u64,
    pub color_bands: ColorBands,
    /// Credential for the primary aggregator. Empty disables that provider
    /// without error.
    pub access_token: String,
    pub episode_strategy: EpisodeStrategy,
    /// Coalescing window for reconciliation passes.
    pub debounce_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sources: HashMap::new(),
            priorities: default_priorities(),
            rate_limits: default_rate_limits(),
            default_rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            ttl_by_provider: HashMap::new(),
            default_ttl_ms: 24 * 60 * 60 * 1000,
            aggregator_ttl_ms: None,
            resolution_ttl_ms: 30 * 24 * 60 * 60 * 1000,
            color_bands: ColorBands::default(),
            access_token: String::new(),
            episode_strategy: EpisodeStrategy::default(),
            debounce_ms: 150,
        }
    }
}

impl EngineConfig {
    pub fn source_enabled(&self, provider: ProviderId) -> bool {
        self.sources.get(&provider).copied().unwrap_or(true)
    }

    pub fn priority(&self, provider: ProviderId) -> i32 {
        self.priorities
            .get(&provider)
            .copied()
            .unwrap_or(i32::MAX)
    }

    pub fn rate_limit_for(&self, origin: &str) -> RateLimitConfig {
        self.rate_limits
            .get(origin)
            .copied()
            .unwrap_or(self.default_rate_limit)
    }

    pub fn ttl_for(&self, provider: ProviderId) -> Duration {
        let ms = self
            .ttl_by_provider
            .get(&provider)
            .copied()
            .unwrap_or(self.default_ttl_ms);
        Duration::from_millis(ms)
    }

    pub fn aggregator_ttl(&self) -> Duration {
        Duration::from_millis(self.aggregator_ttl_ms.unwrap_or(self.default_ttl_ms))
    }

    pub fn resolution_ttl(&self) -> Duration {
        Duration::from_millis(self.resolution_ttl_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_priorities() -> HashMap<ProviderId, i32> {
    use ProviderId::*;
    [
        (Imdb, 1),
        (Tmdb, 2),
        (Trakt, 3),
        (Letterboxd, 4),
        (RottenTomatoesCritic, 5),
        (RottenTomatoesAudience, 6),
        (RogerEbert, 7),
        (MetacriticCritic, 8),
        (MetacriticUser, 9),
        (AniList, 10),
        (MyAnimeList, 11),
    ]
    .into_iter()
    .collect()
}

fn default_rate_limits() -> HashMap<String, RateLimitConfig> {
    // Smaller APIs get tighter limits than the aggregator.
    [
        (
            "api.mdblist.com".to_string(),
            RateLimitConfig {
                interval_ms: 250,
                max_concurrent: 4,
            },
        ),
        (
            "query.wikidata.org".to_string(),
            RateLimitConfig {
                interval_ms: 500,
                max_concurrent: 2,
            },
        ),
        (
            "graphql.anilist.co".to_string(),
            RateLimitConfig {
                interval_ms: 2000,
                max_concurrent: 1,
            },
        ),
        (
            "api.jikan.moe".to_string(),
            RateLimitConfig {
                interval_ms: 1000,
                max_concurrent: 1,
            },
        ),
        (
            "www.rottentomatoes.com".to_string(),
            RateLimitConfig {
                interval_ms: 1000,
                max_concurrent: 1,
            },
        ),
    ]
    .into_iter()
    .collect()
}
