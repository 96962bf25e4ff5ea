//! Merging heterogeneous provider scores into one ordered result set.

use super::normalize::normalize;
use crate::config::EngineConfig;
use crate::providers::{ProviderId, RawRating};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRating {
    pub provider: ProviderId,
    /// Common 0-100 range (unclamped, see `normalize`).
    pub score: i32,
    pub vote_count: Option<u64>,
    pub link: Option<String>,
}

/// Ordered ratings for one item plus the uniform-weight composite. A pure
/// view over this cycle's fetches; always reconstructible, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct AggregationResult {
    pub ratings: Vec<NormalizedRating>,
    /// round(mean) of the scores present this cycle; absent providers
    /// contribute nothing and carry no weight.
    pub master_score: Option<i32>,
}

impl AggregationResult {
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

/// Normalize, dedupe, compose and order this cycle's raw ratings. The first
/// rating seen per provider wins; ordering is ascending by configured
/// priority with insertion order breaking ties.
pub fn merge(raw_ratings: Vec<RawRating>, config: &EngineConfig) -> AggregationResult {
    let mut ratings: Vec<NormalizedRating> = Vec::with_capacity(raw_ratings.len());

    for raw in raw_ratings {
        if !raw.raw_value.is_finite() {
            continue;
        }
        if ratings.iter().any(|r| r.provider == raw.provider) {
            continue;
        }
        ratings.push(NormalizedRating {
            provider: raw.provider,
            score: normalize(raw.raw_value, raw.provider.scale()),
            vote_count: raw.vote_count,
            link: raw.link,
        });
    }

    let master_score = if ratings.is_empty() {
        None
    } else {
        let sum: i64 = ratings.iter().map(|r| r.score as i64).sum();
        Some((sum as f64 / ratings.len() as f64).round() as i32)
    };

    ratings.sort_by_key(|r| config.priority(r.provider));

    AggregationResult {
        ratings,
        master_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(provider: ProviderId, value: f64) -> RawRating {
        RawRating {
            provider,
            raw_value: value,
            vote_count: None,
            link: None,
        }
    }

    #[test]
    fn master_score_is_rounded_mean() {
        let result = merge(
            vec![
                raw(ProviderId::Imdb, 8.3),
                raw(ProviderId::Tmdb, 9.2),
                raw(ProviderId::MetacriticCritic, 75.0),
            ],
            &EngineConfig::default(),
        );
        let scores: Vec<_> = result.ratings.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![83, 92, 75]);
        assert_eq!(result.master_score, Some(83));
    }

    #[test]
    fn ordering_follows_configured_priority() {
        let result = merge(
            vec![
                raw(ProviderId::MyAnimeList, 8.7),
                raw(ProviderId::Imdb, 8.0),
                raw(ProviderId::AniList, 84.0),
            ],
            &EngineConfig::default(),
        );
        let order: Vec<_> = result.ratings.iter().map(|r| r.provider).collect();
        assert_eq!(
            order,
            vec![ProviderId::Imdb, ProviderId::AniList, ProviderId::MyAnimeList]
        );
    }

    #[test]
    fn equal_priorities_keep_insertion_order() {
        let mut config = EngineConfig::default();
        config.priorities.insert(ProviderId::Imdb, 7);
        config.priorities.insert(ProviderId::Tmdb, 7);
        let result = merge(
            vec![raw(ProviderId::Tmdb, 7.0), raw(ProviderId::Imdb, 8.0)],
            &config,
        );
        let order: Vec<_> = result.ratings.iter().map(|r| r.provider).collect();
        assert_eq!(order, vec![ProviderId::Tmdb, ProviderId::Imdb]);
    }

    #[test]
    fn first_rating_per_provider_wins() {
        let result = merge(
            vec![raw(ProviderId::Imdb, 8.0), raw(ProviderId::Imdb, 6.0)],
            &EngineConfig::default(),
        );
        assert_eq!(result.ratings.len(), 1);
        assert_eq!(result.ratings[0].score, 80);
    }

    #[test]
    fn non_finite_values_are_dropped() {
        let result = merge(
            vec![
                raw(ProviderId::Imdb, f64::NAN),
                raw(ProviderId::Tmdb, 7.0),
            ],
            &EngineConfig::default(),
        );
        assert_eq!(result.ratings.len(), 1);
        assert_eq!(result.master_score, Some(70));
    }

    #[test]
    fn empty_input_yields_empty_result() {
        let result = merge(Vec::new(), &EngineConfig::default());
        assert!(result.is_empty());
        assert_eq!(result.master_score, None);
    }

    #[test]
    fn out_of_range_scores_feed_master_unclamped() {
        let result = merge(
            vec![raw(ProviderId::Imdb, 12.5), raw(ProviderId::Tmdb, 7.5)],
            &EngineConfig::default(),
        );
        let scores: Vec<_> = result.ratings.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![125, 75]);
        assert_eq!(result.master_score, Some(100));
    }
}
