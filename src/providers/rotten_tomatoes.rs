//! Rotten Tomatoes fallback adapter.
//!
//! RT has no public JSON API; the title page embeds a
//! `media-scorecard-json` script block with critic and audience scores.
//! This adapter is only consulted when the primary aggregator carried no RT
//! rating for the item.

use super::{ProviderId, ProviderIds, RatingProvider, RawRating};
use crate::config::EngineConfig;
use crate::http_client::ResilientClient;
use crate::media::MediaItem;
use crate::shared::errors::{EngineError, EngineResult};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;

pub struct RottenTomatoesProvider {
    client: Arc<ResilientClient>,
    config: Arc<EngineConfig>,
    scorecard_re: Regex,
}

#[derive(Deserialize)]
struct Scorecard {
    #[serde(rename = "criticsScore")]
    critics_score: Option<ScoreBlock>,
    #[serde(rename = "audienceScore")]
    audience_score: Option<ScoreBlock>,
}

#[derive(Deserialize)]
struct ScoreBlock {
    /// The page serializes scores as strings ("83") or numbers.
    score: Option<serde_json::Value>,
    #[serde(rename = "ratingCount")]
    rating_count: Option<u64>,
}

impl ScoreBlock {
    fn value(&self) -> Option<f64> {
        match self.score.as_ref()? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite())
    }
}

impl RottenTomatoesProvider {
    pub fn new(client: Arc<ResilientClient>, config: Arc<EngineConfig>) -> Self {
        Self {
            client,
            config,
            scorecard_re: Regex::new(
                r#"(?s)<script\s+id="media-scorecard-json"[^>]*>(.*?)</script>"#,
            )
            .expect("scorecard regex"),
        }
    }

    fn extract(&self, page: &str, link: &str) -> EngineResult<Vec<RawRating>> {
        let Some(captures) = self.scorecard_re.captures(page) else {
            // Page layouts change; no block means no data, not a failure.
            return Ok(Vec::new());
        };
        let scorecard: Scorecard = serde_json::from_str(&captures[1])
            .map_err(|e| EngineError::Parse(format!("rt scorecard: {}", e)))?;

        let mut out = Vec::new();
        if let Some(block) = &scorecard.critics_score {
            if let Some(value) = block.value() {
                out.push(RawRating {
                    provider: ProviderId::RottenTomatoesCritic,
                    raw_value: value,
                    vote_count: block.rating_count,
                    link: Some(link.to_string()),
                });
            }
        }
        if let Some(block) = &scorecard.audience_score {
            if let Some(value) = block.value() {
                out.push(RawRating {
                    provider: ProviderId::RottenTomatoesAudience,
                    raw_value: value,
                    vote_count: block.rating_count,
                    link: Some(link.to_string()),
                });
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl RatingProvider for RottenTomatoesProvider {
    fn name(&self) -> &'static str {
        "rotten_tomatoes"
    }

    async fn fetch_ratings(
        &self,
        _item: &MediaItem,
        ids: &ProviderIds,
    ) -> EngineResult<Vec<RawRating>> {
        let Some(path) = &ids.rotten_tomatoes else {
            return Ok(Vec::new());
        };
        let url = format!("https://www.rottentomatoes.com/{}", path);
        let ttl = self.config.ttl_for(ProviderId::RottenTomatoesCritic);

        let outcome = match self.client.fetch_text(&url, ttl).await {
            Ok(outcome) => outcome,
            Err(EngineError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        self.extract(&outcome.data, &url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::http_client::transport::MockHttpTransport;

    fn provider() -> RottenTomatoesProvider {
        let config = Arc::new(EngineConfig::default());
        let client = Arc::new(ResilientClient::new(
            Arc::new(MockHttpTransport::new()),
            Arc::new(MemoryCacheStore::new()),
            &config,
        ));
        RottenTomatoesProvider::new(client, config)
    }

    const PAGE: &str = r#"<html><head>
        <script id="media-scorecard-json" type="application/json">
        {"criticsScore":{"score":"83","ratingCount":512},
         "audienceScore":{"score":85,"ratingCount":250000}}
        </script></head><body></body></html>"#;

    #[test]
    fn extracts_critic_and_audience_scores() {
        let p = provider();
        let ratings = p
            .extract(PAGE, "https://www.rottentomatoes.com/m/the_matrix")
            .unwrap();
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0].provider, ProviderId::RottenTomatoesCritic);
        assert_eq!(ratings[0].raw_value, 83.0);
        assert_eq!(ratings[1].provider, ProviderId::RottenTomatoesAudience);
        assert_eq!(ratings[1].raw_value, 85.0);
        assert_eq!(ratings[1].vote_count, Some(250000));
    }

    #[test]
    fn page_without_scorecard_is_empty() {
        let p = provider();
        let ratings = p.extract("<html></html>", "x").unwrap();
        assert!(ratings.is_empty());
    }

    #[test]
    fn malformed_scorecard_is_parse_error() {
        let p = provider();
        let page = r#"<script id="media-scorecard-json">{broken</script>"#;
        let err = p.extract(page, "x").unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
    }
}
