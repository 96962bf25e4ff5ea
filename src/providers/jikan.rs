//! Jikan (MyAnimeList) adapter. Scores are 0-10 (scale 10).

use super::{ProviderId, ProviderIds, RatingProvider, RawRating};
use crate::config::EngineConfig;
use crate::http_client::ResilientClient;
use crate::media::MediaItem;
use crate::shared::errors::{EngineError, EngineResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

const API_BASE: &str = "https://api.jikan.moe/v4";

pub struct JikanProvider {
    client: Arc<ResilientClient>,
    config: Arc<EngineConfig>,
}

#[derive(Deserialize)]
struct JikanResponse {
    data: Option<JikanAnime>,
}

#[derive(Deserialize)]
struct JikanAnime {
    score: Option<f64>,
    scored_by: Option<u64>,
}

impl JikanProvider {
    pub fn new(client: Arc<ResilientClient>, config: Arc<EngineConfig>) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl RatingProvider for JikanProvider {
    fn name(&self) -> &'static str {
        "jikan"
    }

    async fn fetch_ratings(
        &self,
        _item: &MediaItem,
        ids: &ProviderIds,
    ) -> EngineResult<Vec<RawRating>> {
        let Some(mal_id) = &ids.mal else {
            return Ok(Vec::new());
        };

        let url = format!("{}/anime/{}", API_BASE, mal_id);
        let ttl = self.config.ttl_for(ProviderId::MyAnimeList);
        let outcome = match self.client.fetch_json(&url, ttl).await {
            Ok(outcome) => outcome,
            Err(EngineError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let response: JikanResponse = serde_json::from_value(outcome.data)
            .map_err(|e| EngineError::Parse(format!("jikan response: {}", e)))?;
        let Some(anime) = response.data else {
            return Ok(Vec::new());
        };
        let Some(score) = anime.score.filter(|s| s.is_finite()) else {
            return Ok(Vec::new());
        };

        Ok(vec![RawRating {
            provider: ProviderId::MyAnimeList,
            raw_value: score,
            vote_count: anime.scored_by,
            link: Some(format!("https://myanimelist.net/anime/{}", mal_id)),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jikan_payload_deserializes() {
        let body = r#"{"data":{"mal_id":269,"score":8.69,"scored_by":1100000}}"#;
        let parsed: JikanResponse = serde_json::from_str(body).unwrap();
        let anime = parsed.data.unwrap();
        assert_eq!(anime.score, Some(8.69));
        assert_eq!(anime.scored_by, Some(1100000));
    }

    #[test]
    fn unscored_entry_has_no_rating() {
        let body = r#"{"data":{"mal_id":1,"score":null,"scored_by":null}}"#;
        let parsed: JikanResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.data.unwrap().score.is_none());
    }
}
