//! AniList GraphQL adapter. `meanScore` is already 0-100 (scale 1).

use super::{ProviderId, ProviderIds, RatingProvider, RawRating};
use crate::config::EngineConfig;
use crate::http_client::ResilientClient;
use crate::media::MediaItem;
use crate::shared::errors::{EngineError, EngineResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

const GRAPHQL_URL: &str = "https://graphql.anilist.co";
const MEDIA_QUERY: &str = "query($id:Int){ Media(id:$id,type:ANIME){ id meanScore popularity } }";

pub struct AniListProvider {
    client: Arc<ResilientClient>,
    config: Arc<EngineConfig>,
}

#[derive(Deserialize)]
struct GraphqlResponse {
    data: Option<MediaData>,
}

#[derive(Deserialize)]
struct MediaData {
    #[serde(rename = "Media")]
    media: Option<Media>,
}

#[derive(Deserialize)]
struct Media {
    #[serde(rename = "meanScore")]
    mean_score: Option<f64>,
    popularity: Option<u64>,
}

impl AniListProvider {
    pub fn new(client: Arc<ResilientClient>, config: Arc<EngineConfig>) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl RatingProvider for AniListProvider {
    fn name(&self) -> &'static str {
        "anilist"
    }

    async fn fetch_ratings(
        &self,
        _item: &MediaItem,
        ids: &ProviderIds,
    ) -> EngineResult<Vec<RawRating>> {
        let Some(anilist_id) = &ids.anilist else {
            return Ok(Vec::new());
        };
        let Ok(id) = anilist_id.parse::<i64>() else {
            return Ok(Vec::new());
        };

        let body = json!({ "query": MEDIA_QUERY, "variables": { "id": id } });
        let ttl = self.config.ttl_for(ProviderId::AniList);
        let outcome = match self.client.post_json(GRAPHQL_URL, body, ttl).await {
            Ok(outcome) => outcome,
            Err(EngineError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let response: GraphqlResponse = serde_json::from_value(outcome.data)
            .map_err(|e| EngineError::Parse(format!("anilist response: {}", e)))?;
        let Some(media) = response.data.and_then(|d| d.media) else {
            return Ok(Vec::new());
        };
        let Some(score) = media.mean_score.filter(|s| s.is_finite()) else {
            return Ok(Vec::new());
        };

        Ok(vec![RawRating {
            provider: ProviderId::AniList,
            raw_value: score,
            vote_count: media.popularity,
            link: Some(format!("https://anilist.co/anime/{}", id)),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graphql_payload_deserializes() {
        let body = r#"{"data":{"Media":{"id":21,"meanScore":87,"popularity":512}}}"#;
        let parsed: GraphqlResponse = serde_json::from_str(body).unwrap();
        let media = parsed.data.unwrap().media.unwrap();
        assert_eq!(media.mean_score, Some(87.0));
        assert_eq!(media.popularity, Some(512));
    }

    #[test]
    fn null_media_deserializes_to_none() {
        let body = r#"{"data":{"Media":null}}"#;
        let parsed: GraphqlResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.data.unwrap().media.is_none());
    }
}
