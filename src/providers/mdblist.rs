//! Primary aggregator adapter.
//!
//! One MDBList call returns the scores most sub-sources publish for an item
//! (IMDb, TMDb, Trakt, Letterboxd, Rotten Tomatoes, Metacritic, Roger
//! Ebert), so this adapter yields several `RawRating`s per fetch. Sub-source
//! toggles from the config are applied here since upstream does not filter.

use super::{slug, ProviderId, ProviderIds, RatingProvider, RawRating};
use crate::config::EngineConfig;
use crate::http_client::ResilientClient;
use crate::media::{MediaItem, MediaKind};
use crate::shared::errors::{EngineError, EngineResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

const API_BASE: &str = "https://api.mdblist.com";

pub struct MdblistProvider {
    client: Arc<ResilientClient>,
    config: Arc<EngineConfig>,
    api_key: String,
}

#[derive(Deserialize)]
struct MdblistResponse {
    title: Option<String>,
    #[serde(default)]
    ratings: Vec<MdblistRating>,
}

#[derive(Deserialize)]
struct MdblistRating {
    source: Option<String>,
    value: Option<f64>,
    votes: Option<u64>,
}

impl MdblistProvider {
    pub fn new(
        client: Arc<ResilientClient>,
        config: Arc<EngineConfig>,
    ) -> EngineResult<Self> {
        if config.access_token.trim().is_empty() {
            return Err(EngineError::Config(
                "mdblist access token missing".to_string(),
            ));
        }
        let api_key = config.access_token.clone();
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Classify an upstream source tag. The tag vocabulary is loose
    /// ("tomatoes", "popcorn", "metacritic_user", ...), so matching is by
    /// substring the way the feed documents it.
    fn classify(source: &str) -> Option<ProviderId> {
        let s = source.to_lowercase();
        if s.contains("imdb") {
            Some(ProviderId::Imdb)
        } else if s.contains("tmdb") {
            Some(ProviderId::Tmdb)
        } else if s.contains("trakt") {
            Some(ProviderId::Trakt)
        } else if s.contains("letterboxd") {
            Some(ProviderId::Letterboxd)
        } else if s == "tomatoes" || s.contains("rotten") {
            if s.contains("audience") || s.contains("popcorn") {
                Some(ProviderId::RottenTomatoesAudience)
            } else {
                Some(ProviderId::RottenTomatoesCritic)
            }
        } else if s.contains("popcorn") || s.contains("audience") {
            Some(ProviderId::RottenTomatoesAudience)
        } else if s.contains("metacritic") {
            if s.contains("user") {
                Some(ProviderId::MetacriticUser)
            } else {
                Some(ProviderId::MetacriticCritic)
            }
        } else if s.contains("roger") {
            Some(ProviderId::RogerEbert)
        } else {
            None
        }
    }

    fn link_for(
        &self,
        provider: ProviderId,
        item: &MediaItem,
        ids: &ProviderIds,
        title: &str,
    ) -> Option<String> {
        let media_path = match item.kind {
            MediaKind::Movie => "movie",
            _ => "tv",
        };
        match provider {
            ProviderId::Imdb => ids
                .imdb
                .as_ref()
                .map(|id| format!("https://www.imdb.com/title/{}/", id)),
            ProviderId::Tmdb => ids.tmdb.as_ref().map(|id| {
                format!("https://www.themoviedb.org/{}/{}", media_path, id)
            }),
            ProviderId::Trakt => ids
                .imdb
                .as_ref()
                .map(|id| format!("https://trakt.tv/search/imdb/{}", id)),
            ProviderId::Letterboxd => ids
                .imdb
                .as_ref()
                .map(|id| format!("https://letterboxd.com/imdb/{}/", id)),
            ProviderId::RottenTomatoesCritic | ProviderId::RottenTomatoesAudience => {
                if title.is_empty() {
                    None
                } else {
                    Some(format!(
                        "https://www.rottentomatoes.com/search?search={}",
                        urlencoding::encode(title)
                    ))
                }
            }
            ProviderId::MetacriticCritic | ProviderId::MetacriticUser => {
                let seg = match item.kind {
                    MediaKind::Movie => "movie",
                    _ => "tv",
                };
                let s = slug(title);
                if s.is_empty() {
                    Some(format!(
                        "https://www.metacritic.com/search/all/{}/results",
                        urlencoding::encode(title)
                    ))
                } else {
                    Some(format!("https://www.metacritic.com/{}/{}", seg, s))
                }
            }
            ProviderId::RogerEbert => {
                let s = slug(title);
                (!s.is_empty()).then(|| format!("https://www.rogerebert.com/reviews/{}", s))
            }
            _ => None,
        }
    }

    fn map_response(
        &self,
        response: MdblistResponse,
        item: &MediaItem,
        ids: &ProviderIds,
    ) -> Vec<RawRating> {
        let title = response.title.unwrap_or_else(|| item.title.clone());
        let mut out = Vec::new();
        for rating in response.ratings {
            let Some(source) = rating.source else { continue };
            let Some(value) = rating.value else { continue };
            if !value.is_finite() {
                continue;
            }
            let Some(provider) = Self::classify(&source) else {
                debug!("unrecognized mdblist source tag: {}", source);
                continue;
            };
            if !self.config.source_enabled(provider) {
                continue;
            }
            out.push(RawRating {
                provider,
                raw_value: value,
                vote_count: rating.votes,
                link: self.link_for(provider, item, ids, &title),
            });
        }
        out
    }
}

#[async_trait]
impl RatingProvider for MdblistProvider {
    fn name(&self) -> &'static str {
        "mdblist"
    }

    async fn fetch_ratings(
        &self,
        item: &MediaItem,
        ids: &ProviderIds,
    ) -> EngineResult<Vec<RawRating>> {
        let Some(tmdb_id) = &ids.tmdb else {
            return Ok(Vec::new());
        };
        let media_path = match item.kind {
            MediaKind::Movie => "movie",
            _ => "show",
        };
        let url = format!(
            "{}/tmdb/{}/{}?apikey={}",
            API_BASE, media_path, tmdb_id, self.api_key
        );

        let ttl = self.config.aggregator_ttl();
        let outcome = match self.client.fetch_json(&url, ttl).await {
            Ok(outcome) => outcome,
            Err(EngineError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let response: MdblistResponse = serde_json::from_value(outcome.data)
            .map_err(|e| EngineError::Parse(format!("mdblist response: {}", e)))?;
        Ok(self.map_response(response, item, ids))
    }
}
