//! The resolve→fetch→merge pipeline behind every score on screen.

use crate::aggregation::{merge, AggregationResult};
use crate::config::EngineConfig;
use crate::http_client::ResilientClient;
use crate::media::MediaItem;
use crate::providers::{
    AniListProvider, JikanProvider, MdblistProvider, ProviderId, ProviderIds, RatingProvider,
    RawRating, RottenTomatoesProvider, WikidataResolver,
};
use crate::reconcile::ScoreSource;
use crate::shared::errors::EngineResult;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Wires the provider set to one resilient client. Construction fails only
/// on configuration problems (a missing MDBList key while MDBList-backed
/// sources are enabled); everything at fetch time degrades instead.
pub struct ScorePipeline {
    config: Arc<EngineConfig>,
    resolver: WikidataResolver,
    /// Primary aggregator plus the anime backends, fetched concurrently.
    providers: Vec<Arc<dyn RatingProvider>>,
    /// Scrape fallback, used only when the primary feed had no RT scores.
    rotten_tomatoes: Arc<RottenTomatoesProvider>,
}

impl ScorePipeline {
    pub fn new(config: Arc<EngineConfig>, client: Arc<ResilientClient>) -> EngineResult<Self> {
        let mut providers: Vec<Arc<dyn RatingProvider>> = Vec::new();
        if !config.access_token.trim().is_empty() {
            providers.push(Arc::new(MdblistProvider::new(
                client.clone(),
                config.clone(),
            )?));
        } else {
            warn!("no mdblist access token, primary rating feed disabled");
        }
        if config.source_enabled(ProviderId::AniList) {
            providers.push(Arc::new(AniListProvider::new(
                client.clone(),
                config.clone(),
            )));
        }
        if config.source_enabled(ProviderId::MyAnimeList) {
            providers.push(Arc::new(JikanProvider::new(client.clone(), config.clone())));
        }
        let resolver = WikidataResolver::new(client.clone(), config.resolution_ttl());
        let rotten_tomatoes = Arc::new(RottenTomatoesProvider::new(client, config.clone()));
        Ok(Self {
            config,
            resolver,
            providers,
            rotten_tomatoes,
        })
    }

    /// Fill in the identifiers the host did not supply. Resolution is
    /// best-effort: on failure the hint-only ids still drive the fetch.
    async fn resolve_ids(&self, item: &MediaItem) -> ProviderIds {
        let mut ids = ProviderIds {
            tmdb: item.tmdb_id.clone(),
            imdb: item.imdb_id.clone(),
            ..Default::default()
        };
        let wants_resolution = self.config.source_enabled(ProviderId::AniList)
            || self.config.source_enabled(ProviderId::MyAnimeList)
            || self.config.source_enabled(ProviderId::RottenTomatoesCritic)
            || self.config.source_enabled(ProviderId::RottenTomatoesAudience);
        let Some(imdb_id) = &ids.imdb else {
            return ids;
        };
        if !wants_resolution {
            return ids;
        }
        match self.resolver.resolve(imdb_id).await {
            Ok(resolved) => {
                ids.anilist = resolved.anilist;
                ids.mal = resolved.mal;
                ids.rotten_tomatoes = resolved.rotten_tomatoes;
            }
            Err(e) => warn!("id resolution failed for {}: {}", imdb_id, e),
        }
        ids
    }

    fn rt_enabled(&self) -> bool {
        self.config.source_enabled(ProviderId::RottenTomatoesCritic)
            || self.config.source_enabled(ProviderId::RottenTomatoesAudience)
    }
}

#[async_trait]
impl ScoreSource for ScorePipeline {
    async fn ratings_for(&self, item: &MediaItem) -> AggregationResult {
        let ids = self.resolve_ids(item).await;

        let fetches = self
            .providers
            .iter()
            .map(|p| async { (p.name(), p.fetch_ratings(item, &ids).await) });
        let mut raw: Vec<RawRating> = Vec::new();
        for (name, outcome) in join_all(fetches).await {
            match outcome {
                Ok(ratings) => raw.extend(ratings),
                Err(e) => warn!("provider {} failed for '{}': {}", name, item.title, e),
            }
        }

        // The site scrape runs only when the primary feed came back without
        // RT numbers, so a healthy feed costs no extra request.
        let has_rt = raw.iter().any(|r| {
            matches!(
                r.provider,
                ProviderId::RottenTomatoesCritic | ProviderId::RottenTomatoesAudience
            )
        });
        if !has_rt && self.rt_enabled() && ids.rotten_tomatoes.is_some() {
            match self.rotten_tomatoes.fetch_ratings(item, &ids).await {
                Ok(ratings) => raw.extend(ratings),
                Err(e) => warn!("rotten tomatoes fallback failed for '{}': {}", item.title, e),
            }
        }

        debug!("'{}': {} raw ratings collected", item.title, raw.len());
        merge(raw, &self.config)
    }
}
