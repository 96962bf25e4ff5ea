//! Multi-provider rating aggregation for media-library frontends.
//!
//! The engine takes item observations from a host UI, resolves provider
//! identifiers, fetches ratings from every enabled backend through a
//! rate-limited, cached, circuit-protected HTTP layer, and delivers merged
//! 0-100 scores back through a sink. Backends degrade independently: one
//! failing provider costs only its own rating, never the whole overlay.
//!
//! ```no_run
//! use std::sync::Arc;
//! use overscore::{
//!     AggregationResult, EngineConfig, IdentityKey, MediaItem, RatingsEngine,
//!     ResultSink, SqliteCacheStore,
//! };
//!
//! struct PrintSink;
//!
//! impl ResultSink for PrintSink {
//!     fn deliver(&self, mount: &str, _key: &IdentityKey, result: &AggregationResult) {
//!         println!("{}: {:?}", mount, result.master_score);
//!     }
//! }
//!
//! # async fn run() -> overscore::EngineResult<()> {
//! let mut config = EngineConfig::default();
//! config.access_token = "mdblist-api-key".to_string();
//! let store = Arc::new(SqliteCacheStore::open("ratings.db"));
//! let engine = RatingsEngine::new(config, store, Arc::new(PrintSink))?;
//!
//! let mut item = MediaItem::movie("The Matrix", Some(1999));
//! item.tmdb_id = Some("603".to_string());
//! engine.observe("card-1", item);
//! # Ok(())
//! # }
//! ```

pub mod aggregation;
pub mod cache;
pub mod config;
pub mod http_client;
pub mod media;
pub mod providers;
pub mod reconcile;
pub mod shared;

mod pipeline;

pub use aggregation::{classify, merge, AggregationResult, ColorBand, NormalizedRating};
pub use cache::{CacheStore, CachedEntry, MemoryCacheStore, SqliteCacheStore};
pub use config::{ColorBands, EngineConfig, EpisodeStrategy, RateLimitConfig, RetryConfig};
pub use media::{IdentityKey, MediaItem, MediaKind};
pub use providers::{ProviderId, ProviderIds, RatingProvider, RawRating};
pub use reconcile::{MountId, Reconciler, ResultSink, ScoreSource};
pub use shared::errors::{EngineError, EngineResult};

use crate::http_client::{HttpTransport, ReqwestTransport, ResilientClient};
use crate::pipeline::ScorePipeline;
use std::sync::Arc;

/// The assembled engine: one resilient HTTP client, the full provider set,
/// and a reconciliation loop already running.
pub struct RatingsEngine {
    config: Arc<EngineConfig>,
    pipeline: Arc<ScorePipeline>,
    reconciler: Reconciler,
}

impl RatingsEngine {
    /// Build with a real network transport. Must be called on a tokio
    /// runtime; the reconciliation worker is spawned immediately.
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn CacheStore>,
        sink: Arc<dyn ResultSink>,
    ) -> EngineResult<Self> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Self::with_transport(config, transport, store, sink)
    }

    /// Same as [`RatingsEngine::new`] with the transport swapped out, which
    /// is how the integration tests drive the engine without a network.
    pub fn with_transport(
        config: EngineConfig,
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn CacheStore>,
        sink: Arc<dyn ResultSink>,
    ) -> EngineResult<Self> {
        let config = Arc::new(config);
        let client = Arc::new(ResilientClient::new(transport, store, &config));
        let pipeline = Arc::new(ScorePipeline::new(config.clone(), client)?);
        let reconciler = Reconciler::spawn(config.clone(), pipeline.clone(), sink);
        Ok(Self {
            config,
            pipeline,
            reconciler,
        })
    }

    /// Report that `mount` currently shows `item`. Debounced and
    /// deduplicated; call freely on every host re-render.
    pub fn observe(&self, mount: impl Into<MountId>, item: MediaItem) {
        self.reconciler.observe(mount, item);
    }

    /// Report that `mount` left the page.
    pub fn remove(&self, mount: &str) {
        self.reconciler.remove(mount);
    }

    /// One-shot pipeline run, bypassing mounts and debouncing. Never fails:
    /// total provider loss yields an empty result.
    pub async fn ratings_for(&self, item: &MediaItem) -> AggregationResult {
        use crate::reconcile::ScoreSource as _;
        let folded = item.folded(self.config.episode_strategy);
        self.pipeline.ratings_for(&folded).await
    }

    /// Band a 0-100 score per the configured thresholds.
    pub fn color_band(&self, score: i32) -> ColorBand {
        classify(score, &self.config.color_bands)
    }
}
