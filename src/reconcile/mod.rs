//! Keeping scores in sync with a changing set of on-screen items.

mod reconciler;

pub use reconciler::Reconciler;

use crate::aggregation::AggregationResult;
use crate::media::{IdentityKey, MediaItem};
use async_trait::async_trait;

/// A mount point on the host page: a slot that shows one item at a time and
/// may be re-used for a different item on re-render.
pub type MountId = String;

/// Computes the full resolve→fetch→merge pipeline for one item. Failures are
/// isolated inside; the worst outcome is an empty result.
#[async_trait]
pub trait ScoreSource: Send + Sync {
    async fn ratings_for(&self, item: &MediaItem) -> AggregationResult;
}

/// The presentation layer. Receives one result per (mount, identity) and is
/// solely responsible for rendering; the engine never touches display state.
pub trait ResultSink: Send + Sync {
    fn deliver(&self, mount: &str, key: &IdentityKey, result: &AggregationResult);
}
