//! Debounced, generation-counting reconciliation.
//!
//! Observations from the host are buffered per mount; a burst of
//! notifications coalesces into a single pass after the debounce window.
//! Each pass compares every observed item's Identity Key against what the
//! mount currently shows and starts at most one pipeline flight per key.
//! Finished flights fan their result out to every mount *currently* showing
//! that key — a mount that moved on in the meantime simply is not matched,
//! which is how stale generations get discarded.

use super::{MountId, ResultSink, ScoreSource};
use crate::aggregation::AggregationResult;
use crate::config::EngineConfig;
use crate::media::{IdentityKey, MediaItem};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::debug;

struct MountState {
    identity: IdentityKey,
    /// Bumped on every identity change at this mount; diagnostic only, the
    /// identity comparison is what gates delivery.
    generation: u64,
}

/// Pending observation; `None` marks a removed mount.
type PendingChange = Option<MediaItem>;

struct Inner {
    config: Arc<EngineConfig>,
    source: Arc<dyn ScoreSource>,
    sink: Arc<dyn ResultSink>,
    mounts: DashMap<MountId, MountState>,
    pending: DashMap<MountId, PendingChange>,
    in_flight: DashMap<IdentityKey, ()>,
    /// Last finished result per identity, so a re-observation of a known key
    /// re-delivers without a second pipeline run while still fresh.
    results: DashMap<IdentityKey, (Instant, AggregationResult)>,
}

pub struct Reconciler {
    inner: Arc<Inner>,
    notify: mpsc::UnboundedSender<()>,
}

impl Reconciler {
    /// Start the loop on the current runtime. The worker exits when the
    /// reconciler is dropped.
    pub fn spawn(
        config: Arc<EngineConfig>,
        source: Arc<dyn ScoreSource>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        let (notify, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            config,
            source,
            sink,
            mounts: DashMap::new(),
            pending: DashMap::new(),
            in_flight: DashMap::new(),
            results: DashMap::new(),
        });
        tokio::spawn(Self::worker(inner.clone(), rx));
        Self { inner, notify }
    }

    /// Report what a mount currently shows. Safe to call on every re-render;
    /// repeated observations of the same identity are no-ops.
    pub fn observe(&self, mount: impl Into<MountId>, item: MediaItem) {
        self.inner.pending.insert(mount.into(), Some(item));
        let _ = self.notify.send(());
    }

    /// The mount disappeared from the page.
    pub fn remove(&self, mount: &str) {
        self.inner.pending.insert(mount.to_string(), None);
        let _ = self.notify.send(());
    }

    async fn worker(inner: Arc<Inner>, mut rx: mpsc::UnboundedReceiver<()>) {
        let debounce = inner.config.debounce();
        while rx.recv().await.is_some() {
            sleep(debounce).await;
            // Everything that arrived during the window joins this pass.
            while rx.try_recv().is_ok() {}
            Self::run_pass(&inner);
        }
    }

    fn run_pass(inner: &Arc<Inner>) {
        let drained: Vec<(MountId, PendingChange)> = {
            let keys: Vec<MountId> = inner.pending.iter().map(|e| e.key().clone()).collect();
            keys.into_iter()
                .filter_map(|k| inner.pending.remove(&k))
                .collect()
        };

        for (mount, change) in drained {
            match change {
                None => {
                    inner.mounts.remove(&mount);
                }
                Some(item) => Self::reconcile_mount(inner, mount, item),
            }
        }
    }

    fn reconcile_mount(inner: &Arc<Inner>, mount: MountId, item: MediaItem) {
        let folded = item.folded(inner.config.episode_strategy);
        let key = folded.identity_key();

        let generation = match inner.mounts.get(&mount) {
            Some(state) if state.identity == key => return,
            Some(state) => state.generation + 1,
            None => 1,
        };
        debug!("mount {} -> {} (generation {})", mount, key, generation);
        inner.mounts.insert(
            mount.clone(),
            MountState {
                identity: key.clone(),
                generation,
            },
        );

        // A fresh-enough finished result re-delivers without a new flight.
        let memo_ttl = Duration::from_millis(inner.config.default_ttl_ms);
        if let Some(memo) = inner.results.get(&key) {
            let (stored_at, result) = memo.value();
            if stored_at.elapsed() < memo_ttl {
                inner.sink.deliver(&mount, &key, result);
                return;
            }
        }

        // One pipeline per identity; a concurrent observer of the same key
        // rides the existing flight and receives its fan-out.
        if inner.in_flight.insert(key.clone(), ()).is_some() {
            return;
        }

        let inner = inner.clone();
        tokio::spawn(async move {
            let result = inner.source.ratings_for(&folded).await;
            inner.in_flight.remove(&key);
            inner
                .results
                .insert(key.clone(), (Instant::now(), result.clone()));

            for entry in inner.mounts.iter() {
                if entry.value().identity == key {
                    inner.sink.deliver(entry.key(), &key, &result);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::NormalizedRating;
    use crate::providers::ProviderId;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use tokio::time::timeout;

    fn result_with_score(score: i32) -> AggregationResult {
        AggregationResult {
            ratings: vec![NormalizedRating {
                provider: ProviderId::Imdb,
                score,
                vote_count: None,
                link: None,
            }],
            master_score: Some(score),
        }
    }

    struct CountingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ScoreSource for CountingSource {
        async fn ratings_for(&self, _item: &MediaItem) -> AggregationResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            result_with_score(80)
        }
    }

    /// Blocks calls for "Slow" until released; everything else is instant.
    struct GatedSource {
        gate: Notify,
        started: mpsc::UnboundedSender<String>,
    }

    #[async_trait]
    impl ScoreSource for GatedSource {
        async fn ratings_for(&self, item: &MediaItem) -> AggregationResult {
            let _ = self.started.send(item.title.clone());
            if item.title == "Slow" {
                self.gate.notified().await;
                result_with_score(10)
            } else {
                result_with_score(90)
            }
        }
    }

    struct ChannelSink {
        tx: mpsc::UnboundedSender<(String, IdentityKey, AggregationResult)>,
    }

    impl ResultSink for ChannelSink {
        fn deliver(&self, mount: &str, key: &IdentityKey, result: &AggregationResult) {
            let _ = self.tx.send((mount.to_string(), key.clone(), result.clone()));
        }
    }

    type Delivery = (String, IdentityKey, AggregationResult);

    fn sink() -> (Arc<ChannelSink>, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelSink { tx }), rx)
    }

    async fn next_delivery(rx: &mut mpsc::UnboundedReceiver<Delivery>) -> Delivery {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for delivery")
            .expect("sink channel closed")
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_observations_fetch_once() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let (sink, mut rx) = sink();
        let reconciler = Reconciler::spawn(
            Arc::new(EngineConfig::default()),
            source.clone(),
            sink,
        );

        let item = MediaItem::movie("The Matrix", Some(1999));
        reconciler.observe("m1", item.clone());
        let (mount, _, _) = next_delivery(&mut rx).await;
        assert_eq!(mount, "m1");

        // Second pass with the same identity is a no-op.
        reconciler.observe("m1", item);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn two_mounts_same_identity_share_one_flight() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let (sink, mut rx) = sink();
        let reconciler = Reconciler::spawn(
            Arc::new(EngineConfig::default()),
            source.clone(),
            sink,
        );

        let item = MediaItem::movie("Dune", Some(2021));
        reconciler.observe("m1", item.clone());
        reconciler.observe("m2", item);

        let first = next_delivery(&mut rx).await;
        let second = next_delivery(&mut rx).await;
        let mut mounts = vec![first.0, second.0];
        mounts.sort();
        assert_eq!(mounts, vec!["m1", "m2"]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_result_is_discarded() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let source = Arc::new(GatedSource {
            gate: Notify::new(),
            started: started_tx,
        });
        let (sink, mut rx) = sink();
        let reconciler = Reconciler::spawn(
            Arc::new(EngineConfig::default()),
            source.clone(),
            sink,
        );

        reconciler.observe("m1", MediaItem::movie("Slow", Some(2000)));
        let started = timeout(Duration::from_secs(5), started_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(started, "Slow");

        // The mount moves on while the first flight is still in the air.
        reconciler.observe("m1", MediaItem::movie("Fast", Some(2001)));
        let (mount, key, result) = next_delivery(&mut rx).await;
        assert_eq!(mount, "m1");
        assert_eq!(key, MediaItem::movie("Fast", Some(2001)).identity_key());
        assert_eq!(result.master_score, Some(90));

        // Late completion of the superseded flight must not reach the mount.
        source.gate.notify_one();
        sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_changes_coalesces_to_latest() {
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let source = Arc::new(GatedSource {
            gate: Notify::new(),
            started: started_tx,
        });
        let (sink, mut rx) = sink();
        let reconciler = Reconciler::spawn(
            Arc::new(EngineConfig::default()),
            source,
            sink,
        );

        // Both land within one debounce window; only the latest is fetched.
        reconciler.observe("m1", MediaItem::movie("Draft", Some(2000)));
        reconciler.observe("m1", MediaItem::movie("Final", Some(2001)));

        let started = timeout(Duration::from_secs(5), started_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(started, "Final");
        let (_, key, _) = next_delivery(&mut rx).await;
        assert_eq!(key, MediaItem::movie("Final", Some(2001)).identity_key());
        assert!(started_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn removed_mount_gets_nothing() {
        let source = Arc::new(CountingSource {
            calls: AtomicUsize::new(0),
        });
        let (sink, mut rx) = sink();
        let reconciler = Reconciler::spawn(
            Arc::new(EngineConfig::default()),
            source,
            sink,
        );

        let item = MediaItem::movie("Gone", Some(1999));
        reconciler.observe("m1", item);
        let _ = next_delivery(&mut rx).await;

        reconciler.remove("m1");
        sleep(Duration::from_secs(1)).await;

        // A different mount adopting the same identity later still works.
        reconciler.observe("m2", MediaItem::movie("Gone", Some(1999)));
        let (mount, _, _) = next_delivery(&mut rx).await;
        assert_eq!(mount, "m2");
    }
}
