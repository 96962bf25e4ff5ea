//! Per-origin task scheduling.
//!
//! Each origin gets a FIFO queue bounded two ways: at most `max_concurrent`
//! tasks run at once, and after any task settles the next dequeue waits at
//! least `interval_ms`. Burst concurrency and steady-state rate are therefore
//! both capped per origin, independently. Tasks for different origins do not
//! affect each other.

use crate::config::RateLimitConfig;
use dashmap::DashMap;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, Instant};

pub struct HostLimiter {
    /// Fair semaphore: waiters are admitted in submission order.
    slots: Semaphore,
    /// Earliest instant the next task may start, pushed forward on every
    /// settlement.
    next_dequeue: Mutex<Instant>,
    interval: std::time::Duration,
}

impl HostLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            slots: Semaphore::new(config.max_concurrent.max(1)),
            next_dequeue: Mutex::new(Instant::now()),
            interval: std::time::Duration::from_millis(config.interval_ms),
        }
    }

    /// Run `task` under this origin's limits. Every enqueued task eventually
    /// runs; nothing is dropped.
    pub async fn run<F, Fut, T>(&self, task: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        // Semaphore never closes, acquire cannot fail.
        let _slot = self.slots.acquire().await.expect("limiter semaphore closed");

        // Honor the settlement interval. Another settlement may push the gate
        // while we sleep, so re-check until it has genuinely passed.
        loop {
            let wait = {
                let gate = self.next_dequeue.lock().await;
                gate.saturating_duration_since(Instant::now())
            };
            if wait.is_zero() {
                break;
            }
            sleep(wait).await;
        }

        let out = task().await;

        // Settlement: success or failure both push the gate.
        let mut gate = self.next_dequeue.lock().await;
        *gate = Instant::now() + self.interval;
        out
    }
}

/// All limiters, keyed by origin. Owned by the resilient client; created
/// lazily on first use of an origin.
pub struct HostLimiterRegistry {
    limiters: DashMap<String, Arc<HostLimiter>>,
    overrides: HashMap<String, RateLimitConfig>,
    default: RateLimitConfig,
}

impl HostLimiterRegistry {
    pub fn new(overrides: HashMap<String, RateLimitConfig>, default: RateLimitConfig) -> Self {
        Self {
            limiters: DashMap::new(),
            overrides,
            default,
        }
    }

    pub fn for_origin(&self, origin: &str) -> Arc<HostLimiter> {
        if let Some(limiter) = self.limiters.get(origin) {
            return limiter.clone();
        }
        let config = self.overrides.get(origin).copied().unwrap_or(self.default);
        self.limiters
            .entry(origin.to_string())
            .or_insert_with(|| Arc::new(HostLimiter::new(config)))
            .clone()
    }
}
