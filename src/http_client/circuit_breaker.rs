//! Per-origin circuit breaking.
//!
//! Three logical states: Closed (normal), Open (fast-fail until the cooldown
//! expires) and Probing (exactly one trial call allowed once it has). A probe
//! success closes the circuit; a probe failure re-opens it with a fresh
//! cooldown. The cooldown is fixed — per-call backoff growth belongs to the
//! retry policy, not here.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct OriginState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
    probe_in_flight: bool,
}

impl Default for OriginState {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            open_until: None,
            probe_in_flight: false,
        }
    }
}

pub struct CircuitBreaker {
    origins: DashMap<String, OriginState>,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            origins: DashMap::new(),
            failure_threshold,
            cooldown,
        }
    }

    /// Whether a call to `origin` may proceed. While open this returns false
    /// without counting anything; once the cooldown has elapsed it admits a
    /// single probe and denies further callers until that probe settles.
    pub fn can_call(&self, origin: &str) -> bool {
        let mut state = self.origins.entry(origin.to_string()).or_default();
        match state.open_until {
            None => true,
            Some(open_until) => {
                if Instant::now() < open_until {
                    false
                } else if state.probe_in_flight {
                    false
                } else {
                    state.probe_in_flight = true;
                    true
                }
            }
        }
    }

    pub fn record_success(&self, origin: &str) {
        let mut state = self.origins.entry(origin.to_string()).or_default();
        state.consecutive_failures = 0;
        state.open_until = None;
        state.probe_in_flight = false;
    }

    pub fn record_failure(&self, origin: &str) {
        let mut state = self.origins.entry(origin.to_string()).or_default();
        if state.probe_in_flight {
            // Failed probe re-opens with a fresh cooldown.
            state.probe_in_flight = false;
            state.open_until = Some(Instant::now() + self.cooldown);
            return;
        }
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.failure_threshold {
            state.open_until = Some(Instant::now() + self.cooldown);
            log::warn!(
                "circuit opened for {} after {} consecutive failures",
                origin,
                state.consecutive_failures
            );
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::default();
        for _ in 0..5 {
            assert!(breaker.can_call("x.test"));
            breaker.record_failure("x.test");
        }
        assert!(!breaker.can_call("x.test"));
    }

    #[tokio::test(start_paused = true)]
    async fn exactly_one_probe_after_cooldown() {
        let breaker = CircuitBreaker::default();
        for _ in 0..5 {
            breaker.record_failure("x.test");
        }
        assert!(!breaker.can_call("x.test"));

        advance(Duration::from_secs(61)).await;
        assert!(breaker.can_call("x.test"), "probe should be admitted");
        assert!(!breaker.can_call("x.test"), "second caller must wait on probe");
    }

    #[tokio::test(start_paused = true)]
    async fn probe_success_closes_circuit() {
        let breaker = CircuitBreaker::default();
        for _ in 0..5 {
            breaker.record_failure("x.test");
        }
        advance(Duration::from_secs(61)).await;
        assert!(breaker.can_call("x.test"));
        breaker.record_success("x.test");
        assert!(breaker.can_call("x.test"));
        assert!(breaker.can_call("x.test"));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_reopens_with_fresh_cooldown() {
        let breaker = CircuitBreaker::default();
        for _ in 0..5 {
            breaker.record_failure("x.test");
        }
        advance(Duration::from_secs(61)).await;
        assert!(breaker.can_call("x.test"));
        breaker.record_failure("x.test");

        assert!(!breaker.can_call("x.test"));
        advance(Duration::from_secs(59)).await;
        assert!(!breaker.can_call("x.test"));
        advance(Duration::from_secs(2)).await;
        assert!(breaker.can_call("x.test"));
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_failure_count() {
        let breaker = CircuitBreaker::default();
        for _ in 0..4 {
            breaker.record_failure("x.test");
        }
        breaker.record_success("x.test");
        for _ in 0..4 {
            breaker.record_failure("x.test");
        }
        assert!(breaker.can_call("x.test"));
    }

    #[tokio::test(start_paused = true)]
    async fn origins_are_independent() {
        let breaker = CircuitBreaker::default();
        for _ in 0..5 {
            breaker.record_failure("down.test");
        }
        assert!(!breaker.can_call("down.test"));
        assert!(breaker.can_call("up.test"));
    }
}
