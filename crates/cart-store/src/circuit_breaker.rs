//! Per-dependency circuit breaker.
//!
//! Three states, same shape as a reconnect state machine: closed (calls
//! pass through), open (calls fail fast), half-open (exactly one probe is
//! admitted). Unlike a reconnect backoff loop this uses a fixed cool-down,
//! not exponential backoff — state is shared behind an `Arc<RwLock<_>>` the
//! same way a connection-state handle is shared across tasks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::warn;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Breaker {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl Breaker {
    fn new() -> Self {
        Breaker { state: BreakerState::Closed, consecutive_failures: 0, opened_at: None }
    }
}

/// Tuning shared by every breaker in the registry (`CIRCUIT_BREAKER_THRESHOLD`
/// / `CIRCUIT_BREAKER_TIMEOUT`).
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfig { failure_threshold: 3, cooldown: Duration::from_secs(60) }
    }
}

/// One breaker per named outbound dependency (`redis`, `postgres`,
/// `event_bus`). Breakers are never global — each dependency tracked here
/// is independent.
#[derive(Clone)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: Arc<RwLock<HashMap<String, Breaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        CircuitBreakerRegistry { config, breakers: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Call before attempting an outbound call. Returns `Err(CircuitOpen)`
    /// if the breaker is open and the cool-down has not elapsed; if the
    /// cool-down has elapsed, transitions to half-open and admits this one
    /// probe.
    pub async fn before_call(&self, dependency: &str) -> Result<(), StoreError> {
        let mut breakers = self.breakers.write().await;
        let breaker = breakers.entry(dependency.to_string()).or_insert_with(Breaker::new);

        match breaker.state {
            BreakerState::Closed => Ok(()),
            BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let elapsed = breaker.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO);
                if elapsed >= self.config.cooldown {
                    breaker.state = BreakerState::HalfOpen;
                    Ok(())
                } else {
                    Err(StoreError::CircuitOpen { dependency: dependency.to_string() })
                }
            }
        }
    }

    /// Records a successful call: closes the breaker and resets the
    /// failure count.
    pub async fn record_success(&self, dependency: &str) {
        let mut breakers = self.breakers.write().await;
        let breaker = breakers.entry(dependency.to_string()).or_insert_with(Breaker::new);
        breaker.state = BreakerState::Closed;
        breaker.consecutive_failures = 0;
        breaker.opened_at = None;
    }

    /// Records a failed call. Three consecutive failures open the
    /// breaker; a failed half-open probe re-opens it immediately.
    pub async fn record_failure(&self, dependency: &str) {
        let mut breakers = self.breakers.write().await;
        let breaker = breakers.entry(dependency.to_string()).or_insert_with(Breaker::new);

        match breaker.state {
            BreakerState::HalfOpen => {
                breaker.state = BreakerState::Open;
                breaker.opened_at = Some(Instant::now());
                warn!(dependency, "circuit re-opened after failed half-open probe");
            }
            _ => {
                breaker.consecutive_failures += 1;
                if breaker.consecutive_failures >= self.config.failure_threshold {
                    breaker.state = BreakerState::Open;
                    breaker.opened_at = Some(Instant::now());
                    warn!(dependency, failures = breaker.consecutive_failures, "circuit opened");
                }
            }
        }
    }

    pub async fn is_open(&self, dependency: &str) -> bool {
        let breakers = self.breakers.read().await;
        breakers.get(dependency).map(|b| b.state == BreakerState::Open).unwrap_or(false)
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closed_breaker_admits_calls() {
        let registry = CircuitBreakerRegistry::default();
        assert!(registry.before_call("redis").await.is_ok());
    }

    #[tokio::test]
    async fn three_consecutive_failures_open_the_circuit() {
        let registry = CircuitBreakerRegistry::default();
        for _ in 0..3 {
            registry.record_failure("redis").await;
        }
        assert!(registry.is_open("redis").await);
        assert!(registry.before_call("redis").await.is_err());
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let registry = CircuitBreakerRegistry::default();
        registry.record_failure("redis").await;
        registry.record_failure("redis").await;
        registry.record_success("redis").await;
        registry.record_failure("redis").await;
        assert!(!registry.is_open("redis").await);
    }

    #[tokio::test]
    async fn half_open_probe_failure_reopens_immediately() {
        let config = CircuitBreakerConfig { failure_threshold: 1, cooldown: Duration::from_millis(1) };
        let registry = CircuitBreakerRegistry::new(config);
        registry.record_failure("postgres").await;
        assert!(registry.is_open("postgres").await);

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(registry.before_call("postgres").await.is_ok()); // half-open probe admitted
        registry.record_failure("postgres").await;
        assert!(registry.is_open("postgres").await);
    }

    #[tokio::test]
    async fn breakers_are_independent_per_dependency() {
        let registry = CircuitBreakerRegistry::default();
        for _ in 0..3 {
            registry.record_failure("redis").await;
        }
        assert!(registry.is_open("redis").await);
        assert!(!registry.is_open("postgres").await);
    }
}
