use crate::TextGenerator;
use crate::config::ResilienceConfig;
use crate::error::{GenerationError, Result};
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Short-circuits calls after `threshold` consecutive failures until
/// `recovery` has elapsed, then lets a single trial call through.
pub struct CircuitBreaker {
    threshold: u32,
    recovery: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, recovery: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            recovery,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Ask permission for a call
    pub async fn acquire(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let elapsed = inner
            .opened_at
            .map(|at| at.elapsed())
            .unwrap_or(self.recovery);
        if elapsed >= self.recovery {
            debug!("Circuit half-open, allowing trial call");
            inner.state = CircuitState::HalfOpen;
            return Ok(());
        }

        Err(GenerationError::CircuitOpen {
            retry_in_secs: (self.recovery - elapsed).as_secs().max(1),
        })
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        if inner.state != CircuitState::Closed {
            debug!("Circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures += 1;
        let trip = inner.state == CircuitState::HalfOpen
            || inner.consecutive_failures >= self.threshold;
        if trip && inner.state != CircuitState::Open {
            warn!(
                "Circuit opened after {} consecutive failures",
                inner.consecutive_failures
            );
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }
}

/// Wraps a generator with retry (exponential backoff) and a circuit breaker
pub struct ResilientGenerator {
    inner: Arc<dyn TextGenerator>,
    breaker: CircuitBreaker,
    max_attempts: u32,
    min_backoff: Duration,
    max_backoff: Duration,
}

impl ResilientGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>, config: &ResilienceConfig) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(
                config.failure_threshold,
                Duration::from_secs(config.recovery_timeout_secs),
            ),
            max_attempts: config.max_attempts.max(1),
            min_backoff: Duration::from_millis(config.min_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        let ceiling = self.max_backoff.max(self.min_backoff);
        self.min_backoff
            .saturating_mul(factor)
            .clamp(self.min_backoff, ceiling)
    }
}

#[async_trait]
impl TextGenerator for ResilientGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.breaker.acquire().await?;

        let mut attempt = 1;
        loop {
            match self.inner.generate(prompt).await {
                Ok(text) => {
                    self.breaker.record_success().await;
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let wait = self.backoff(attempt);
                    warn!(
                        "Generation attempt {attempt}/{} failed: {e}; retrying in {wait:?}",
                        self.max_attempts
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.breaker.record_failure().await;
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls with the given status, then succeeds
    struct Flaky {
        failures: usize,
        status: u16,
        calls: AtomicUsize,
    }

    impl Flaky {
        fn new(failures: usize, status: u16) -> Arc<Self> {
            Arc::new(Self {
                failures,
                status,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for Flaky {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(GenerationError::Status {
                    status: self.status,
                    body: "boom".to_string(),
                })
            } else {
                Ok("ok".to_string())
            }
        }
    }

    fn config(max_attempts: u32) -> ResilienceConfig {
        ResilienceConfig {
            max_attempts,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let flaky = Flaky::new(2, 503);
        let generator = ResilientGenerator::new(flaky.clone(), &config(3));

        let started = Instant::now();
        let text = generator.generate("q").await.unwrap();

        assert_eq!(text, "ok");
        assert_eq!(flaky.calls(), 3);
        // 2s + 4s of backoff
        assert!(started.elapsed() >= Duration::from_secs(6));
        assert_eq!(generator.breaker().state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_fails_fast() {
        let flaky = Flaky::new(5, 401);
        let generator = ResilientGenerator::new(flaky.clone(), &config(3));

        let err = generator.generate("q").await.unwrap_err();
        assert!(matches!(err, GenerationError::Status { status: 401, .. }));
        assert_eq!(flaky.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_opens_and_recovers() {
        let flaky = Flaky::new(3, 500);
        let generator = ResilientGenerator::new(flaky.clone(), &config(1));

        for _ in 0..3 {
            assert!(generator.generate("q").await.is_err());
        }
        assert_eq!(generator.breaker().state().await, CircuitState::Open);

        let err = generator.generate("q").await.unwrap_err();
        assert!(matches!(err, GenerationError::CircuitOpen { .. }));
        assert_eq!(flaky.calls(), 3);

        tokio::time::advance(Duration::from_secs(61)).await;

        let text = generator.generate("q").await.unwrap();
        assert_eq!(text, "ok");
        assert_eq!(flaky.calls(), 4);
        assert_eq!(generator.breaker().state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(10));
        breaker.record_failure().await;
        assert!(breaker.acquire().await.is_err());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(breaker.acquire().await.is_ok());
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);

        breaker.record_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[test]
    fn test_backoff_is_clamped() {
        let generator = ResilientGenerator::new(Flaky::new(0, 500), &config(5));
        assert_eq!(generator.backoff(1), Duration::from_secs(2));
        assert_eq!(generator.backoff(2), Duration::from_secs(4));
        assert_eq!(generator.backoff(3), Duration::from_secs(8));
        assert_eq!(generator.backoff(4), Duration::from_secs(10));
    }
}
