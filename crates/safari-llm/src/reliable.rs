use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use rand::Rng;
use tracing::{info, warn};

use safari_core::errors::GatewayError;
use safari_core::provider::{ReasoningRequest, ReasoningResponse, ReasoningService};
use safari_settings::RetrySettings;

/// Configuration for the ReliableReasoner retry and circuit breaker behavior.
#[derive(Clone, Debug)]
pub struct ReliableConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_cooldown: Duration,
}

impl Default for ReliableConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.2,
            circuit_breaker_threshold: 5,
            circuit_breaker_cooldown: Duration::from_secs(60),
        }
    }
}

impl From<&RetrySettings> for ReliableConfig {
    fn from(s: &RetrySettings) -> Self {
        Self {
            max_retries: s.max_retries,
            base_delay: Duration::from_millis(s.base_delay_ms),
            max_delay: Duration::from_millis(s.max_delay_ms),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum CircuitState {
    Closed,
    Open { since: Instant },
    HalfOpen,
}

/// Wraps a ReasoningService with retry logic and circuit breaker.
///
/// - Retries retryable errors with exponential backoff + jitter
/// - Respects `retry_after` hints from rate limit responses
/// - Circuit breaker: N consecutive failures → open → cooldown → half-open → success → closed
pub struct ReliableReasoner<R: ReasoningService> {
    inner: R,
    config: ReliableConfig,
    circuit_state: RwLock<CircuitState>,
    consecutive_failures: AtomicU32,
    total_retries: AtomicU64,
}

impl<R: ReasoningService> ReliableReasoner<R> {
    pub fn new(inner: R, config: ReliableConfig) -> Self {
        Self {
            inner,
            config,
            circuit_state: RwLock::new(CircuitState::Closed),
            consecutive_failures: AtomicU32::new(0),
            total_retries: AtomicU64::new(0),
        }
    }

    pub fn with_defaults(inner: R) -> Self {
        Self::new(inner, ReliableConfig::default())
    }

    fn check_circuit(&self) -> Result<(), GatewayError> {
        let state = self.circuit_state.read();
        match &*state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open { since } => {
                if since.elapsed() >= self.config.circuit_breaker_cooldown {
                    drop(state);
                    *self.circuit_state.write() = CircuitState::HalfOpen;
                    Ok(())
                } else {
                    Err(GatewayError::CircuitOpen)
                }
            }
        }
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let mut state = self.circuit_state.write();
        if *state != CircuitState::Closed {
            info!(model = self.inner.model(), "circuit breaker closed after successful request");
            *state = CircuitState::Closed;
        }
    }

    fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.config.circuit_breaker_threshold {
            let mut state = self.circuit_state.write();
            if !matches!(*state, CircuitState::Open { .. }) {
                warn!(
                    failures,
                    cooldown_secs = self.config.circuit_breaker_cooldown.as_secs(),
                    "circuit breaker opened"
                );
                *state = CircuitState::Open {
                    since: Instant::now(),
                };
            }
        }
    }

    /// Exponential backoff with jitter, unless the server suggested a delay.
    fn retry_delay(&self, attempt: u32, suggested: Option<Duration>) -> Duration {
        if let Some(delay) = suggested {
            return delay;
        }

        let exp_delay = self.config.base_delay.as_millis() as f64 * 2.0_f64.powi(attempt as i32);
        let capped = exp_delay.min(self.config.max_delay.as_millis() as f64);

        let jitter_range = capped * self.config.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let final_ms = (capped + jitter).max(0.0);

        Duration::from_millis(final_ms as u64)
    }

    pub fn total_retries(&self) -> u64 {
        self.total_retries.load(Ordering::Relaxed)
    }

    pub fn circuit_state_name(&self) -> &'static str {
        match &*self.circuit_state.read() {
            CircuitState::Closed => "closed",
            CircuitState::Open { .. } => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[async_trait]
impl<R: ReasoningService> ReasoningService for ReliableReasoner<R> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn invoke(&self, request: &ReasoningRequest) -> Result<ReasoningResponse, GatewayError> {
        self.check_circuit()?;

        let mut last_error: Option<GatewayError> = None;

        for attempt in 0..=self.config.max_retries {
            match self.inner.invoke(request).await {
                Ok(response) => {
                    self.record_success();
                    return Ok(response);
                }
                Err(e) => {
                    if !e.is_retryable() || attempt == self.config.max_retries {
                        self.record_failure();
                        return Err(e);
                    }

                    let delay = self.retry_delay(attempt, e.retry_after());
                    self.total_retries.fetch_add(1, Ordering::Relaxed);

                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying reasoning call"
                    );

                    last_error = Some(e);
                    tokio::time::sleep(delay).await;
                    self.check_circuit()?;
                }
            }
        }

        Err(last_error.unwrap_or(GatewayError::Network("max retries exceeded".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockReasoner, MockReply};
    use safari_core::capture::ViewportImage;

    fn request() -> ReasoningRequest {
        ReasoningRequest {
            system: String::new(),
            context: String::new(),
            image: ViewportImage::png(vec![0]),
            tools: vec![],
        }
    }

    fn fast_config(max_retries: u32) -> ReliableConfig {
        ReliableConfig {
            max_retries,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            ..Default::default()
        }
    }

    fn server_error() -> MockReply {
        MockReply::Error(GatewayError::Unavailable {
            status: 500,
            body: "internal".into(),
        })
    }

    #[tokio::test]
    async fn success_on_first_try() {
        let reliable = ReliableReasoner::with_defaults(MockReasoner::new(vec![MockReply::done()]));
        assert!(reliable.invoke(&request()).await.is_ok());
        assert_eq!(reliable.total_retries(), 0);
    }

    #[tokio::test]
    async fn retries_on_retryable_error() {
        let mock = MockReasoner::new(vec![server_error(), server_error(), MockReply::done()]);
        let reliable = ReliableReasoner::new(mock, fast_config(3));

        let resp = reliable.invoke(&request()).await.unwrap();
        assert_eq!(resp.tool_calls[0].name, "declare_done");
        assert_eq!(reliable.total_retries(), 2);
    }

    #[tokio::test]
    async fn fatal_error_not_retried() {
        let mock = MockReasoner::new(vec![
            MockReply::Error(GatewayError::AccessDenied {
                status: 401,
                body: "bad key".into(),
            }),
            MockReply::done(),
        ]);
        let reliable = ReliableReasoner::new(mock, fast_config(3));

        let err = reliable.invoke(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::AccessDenied { .. }));
        assert_eq!(reliable.total_retries(), 0);
    }

    #[tokio::test]
    async fn max_retries_exhausted() {
        let mock = MockReasoner::new(vec![server_error(), server_error(), server_error()]);
        let reliable = ReliableReasoner::new(mock, fast_config(2));

        let err = reliable.invoke(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable { .. }));
        assert_eq!(reliable.total_retries(), 2);
    }

    #[tokio::test]
    async fn circuit_opens_after_threshold() {
        let mock = MockReasoner::new(vec![]).with_fallback(MockReply::Error(
            GatewayError::InvalidRequest("nope".into()),
        ));
        let config = ReliableConfig {
            circuit_breaker_threshold: 2,
            ..fast_config(0)
        };
        let reliable = ReliableReasoner::new(mock, config);

        let _ = reliable.invoke(&request()).await;
        assert_eq!(reliable.circuit_state_name(), "closed");
        let _ = reliable.invoke(&request()).await;
        assert_eq!(reliable.circuit_state_name(), "open");

        let err = reliable.invoke(&request()).await.unwrap_err();
        assert!(matches!(err, GatewayError::CircuitOpen));
    }

    #[test]
    fn retry_hint_wins() {
        let reliable = ReliableReasoner::with_defaults(MockReasoner::new(vec![]));
        let d = reliable.retry_delay(3, Some(Duration::from_millis(1234)));
        assert_eq!(d, Duration::from_millis(1234));
    }

    #[test]
    fn backoff_is_capped() {
        let reliable = ReliableReasoner::new(
            MockReasoner::new(vec![]),
            ReliableConfig {
                jitter_factor: 0.0,
                ..fast_config(5)
            },
        );
        assert_eq!(reliable.retry_delay(0, None), Duration::from_millis(10));
        assert_eq!(reliable.retry_delay(10, None), Duration::from_millis(50));
    }
}
