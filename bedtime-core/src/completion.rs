//! The completion service boundary and the retrying client every stage
//! calls through.

use async_trait::async_trait;
use claude::{Claude, Message, Request};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by a completion service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Worth retrying: network trouble, rate limiting, overload.
    #[error("transient service failure: {0}")]
    Transient(String),

    /// Will fail again: bad credentials, malformed request.
    #[error("service rejected the request: {0}")]
    Permanent(String),
}

/// Failure of a stage's completion call after the retry policy ran.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("generation unavailable after {attempts} attempts: {reason}")]
    Unavailable { attempts: u32, reason: String },

    #[error("generation rejected by the completion service: {reason}")]
    Rejected { reason: String },
}

/// Text in, text out. One call per invocation, no retries.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        system_prompt: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String, ServiceError>;
}

#[async_trait]
impl CompletionService for Claude {
    async fn complete(
        &self,
        prompt: &str,
        system_prompt: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String, ServiceError> {
        let request = Request::new(vec![Message::user(prompt)])
            .with_system(system_prompt)
            .with_temperature(temperature)
            .with_max_tokens(max_tokens);

        match Claude::complete(self, request).await {
            Ok(response) => Ok(response.text()),
            Err(e) if e.is_transient() => Err(ServiceError::Transient(e.to_string())),
            Err(e) => Err(ServiceError::Permanent(e.to_string())),
        }
    }
}

/// Sampling parameters for one stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageParams {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl StageParams {
    pub const fn new(temperature: f32, max_tokens: usize) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }
}

/// Longest wait between two attempts, whatever the policy.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Factor applied to the delay after each retry. Values below 1 are
    /// treated as 1.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1500),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }
}

/// Attempt counter and the delay to wait before the next attempt.
#[derive(Debug, Clone)]
struct Backoff {
    attempt: u32,
    max_attempts: u32,
    next_delay: Duration,
    multiplier: f64,
}

impl Backoff {
    fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempt: 0,
            max_attempts: policy.max_attempts.max(1),
            next_delay: policy.base_delay,
            multiplier: policy.multiplier.max(1.0),
        }
    }

    /// Start an attempt, returning its 1-based number.
    fn begin(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Delay before the next attempt, or `None` when the budget is spent.
    fn retry_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let delay = self.next_delay.min(MAX_RETRY_DELAY);
        self.next_delay = Duration::try_from_secs_f64(delay.as_secs_f64() * self.multiplier)
            .map_or(MAX_RETRY_DELAY, |next| next.min(MAX_RETRY_DELAY));
        Some(delay)
    }
}

/// Retrying wrapper around a [`CompletionService`].
///
/// Transient failures and blank responses are retried under the
/// [`RetryPolicy`]; permanent failures surface immediately. Cheap to clone.
#[derive(Clone)]
pub struct CompletionClient {
    service: Arc<dyn CompletionService>,
    policy: RetryPolicy,
}

impl CompletionClient {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            service,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run one completion with retries.
    pub async fn complete(
        &self,
        prompt: &str,
        system_prompt: &str,
        params: StageParams,
    ) -> Result<String, GenerationError> {
        let mut backoff = Backoff::new(&self.policy);

        tracing::debug!(
            prompt_chars = prompt.len(),
            temperature = params.temperature,
            max_tokens = params.max_tokens,
            "sending completion"
        );

        loop {
            let attempt = backoff.begin();
            let reason = match self
                .service
                .complete(prompt, system_prompt, params.temperature, params.max_tokens)
                .await
            {
                Ok(text) if !text.trim().is_empty() => {
                    if attempt > 1 {
                        tracing::info!(attempt, "completion recovered after retries");
                    }
                    return Ok(text);
                }
                Ok(_) => "completion returned no text".to_string(),
                Err(ServiceError::Transient(reason)) => reason,
                Err(ServiceError::Permanent(reason)) => {
                    tracing::error!(attempt, error = %reason, "completion rejected");
                    return Err(GenerationError::Rejected { reason });
                }
            };

            match backoff.retry_delay() {
                Some(delay) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = backoff.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %reason,
                        "completion failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!(
                        attempts = attempt,
                        error = %reason,
                        "completion retries exhausted"
                    );
                    return Err(GenerationError::Unavailable {
                        attempts: attempt,
                        reason,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockCompletion, MockReply};

    fn client(mock: &Arc<MockCompletion>) -> CompletionClient {
        CompletionClient::new(mock.clone())
    }

    const PARAMS: StageParams = StageParams::new(0.4, 900);

    #[test]
    fn test_backoff_delays_strictly_increase() {
        let mut backoff = Backoff::new(&RetryPolicy::default());
        assert_eq!(backoff.begin(), 1);
        assert_eq!(backoff.retry_delay(), Some(Duration::from_millis(1500)));
        assert_eq!(backoff.begin(), 2);
        assert_eq!(backoff.retry_delay(), Some(Duration::from_millis(3000)));
        assert_eq!(backoff.begin(), 3);
        assert_eq!(backoff.retry_delay(), None);
    }

    #[test]
    fn test_multiplier_below_one_does_not_shrink() {
        let policy = RetryPolicy::default().with_multiplier(0.5);
        let mut backoff = Backoff::new(&policy);
        backoff.begin();
        let first = backoff.retry_delay().unwrap();
        backoff.begin();
        assert_eq!(backoff.retry_delay(), Some(first));
    }

    #[test]
    fn test_runaway_growth_saturates() {
        let policy = RetryPolicy::default()
            .with_max_attempts(100)
            .with_multiplier(f64::INFINITY);
        let mut backoff = Backoff::new(&policy);
        backoff.begin();
        assert_eq!(backoff.retry_delay(), Some(Duration::from_millis(1500)));
        for _ in 2..100 {
            backoff.begin();
            assert_eq!(backoff.retry_delay(), Some(MAX_RETRY_DELAY));
        }
        backoff.begin();
        assert_eq!(backoff.retry_delay(), None);

        let mut doubling = Backoff::new(&RetryPolicy::default().with_max_attempts(80));
        let mut last = Duration::ZERO;
        for _ in 1..80 {
            doubling.begin();
            let delay = doubling.retry_delay().unwrap();
            assert!(delay >= last && delay <= MAX_RETRY_DELAY);
            last = delay;
        }
        assert_eq!(last, MAX_RETRY_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let mock = Arc::new(MockCompletion::new(vec![MockReply::text("hello")]));
        let text = client(&mock).complete("p", "s", PARAMS).await.unwrap();
        assert_eq!(text, "hello");
        assert_eq!(mock.call_count(), 1);
        let call = &mock.calls()[0];
        assert_eq!(call.temperature, 0.4);
        assert_eq!(call.max_tokens, 900);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let mock = Arc::new(MockCompletion::new(vec![
            MockReply::transient("connection reset"),
            MockReply::text("recovered"),
        ]));
        let text = client(&mock).complete("p", "s", PARAMS).await.unwrap();
        assert_eq!(text, "recovered");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_attempts_then_unavailable() {
        let mock = Arc::new(MockCompletion::new(vec![
            MockReply::transient("overloaded"),
            MockReply::transient("overloaded"),
            MockReply::transient("overloaded"),
            MockReply::text("never reached"),
        ]));
        let start = tokio::time::Instant::now();
        let err = client(&mock).complete("p", "s", PARAMS).await.unwrap_err();

        assert!(matches!(err, GenerationError::Unavailable { attempts: 3, .. }));
        assert_eq!(mock.call_count(), 3);
        assert!(start.elapsed() >= Duration::from_millis(4500));

        let times: Vec<_> = mock.calls().iter().map(|c| c.at).collect();
        let first_gap = times[1] - times[0];
        let second_gap = times[2] - times[1];
        assert!(first_gap >= Duration::from_millis(1500));
        assert!(second_gap > first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_response_is_retried() {
        let mock = Arc::new(MockCompletion::new(vec![
            MockReply::text("   \n"),
            MockReply::text("TITLE: Real"),
        ]));
        let text = client(&mock).complete("p", "s", PARAMS).await.unwrap();
        assert_eq!(text, "TITLE: Real");
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let mock = Arc::new(MockCompletion::new(vec![
            MockReply::permanent("invalid x-api-key"),
            MockReply::text("never reached"),
        ]));
        let err = client(&mock).complete("p", "s", PARAMS).await.unwrap_err();
        assert!(matches!(err, GenerationError::Rejected { .. }));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy() {
        let mock = Arc::new(MockCompletion::new(vec![MockReply::transient("down")]));
        let err = client(&mock)
            .with_policy(RetryPolicy::none())
            .complete("p", "s", PARAMS)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Unavailable { attempts: 1, .. }));
    }
}
