//! ============================================================================
//! Jittered Dispatcher - Randomized pacing for upstream indexer calls
//! ============================================================================
//! Sleeps a uniform random delay in [0, max_jitter] before every call so that
//! bursts of concurrent clients don't hit the indexer in lockstep, then runs
//! the call under an explicit timeout. No backoff, no token bucket.
//! ============================================================================

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::{GateError, GateResult};

/// Stateless jitter + timeout wrapper around an upstream call
#[derive(Debug, Clone, Copy)]
pub struct JitteredDispatcher {
    max_jitter: Duration,
    timeout: Duration,
}

impl JitteredDispatcher {
    pub fn new(max_jitter: Duration, timeout: Duration) -> Self {
        Self { max_jitter, timeout }
    }

    /// Same timeout, different jitter bound
    pub fn with_max_jitter(&self, max_jitter: Duration) -> Self {
        Self {
            max_jitter,
            timeout: self.timeout,
        }
    }

    pub fn max_jitter(&self) -> Duration {
        self.max_jitter
    }

    /// Wait a random delay, then run `call` under the configured timeout.
    /// An elapsed timeout is reported as a transport error.
    pub async fn dispatch<F, Fut, T>(&self, label: &str, call: F) -> GateResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GateResult<T>>,
    {
        let delay = jitter_delay(self.max_jitter);
        if !delay.is_zero() {
            debug!("Dispatching {} after {:?} jitter", label, delay);
            sleep(delay).await;
        }

        match timeout(self.timeout, call()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} timed out after {:?}", label, self.timeout);
                Err(GateError::Transport(format!(
                    "{} timed out after {:?}",
                    label, self.timeout
                )))
            }
        }
    }
}

/// Uniform random delay in [0, max]
pub fn jitter_delay(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_within_bound() {
        let max = Duration::from_millis(500);
        for _ in 0..200 {
            assert!(jitter_delay(max) <= max);
        }
        assert_eq!(jitter_delay(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_returns_call_result() {
        let dispatcher = JitteredDispatcher::new(Duration::from_millis(500), Duration::from_secs(5));
        let result = dispatcher.dispatch("ok", || async { Ok::<_, GateError>(42) }).await;
        assert_eq!(result, Ok(42));

        let result: GateResult<u32> = dispatcher
            .dispatch("fail", || async { Err(GateError::NotFound("x".into())) })
            .await;
        assert_eq!(result, Err(GateError::NotFound("x".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_jitter_delays_call() {
        let dispatcher = JitteredDispatcher::new(Duration::from_millis(500), Duration::from_secs(5));
        let started = tokio::time::Instant::now();
        dispatcher.dispatch("delay", || async { Ok::<_, GateError>(()) }).await.unwrap();
        assert!(started.elapsed() <= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_timeout_is_transport_error() {
        let dispatcher = JitteredDispatcher::new(Duration::ZERO, Duration::from_secs(1));
        let result: GateResult<()> = dispatcher
            .dispatch("stuck", || async {
                sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(GateError::Transport(_))));
    }

    #[test]
    fn test_with_max_jitter_keeps_timeout() {
        let base = JitteredDispatcher::new(Duration::from_millis(500), Duration::from_secs(7));
        let fallback = base.with_max_jitter(Duration::from_millis(200));
        assert_eq!(fallback.max_jitter(), Duration::from_millis(200));
        assert_eq!(fallback.timeout, Duration::from_secs(7));
    }
}
