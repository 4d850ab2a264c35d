use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::config::DeliverySection;

use super::sink::SinkError;

/// A failed message is retried exactly once.
const ATTEMPTS: usize = 2;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct RetryOutcome<T> {
    pub result: T,
    pub attempts: usize,
    pub waited: Duration,
}

impl RetryPolicy {
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    pub fn from_config(config: &DeliverySection) -> Self {
        Self::new(Duration::from_millis(config.retry_backoff_ms))
    }

    fn delay_for(&self, error: &SinkError) -> Duration {
        match error.retry_after() {
            Some(hint) => hint.max(self.backoff),
            None => self.backoff,
        }
    }

    /// Runs `operation` once more after a failure; the second error is
    /// returned unchanged.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<RetryOutcome<T>, SinkError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, SinkError>>,
    {
        let mut attempt = 0usize;
        let mut waited = Duration::ZERO;
        loop {
            match operation(attempt).await {
                Ok(result) => {
                    return Ok(RetryOutcome {
                        result,
                        attempts: attempt + 1,
                        waited,
                    });
                }
                Err(error) => {
                    attempt += 1;
                    if attempt >= ATTEMPTS {
                        return Err(error);
                    }
                    let delay = self.delay_for(&error);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "send rejected, retrying"
                    );
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    waited += delay;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DeliverySection::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_on_second_attempt() {
        let policy = RetryPolicy::new(Duration::from_millis(500));
        let calls = Arc::new(Mutex::new(0usize));
        let calls_for_run = Arc::clone(&calls);
        let outcome = policy
            .run(move |_| {
                let calls = Arc::clone(&calls_for_run);
                async move {
                    let mut guard = calls.lock().unwrap();
                    *guard += 1;
                    if *guard == 1 {
                        Err(SinkError::Transient("network".into()))
                    } else {
                        Ok("sent")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.result, "sent");
        assert_eq!(outcome.waited, Duration::from_millis(500));
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_honours_longer_retry_after_hint() {
        let policy = RetryPolicy::new(Duration::from_millis(500));
        let mut first = true;
        let outcome = policy
            .run(|_| {
                let fail = std::mem::replace(&mut first, false);
                async move {
                    if fail {
                        Err(SinkError::RateLimited {
                            retry_after: Some(Duration::from_secs(3)),
                        })
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(outcome.waited, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_after_second_failure() {
        let policy = RetryPolicy::new(Duration::from_millis(10));
        let calls = Arc::new(Mutex::new(0usize));
        let calls_for_run = Arc::clone(&calls);
        let result = policy
            .run(move |_| {
                let calls = Arc::clone(&calls_for_run);
                async move {
                    *calls.lock().unwrap() += 1;
                    Err::<(), _>(SinkError::Rejected("chat not found".into()))
                }
            })
            .await;
        assert_eq!(
            result.unwrap_err(),
            SinkError::Rejected("chat not found".into())
        );
        assert_eq!(*calls.lock().unwrap(), 2);
    }
}
