use std::{fmt::Display, future::Future, time::Duration};
use tokio::time::sleep;
use tracing::warn;

/// Whether a failed attempt should be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retry,
    Stop,
}

#[derive(Debug)]
pub enum RetryError<E> {
    /// The classifier refused to retry.
    Fatal { error: E, attempts: usize },
    /// Every allowed attempt failed with a retryable error.
    AttemptsExceeded { error: E, attempts: usize },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> usize {
        match self {
            RetryError::Fatal { attempts, .. } | RetryError::AttemptsExceeded { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Fatal { error, .. } | RetryError::AttemptsExceeded { error, .. } => error,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::AttemptsExceeded { .. })
    }
}

impl<E: Display> Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::Fatal { error, attempts } => {
                write!(f, "{error} (not retryable, attempt {attempts})")
            }
            RetryError::AttemptsExceeded { error, attempts } => {
                write!(f, "{error} (gave up after {attempts} attempts)")
            }
        }
    }
}

/// Bounded exponential backoff: `base_delay * 2^attempt`, capped at
/// `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Runs `op` until it succeeds, the classifier says stop, or the attempts
    /// run out. `label` names the operation in retry logs.
    pub async fn run<F, Fut, T, E, Classifier>(
        &self,
        label: &str,
        mut op: F,
        classify: Classifier,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        Classifier: Fn(&E) -> RetryDisposition,
    {
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    let attempts = attempt + 1;
                    match classify(&error) {
                        RetryDisposition::Stop => {
                            return Err(RetryError::Fatal { error, attempts });
                        }
                        RetryDisposition::Retry if attempts >= self.max_attempts => {
                            return Err(RetryError::AttemptsExceeded { error, attempts });
                        }
                        RetryDisposition::Retry => {
                            let delay = self.backoff_delay(attempt);
                            warn!(
                                operation = label,
                                attempt = attempts,
                                max_attempts = self.max_attempts,
                                delay_ms = delay.as_millis() as u64,
                                %error,
                                "Attempt failed, retrying"
                            );
                            sleep(delay).await;
                            attempt += 1;
                        }
                    }
                }
            }
        }
    }

    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let factor = 1u128 << attempt.min(6);
        let delay_ms = self.base_delay.as_millis().saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(2))
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(350));
        assert_eq!(policy.backoff_delay(40), Duration::from_millis(350));
        assert_eq!(RetryPolicy::none().backoff_delay(3), Duration::ZERO);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicUsize::new(0);
        let result = fast(3)
            .run(
                "flaky",
                || async {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("busy")
                    } else {
                        Ok(7)
                    }
                },
                |_| RetryDisposition::Retry,
            )
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_when_attempts_run_out() {
        let calls = AtomicUsize::new(0);
        let err = fast(4)
            .run(
                "down",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("down")
                },
                |_| RetryDisposition::Retry,
            )
            .await
            .unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let err = fast(5)
            .run("bad", || async { Err::<(), _>("bad key") }, |_| RetryDisposition::Stop)
            .await
            .unwrap_err();
        assert!(!err.is_exhausted());
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.into_inner(), "bad key");
    }
}
