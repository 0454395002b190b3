//! Fixed-backoff retry bounded by an optional overall deadline.
//!
//! The whole loop is an ordinary future: dropping it (for example through
//! `tokio::time::timeout` in the caller) cancels the in-flight attempt or the
//! pending backoff sleep.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, warn};

use crate::error::LlmError;

/// How often and how long to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
    /// Budget for all attempts and pauses together.
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    /// Fixed backoff without a deadline.
    #[must_use]
    pub fn fixed(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
            deadline: None,
        }
    }

    /// A single attempt, no retry.
    #[must_use]
    pub fn once() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Bound the whole loop by `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Run `op` until it succeeds or the policy gives up.
    ///
    /// `op` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// [`LlmError::RetriesExhausted`] after the last failed attempt, or
    /// [`LlmError::DeadlineExceeded`] once the deadline leaves no room for
    /// another attempt.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<Attempted<T>, LlmError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let attempts = self.max_attempts.max(1);
        let deadline = self.deadline.map(|d| Instant::now() + d);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                debug!(label, attempt, max_attempts = attempts, "Retrying LLM call");
            }

            let started = Instant::now();
            let outcome = match deadline {
                Some(at) => match timeout_at(at, op(attempt)).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(label, attempt, "LLM deadline reached mid-attempt");
                        return Err(self.deadline_exceeded());
                    }
                },
                None => op(attempt).await,
            };

            match outcome {
                Ok(value) => {
                    return Ok(Attempted {
                        value,
                        attempts: attempt,
                        last_attempt: started.elapsed(),
                    });
                }
                Err(e) => {
                    warn!(label, attempt, error = %e, output_error = e.is_output_error(), "LLM attempt failed");
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                if deadline.is_some_and(|at| Instant::now() + self.backoff >= at) {
                    warn!(label, attempt, "No time left for another LLM attempt");
                    return Err(self.deadline_exceeded());
                }
                sleep(self.backoff).await;
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts,
            last_error,
        })
    }

    fn deadline_exceeded(&self) -> LlmError {
        let ms = self
            .deadline
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        LlmError::DeadlineExceeded(ms)
    }
}

/// A successful result and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    /// The value produced by the successful attempt.
    pub value: T,
    /// 1-based number of the successful attempt.
    pub attempts: u32,
    /// Duration of the successful attempt alone.
    pub last_attempt: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result = RetryPolicy::default()
            .run("test", |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(LlmError::Unavailable("down".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .expect("third attempt succeeds");

        assert_eq!(result.attempts, 3);
        assert_eq!(result.value, 2);
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let err = RetryPolicy::default()
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(LlmError::EmptyContent) }
            })
            .await
            .expect_err("always fails");

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, LlmError::RetriesExhausted { attempts: 3, .. }));
        // No pause after the final attempt.
        assert_eq!(start.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn once_never_sleeps() {
        let start = Instant::now();
        let err = RetryPolicy::once()
            .run("test", |_| async { Err::<(), _>(LlmError::EmptyContent) })
            .await
            .expect_err("fails");
        assert!(matches!(err, LlmError::RetriesExhausted { attempts: 1, .. }));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_stops_before_backoff() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default().with_deadline(Duration::from_secs(3));
        let err = policy
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(LlmError::EmptyContent) }
            })
            .await
            .expect_err("deadline");

        // Attempt 1 at t=0, attempt 2 at t=2, no room for a third pause.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(err, LlmError::DeadlineExceeded(3000)));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cuts_a_hanging_attempt() {
        let policy = RetryPolicy::default().with_deadline(Duration::from_secs(5));
        let start = Instant::now();
        let err = policy
            .run("test", |_| async {
                sleep(Duration::from_secs(60)).await;
                Ok::<_, LlmError>(())
            })
            .await
            .expect_err("hangs past deadline");
        assert!(matches!(err, LlmError::DeadlineExceeded(5000)));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_duration_is_measured_alone() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::default()
            .run("test", |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    sleep(Duration::from_millis(300)).await;
                    if n == 0 { Err(LlmError::EmptyContent) } else { Ok(()) }
                }
            })
            .await
            .expect("second attempt succeeds");
        assert_eq!(result.last_attempt, Duration::from_millis(300));
    }
}
