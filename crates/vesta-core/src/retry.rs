// ── Per-source retry with exponential backoff ──
//
// Each source gets its own `Backoff` within a tick. Waits are absolute
// deadlines raced against the shutdown token, so cancellation never has
// to wait out a sleep.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::FetchError;
use crate::model::Source;

/// Attempt ceiling and delay schedule for one source within one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay after the first failure; doubles per further failure.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after `failures` consecutive failed attempts.
    pub fn delay_after(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay)
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStep {
    Retry { at: Instant },
    GiveUp,
}

/// Attempt counter for one source.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    attempts: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record the start of an attempt; returns its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub fn on_failure(&self, err: &FetchError, now: Instant) -> BackoffStep {
        if !err.is_retryable() || self.attempts >= self.policy.max_attempts {
            return BackoffStep::GiveUp;
        }
        BackoffStep::Retry {
            at: now + self.policy.delay_after(self.attempts),
        }
    }
}

/// Drive `op` until it succeeds, fails finally, or `cancel` fires.
///
/// `attempts` is updated before each attempt so a caller that abandons
/// this future on a deadline can still report how far it got.
pub(crate) async fn run<T, F, Fut>(
    policy: &RetryPolicy,
    source: Source,
    cancel: &CancellationToken,
    attempts: &AtomicU32,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut backoff = Backoff::new(policy.clone());
    loop {
        let attempt = backoff.begin_attempt();
        attempts.store(attempt, Ordering::Relaxed);

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FetchError::Cancelled),
            r = op() => r,
        };
        let err = match result {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        match backoff.on_failure(&err, Instant::now()) {
            BackoffStep::GiveUp => return Err(err),
            BackoffStep::Retry { at } => {
                debug!(%source, attempt, error = %err, "fetch failed, backing off");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(FetchError::Cancelled),
                    () = tokio::time::sleep_until(at) => {}
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn transient() -> FetchError {
        FetchError::Transport(vesta_api::Error::Timeout { timeout_ms: 10 })
    }

    #[test]
    fn delays_double_and_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(250));
        assert_eq!(policy.delay_after(2), Duration::from_millis(500));
        assert_eq!(policy.delay_after(3), Duration::from_secs(1));
        assert_eq!(policy.delay_after(4), Duration::from_secs(2));
        assert_eq!(policy.delay_after(40), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_gives_up_at_ceiling() {
        let mut backoff = Backoff::new(RetryPolicy::default());
        let now = Instant::now();
        backoff.begin_attempt();
        assert_eq!(
            backoff.on_failure(&transient(), now),
            BackoffStep::Retry {
                at: now + Duration::from_millis(250)
            }
        );
        backoff.begin_attempt();
        backoff.begin_attempt();
        assert_eq!(backoff.on_failure(&transient(), now), BackoffStep::GiveUp);
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failures_are_final() {
        let mut backoff = Backoff::new(RetryPolicy::default());
        backoff.begin_attempt();
        let err = FetchError::Transport(vesta_api::Error::Auth { status: 401 });
        assert_eq!(backoff.on_failure(&err, Instant::now()), BackoffStep::GiveUp);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success_with_backoff() {
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let start = Instant::now();

        let result = run(
            &RetryPolicy::default(),
            Source::Status,
            &cancel,
            &attempts,
            move || async move {
                if calls.fetch_add(1, Ordering::Relaxed) < 2 {
                    Err(transient())
                } else {
                    Ok(7)
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::Relaxed), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(750));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff_wait() {
        let cancel = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(60),
            max_delay: Duration::from_secs(60),
        };
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let start = Instant::now();

        let result: Result<(), _> = run(&policy, Source::Events, &cancel, &attempts, || async {
            Err(transient())
        })
        .await;

        assert_eq!(result.unwrap_err(), FetchError::Cancelled);
        assert_eq!(attempts.load(Ordering::Relaxed), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
