use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Bounded retry with a constant inter-attempt interval. External calls here
/// are rate-bounded by ledger confirmation times, not server-side congestion,
/// so there is no exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
    pub verbose: bool,
}

impl RetryPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self {
            attempts,
            interval,
            verbose: false,
        }
    }

    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(3)).verbose()
    }
}

/// Result of a retried operation. The operation's own errors are swallowed,
/// callers must check for `Exhausted` explicitly.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Completed(T),
    Exhausted,
}

impl<T> RetryOutcome<T> {
    pub fn ok(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Exhausted => None,
        }
    }
}

pub async fn retry<T, F, Fut>(policy: &RetryPolicy, op: F) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    retry_notify(policy, op, |_| {}).await
}

/// Runs `op` up to `policy.attempts` times, invoking `on_fail` after every
/// failed attempt and sleeping `policy.interval` between attempts (no sleep
/// after the last one).
pub async fn retry_notify<T, F, Fut, N>(
    policy: &RetryPolicy,
    mut op: F,
    mut on_fail: N,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
    N: FnMut(&anyhow::Error),
{
    let mut left = policy.attempts;
    while left > 0 {
        match op().await {
            Ok(value) => return RetryOutcome::Completed(value),
            Err(err) => {
                left -= 1;
                on_fail(&err);
                if policy.verbose {
                    warn!(error = %format!("{err:#}"), retries_left = left, "call failed, retrying");
                }
                if left > 0 {
                    tokio::time::sleep(policy.interval).await;
                }
            }
        }
    }
    RetryOutcome::Exhausted
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Instant;

    use super::*;

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(4, Duration::from_millis(5));
        let calls = Cell::new(0u32);
        let failures = Cell::new(0u32);

        let outcome = retry_notify(
            &policy,
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n <= 3 {
                        anyhow::bail!("transient failure {n}");
                    }
                    Ok(n)
                }
            },
            |_| failures.set(failures.get() + 1),
        )
        .await;

        assert!(outcome.ok());
        assert_eq!(outcome.into_value(), Some(4));
        assert_eq!(calls.get(), 4);
        assert_eq!(failures.get(), 3);
    }

    #[tokio::test]
    async fn exhausts_after_all_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(5));
        let calls = Cell::new(0u32);
        let failures = Cell::new(0u32);

        let started = Instant::now();
        let outcome: RetryOutcome<()> = retry_notify(
            &policy,
            || {
                calls.set(calls.get() + 1);
                async { anyhow::bail!("always fails") }
            },
            |_| failures.set(failures.get() + 1),
        )
        .await;

        assert!(!outcome.ok());
        assert_eq!(calls.get(), 3);
        assert_eq!(failures.get(), 3);
        // attempts - 1 sleeps of 5ms each
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn first_attempt_success_skips_delays() {
        let policy = RetryPolicy::new(5, Duration::from_secs(60));
        let started = Instant::now();
        let outcome = retry(&policy, || async { Ok(42u32) }).await;
        assert_eq!(outcome.into_value(), Some(42));
        // no inter-attempt sleep was taken
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn zero_attempts_exhausts_immediately() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        let outcome: RetryOutcome<()> = retry(&policy, || async { Ok(()) }).await;
        assert!(!outcome.ok());
    }
}
