use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::error::ToolError;

/// Exponential backoff retry policy: `max_retries=3`, `initial_delay=1s`,
/// `max_delay=30s`, `backoff_factor=2.0`. A RATE_LIMIT failure sleeps
/// `min(delay*2, max_delay)` for that attempt only — the persistent `delay`
/// used to seed the next attempt still advances by the plain
/// `min(delay*backoff_factor, max_delay)`, so the rate-limit doubling never
/// compounds across retries. Non-retryable categories and the final attempt
/// both return immediately without sleeping.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs_f64(1.0),
            max_delay: Duration::from_secs_f64(30.0),
            backoff_factor: 2.0,
        }
    }
}

/// Runs `f` under the backoff policy, returning the successful value along
/// with how many retries were consumed, or the last error paired with the
/// number of retries actually attempted before giving up — zero for a
/// non-retryable category, up to `max_retries` once retries are exhausted.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: BackoffPolicy,
    tool_name: &str,
    mut f: F,
) -> Result<(T, u32), (ToolError, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ToolError>>,
{
    let mut delay = policy.initial_delay;

    for attempt in 0..=policy.max_retries {
        match f().await {
            Ok(value) => return Ok((value, attempt)),
            Err(err) => {
                let category = err.category();

                if !category.is_retryable() {
                    warn!(tool = tool_name, category = category.as_str(), "tool call failed, not retryable");
                    return Err((err, 0));
                }

                if attempt == policy.max_retries {
                    error!(tool = tool_name, retries = policy.max_retries, "tool call exhausted retries");
                    return Err((err, attempt));
                }

                let effective_delay = if matches!(category, crate::error::ErrorCategory::RateLimit) {
                    std::cmp::min(delay * 2, policy.max_delay)
                } else {
                    delay
                };

                warn!(
                    tool = tool_name,
                    attempt = attempt + 1,
                    delay_secs = effective_delay.as_secs_f64(),
                    "tool call failed, retrying"
                );

                tokio::time::sleep(effective_delay).await;

                delay = std::cmp::min(delay.mul_f64(policy.backoff_factor), policy.max_delay);
            }
        }
    }

    unreachable!("loop always returns by the final-attempt branch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_k_retryable_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(BackoffPolicy::default(), "test_tool", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ToolError::Network("connection refused".into()))
                } else {
                    Ok("ok")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, ("ok", 2));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_returns_immediately_with_zero_retries() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(BackoffPolicy::default(), "test_tool", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(ToolError::Auth("bad token".into())) }
        })
        .await;

        let (_, retried) = result.unwrap_err();
        assert_eq!(retried, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(BackoffPolicy::default(), "test_tool", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(ToolError::Server("502".into())) }
        })
        .await;

        let (_, retried) = result.unwrap_err();
        assert_eq!(retried, 3);
        // initial attempt + 3 retries = 4 calls total
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
