use crate::config::settings::RetryConfig;
use crate::model::client::ModelError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Drive `op` until it succeeds, fails with a non-retryable error, or the
/// attempt ceiling is reached (the final error is then surfaced as-is).
/// A warning is logged before each backoff sleep.
pub async fn run<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, ModelError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ModelError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let wait = backoff_wait(config, attempt);
                warn!(
                    attempt,
                    max_attempts,
                    wait_ms = wait.as_millis() as u64,
                    error = %err,
                    "model query failed, retrying"
                );
                tokio::time::sleep(wait).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Wait before the next attempt after `attempt` failures:
/// `initial_wait * 2^(attempt - 1)`, capped at `max_wait`.
fn backoff_wait(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(31));
    config.initial_wait.saturating_mul(factor).min(config.max_wait)
}
