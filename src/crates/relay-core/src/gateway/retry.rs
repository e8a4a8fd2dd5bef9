//! Exponential backoff with jitter, grounded on the orchestrator's LLM
//! retry loop but adapted to the upstream gateway's own error taxonomy.

use super::error::GatewayError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms =
            (self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32)) as u64;
        let delay_ms = delay_ms.min(self.max_backoff_ms);
        let delay_ms = if self.jitter {
            let jitter_amount = (delay_ms as f64 * 0.25 * rand::random::<f64>()) as u64;
            delay_ms + jitter_amount
        } else {
            delay_ms
        };
        Duration::from_millis(delay_ms)
    }
}

/// Run `f` with retry-with-backoff, skipping retries entirely for
/// permanent (non-transient) gateway errors.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            info!(operation = operation_name, attempt, "retrying upstream call");
        }

        match f().await {
            Ok(result) => {
                if attempt > 0 {
                    info!(operation = operation_name, attempt, "upstream call succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                debug!(
                    operation = operation_name,
                    attempt,
                    error = %e,
                    transient = e.is_transient(),
                    "upstream call failed"
                );

                if !e.is_transient() {
                    error!(operation = operation_name, error = %e, "permanent gateway error, aborting retries");
                    return Err(e);
                }

                last_error = Some(e);

                if attempt < config.max_retries {
                    let delay = config.backoff_delay(attempt);
                    warn!(
                        operation = operation_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient error, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    let final_error = last_error.unwrap_or_else(|| {
        GatewayError::Unavailable(format!(
            "operation '{operation_name}' failed after {} retries",
            config.max_retries
        ))
    });
    error!(operation = operation_name, error = %final_error, "all retry attempts exhausted");
    Err(final_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn backoff_delay_is_exponential_without_jitter() {
        let config = RetryConfig {
            jitter: false,
            ..RetryConfig::default()
        };
        assert_eq!(config.backoff_delay(0).as_millis(), 500);
        assert_eq!(config.backoff_delay(1).as_millis(), 1000);
        assert_eq!(config.backoff_delay(2).as_millis(), 2000);
    }

    #[test]
    fn backoff_delay_caps_at_max() {
        let config = RetryConfig {
            jitter: false,
            max_backoff_ms: 1200,
            ..RetryConfig::default()
        };
        assert_eq!(config.backoff_delay(5).as_millis(), 1200);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let config = RetryConfig {
            initial_backoff_ms: 5,
            jitter: false,
            ..RetryConfig::default()
        };
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result = retry_with_backoff(&config, "test", move || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(GatewayError::Timeout("slow".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn aborts_immediately_on_permanent_error() {
        let config = RetryConfig::default();
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result: Result<(), GatewayError> = retry_with_backoff(&config, "test", move || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(GatewayError::Unauthorized("bad token".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
