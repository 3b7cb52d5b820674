//! Retry with exponential backoff around any remote operation.

use std::future::Future;
use tracing::{info, warn};

use crate::config::RetryPolicy;
use crate::error::{RemoteError, SyncError};

#[derive(Debug, Clone, Default)]
pub struct RetryingClient {
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails terminally, or the attempt
    /// budget is spent. `context` labels traces and the returned error.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        mut operation: F,
        context: &str,
    ) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            info!(context, attempt, max_attempts, "Executing remote operation");
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(context, attempt, "Remote operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            warn!(context, attempt, max_attempts, error = %error, "Remote operation failed");

            if !error.is_retryable() {
                return Err(SyncError::NetworkPermanent {
                    context: context.to_string(),
                    source: error,
                });
            }
            if attempt >= max_attempts {
                return Err(SyncError::NetworkTransient {
                    context: context.to_string(),
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = self.policy.delay_for(attempt);
            info!(context, delay_ms = delay.as_millis() as u64, "Retrying after backoff");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
