//! Exponential backoff retry policy (spec §4.1).

use std::time::Duration;

use super::traits::{CancelToken, ProviderError};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub factor: f64,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(10),
            max_attempts: 3,
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.initial.as_secs_f64() * self.factor.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max.as_secs_f64()))
    }

    /// Runs `op` under this policy, retrying only on retryable errors, and
    /// aborting between attempts if `cancel` fires.
    pub async fn run<T, F, Fut>(&self, cancel: &CancelToken, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(ProviderError::Other {
                    message: "cancelled".to_string(),
                    retryable: false,
                });
            }

            match op().await {
                Ok(v) => return Ok(v),
                Err(err) if err.is_retryable() && attempt + 1 < self.max_attempts => {
                    log::warn!("retryable provider error on attempt {attempt}: {err}");
                    let delay = match &err {
                        ProviderError::RateLimit {
                            retry_after: Some(secs),
                        } => Duration::from_secs(*secs),
                        _ => self.delay_for(attempt),
                    };
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
