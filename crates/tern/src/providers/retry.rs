use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::ProviderError;

/// Floor for provider-supplied retry hints. Reset timestamps can sit in
/// the past, and sleeping zero would turn the backoff into a busy loop.
pub const MIN_HINT_DELAY: Duration = Duration::from_secs(1);

/// Bounds for the retry loop around one provider call.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total calls allowed, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the delay added as random jitter
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
        }
    }
}

/// What to do with a failed attempt.
enum Disposition {
    /// Try again, optionally after the delay the provider asked for
    Retry(Option<Duration>),
    /// Give up and surface the error as-is
    Fatal,
}

/// Only rate limiting is retried. Configuration problems, rejected
/// requests, and transport failures do not get better by waiting.
fn classify(error: &ProviderError) -> Disposition {
    match error {
        ProviderError::RateLimited { retry_after } => Disposition::Retry(*retry_after),
        _ => Disposition::Fatal,
    }
}

impl RetryConfig {
    /// Delay before the next attempt: the provider's own hint when it gave
    /// one, otherwise exponential backoff, either way capped and jittered.
    fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let base = match hint {
            Some(hint) => hint.clamp(MIN_HINT_DELAY, self.max_delay),
            None => self
                .base_delay
                .saturating_mul(2u32.saturating_pow(attempt))
                .min(self.max_delay),
        };
        if self.jitter > 0.0 {
            base + base.mul_f64(rand::thread_rng().gen_range(0.0..self.jitter))
        } else {
            base
        }
    }
}

/// Run one provider call with bounded retries on rate limiting.
///
/// Fatal errors pass through on first occurrence. Rate limits are retried
/// up to `max_attempts` total calls with a sleep in between, and surface
/// as `RateLimitExceeded` once the budget is spent. Cancellation wins any
/// race against the in-flight call or a backoff sleep.
pub async fn with_retries<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        let result = tokio::select! {
            result = operation() => result,
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        match classify(&error) {
            Disposition::Fatal => return Err(error),
            Disposition::Retry(hint) => {
                attempt += 1;
                if attempt >= config.max_attempts {
                    return Err(ProviderError::RateLimitExceeded { attempts: attempt });
                }
                let delay = config.delay_for(attempt - 1, hint);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                }
            }
        }
    }
}
