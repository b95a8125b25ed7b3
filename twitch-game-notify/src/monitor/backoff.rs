//! Retry policy for establishing the API client.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use twitch_api::ApiError;

use super::{AUTHENTICATION_FAILED_MESSAGE, report_error};
use crate::error::{Error, Result};
use crate::notification::NotificationSink;

/// Exponential backoff without a retry limit.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Add up to 25% random jitter to every delay.
    pub use_jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(20),
            multiplier: 2.0,
            use_jitter: false,
        }
    }
}

impl BackoffPolicy {
    /// Delay after the given failed attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let max_ms = self.max_delay.as_millis() as f64;
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let base_ms = (self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent))
            .min(max_ms);

        let delay_ms = if self.use_jitter {
            // Up to 25% extra, still bounded by `max_delay`.
            (base_ms * (1.0 + 0.25 * rand::random::<f64>())).min(max_ms)
        } else {
            base_ms
        };

        Duration::from_millis(delay_ms as u64)
    }
}

pub fn connection_retry_message(delay: Duration) -> String {
    format!(
        "Unable to connect to Twitch. Retrying in {}s",
        delay.as_secs()
    )
}

/// Run `connect` until it succeeds, backing off between transient failures.
///
/// Every failed attempt is reported through `sink`. Authentication failures
/// and other permanent errors end the loop; so does cancelling `token`.
pub async fn establish_client<T, S, F, Fut>(
    policy: &BackoffPolicy,
    sink: &S,
    token: &CancellationToken,
    mut connect: F,
) -> Result<T>
where
    S: NotificationSink + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, ApiError>>,
{
    let mut attempt: u32 = 0;

    loop {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let error = match connect().await {
            Ok(client) => {
                if attempt > 0 {
                    debug!(attempts = attempt + 1, "Connected to Twitch after retrying");
                }
                return Ok(client);
            }
            Err(e) => e,
        };

        if error.is_authentication() {
            warn!(error = %error, "Twitch rejected the API credentials");
            report_error(sink, AUTHENTICATION_FAILED_MESSAGE).await;
            return Err(error.into());
        }
        if !error.is_transient() {
            report_error(sink, &error.to_string()).await;
            return Err(error.into());
        }

        attempt += 1;
        let delay = policy.delay_for_attempt(attempt);
        warn!(attempt, delay_secs = delay.as_secs(), error = %error, "Failed to connect to Twitch");
        report_error(sink, &connection_retry_message(delay)).await;

        tokio::select! {
            _ = token.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
