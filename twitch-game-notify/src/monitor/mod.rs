//! Poll loop.
//!
//! [`Monitor`] walks the configured streamers once per query period (or a
//! single time in one-shot mode), feeds each snapshot to the decision engine
//! and applies the failure policy to API errors.

mod backoff;
mod service;

pub use backoff::{BackoffPolicy, connection_retry_message, establish_client};
pub use service::{CycleSummary, Monitor, MonitorSettings};

use tracing::{error, warn};

use crate::notification::NotificationSink;

pub const AUTHENTICATION_FAILED_MESSAGE: &str =
    "Invalid authentication credentials for Twitch API. Exiting.";

pub const CONNECTION_LOST_MESSAGE: &str = "Unable to connect to Twitch";

/// Log an error and pass it on to the sink.
pub async fn report_error<S>(sink: &S, message: &str)
where
    S: NotificationSink + ?Sized,
{
    error!("{message}");
    if let Err(e) = sink.send_error(message).await {
        warn!(sink = sink.sink_type(), "Failed to send error notification: {e}");
    }
}
