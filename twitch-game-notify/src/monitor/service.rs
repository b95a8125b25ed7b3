use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use twitch_api::{ApiError, TwitchApi};

use super::{
    AUTHENTICATION_FAILED_MESSAGE, CONNECTION_LOST_MESSAGE, connection_retry_message,
    report_error,
};
use crate::cache::NameCache;
use crate::config::{AppConfig, StreamerConfig};
use crate::engine::{Decision, PreviousGameState, evaluate};
use crate::error::Result;
use crate::notification::NotificationSink;

/// How the monitor runs.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub query_period: Duration,
    /// Poll every streamer once, without duplicate suppression.
    pub one_shot: bool,
    /// Drop 502 answers without notifying.
    pub ignore_502s: bool,
}

impl MonitorSettings {
    pub fn from_config(config: &AppConfig, one_shot: bool) -> Self {
        Self {
            query_period: config.query_period(),
            one_shot,
            ignore_502s: config.ignore_502s(one_shot),
        }
    }
}

/// Outcome counts of one pass over the streamers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub notified: usize,
    pub suppressed: usize,
    /// API errors other than connection failures, reported or ignored.
    pub failed: usize,
    pub unreachable: usize,
}

enum FailureAction {
    Ignored,
    Reported,
    Unreachable,
}

/// Owns the per-streamer state and the name cache for the whole run.
pub struct Monitor {
    api: Arc<dyn TwitchApi>,
    sink: Arc<dyn NotificationSink>,
    streamers: BTreeMap<String, StreamerConfig>,
    settings: MonitorSettings,
    previous: Option<PreviousGameState>,
    cache: Option<NameCache>,
}

impl Monitor {
    pub fn new(
        api: Arc<dyn TwitchApi>,
        sink: Arc<dyn NotificationSink>,
        streamers: BTreeMap<String, StreamerConfig>,
        settings: MonitorSettings,
    ) -> Self {
        let previous = (!settings.one_shot)
            .then(|| PreviousGameState::for_streamers(streamers.keys().cloned()));

        Self {
            api,
            sink,
            streamers,
            settings,
            previous,
            cache: None,
        }
    }

    /// Resolve names through `cache` before asking the API.
    pub fn with_cache(mut self, cache: NameCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn previous_state(&self) -> Option<&PreviousGameState> {
        self.previous.as_ref()
    }

    /// Give the cache back for persisting.
    pub fn into_cache(self) -> Option<NameCache> {
        self.cache
    }

    /// Run once or until cancelled, depending on the settings.
    pub async fn run(&mut self, token: &CancellationToken) -> Result<()> {
        if self.settings.one_shot {
            self.run_cycle(token).await.map(|_| ())
        } else {
            self.run_forever(token).await
        }
    }

    /// Poll on a fixed period until `token` is cancelled. Cycles never
    /// overlap: a slow cycle delays the next tick.
    pub async fn run_forever(&mut self, token: &CancellationToken) -> Result<()> {
        // `interval` rejects a zero period.
        let period = self.settings.query_period.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            streamers = self.streamers.len(),
            period_secs = self.settings.query_period.as_secs_f64(),
            "Monitor started"
        );

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {}
            }

            let summary = self.run_cycle(token).await?;
            debug!(
                notified = summary.notified,
                suppressed = summary.suppressed,
                failed = summary.failed,
                unreachable = summary.unreachable,
                "Cycle finished"
            );
        }

        info!("Monitor stopped");
        Ok(())
    }

    /// Poll every streamer once. Only an authentication failure is returned
    /// as an error; every other failure skips the streamer for this cycle.
    pub async fn run_cycle(&mut self, token: &CancellationToken) -> Result<CycleSummary> {
        let mut summary = CycleSummary::default();

        for (login, config) in &self.streamers {
            if token.is_cancelled() {
                debug!("Cycle interrupted by shutdown");
                break;
            }

            let decision = match self.api.stream_snapshot(login).await {
                Ok(snapshot) => {
                    evaluate(
                        login,
                        config,
                        &snapshot,
                        self.previous.as_mut(),
                        self.cache.as_mut(),
                        self.api.as_ref(),
                    )
                    .await
                }
                Err(e) => Decision::Errored(e),
            };

            match decision {
                Decision::Suppressed(reason) => {
                    debug!(streamer = %login, reason = %reason, "No notification");
                    summary.suppressed += 1;
                }
                Decision::Notify(notification) => {
                    info!(
                        streamer = %login,
                        game = %notification.game_title,
                        "Streamer is playing a watched game"
                    );
                    if let Err(e) = self.sink.send_stream(&notification).await {
                        warn!(
                            streamer = %login,
                            sink = self.sink.sink_type(),
                            "Failed to send notification: {e}"
                        );
                    }
                    summary.notified += 1;
                }
                Decision::Errored(e) => match self.handle_failure(login, e).await? {
                    FailureAction::Unreachable => summary.unreachable += 1,
                    FailureAction::Ignored | FailureAction::Reported => summary.failed += 1,
                },
            }
        }

        if summary.unreachable > 0 {
            let message = if self.settings.one_shot {
                CONNECTION_LOST_MESSAGE.to_string()
            } else {
                connection_retry_message(self.settings.query_period)
            };
            report_error(self.sink.as_ref(), &message).await;
        }

        Ok(summary)
    }

    async fn handle_failure(&self, login: &str, error: ApiError) -> Result<FailureAction> {
        if error.is_authentication() {
            report_error(self.sink.as_ref(), AUTHENTICATION_FAILED_MESSAGE).await;
            return Err(error.into());
        }

        if error.is_connection() {
            warn!(streamer = %login, error = %error, "Twitch unreachable");
            return Ok(FailureAction::Unreachable);
        }

        if error.is_bad_gateway() && self.settings.ignore_502s {
            debug!(streamer = %login, "Ignoring 502 from Twitch");
            return Ok(FailureAction::Ignored);
        }

        warn!(streamer = %login, status = ?error.status_code(), "Twitch request failed");
        report_error(self.sink.as_ref(), &error.to_string()).await;
        Ok(FailureAction::Reported)
    }
}
