//! Notification sinks.
//!
//! - [`TerminalSink`] prints stream notifications to stdout.
//! - [`DesktopSink`] shows them through the desktop notification daemon.

use async_trait::async_trait;
use chrono::Local;
use colored::Colorize;
use notify_rust::Notification;
use tracing::debug;

use crate::config::APP_NAME;
use crate::engine::StreamNotification;
use crate::error::{Error, Result};

/// Destination for stream and error notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Get the sink type name.
    fn sink_type(&self) -> &'static str;

    /// Announce that a streamer is playing a game of interest.
    async fn send_stream(&self, notification: &StreamNotification) -> Result<()>;

    /// Surface an error to the user. Callers log the error themselves.
    async fn send_error(&self, message: &str) -> Result<()>;
}

/// Body shared by both sinks.
pub fn stream_body(notification: &StreamNotification) -> String {
    format!(
        "Streaming {}\nTitle: {}",
        notification.game_title, notification.title
    )
}

/// Prints notifications to stdout. Errors only go to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalSink;

impl TerminalSink {
    pub fn render(notification: &StreamNotification) -> String {
        format!(
            "{} @ {}\n{}",
            notification.display_name.bold(),
            Local::now().format("%Y-%m-%dT%H:%M:%S%.6f"),
            stream_body(notification)
        )
    }
}

#[async_trait]
impl NotificationSink for TerminalSink {
    fn sink_type(&self) -> &'static str {
        "terminal"
    }

    async fn send_stream(&self, notification: &StreamNotification) -> Result<()> {
        println!("{}", Self::render(notification));
        Ok(())
    }

    async fn send_error(&self, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Shows notifications through the desktop notification service.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopSink;

impl DesktopSink {
    pub fn new() -> Self {
        Self
    }

    fn subject(name: &str) -> String {
        format!("{} @ {}", name, Local::now().format("%H:%M"))
    }

    fn build(subject: &str, body: &str) -> Notification {
        let mut notification = Notification::new();
        notification.appname(APP_NAME).summary(subject).body(body);
        notification
    }

    async fn show(&self, subject: &str, body: &str) -> Result<()> {
        debug!(subject = %subject, "Showing desktop notification");

        let notification = Self::build(subject, body);
        // Delivery talks to the session bus synchronously.
        tokio::task::spawn_blocking(move || notification.show().map(|_| ()))
            .await
            .map_err(|e| Error::notification(format!("Notification task failed: {e}")))?
            .map_err(|e| Error::notification(format!("Failed to show notification: {e}")))
    }
}

#[async_trait]
impl NotificationSink for DesktopSink {
    fn sink_type(&self) -> &'static str {
        "desktop"
    }

    async fn send_stream(&self, notification: &StreamNotification) -> Result<()> {
        self.show(
            &Self::subject(&notification.display_name),
            &stream_body(notification),
        )
        .await
    }

    async fn send_error(&self, message: &str) -> Result<()> {
        self.show(&Self::subject(APP_NAME), message).await
    }
}
