use std::future::Future;

use courier_common::config::RetryPolicy;
use courier_common::error::PollFailure;
use courier_common::types::{Cursor, Destination, PollResponse, ReviewEvent};
use courier_notifier::alerts::AlertPublisher;
use courier_notifier::formatter::{
    STARTED_MESSAGE, STOPPED_MESSAGE, UNAUTHORIZED_MESSAGE, format_review,
};
use courier_notifier::sink::NotificationSink;

use crate::classifier::ErrorClassifier;
use crate::client::ReviewSource;

/// Why the watcher stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The review service rejected the credential. Retrying cannot help.
    Unauthorized,
    /// An external stop signal arrived.
    Stopped,
}

/// Counters for the lifetime of one watcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherStats {
    pub polls: u64,
    pub notifications_sent: u64,
    pub delivery_failures: u64,
    pub retries: u64,
}

/// Long-polling loop that owns the cursor and forwards review results.
///
/// One request is in flight at a time. The cursor only ever takes values
/// returned by the server; failed requests are retried with the cursor
/// unchanged.
pub struct ReviewWatcher<S, N> {
    source: S,
    sink: N,
    destination: Destination,
    classifier: ErrorClassifier,
    alerts: Option<AlertPublisher>,
    cursor: Option<Cursor>,
    stats: WatcherStats,
}

impl<S: ReviewSource, N: NotificationSink> ReviewWatcher<S, N> {
    pub fn new(source: S, sink: N, destination: Destination) -> Self {
        Self {
            source,
            sink,
            destination,
            classifier: ErrorClassifier::default(),
            alerts: None,
            cursor: None,
            stats: WatcherStats::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.classifier = ErrorClassifier::new(policy);
        self
    }

    /// Mirror failures into an alert stream.
    pub fn with_alerts(mut self, alerts: AlertPublisher) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Last cursor the server handed out, if any.
    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor.clone()
    }

    pub fn stats(&self) -> WatcherStats {
        self.stats
    }

    /// Run until `shutdown` resolves or the credential is rejected.
    ///
    /// Both the in-flight request and a backoff sleep are abandoned as soon
    /// as `shutdown` resolves; a "stopped" notice is then sent best-effort.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Outcome
    where
        F: Future<Output = ()>,
    {
        let outcome = tokio::select! {
            outcome = self.run() => outcome,
            _ = shutdown => Outcome::Stopped,
        };

        if outcome == Outcome::Stopped {
            tracing::info!(cursor = ?self.cursor, "Watcher stopped by signal");
            self.notify(STOPPED_MESSAGE).await;
        }

        outcome
    }

    /// Poll forever. Returns only when the credential is rejected.
    pub async fn run(&mut self) -> Outcome {
        tracing::info!(destination = %self.destination, "Review watcher started");
        self.notify(STARTED_MESSAGE).await;

        loop {
            self.stats.polls += 1;
            tracing::debug!(cursor = ?self.cursor, "Long-poll request");

            match self.source.poll(self.cursor.clone()).await {
                Ok(PollResponse::Found {
                    events,
                    next_cursor,
                }) => {
                    tracing::info!(count = events.len(), "New review results found");
                    for event in &events {
                        self.deliver(event).await;
                    }
                    self.advance(next_cursor);
                }
                Ok(PollResponse::Timeout { next_cursor }) => {
                    tracing::debug!("Server timeout, reconnecting");
                    self.advance(next_cursor);
                }
                Err(PollFailure::ReadTimeout) => {
                    tracing::debug!(cursor = ?self.cursor, "Read timed out, reconnecting");
                }
                Err(failure) => {
                    let classified = self.classifier.classify(&failure);

                    let Some(delay) = classified.retry_after() else {
                        tracing::error!(error = %failure, "Review API rejected the token, stopping");
                        self.notify(UNAUTHORIZED_MESSAGE).await;
                        return Outcome::Unauthorized;
                    };

                    tracing::error!(
                        error = %failure,
                        classification = %classified,
                        retry_after_secs = delay.as_secs_f64(),
                        cursor = ?self.cursor,
                        "Long-poll request failed, retrying"
                    );
                    if let Some(alerts) = &self.alerts {
                        alerts.error(format!("Review API request failed ({classified}): {failure}"));
                    }

                    self.stats.retries += 1;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn advance(&mut self, next: Cursor) {
        if let Some(current) = &self.cursor
            && next.value() < current.value()
        {
            tracing::warn!(%current, %next, "Server moved the cursor backwards");
        }
        self.cursor = Some(next);
    }

    /// Format and send one review. A failed send is reported, not retried.
    async fn deliver(&mut self, event: &ReviewEvent) {
        let text = format_review(event);
        tracing::info!(lesson = %event.lesson_title, is_negative = event.is_negative, "Sending review notification");

        match self.sink.send(&self.destination, &text).await {
            Ok(()) => self.stats.notifications_sent += 1,
            Err(e) => {
                self.stats.delivery_failures += 1;
                tracing::warn!(
                    sink = self.sink.name(),
                    lesson = %event.lesson_title,
                    error = %e,
                    "Review notification dropped"
                );
                if let Some(alerts) = &self.alerts {
                    alerts.warning(format!(
                        "Notification for \"{}\" was not delivered: {e}",
                        event.lesson_title
                    ));
                }
            }
        }
    }

    /// Best-effort service message.
    async fn notify(&self, text: &str) {
        if let Err(e) = self.sink.send(&self.destination, text).await {
            tracing::warn!(sink = self.sink.name(), error = %e, "Service message not delivered");
        }
    }
}
