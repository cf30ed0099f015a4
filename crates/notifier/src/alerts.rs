//! Alert forwarding: mirrors warnings and errors into the notification chat.
//!
//! The polling loop publishes an [`Alert`] for every classified failure and
//! every dropped notification. An [`AlertForwarder`] task drains the channel
//! and delivers each alert through its own sink, so a slow or broken
//! transport never blocks polling. The queue is bounded; alerts published
//! while it is full are dropped.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use courier_common::types::Destination;

use crate::sink::{NotificationSink, TELEGRAM_MAX_MESSAGE_LEN, truncate_message};

/// Alert severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Warning,
    Error,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::Warning => write!(f, "WARNING"),
            AlertLevel::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Alert {
    pub fn new(level: AlertLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Utc::now(),
        }
    }

    /// `2024-05-01 12:00:00,123 - ERROR - message`
    pub fn render(&self) -> String {
        format!(
            "{} - {} - {}",
            self.at.format("%Y-%m-%d %H:%M:%S,%3f"),
            self.level,
            self.message
        )
    }
}

/// Alerts that may wait for delivery before new ones are dropped.
pub const ALERT_QUEUE_CAPACITY: usize = 64;

/// Sending half handed to the polling loop.
#[derive(Debug, Clone)]
pub struct AlertPublisher {
    tx: mpsc::Sender<Alert>,
}

impl AlertPublisher {
    /// Create a connected publisher/forwarder pair.
    pub fn channel<N: NotificationSink>(
        sink: N,
        destination: Destination,
    ) -> (AlertPublisher, AlertForwarder<N>) {
        Self::with_capacity(sink, destination, ALERT_QUEUE_CAPACITY)
    }

    pub fn with_capacity<N: NotificationSink>(
        sink: N,
        destination: Destination,
        capacity: usize,
    ) -> (AlertPublisher, AlertForwarder<N>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            AlertPublisher { tx },
            AlertForwarder {
                rx,
                sink,
                destination,
            },
        )
    }

    /// Queue an alert without waiting. Dropped when the queue is full or
    /// the forwarder is gone.
    pub fn publish(&self, alert: Alert) {
        match self.tx.try_send(alert) {
            Ok(()) => {}
            Err(TrySendError::Full(alert)) => {
                tracing::debug!(level = %alert.level, "Alert queue full, dropping alert");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.publish(Alert::new(AlertLevel::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(Alert::new(AlertLevel::Error, message));
    }
}

/// Receiving half: delivers queued alerts through a sink.
pub struct AlertForwarder<N> {
    rx: mpsc::Receiver<Alert>,
    sink: N,
    destination: Destination,
}

impl<N: NotificationSink> AlertForwarder<N> {
    /// Drain alerts until every publisher has been dropped.
    ///
    /// Returns the number of alerts delivered.
    pub async fn run(mut self) -> u64 {
        let mut delivered = 0u64;

        while let Some(alert) = self.rx.recv().await {
            let text = alert.render();
            let text = truncate_message(&text, TELEGRAM_MAX_MESSAGE_LEN);

            // Never re-published as an alert.
            match self.sink.send(&self.destination, text).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(sink = self.sink.name(), error = %e, "Failed to forward alert");
                }
            }
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use courier_common::error::DeliveryError;

    use super::*;

    #[derive(Default)]
    struct Collecting {
        texts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSink for Collecting {
        async fn send(&self, _destination: &Destination, text: &str) -> Result<(), DeliveryError> {
            self.texts.lock().unwrap().push(text.to_string());
            if self.fail {
                Err(DeliveryError::Transport("down".into()))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &'static str {
            "collecting"
        }
    }

    #[test]
    fn test_render_format() {
        let alert = Alert {
            level: AlertLevel::Error,
            message: "boom".into(),
            at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };
        assert_eq!(alert.render(), "2024-05-01 12:00:00,000 - ERROR - boom");
    }

    #[tokio::test]
    async fn test_forwarder_delivers_in_order() {
        let sink = Arc::new(Collecting::default());
        let (publisher, forwarder) = AlertPublisher::channel(sink.clone(), Destination::new("42"));

        publisher.warning("first");
        publisher.error("second");
        drop(publisher);

        assert_eq!(forwarder.run().await, 2);
        let texts = sink.texts.lock().unwrap();
        assert!(texts[0].ends_with("WARNING - first"));
        assert!(texts[1].ends_with("ERROR - second"));
    }

    #[tokio::test]
    async fn test_forwarder_truncates_long_alerts() {
        let sink = Arc::new(Collecting::default());
        let (publisher, forwarder) = AlertPublisher::channel(sink.clone(), Destination::new("42"));

        publisher.error("x".repeat(10_000));
        drop(publisher);
        forwarder.run().await;

        let texts = sink.texts.lock().unwrap();
        assert_eq!(texts[0].chars().count(), TELEGRAM_MAX_MESSAGE_LEN);
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest_alerts() {
        let sink = Arc::new(Collecting::default());
        let (publisher, forwarder) =
            AlertPublisher::with_capacity(sink.clone(), Destination::new("42"), 2);

        publisher.error("first");
        publisher.error("second");
        publisher.error("third");
        drop(publisher);

        assert_eq!(forwarder.run().await, 2);
        let texts = sink.texts.lock().unwrap();
        assert!(texts[0].ends_with("first"));
        assert!(texts[1].ends_with("second"));
    }

    #[tokio::test]
    async fn test_forwarder_survives_delivery_failure() {
        let sink = Arc::new(Collecting {
            fail: true,
            ..Default::default()
        });
        let (publisher, forwarder) = AlertPublisher::channel(sink.clone(), Destination::new("42"));

        publisher.error("a");
        publisher.error("b");
        drop(publisher);

        assert_eq!(forwarder.run().await, 0);
        assert_eq!(sink.texts.lock().unwrap().len(), 2);
    }
}
