//! Notification side of the courier: message texts, delivery and alert
//! forwarding.

pub mod alerts;
pub mod formatter;
pub mod sink;

pub use alerts::{Alert, AlertForwarder, AlertLevel, AlertPublisher};
pub use formatter::format_review;
pub use sink::{NotificationSink, TelegramSink};
