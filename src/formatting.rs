// src/formatting.rs

use crate::core::Notification;

/// A trait for rendering a notification into a channel's message text.
pub trait TextFormatter: Send + Sync {
    fn format(&self, notification: &Notification) -> String;
}

/// Plain-text mail body: a header line with the time of the event, then one
/// paragraph per detail pair.
pub struct EmailFormatter;

impl EmailFormatter {
    /// The subject line, `<prefix> <event name>`.
    pub fn subject(&self, prefix: &str, notification: &Notification) -> String {
        let name = notification.event.name();
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{} {}", prefix, name)
        }
    }
}

impl TextFormatter for EmailFormatter {
    fn format(&self, notification: &Notification) -> String {
        let mut body = format!(
            "Event: {} occurred on {}\n\n",
            notification.event.name(),
            notification.timestamp.to_rfc2822()
        );
        for (key, value) in notification.event.detail().iter() {
            body.push_str(&format!("{}: {}\n\n", key, value));
        }
        body
    }
}

/// Chat message: the event name in bold, then one line per detail pair.
pub struct ImFormatter;

impl TextFormatter for ImFormatter {
    fn format(&self, notification: &Notification) -> String {
        let mut lines = vec![format!("*{}*", notification.event.name())];
        lines.extend(detail_lines(notification));
        lines.join("\n")
    }
}

/// Text message: kept short since carrier gateways truncate long bodies.
pub struct SmsFormatter;

impl TextFormatter for SmsFormatter {
    fn format(&self, notification: &Notification) -> String {
        format!(
            "{}\n\n{}",
            notification.event.name(),
            detail_lines(notification).join("\n")
        )
    }
}

fn detail_lines(notification: &Notification) -> Vec<String> {
    notification
        .event
        .detail()
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect()
}
