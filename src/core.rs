//! Core domain types and service traits for eventnotify
//!
//! This module defines the fundamental data structures and the narrow
//! capability traits the dispatcher depends on. Concrete adapters for the
//! traits live in `transport`; test fakes live in `test_utils`.

use crate::errors::ChannelError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A delivery channel.
///
/// The declaration order is the fixed invocation order of the dispatcher:
/// the log store always runs first so the event is recorded even if a later
/// channel fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "db", alias = "log")]
    Log,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "im")]
    Im,
    #[serde(rename = "sms")]
    Sms,
}

impl Channel {
    /// All channels, in invocation order.
    pub const ALL: [Channel; 4] = [Channel::Log, Channel::Email, Channel::Im, Channel::Sms];

    /// The name used for this channel in configuration and as a direct severity level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Log => "db",
            Channel::Email => "email",
            Channel::Im => "im",
            Channel::Sms => "sms",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "db" | "log" => Ok(Channel::Log),
            "email" => Ok(Channel::Email),
            "im" => Ok(Channel::Im),
            "sms" => Ok(Channel::Sms),
            other => Err(format!("unknown channel '{}'", other)),
        }
    }
}

/// A set of channels. Iteration always follows the invocation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelSet(BTreeSet<Channel>);

impl ChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.0.contains(&channel)
    }

    pub fn insert(&mut self, channel: Channel) {
        self.0.insert(channel);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Channel> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Channel> for ChannelSet {
    fn from_iter<I: IntoIterator<Item = Channel>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Channel; N]> for ChannelSet {
    fn from(channels: [Channel; N]) -> Self {
        channels.into_iter().collect()
    }
}

/// Caller-supplied key/value pairs describing an event.
///
/// Insertion order is kept so every channel renders the pairs the same way.
/// Inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detail(Vec<(String, String)>);

impl Detail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Detail {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut detail = Detail::new();
        for (k, v) in iter {
            detail.insert(k, v);
        }
        detail
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Detail {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// An immutable event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    name: String,
    detail: Detail,
}

impl Event {
    pub fn new(name: impl Into<String>, detail: Detail) -> Self {
        Self {
            name: name.into(),
            detail,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn detail(&self) -> &Detail {
        &self.detail
    }
}

/// Everything a channel needs to deliver one event.
#[derive(Debug, Clone)]
pub struct Notification {
    /// The normalised severity level the caller dispatched with.
    pub level: String,
    pub event: Event,
    /// When the dispatch happened; rendered into message bodies and stored by the log.
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: impl Into<String>, event: Event) -> Self {
        Self {
            level: level.into(),
            event,
            timestamp: Utc::now(),
        }
    }

    /// Pins the timestamp, for deterministic rendering.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

// =============================================================================
// Delivery results
// =============================================================================

/// The outcome of one delivery step (a whole channel or one of its recipients).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    /// Short human-readable description, e.g. "Mail to a@example.com".
    pub message: String,
    /// The cause of a failure; `None` on success.
    pub error: Option<ChannelError>,
}

impl Outcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>, error: ChannelError) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error),
        }
    }

    /// Renders the outcome as one summary line.
    pub fn render(&self) -> String {
        if self.success {
            format!("Success: {}", self.message)
        } else {
            format!("Error: {}", self.message)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeliveryStatus {
    /// Every step succeeded.
    Success,
    /// Some steps succeeded, some failed.
    Partial,
    /// Nothing was delivered.
    Failure,
}

/// The aggregated outcome of one channel for a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    pub channel: Channel,
    pub status: DeliveryStatus,
    pub outcomes: Vec<Outcome>,
}

impl DeliveryResult {
    /// Derives the channel status from its outcomes. A channel with no
    /// outcomes at all counts as a failure.
    pub fn from_outcomes(channel: Channel, outcomes: Vec<Outcome>) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.success).count();
        let status = if outcomes.is_empty() || succeeded == 0 {
            DeliveryStatus::Failure
        } else if succeeded == outcomes.len() {
            DeliveryStatus::Success
        } else {
            DeliveryStatus::Partial
        };
        Self {
            channel,
            status,
            outcomes,
        }
    }

    /// A channel-level failure with a single outcome.
    pub fn failed(channel: Channel, message: impl Into<String>, error: ChannelError) -> Self {
        Self::from_outcomes(channel, vec![Outcome::failure(message, error)])
    }

    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Success
    }

    /// The outcome messages joined on one line.
    pub fn message(&self) -> String {
        self.outcomes
            .iter()
            .map(Outcome::render)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// One flat entry per channel, for programmatic consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseEntry {
    pub channel: Channel,
    pub success: bool,
    pub message: String,
}

/// The result of one `Dispatcher::send` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub level: String,
    pub event_name: String,
    /// One result per channel, in invocation order.
    pub results: Vec<DeliveryResult>,
}

impl Response {
    /// The multi-line human-readable summary, one line per outcome.
    pub fn summary_text(&self) -> String {
        let mut text = String::new();
        for outcome in self.results.iter().flat_map(|r| r.outcomes.iter()) {
            text.push_str(&outcome.render());
            text.push('\n');
        }
        text
    }

    pub fn entries(&self) -> Vec<ResponseEntry> {
        self.results
            .iter()
            .map(|r| ResponseEntry {
                channel: r.channel,
                success: r.is_success(),
                message: r.message(),
            })
            .collect()
    }

    pub fn result_for(&self, channel: Channel) -> Option<&DeliveryResult> {
        self.results.iter().find(|r| r.channel == channel)
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(DeliveryResult::is_success)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary_text())
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Durable storage for the event log.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Writes the parent event row and returns its generated identifier.
    async fn insert_event(&self, level: &str, event: &str, at: DateTime<Utc>) -> Result<i64>;

    /// Writes one detail row linked to a previously written event.
    async fn insert_detail(&self, event_id: i64, key: &str, value: &str) -> Result<()>;
}

/// A single outgoing mail, addressed to one or more recipients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Sends mail through some transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers one message to all of its recipients in a single transport call.
    ///
    /// # Returns
    /// * `Ok(())` if the transport accepted the message
    /// * `Err` for authentication, network or relay errors
    async fn send(&self, message: &MailMessage) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    Offline,
}

/// An instant-messaging account.
#[async_trait]
pub trait ImClient: Send + Sync {
    /// Returns the contacts in the account's roster.
    async fn roster(&self) -> Result<Vec<String>>;

    /// Checks the live presence of one contact.
    async fn presence(&self, contact: &str) -> Result<Presence>;

    /// Sends a message to one contact.
    async fn send_message(&self, contact: &str, body: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_set_iterates_in_invocation_order() {
        let set = ChannelSet::from([Channel::Sms, Channel::Im, Channel::Log, Channel::Email]);
        let order: Vec<_> = set.iter().collect();
        assert_eq!(order, Channel::ALL.to_vec());
    }

    #[test]
    fn test_channel_from_str_accepts_log_alias() {
        assert_eq!("db".parse::<Channel>(), Ok(Channel::Log));
        assert_eq!("LOG".parse::<Channel>(), Ok(Channel::Log));
        assert!("pager".parse::<Channel>().is_err());
    }

    #[test]
    fn test_detail_keeps_insertion_order_and_replaces_in_place() {
        let mut detail = Detail::from([("Status", "Down"), ("Name", "Webserver 1")]);
        detail.insert("Status", "Up");
        detail.insert("Contact", "Sysadmin");

        let keys: Vec<_> = detail.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Status", "Name", "Contact"]);
        assert_eq!(detail.get("Status"), Some("Up"));
    }

    #[test]
    fn test_delivery_status_from_outcomes() {
        let ok = Outcome::success("Mail to a@example.com");
        let bad = Outcome::failure(
            "Email failed for x (address not valid)",
            ChannelError::InvalidAddress("x".into()),
        );

        let all_ok = DeliveryResult::from_outcomes(Channel::Email, vec![ok.clone()]);
        assert_eq!(all_ok.status, DeliveryStatus::Success);

        let mixed = DeliveryResult::from_outcomes(Channel::Email, vec![bad.clone(), ok]);
        assert_eq!(mixed.status, DeliveryStatus::Partial);

        let none = DeliveryResult::from_outcomes(Channel::Email, vec![bad]);
        assert_eq!(none.status, DeliveryStatus::Failure);

        let empty = DeliveryResult::from_outcomes(Channel::Email, vec![]);
        assert_eq!(empty.status, DeliveryStatus::Failure);
    }

    #[test]
    fn test_response_summary_text() {
        let response = Response {
            level: "low".into(),
            event_name: "Event #123".into(),
            results: vec![
                DeliveryResult::from_outcomes(
                    Channel::Log,
                    vec![
                        Outcome::success("DB Write"),
                        Outcome::success("DB Write event args"),
                    ],
                ),
                DeliveryResult::failed(
                    Channel::Email,
                    "Email failed to send (relay refused)",
                    ChannelError::Transport("relay refused".into()),
                ),
            ],
        };

        assert_eq!(
            response.summary_text(),
            "Success: DB Write\nSuccess: DB Write event args\nError: Email failed to send (relay refused)\n"
        );

        let entries = response.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].success);
        assert!(!entries[1].success);
        assert!(!response.all_succeeded());
    }
}
