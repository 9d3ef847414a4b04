//! In-memory fakes for the channel transports.
//!
//! Compiled for unit tests and, through the `test-utils` feature, for the
//! integration tests under `tests/`.

use crate::core::{EventStore, ImClient, MailMessage, Mailer, Presence};
use crate::monitor::Pinger;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An event row as written to a `FakeEventStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub id: i64,
    pub level: String,
    pub name: String,
    pub at: DateTime<Utc>,
}

/// A detail row as written to a `FakeEventStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDetail {
    pub event_id: i64,
    pub key: String,
    pub value: String,
}

/// Fake event store that keeps rows in memory
#[derive(Default)]
pub struct FakeEventStore {
    events: Arc<Mutex<Vec<StoredEvent>>>,
    details: Arc<Mutex<Vec<StoredDetail>>>,
    fail_events: Arc<Mutex<bool>>,
    failing_keys: Arc<Mutex<HashSet<String>>>,
}

impl FakeEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every event insert fail
    pub fn fail_events(&self, fail: bool) {
        *self.fail_events.lock().unwrap() = fail;
    }

    /// Make detail inserts for the given key fail
    pub fn fail_detail_key(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn events(&self) -> Vec<StoredEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn details(&self) -> Vec<StoredDetail> {
        self.details.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventStore for FakeEventStore {
    async fn insert_event(&self, level: &str, event: &str, at: DateTime<Utc>) -> Result<i64> {
        if *self.fail_events.lock().unwrap() {
            bail!("simulated event write failure");
        }
        let mut events = self.events.lock().unwrap();
        let id = events.len() as i64 + 1;
        events.push(StoredEvent {
            id,
            level: level.to_string(),
            name: event.to_string(),
            at,
        });
        Ok(id)
    }

    async fn insert_detail(&self, event_id: i64, key: &str, value: &str) -> Result<()> {
        if self.failing_keys.lock().unwrap().contains(key) {
            bail!("simulated detail write failure");
        }
        self.details.lock().unwrap().push(StoredDetail {
            event_id,
            key: key.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }
}

/// Fake mailer that records every message it accepts
#[derive(Default)]
pub struct FakeMailer {
    sent: Arc<Mutex<Vec<MailMessage>>>,
    attempts: Arc<Mutex<usize>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl FakeMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send fail with the given error message
    pub fn fail_with(&self, error: &str) {
        *self.failure.lock().unwrap() = Some(error.to_string());
    }

    /// Messages accepted so far
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of send calls, including failed ones
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, message: &MailMessage) -> Result<()> {
        *self.attempts.lock().unwrap() += 1;
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(anyhow!(error));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Fake IM account with a scripted roster.
///
/// Contacts are matched case-insensitively, the way IM servers compare bare
/// addresses.
#[derive(Default)]
pub struct FakeImClient {
    // Original spelling, as returned by `roster()`.
    contacts: Arc<Mutex<Vec<String>>>,
    presence: Arc<Mutex<HashMap<String, Presence>>>,
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    presence_checks: Arc<Mutex<HashMap<String, usize>>>,
    sent: Arc<Mutex<Vec<(String, String)>>>,
    fail_roster: Arc<Mutex<bool>>,
}

impl FakeImClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contact(&self, contact: &str, presence: Presence) {
        self.contacts.lock().unwrap().push(contact.to_string());
        self.presence
            .lock()
            .unwrap()
            .insert(contact.to_lowercase(), presence);
    }

    /// Make presence checks for a contact take this long
    pub fn delay_presence(&self, contact: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(contact.to_lowercase(), delay);
    }

    pub fn fail_roster(&self, fail: bool) {
        *self.fail_roster.lock().unwrap() = fail;
    }

    /// Number of presence checks made for a contact
    pub fn presence_checks(&self, contact: &str) -> usize {
        self.presence_checks
            .lock()
            .unwrap()
            .get(&contact.to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    /// `(contact, body)` pairs sent so far
    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImClient for FakeImClient {
    async fn roster(&self) -> Result<Vec<String>> {
        if *self.fail_roster.lock().unwrap() {
            bail!("simulated roster failure");
        }
        Ok(self.contacts.lock().unwrap().clone())
    }

    async fn presence(&self, contact: &str) -> Result<Presence> {
        let key = contact.to_lowercase();
        *self
            .presence_checks
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_insert(0) += 1;

        let delay = self.delays.lock().unwrap().get(&key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.presence
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .ok_or_else(|| anyhow!("unknown contact {}", contact))
    }

    async fn send_message(&self, contact: &str, body: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((contact.to_string(), body.to_string()));
        Ok(())
    }
}

/// Fake pinger. Addresses not marked reachable do not reply.
#[derive(Default)]
pub struct FakePinger {
    reachable: Arc<Mutex<HashSet<String>>>,
    broken: Arc<Mutex<bool>>,
    pings: Arc<Mutex<Vec<String>>>,
}

impl FakePinger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reachable(&self, address: &str, reachable: bool) {
        let mut set = self.reachable.lock().unwrap();
        if reachable {
            set.insert(address.to_string());
        } else {
            set.remove(address);
        }
    }

    /// Make the ping check itself fail, as if the `ping` binary were missing
    pub fn fail_all(&self, fail: bool) {
        *self.broken.lock().unwrap() = fail;
    }

    /// Addresses pinged so far, in order
    pub fn pings(&self) -> Vec<String> {
        self.pings.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pinger for FakePinger {
    async fn ping(&self, address: &str) -> Result<bool> {
        self.pings.lock().unwrap().push(address.to_string());
        if *self.broken.lock().unwrap() {
            bail!("ping: command not found");
        }
        Ok(self.reachable.lock().unwrap().contains(address))
    }
}
