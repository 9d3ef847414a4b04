//! The instant-messaging channel.
//!
//! The roster is fetched once per delivery. Recipients are then handled in
//! parallel, each bounded by its own timeout, and the outcomes are reported
//! in the order the recipients are configured.

use crate::channels::Notifier;
use crate::core::{Channel, DeliveryResult, ImClient, Notification, Outcome, Presence};
use crate::errors::ChannelError;
use crate::formatting::{ImFormatter, TextFormatter};
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, instrument, warn};

pub struct ImChannel {
    client: Arc<dyn ImClient>,
    recipients: Vec<String>,
    recipient_timeout: Duration,
    roster_timeout: Duration,
}

impl ImChannel {
    pub fn new(
        client: Arc<dyn ImClient>,
        recipients: Vec<String>,
        recipient_timeout: Duration,
        roster_timeout: Duration,
    ) -> Self {
        Self {
            client,
            recipients,
            recipient_timeout,
            roster_timeout,
        }
    }

    /// Messages every configured recipient that is in the roster and online.
    #[instrument(skip_all, fields(event = %notification.event.name(), recipients = self.recipients.len()))]
    pub async fn send_im(&self, notification: &Notification) -> DeliveryResult {
        if self.recipients.is_empty() {
            warn!("No IM recipients configured");
            return DeliveryResult::failed(
                Channel::Im,
                "IM not sent (no recipients)",
                ChannelError::NoRecipients,
            );
        }

        let roster = match timeout(self.roster_timeout, self.client.roster()).await {
            Ok(Ok(contacts)) => contacts
                .iter()
                .map(|c| normalize_contact(c))
                .collect::<HashSet<_>>(),
            Ok(Err(e)) => {
                error!(error = %e, "Failed to fetch IM roster");
                return DeliveryResult::failed(
                    Channel::Im,
                    format!("IM roster unavailable ({:#})", e),
                    ChannelError::RosterUnavailable(format!("{:#}", e)),
                );
            }
            Err(_) => {
                error!("Timed out fetching IM roster");
                return DeliveryResult::failed(
                    Channel::Im,
                    format!(
                        "IM roster unavailable (timed out after {}s)",
                        self.roster_timeout.as_secs()
                    ),
                    ChannelError::Timeout {
                        target: "roster".into(),
                        seconds: self.roster_timeout.as_secs(),
                    },
                );
            }
        };
        debug!(contacts = roster.len(), "Roster fetched");

        let message = ImFormatter.format(notification);
        let outcomes = join_all(
            self.recipients
                .iter()
                .map(|contact| self.deliver_to(contact, &roster, &message)),
        )
        .await;
        DeliveryResult::from_outcomes(Channel::Im, outcomes)
    }

    async fn deliver_to(&self, contact: &str, roster: &HashSet<String>, message: &str) -> Outcome {
        if !roster.contains(&normalize_contact(contact)) {
            warn!(contact, "IM recipient not in roster");
            return Outcome::failure(
                format!("IM to {} (user not in roster)", contact),
                ChannelError::NotInRoster(contact.to_string()),
            );
        }

        match timeout(self.recipient_timeout, self.presence_then_send(contact, message)).await {
            Ok(Ok(Presence::Online)) => Outcome::success(format!("IM to {}", contact)),
            Ok(Ok(Presence::Offline)) => {
                debug!(contact, "IM recipient offline");
                Outcome::failure(
                    format!("IM to {} (user offline)", contact),
                    ChannelError::Offline(contact.to_string()),
                )
            }
            Ok(Err(e)) => {
                error!(contact, error = %e, "IM delivery failed");
                Outcome::failure(
                    format!("IM to {} ({:#})", contact, e),
                    ChannelError::transport(&e),
                )
            }
            Err(_) => {
                warn!(contact, "IM delivery timed out");
                Outcome::failure(
                    format!(
                        "IM to {} (timed out after {}s)",
                        contact,
                        self.recipient_timeout.as_secs()
                    ),
                    ChannelError::Timeout {
                        target: contact.to_string(),
                        seconds: self.recipient_timeout.as_secs(),
                    },
                )
            }
        }
    }

    /// Only messages an online contact; returns the presence that was observed.
    async fn presence_then_send(&self, contact: &str, message: &str) -> Result<Presence> {
        let presence = self.client.presence(contact).await?;
        if presence == Presence::Online {
            self.client.send_message(contact, message).await?;
        }
        Ok(presence)
    }
}

#[async_trait]
impl Notifier for ImChannel {
    fn channel(&self) -> Channel {
        Channel::Im
    }

    async fn deliver(&self, notification: &Notification) -> DeliveryResult {
        self.send_im(notification).await
    }
}

/// Chat addresses compare case-insensitively.
fn normalize_contact(contact: &str) -> String {
    contact.trim().to_lowercase()
}
