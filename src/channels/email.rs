//! The email channel.

use crate::channels::Notifier;
use crate::core::{Channel, DeliveryResult, MailMessage, Mailer, Notification, Outcome};
use crate::errors::ChannelError;
use crate::formatting::{EmailFormatter, TextFormatter};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{error, info, instrument, warn};

static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("address pattern is valid")
});

/// Checks that an address is a well-formed `local@domain.tld`.
pub fn is_valid_address(address: &str) -> bool {
    address.len() <= 254 && ADDRESS_PATTERN.is_match(address)
}

pub struct EmailChannel {
    mailer: Arc<dyn Mailer>,
    recipients: Vec<String>,
    subject_prefix: String,
}

impl EmailChannel {
    pub fn new(mailer: Arc<dyn Mailer>, recipients: Vec<String>, subject_prefix: String) -> Self {
        Self {
            mailer,
            recipients,
            subject_prefix,
        }
    }

    /// Mails the event to every well-formed recipient in one transport call.
    ///
    /// Malformed addresses are reported one by one and left out of the send.
    #[instrument(skip_all, fields(event = %notification.event.name()))]
    pub async fn send_email(&self, notification: &Notification) -> DeliveryResult {
        let mut outcomes = Vec::new();
        let mut to = Vec::new();
        for address in &self.recipients {
            if is_valid_address(address) {
                to.push(address.clone());
            } else {
                warn!(address = %address, "Skipping malformed email address");
                outcomes.push(Outcome::failure(
                    format!("Email failed for {} (address not valid)", address),
                    ChannelError::InvalidAddress(address.clone()),
                ));
            }
        }

        let message = MailMessage {
            to,
            subject: EmailFormatter.subject(&self.subject_prefix, notification),
            body: EmailFormatter.format(notification),
        };
        outcomes.push(send_mail(self.mailer.as_ref(), &message).await);
        DeliveryResult::from_outcomes(Channel::Email, outcomes)
    }
}

#[async_trait]
impl Notifier for EmailChannel {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn deliver(&self, notification: &Notification) -> DeliveryResult {
        self.send_email(notification).await
    }
}

/// Sends one message to all of its recipients. The whole send succeeds or
/// fails as a unit; a message without recipients is never handed to the
/// transport.
pub(crate) async fn send_mail(mailer: &dyn Mailer, message: &MailMessage) -> Outcome {
    if message.to.is_empty() {
        warn!("No valid recipients, mail not sent");
        return Outcome::failure(
            "Email not sent (no valid recipients)",
            ChannelError::NoRecipients,
        );
    }

    match mailer.send(message).await {
        Ok(()) => {
            info!(recipients = message.to.len(), "Mail sent");
            Outcome::success(format!("Mail to {}", message.to.join(",")))
        }
        Err(e) => {
            error!(error = %e, "Mail transport failed");
            Outcome::failure(
                format!("Email failed to send ({:#})", e),
                ChannelError::transport(&e),
            )
        }
    }
}
