//! The SMS channel, delivered through carrier email-to-text gateways.
//!
//! Each configured `number:carrier` pair is turned into an address such as
//! `5045551234@txt.att.net` and the whole batch goes out as one mail through
//! the shared mail transport.

use crate::channels::email::send_mail;
use crate::channels::Notifier;
use crate::core::{Channel, DeliveryResult, MailMessage, Mailer, Notification, Outcome};
use crate::errors::ChannelError;
use crate::formatting::{SmsFormatter, TextFormatter};
use async_trait::async_trait;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{instrument, warn};

/// A phone number and the carrier that serves it.
#[derive(Debug, Clone, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub struct SmsRecipient {
    pub number: String,
    /// Carrier tag as configured, e.g. `ATT`. Empty when none was given.
    pub carrier: String,
}

impl FromStr for SmsRecipient {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, carrier) = s.split_once(':').unwrap_or((s, ""));
        let number = number.trim();
        if number.is_empty() {
            return Err(format!("'{}' has no phone number", s));
        }
        Ok(Self {
            number: number.to_string(),
            carrier: carrier.trim().to_string(),
        })
    }
}

impl fmt::Display for SmsRecipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.carrier.is_empty() {
            f.write_str(&self.number)
        } else {
            write!(f, "{}:{}", self.number, self.carrier)
        }
    }
}

/// Carrier tag to gateway domain. Tags match case-insensitively.
#[derive(Debug, Clone, PartialEq)]
pub struct CarrierGateways(BTreeMap<String, String>);

impl CarrierGateways {
    /// The built-in table with configured entries added or replaced.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Self {
        let mut gateways = Self::default();
        for (carrier, domain) in overrides {
            gateways.insert(carrier, domain);
        }
        gateways
    }

    pub fn insert(&mut self, carrier: &str, domain: &str) {
        let domain = domain.trim();
        let domain = domain.strip_prefix('@').unwrap_or(domain);
        self.0
            .insert(carrier.trim().to_lowercase(), format!("@{}", domain));
    }

    /// The gateway address for a recipient, if its carrier is known.
    pub fn address_for(&self, recipient: &SmsRecipient) -> Option<String> {
        self.0
            .get(&recipient.carrier.to_lowercase())
            .map(|domain| format!("{}{}", recipient.number, domain))
    }
}

impl Default for CarrierGateways {
    fn default() -> Self {
        let mut gateways = Self(BTreeMap::new());
        gateways.insert("ATT", "@txt.att.net");
        gateways.insert("Verizon", "@vtext.com");
        gateways.insert("TMobile", "@tmomail.net");
        gateways.insert("Sprint", "@messaging.sprintpcs.com");
        gateways
    }
}

pub struct SmsChannel {
    mailer: Arc<dyn Mailer>,
    numbers: Vec<SmsRecipient>,
    gateways: CarrierGateways,
}

impl SmsChannel {
    pub fn new(mailer: Arc<dyn Mailer>, numbers: Vec<SmsRecipient>, gateways: CarrierGateways) -> Self {
        Self {
            mailer,
            numbers,
            gateways,
        }
    }

    /// Texts every number whose carrier has a known gateway.
    ///
    /// Numbers with an unknown carrier are reported individually and dropped
    /// from the batch; the remaining numbers are still sent.
    #[instrument(skip_all, fields(event = %notification.event.name(), numbers = self.numbers.len()))]
    pub async fn send_sms(&self, notification: &Notification) -> DeliveryResult {
        let mut outcomes = Vec::new();
        let mut to = Vec::new();
        for recipient in &self.numbers {
            match self.gateways.address_for(recipient) {
                Some(address) => to.push(address),
                None => {
                    let carrier = if recipient.carrier.is_empty() {
                        "carrier"
                    } else {
                        recipient.carrier.as_str()
                    };
                    warn!(number = %recipient.number, carrier, "Carrier not supported");
                    outcomes.push(Outcome::failure(
                        format!("SMS to {} failed ({} not supported)", recipient.number, carrier),
                        ChannelError::CarrierNotSupported {
                            number: recipient.number.clone(),
                            carrier: carrier.to_string(),
                        },
                    ));
                }
            }
        }

        let message = MailMessage {
            to,
            subject: String::new(),
            body: SmsFormatter.format(notification),
        };
        outcomes.push(send_mail(self.mailer.as_ref(), &message).await);
        DeliveryResult::from_outcomes(Channel::Sms, outcomes)
    }
}

#[async_trait]
impl Notifier for SmsChannel {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn deliver(&self, notification: &Notification) -> DeliveryResult {
        self.send_sms(notification).await
    }
}
