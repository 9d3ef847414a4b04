//! Delivery channels.
//!
//! Each channel turns a `Notification` into a `DeliveryResult` and never
//! returns an error: every failure inside a channel is captured as a failed
//! `Outcome`. The dispatcher talks to channels only through `Notifier`.

pub mod email;
pub mod im;
pub mod log;
pub mod sms;

pub use email::EmailChannel;
pub use im::ImChannel;
pub use log::LogChannel;
pub use sms::{CarrierGateways, SmsChannel, SmsRecipient};

use crate::core::{Channel, DeliveryResult, Notification};
use async_trait::async_trait;

/// A configured delivery channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Which channel this is. Used for ordering, logging and metrics.
    fn channel(&self) -> Channel;

    /// Delivers the notification and reports the outcome.
    async fn deliver(&self, notification: &Notification) -> DeliveryResult;
}
