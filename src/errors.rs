//! Error taxonomy for the dispatcher.
//!
//! `ConfigError` is the only error that escapes `Dispatcher::send`. Everything
//! that goes wrong inside a single channel is a `ChannelError`, which is
//! captured in that channel's `DeliveryResult` and never propagated further.

use crate::core::Channel;
use thiserror::Error;

/// A configuration problem that makes a dispatch (or construction) impossible.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown severity level '{0}'")]
    UnknownSeverity(String),

    #[error("invalid severity policy: {0}")]
    InvalidPolicy(String),

    #[error("{channel} channel is not usable: {reason}")]
    MissingChannelConfig { channel: Channel, reason: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("severity level '{level}' resolved to no configured channel")]
    NoUsableChannels { level: String },

    #[error("no delivery channel is configured")]
    NoChannelsConfigured,
}

/// A failed delivery within one channel, or one recipient of a channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("address not valid")]
    InvalidAddress(String),

    #[error("user not in roster")]
    NotInRoster(String),

    #[error("user offline")]
    Offline(String),

    #[error("{carrier} not supported")]
    CarrierNotSupported { number: String, carrier: String },

    #[error("no valid recipients")]
    NoRecipients,

    #[error("timed out after {seconds}s")]
    Timeout { target: String, seconds: u64 },

    #[error("roster unavailable: {0}")]
    RosterUnavailable(String),

    #[error("{0}")]
    Transport(String),

    #[error("event row not written: {0}")]
    EventWrite(String),

    #[error("event row written, {written} detail rows written, {failed} failed: {reason}")]
    PartialWrite {
        written: usize,
        failed: usize,
        reason: String,
    },

    #[error("channel task aborted: {0}")]
    Aborted(String),
}

impl ChannelError {
    /// Builds a transport error that keeps the full cause chain of an adapter error.
    pub fn transport(err: &anyhow::Error) -> Self {
        Self::Transport(format!("{:#}", err))
    }
}
