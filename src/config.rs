//! Configuration management for eventnotify
//!
//! This module defines the main `Config` struct and its sub-structs. It uses
//! the `figment` crate to layer defaults, an `eventnotify.toml` file,
//! `EVENTNOTIFY_` environment variables and command-line overrides. The
//! resulting `Config` is immutable: the dispatcher and monitor are built from
//! it once and never consult it again.

use crate::channels::sms::SmsRecipient;
use crate::cli::Cli;
use crate::core::Channel;
use crate::monitor::Host;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The config file read when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "eventnotify.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Extra or redefined severity levels.
    pub severity: SeverityConfig,
    /// The persistent event log.
    pub log: LogConfig,
    /// The mail transport shared by the email and SMS channels.
    pub mail: Option<MailTransportConfig>,
    pub email: EmailConfig,
    pub im: Option<ImConfig>,
    pub sms: SmsConfig,
    pub monitor: MonitorConfig,
}

/// Severity levels on top of the built-in ones, e.g. `page = ["db", "sms"]`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct SeverityConfig {
    #[serde(default)]
    pub levels: BTreeMap<String, Vec<Channel>>,
}

/// Configuration for the SQLite event log.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LogConfig {
    pub enabled: bool,
    /// Path to the SQLite database file.
    pub database_path: PathBuf,
    /// Table holding one row per event.
    pub events_table: String,
    /// Table holding one row per event detail pair.
    pub details_table: String,
    /// How long a write waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

/// Configuration for the HTTP mail relay.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MailTransportConfig {
    /// The relay endpoint messages are posted to.
    pub endpoint: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// The envelope sender address.
    pub sender: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default = "default_mail_timeout")]
    pub timeout_seconds: u64,
}

fn default_mail_timeout() -> u64 {
    10
}

/// Configuration for the email channel.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmailConfig {
    pub enabled: bool,
    pub recipients: Vec<String>,
    /// Prepended to the event name to form the subject line.
    pub subject_prefix: String,
}

/// Configuration for the instant-messaging channel.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ImConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Base URL of the chat gateway.
    pub endpoint: String,
    /// The account messages are sent from.
    pub account: String,
    #[serde(default)]
    pub password: Option<String>,
    pub recipients: Vec<String>,
    /// Upper bound for the presence check and send of a single recipient.
    #[serde(default = "default_im_timeout")]
    pub recipient_timeout_seconds: u64,
    /// Upper bound for fetching the roster.
    #[serde(default = "default_im_timeout")]
    pub roster_timeout_seconds: u64,
}

fn default_true() -> bool {
    true
}

fn default_im_timeout() -> u64 {
    5
}

/// Configuration for the SMS-over-email channel.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SmsConfig {
    pub enabled: bool,
    /// Entries of the form `number:carrier`, e.g. `5045551234:ATT`.
    pub numbers: Vec<SmsRecipient>,
    /// Extra or replacement carrier gateways, e.g. `Cricket = "@sms.cricketwireless.net"`.
    #[serde(default)]
    pub carriers: BTreeMap<String, String>,
}

/// Configuration for the host monitor.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MonitorConfig {
    /// The severity level used when a host is down.
    pub level: String,
    /// Seconds between polling rounds.
    pub interval_seconds: u64,
    /// Echo requests sent per ping check.
    pub ping_count: u32,
    /// Seconds to wait for each echo reply.
    pub ping_timeout_seconds: u64,
    /// Seconds to wait for the HTTP check.
    pub http_timeout_seconds: u64,
    pub hosts: Vec<Host>,
}

impl Config {
    /// Loads the application configuration.
    ///
    /// Sources are layered, later ones winning: built-in defaults, the TOML
    /// file named by `--config` (or `eventnotify.toml`), environment variables
    /// such as `EVENTNOTIFY_LOG_LEVEL` or `EVENTNOTIFY_MONITOR__LEVEL`, and the
    /// command-line overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("EVENTNOTIFY_").split("__"))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            severity: SeverityConfig::default(),
            log: LogConfig {
                enabled: true,
                database_path: PathBuf::from("eventnotify.db"),
                events_table: "events".to_string(),
                details_table: "event_details".to_string(),
                busy_timeout_ms: 5000,
            },
            mail: None,
            email: EmailConfig {
                enabled: false,
                recipients: vec![],
                subject_prefix: "[Event]".to_string(),
            },
            im: None,
            sms: SmsConfig {
                enabled: false,
                numbers: vec![],
                carriers: BTreeMap::new(),
            },
            monitor: MonitorConfig {
                level: "info".to_string(),
                interval_seconds: 300,
                ping_count: 4,
                ping_timeout_seconds: 3,
                http_timeout_seconds: 10,
                hosts: vec![],
            },
        }
    }
}
