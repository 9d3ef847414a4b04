//! Wiring of the real transports into a `Dispatcher` and a `Monitor`.

use crate::{
    channels::{CarrierGateways, EmailChannel, ImChannel, SmsChannel},
    config::Config,
    core::{Channel, Mailer},
    dispatcher::Dispatcher,
    errors::ConfigError,
    monitor::{Monitor, ReqwestProbe, SystemPinger},
    severity::SeverityPolicy,
    transport::{HttpImGateway, HttpMailer, SqliteEventStore},
};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builds a dispatcher with every channel the configuration enables.
///
/// An enabled channel that is missing something it needs is an error here
/// rather than a failure on every later dispatch.
pub async fn build_dispatcher(config: &Config) -> Result<Dispatcher> {
    let policy = SeverityPolicy::with_overrides(&config.severity.levels)?;
    let mut builder = Dispatcher::builder().policy(policy);

    if config.log.enabled {
        let store = SqliteEventStore::new(&config.log)?;
        store.ensure_schema().await?;
        info!(path = %config.log.database_path.display(), "Event log enabled");
        builder = builder.log_store(Arc::new(store));
    }

    let mailer: Option<Arc<dyn Mailer>> = match &config.mail {
        Some(mail) => {
            let mailer: Arc<dyn Mailer> = Arc::new(HttpMailer::new(mail)?);
            Some(mailer)
        }
        None => None,
    };

    if config.email.enabled {
        let mailer = mailer
            .clone()
            .ok_or_else(|| missing(Channel::Email, "no [mail] transport configured"))?;
        if config.email.recipients.is_empty() {
            return Err(missing(Channel::Email, "no recipients").into());
        }
        info!(recipients = config.email.recipients.len(), "Email channel enabled");
        builder = builder.notifier(Arc::new(EmailChannel::new(
            mailer,
            config.email.recipients.clone(),
            config.email.subject_prefix.clone(),
        )));
    }

    if let Some(im) = config.im.as_ref().filter(|im| im.enabled) {
        if im.recipients.is_empty() {
            return Err(missing(Channel::Im, "no recipients").into());
        }
        for (field, seconds) in [
            ("im.recipient_timeout_seconds", im.recipient_timeout_seconds),
            ("im.roster_timeout_seconds", im.roster_timeout_seconds),
        ] {
            if seconds == 0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be at least 1 second".into(),
                }
                .into());
            }
        }
        info!(account = %im.account, recipients = im.recipients.len(), "IM channel enabled");
        builder = builder.notifier(Arc::new(ImChannel::new(
            Arc::new(HttpImGateway::new(im)?),
            im.recipients.clone(),
            Duration::from_secs(im.recipient_timeout_seconds),
            Duration::from_secs(im.roster_timeout_seconds),
        )));
    }

    if config.sms.enabled {
        let mailer = mailer.ok_or_else(|| missing(Channel::Sms, "no [mail] transport configured"))?;
        if config.sms.numbers.is_empty() {
            return Err(missing(Channel::Sms, "no numbers").into());
        }
        info!(numbers = config.sms.numbers.len(), "SMS channel enabled");
        builder = builder.notifier(Arc::new(SmsChannel::new(
            mailer,
            config.sms.numbers.clone(),
            CarrierGateways::with_overrides(&config.sms.carriers),
        )));
    }

    Ok(builder.build()?)
}

/// Builds the host monitor on top of a dispatcher, using the system `ping`
/// binary and an HTTP client for the checks.
pub fn build_monitor(config: &Config, dispatcher: Arc<Dispatcher>) -> Result<Monitor> {
    let settings = &config.monitor;
    let pinger = Arc::new(SystemPinger::new(
        settings.ping_count,
        Duration::from_secs(settings.ping_timeout_seconds),
    ));
    let probe = Arc::new(ReqwestProbe::new(Duration::from_secs(
        settings.http_timeout_seconds,
    ))?);

    let mut monitor = Monitor::new(dispatcher, settings.level.clone(), pinger, probe)?;
    for host in &settings.hosts {
        monitor.add_host(host.clone());
    }
    Ok(monitor)
}

fn missing(channel: Channel, reason: &str) -> ConfigError {
    ConfigError::MissingChannelConfig {
        channel,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ImConfig, MailTransportConfig};
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.log.database_path = dir.path().join("events.db");
        config
    }

    #[tokio::test]
    async fn test_default_config_has_only_the_log_channel() {
        let dir = TempDir::new().unwrap();
        let dispatcher = build_dispatcher(&config_in(&dir)).await.unwrap();

        let channels: Vec<_> = dispatcher.channels().iter().collect();
        assert_eq!(channels, vec![Channel::Log]);
        assert!(dir.path().join("events.db").exists());
    }

    #[tokio::test]
    async fn test_email_without_transport_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.email.enabled = true;
        config.email.recipients = vec!["ops@example.com".into()];

        let err = build_dispatcher(&config).await.err().unwrap();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::MissingChannelConfig {
                channel: Channel::Email,
                reason: "no [mail] transport configured".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_all_channels_enabled() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.mail = Some(MailTransportConfig {
            endpoint: "http://127.0.0.1:9/send".into(),
            username: None,
            password: None,
            sender: "alerts@example.com".into(),
            sender_name: "Alerts".into(),
            timeout_seconds: 1,
        });
        config.email.enabled = true;
        config.email.recipients = vec!["ops@example.com".into()];
        config.im = Some(ImConfig {
            enabled: true,
            endpoint: "http://127.0.0.1:9".into(),
            account: "alerts@chat.example.com".into(),
            password: None,
            recipients: vec!["ops@chat.example.com".into()],
            recipient_timeout_seconds: 1,
            roster_timeout_seconds: 1,
        });
        config.sms.enabled = true;
        config.sms.numbers = vec!["5045551234:ATT".parse().unwrap()];

        let dispatcher = Arc::new(build_dispatcher(&config).await.unwrap());
        assert_eq!(dispatcher.channels().len(), 4);

        config.monitor.hosts = vec![crate::monitor::Host::new("10.0.0.5", "NAS")];
        let monitor = build_monitor(&config, dispatcher).unwrap();
        assert_eq!(monitor.hosts().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_im_timeouts_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.im = Some(ImConfig {
            enabled: true,
            endpoint: "http://127.0.0.1:9".into(),
            account: "alerts@chat.example.com".into(),
            password: None,
            recipients: vec!["ops@chat.example.com".into()],
            recipient_timeout_seconds: 0,
            roster_timeout_seconds: 5,
        });

        let err = build_dispatcher(&config).await.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidValue { field: "im.recipient_timeout_seconds", .. })
        ));

        if let Some(im) = config.im.as_mut() {
            im.recipient_timeout_seconds = 5;
            im.roster_timeout_seconds = 0;
        }
        let err = build_dispatcher(&config).await.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidValue { field: "im.roster_timeout_seconds", .. })
        ));
    }

    #[tokio::test]
    async fn test_monitor_level_must_be_deliverable() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        let dispatcher = Arc::new(build_dispatcher(&config).await.unwrap());
        assert!(build_monitor(&config, dispatcher.clone()).is_ok());

        // Only the log is configured, so "im" cannot be delivered.
        config.monitor.level = "im".to_string();
        let err = build_monitor(&config, dispatcher).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::NoUsableChannels { .. })
        ));
    }
}
