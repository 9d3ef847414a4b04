//! The notification dispatcher.
//!
//! `Dispatcher::send` resolves a severity level to its channels, runs the log
//! channel first, then the remaining channels concurrently, and collects the
//! per-channel results in fixed channel order. A failing channel never stops
//! the others; only an unresolvable level is an error.

use crate::channels::{LogChannel, Notifier};
use crate::core::{Channel, ChannelSet, DeliveryResult, DeliveryStatus, Detail, Event, EventStore, Notification, Response};
use crate::errors::{ChannelError, ConfigError};
use crate::severity::{self, SeverityPolicy};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Routes events to delivery channels. Cheap to share behind an `Arc`; all
/// state is fixed at construction.
pub struct Dispatcher {
    policy: SeverityPolicy,
    notifiers: BTreeMap<Channel, Arc<dyn Notifier>>,
}

impl Dispatcher {
    /// Creates a new `DispatcherBuilder`.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// The channels this dispatcher can deliver to.
    pub fn channels(&self) -> ChannelSet {
        self.notifiers.keys().copied().collect()
    }

    pub fn policy(&self) -> &SeverityPolicy {
        &self.policy
    }

    /// Dispatches an event at the given severity level.
    ///
    /// # Returns
    /// * `Ok(Response)` once every selected channel has been attempted,
    ///   whatever the individual outcomes
    /// * `Err(ConfigError)` if the level is unknown or none of its channels is
    ///   configured; no channel is touched in that case
    #[instrument(skip_all, fields(level = %level, event = %event_name))]
    pub async fn send(
        &self,
        level: &str,
        event_name: &str,
        detail: Detail,
    ) -> Result<Response, ConfigError> {
        let resolved = self.policy.channels_for(level)?;
        let active: Vec<Arc<dyn Notifier>> = resolved
            .iter()
            .filter_map(|channel| match self.notifiers.get(&channel) {
                Some(notifier) => Some(notifier.clone()),
                None => {
                    warn!(channel = %channel, "Channel selected but not configured, skipping");
                    None
                }
            })
            .collect();
        if active.is_empty() {
            return Err(ConfigError::NoUsableChannels {
                level: level.to_string(),
            });
        }

        let level = severity::normalize(level);
        metrics::counter!("notifications_dispatched_total", "level" => level.clone()).increment(1);
        let notification = Arc::new(Notification::new(
            level.clone(),
            Event::new(event_name, detail),
        ));

        let mut results = Vec::with_capacity(active.len());
        let mut rest = active.as_slice();
        if let Some((first, tail)) = active.split_first() {
            if first.channel() == Channel::Log {
                results.push(deliver_isolated(first.clone(), notification.clone()).await);
                rest = tail;
            }
        }
        results.extend(
            join_all(
                rest.iter()
                    .map(|notifier| deliver_isolated(notifier.clone(), notification.clone())),
            )
            .await,
        );

        let response = Response {
            level,
            event_name: event_name.to_string(),
            results,
        };
        info!(
            channels = response.results.len(),
            all_succeeded = response.all_succeeded(),
            "Event dispatched"
        );
        Ok(response)
    }
}

/// Runs one channel in its own task so that even a panic inside the channel
/// ends up as a failed `DeliveryResult`.
async fn deliver_isolated(
    notifier: Arc<dyn Notifier>,
    notification: Arc<Notification>,
) -> DeliveryResult {
    let channel = notifier.channel();
    let start = Instant::now();
    debug!(channel = %channel, "Delivering");

    let result = match tokio::spawn(async move { notifier.deliver(&notification).await }).await {
        Ok(result) => result,
        Err(e) => {
            error!(channel = %channel, error = %e, "Channel task failed");
            DeliveryResult::failed(
                channel,
                format!("{} delivery aborted ({})", channel, e),
                ChannelError::Aborted(e.to_string()),
            )
        }
    };

    let status = match result.status {
        DeliveryStatus::Success => "success",
        DeliveryStatus::Partial => "partial",
        DeliveryStatus::Failure => "failure",
    };
    metrics::histogram!("channel_delivery_duration_seconds", "channel" => channel.as_str())
        .record(start.elapsed().as_secs_f64());
    metrics::counter!("channel_deliveries_total", "channel" => channel.as_str(), "status" => status)
        .increment(1);
    result
}

/// Builder for a `Dispatcher`.
///
/// Channels are registered as `Notifier`s, so tests can plug in fakes and
/// `services::build_dispatcher` can plug in the real adapters.
#[derive(Default)]
pub struct DispatcherBuilder {
    policy: Option<SeverityPolicy>,
    notifiers: BTreeMap<Channel, Arc<dyn Notifier>>,
}

impl DispatcherBuilder {
    /// Replaces the default severity policy.
    pub fn policy(mut self, policy: SeverityPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Registers a channel. A later registration for the same channel wins.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.insert(notifier.channel(), notifier);
        self
    }

    /// Registers the log channel on top of an event store.
    pub fn log_store(self, store: Arc<dyn EventStore>) -> Self {
        self.notifier(Arc::new(LogChannel::new(store)))
    }

    pub fn build(self) -> Result<Dispatcher, ConfigError> {
        if self.notifiers.is_empty() {
            return Err(ConfigError::NoChannelsConfigured);
        }
        let dispatcher = Dispatcher {
            policy: self.policy.unwrap_or_default(),
            notifiers: self.notifiers,
        };
        info!(channels = ?dispatcher.channels(), "Dispatcher ready");
        Ok(dispatcher)
    }
}
