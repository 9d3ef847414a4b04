//! The event log channel.
//!
//! Writes one event row and then one detail row per detail pair, linked by
//! the event row's generated id. The event row is the source of truth: if it
//! is written but some detail rows are not, the channel reports a partial
//! write instead of a plain failure.

use crate::channels::Notifier;
use crate::core::{Channel, DeliveryResult, EventStore, Notification, Outcome};
use crate::errors::ChannelError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

pub struct LogChannel {
    store: Arc<dyn EventStore>,
}

impl LogChannel {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Records the event and its details.
    #[instrument(skip_all, fields(event = %notification.event.name()))]
    pub async fn record(&self, notification: &Notification) -> DeliveryResult {
        let event_id = match self
            .store
            .insert_event(
                &notification.level,
                notification.event.name(),
                notification.timestamp,
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Failed to write event row");
                return DeliveryResult::failed(
                    Channel::Log,
                    format!("DB Write events ({:#})", e),
                    ChannelError::EventWrite(format!("{:#}", e)),
                );
            }
        };
        debug!(event_id, "Event row written");

        let detail = notification.event.detail();
        let mut written = 0;
        let mut failures = Vec::new();
        for (key, value) in detail.iter() {
            match self.store.insert_detail(event_id, key, value).await {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!(event_id, key, error = %e, "Failed to write detail row");
                    failures.push(format!("{}: {:#}", key, e));
                }
            }
        }

        let details_outcome = if failures.is_empty() {
            Outcome::success("DB Write event args")
        } else {
            Outcome::failure(
                format!(
                    "DB Write event args ({} of {} failed)",
                    failures.len(),
                    detail.len()
                ),
                ChannelError::PartialWrite {
                    written,
                    failed: failures.len(),
                    reason: failures.join("; "),
                },
            )
        };

        DeliveryResult::from_outcomes(
            Channel::Log,
            vec![Outcome::success("DB Write"), details_outcome],
        )
    }
}

#[async_trait]
impl Notifier for LogChannel {
    fn channel(&self) -> Channel {
        Channel::Log
    }

    async fn deliver(&self, notification: &Notification) -> DeliveryResult {
        self.record(notification).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DeliveryStatus, Detail, Event};
    use crate::test_utils::FakeEventStore;

    fn notification(detail: Detail) -> Notification {
        Notification::new("info", Event::new("Ping Check", detail))
    }

    #[tokio::test]
    async fn test_writes_one_event_and_one_row_per_detail() {
        let store = Arc::new(FakeEventStore::new());
        let channel = LogChannel::new(store.clone());
        let detail = Detail::from([("IP", "10.0.0.5"), ("Status", "Down"), ("Name", "nas")]);

        let result = channel.record(&notification(detail)).await;

        assert_eq!(result.status, DeliveryStatus::Success);
        assert_eq!(store.events().len(), 1);
        assert_eq!(store.events()[0].level, "info");
        let details = store.details();
        assert_eq!(details.len(), 3);
        assert!(details.iter().all(|d| d.event_id == store.events()[0].id));
        assert_eq!(details[0].key, "IP");
    }

    #[tokio::test]
    async fn test_event_failure_skips_detail_rows() {
        let store = Arc::new(FakeEventStore::new());
        store.fail_events(true);
        let channel = LogChannel::new(store.clone());

        let result = channel
            .record(&notification(Detail::from([("IP", "10.0.0.5")])))
            .await;

        assert_eq!(result.status, DeliveryStatus::Failure);
        assert_eq!(result.outcomes.len(), 1);
        assert!(matches!(
            result.outcomes[0].error,
            Some(ChannelError::EventWrite(_))
        ));
        assert!(store.details().is_empty());
    }

    #[tokio::test]
    async fn test_detail_failure_is_a_partial_write() {
        let store = Arc::new(FakeEventStore::new());
        store.fail_detail_key("Status");
        let channel = LogChannel::new(store.clone());
        let detail = Detail::from([("IP", "10.0.0.5"), ("Status", "Down")]);

        let result = channel.record(&notification(detail)).await;

        assert_eq!(result.status, DeliveryStatus::Partial);
        assert!(result.outcomes[0].success);
        assert_eq!(
            result.outcomes[1].error,
            Some(ChannelError::PartialWrite {
                written: 1,
                failed: 1,
                reason: "Status: simulated detail write failure".into(),
            })
        );
        assert_eq!(store.events().len(), 1);
        assert_eq!(store.details().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_detail_writes_only_the_event_row() {
        let store = Arc::new(FakeEventStore::new());
        let channel = LogChannel::new(store.clone());

        let result = channel.record(&notification(Detail::new())).await;

        assert!(result.is_success());
        assert_eq!(store.events().len(), 1);
        assert!(store.details().is_empty());
    }
}
