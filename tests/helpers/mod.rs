//! Shared fixtures for the integration tests.

use eventnotify::channels::{CarrierGateways, EmailChannel, ImChannel, SmsChannel};
use eventnotify::test_utils::{FakeEventStore, FakeImClient, FakeMailer};
use eventnotify::{Dispatcher, Presence};
use std::sync::Arc;
use std::time::Duration;

/// A dispatcher with all four channels wired to in-memory fakes.
pub struct FakeDeployment {
    pub dispatcher: Dispatcher,
    pub store: Arc<FakeEventStore>,
    pub mailer: Arc<FakeMailer>,
    pub im: Arc<FakeImClient>,
}

impl FakeDeployment {
    /// Every channel configured and healthy.
    pub fn healthy() -> Self {
        Self::with_email_recipients(&["oncall@example.com"])
    }

    pub fn with_email_recipients(recipients: &[&str]) -> Self {
        let store = Arc::new(FakeEventStore::new());
        let mailer = Arc::new(FakeMailer::new());
        let im = Arc::new(FakeImClient::new());
        im.add_contact("ops@chat.example.com", Presence::Online);

        let dispatcher = Dispatcher::builder()
            .log_store(store.clone())
            .notifier(Arc::new(EmailChannel::new(
                mailer.clone(),
                recipients.iter().map(|r| r.to_string()).collect(),
                "[Event]".to_string(),
            )))
            .notifier(Arc::new(ImChannel::new(
                im.clone(),
                vec!["ops@chat.example.com".to_string()],
                Duration::from_secs(5),
                Duration::from_secs(5),
            )))
            .notifier(Arc::new(SmsChannel::new(
                mailer.clone(),
                vec!["5045551234:ATT".parse().unwrap()],
                CarrierGateways::default(),
            )))
            .build()
            .unwrap();

        Self {
            dispatcher,
            store,
            mailer,
            im,
        }
    }
}
