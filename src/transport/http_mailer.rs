//! A mail transport that posts messages to an HTTP mail relay.

use crate::config::MailTransportConfig;
use crate::core::{MailMessage, Mailer};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info, instrument};

/// Sends mail by posting a JSON document to a relay endpoint.
///
/// The relay is expected to accept
/// `{from, from_name, to: [..], subject, body}` and answer with a 2xx status.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    username: Option<String>,
    password: Option<String>,
    sender: String,
    sender_name: String,
}

impl HttpMailer {
    pub fn new(config: &MailTransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            sender: config.sender.clone(),
            sender_name: config.sender_name.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    #[instrument(skip(self, message), fields(recipients = message.to.len()))]
    async fn send(&self, message: &MailMessage) -> Result<()> {
        let payload = json!({
            "from": self.sender,
            "from_name": self.sender_name,
            "to": message.to,
            "subject": message.subject,
            "body": message.body,
        });

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "HTTP request to mail relay failed");
            e
        })?;

        if response.status().is_success() {
            info!("Mail relay accepted message.");
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body = %text, "Mail relay rejected message");
            anyhow::bail!("mail relay returned status {}: {}", status, text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: String) -> MailTransportConfig {
        MailTransportConfig {
            endpoint,
            username: Some("alerts".into()),
            password: Some("secret".into()),
            sender: "alerts@example.com".into(),
            sender_name: "Event Notifier".into(),
            timeout_seconds: 10,
        }
    }

    fn message() -> MailMessage {
        MailMessage {
            to: vec!["a@example.com".into(), "b@example.com".into()],
            subject: "[Alert] Event #123".into(),
            body: "Event: Event #123".into(),
        }
    }

    #[tokio::test]
    async fn test_send_posts_one_message_for_all_recipients() {
        let server = MockServer::start().await;
        let expected = json!({
            "from": "alerts@example.com",
            "from_name": "Event Notifier",
            "to": ["a@example.com", "b@example.com"],
            "subject": "[Alert] Event #123",
            "body": "Event: Event #123",
        });

        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header_exists("authorization"))
            .and(body_json(&expected))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(&config(format!("{}/send", server.uri()))).unwrap();
        mailer.send(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn test_relay_rejection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(&config(format!("{}/send", server.uri()))).unwrap();
        let err = mailer.send(&message()).await.unwrap_err();

        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("bad credentials"));
    }

    #[tokio::test]
    async fn test_send_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let mut cfg = config(format!("{}/send", server.uri()));
        cfg.timeout_seconds = 1;
        let mailer = HttpMailer::new(&cfg).unwrap();
        let err = mailer.send(&message()).await.unwrap_err();

        let is_timeout = err
            .chain()
            .any(|cause| cause.downcast_ref::<reqwest::Error>().map_or(false, |e| e.is_timeout()));
        assert!(is_timeout, "Error should be a timeout error, but was: {}", err);
    }
}
