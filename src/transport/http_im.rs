//! An instant-messaging client for an HTTP chat gateway.
//!
//! The gateway holds the chat session for `account` and exposes:
//!
//! - `GET  {endpoint}/roster` returning a JSON array of contacts
//! - `GET  {endpoint}/presence?contact=..` returning `{"status": "online"|"offline"}`
//! - `POST {endpoint}/messages` with `{"to": .., "body": ..}`

use crate::config::ImConfig;
use crate::core::{ImClient, Presence};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};

pub struct HttpImGateway {
    client: reqwest::Client,
    endpoint: String,
    account: String,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PresenceResponse {
    status: Presence,
}

impl HttpImGateway {
    pub fn new(config: &ImConfig) -> Result<Self> {
        // The channel bounds each recipient separately; this only guards
        // against a request that never completes.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(
                config
                    .recipient_timeout_seconds
                    .max(config.roster_timeout_seconds),
            ))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            account: config.account.clone(),
            password: config.password.clone(),
        })
    }

    fn get(&self, route: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}/{}", self.endpoint, route))
            .basic_auth(&self.account, self.password.as_ref())
    }
}

#[async_trait]
impl ImClient for HttpImGateway {
    #[instrument(skip(self))]
    async fn roster(&self) -> Result<Vec<String>> {
        let contacts = self
            .get("roster")
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<String>>()
            .await
            .context("malformed roster response")?;
        debug!(contacts = contacts.len(), "Fetched roster");
        Ok(contacts)
    }

    #[instrument(skip(self))]
    async fn presence(&self, contact: &str) -> Result<Presence> {
        let response = self
            .get("presence")
            .query(&[("contact", contact)])
            .send()
            .await?
            .error_for_status()?
            .json::<PresenceResponse>()
            .await
            .context("malformed presence response")?;
        Ok(response.status)
    }

    #[instrument(skip(self, body))]
    async fn send_message(&self, contact: &str, body: &str) -> Result<()> {
        self.client
            .post(format!("{}/messages", self.endpoint))
            .basic_auth(&self.account, self.password.as_ref())
            .json(&json!({ "to": contact, "body": body }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ImChannel;
    use crate::core::{Detail, Event, Notification, Outcome};
    use std::sync::Arc;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: String) -> ImConfig {
        ImConfig {
            enabled: true,
            endpoint,
            account: "monitor@chat.example.com".into(),
            password: Some("secret".into()),
            recipients: vec![],
            recipient_timeout_seconds: 2,
            roster_timeout_seconds: 2,
        }
    }

    async fn mount_presence(server: &MockServer, contact: &str, status: &str) {
        Mock::given(method("GET"))
            .and(path("/presence"))
            .and(query_param("contact", contact))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": status })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_gateway_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/roster"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!(["ops@chat.example.com"])),
            )
            .mount(&server)
            .await;
        mount_presence(&server, "ops@chat.example.com", "online").await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(body_json(json!({ "to": "ops@chat.example.com", "body": "hello" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = HttpImGateway::new(&config(format!("{}/", server.uri()))).unwrap();

        assert_eq!(gateway.roster().await.unwrap(), vec!["ops@chat.example.com"]);
        assert_eq!(
            gateway.presence("ops@chat.example.com").await.unwrap(),
            Presence::Online
        );
        gateway
            .send_message("ops@chat.example.com", "hello")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_im_channel_over_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/roster"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                "ops@chat.example.com",
                "night@chat.example.com"
            ])))
            .mount(&server)
            .await;
        mount_presence(&server, "ops@chat.example.com", "online").await;
        mount_presence(&server, "night@chat.example.com", "offline").await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = HttpImGateway::new(&config(server.uri())).unwrap();
        let channel = ImChannel::new(
            Arc::new(gateway),
            vec![
                "ops@chat.example.com".into(),
                "night@chat.example.com".into(),
            ],
            Duration::from_secs(2),
            Duration::from_secs(2),
        );

        let result = channel
            .send_im(&Notification::new(
                "im",
                Event::new("NAS Down", Detail::from([("Status", "Down")])),
            ))
            .await;

        let lines: Vec<_> = result.outcomes.iter().map(Outcome::render).collect();
        assert_eq!(
            lines,
            vec![
                "Success: IM to ops@chat.example.com",
                "Error: IM to night@chat.example.com (user offline)",
            ]
        );
    }

    #[tokio::test]
    async fn test_roster_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/roster"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let gateway = HttpImGateway::new(&config(server.uri())).unwrap();
        assert!(gateway.roster().await.is_err());
    }
}
