//! Reachability checks used by the monitor.

use anyhow::Result;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Checks whether a host answers ICMP echo requests.
#[async_trait]
pub trait Pinger: Send + Sync {
    /// Returns `Ok(true)` if the host replied, `Ok(false)` if it did not,
    /// and `Err` if the check itself could not be run.
    async fn ping(&self, address: &str) -> Result<bool>;
}

/// Checks whether a web address can be fetched.
#[async_trait]
pub trait HttpProbe: Send + Sync {
    /// Fetches the address; any transport error or non-2xx status is an `Err`.
    async fn fetch(&self, url: &str) -> Result<()>;
}

/// Pings through the system `ping` binary, which already has the privileges
/// raw ICMP sockets need.
pub struct SystemPinger {
    count: u32,
    timeout: Duration,
}

impl SystemPinger {
    pub fn new(count: u32, timeout: Duration) -> Self {
        Self {
            count: count.max(1),
            timeout,
        }
    }
}

#[async_trait]
impl Pinger for SystemPinger {
    #[instrument(skip(self))]
    async fn ping(&self, address: &str) -> Result<bool> {
        let status = Command::new("ping")
            .arg("-c")
            .arg(self.count.to_string())
            .arg("-W")
            .arg(self.timeout.as_secs().max(1).to_string())
            .arg(address)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;
        debug!(success = status.success(), "ping finished");
        Ok(status.success())
    }
}

/// Fetches web addresses with a shared `reqwest` client.
pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn fetch(&self, url: &str) -> Result<()> {
        self.client.get(url).send().await?.error_for_status()?;
        Ok(())
    }
}
