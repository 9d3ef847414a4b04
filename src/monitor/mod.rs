//! Host monitoring.
//!
//! A `Monitor` holds a fixed list of hosts and checks each one twice per
//! round: an ICMP ping against its address and an HTTP fetch of its web
//! address. Every failed check raises one `"<name> Down"` event through the
//! dispatcher. There is no retry or backoff; the next round simply checks
//! again.

pub mod host;
pub mod probe;

pub use host::{Credentials, Host};
pub use probe::{HttpProbe, Pinger, ReqwestProbe, SystemPinger};

use crate::core::{Detail, Response};
use crate::dispatcher::Dispatcher;
use crate::errors::ConfigError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// What a single round of checks found for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostStatus {
    pub name: String,
    pub ping_ok: bool,
    pub http_ok: bool,
}

impl HostStatus {
    pub fn is_up(&self) -> bool {
        self.ping_ok && self.http_ok
    }
}

/// The result of one polling round.
#[derive(Debug, Clone, Default)]
pub struct PollReport {
    pub hosts: Vec<HostStatus>,
    /// One dispatcher response per failed check, in check order.
    pub responses: Vec<Response>,
}

impl PollReport {
    pub fn all_up(&self) -> bool {
        self.hosts.iter().all(HostStatus::is_up)
    }
}

pub struct Monitor {
    hosts: Vec<Host>,
    dispatcher: Arc<Dispatcher>,
    level: String,
    pinger: Arc<dyn Pinger>,
    probe: Arc<dyn HttpProbe>,
}

impl Monitor {
    /// Creates a monitor that reports down hosts at `level`.
    ///
    /// Fails if the dispatcher cannot deliver anything at that level, so a
    /// misconfigured monitor is caught before the first outage.
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        level: impl Into<String>,
        pinger: Arc<dyn Pinger>,
        probe: Arc<dyn HttpProbe>,
    ) -> Result<Self, ConfigError> {
        let level = level.into();
        let resolved = dispatcher.policy().channels_for(&level)?;
        let configured = dispatcher.channels();
        if !resolved.iter().any(|c| configured.contains(c)) {
            return Err(ConfigError::NoUsableChannels { level });
        }
        Ok(Self {
            hosts: Vec::new(),
            dispatcher,
            level,
            pinger,
            probe,
        })
    }

    pub fn add_host(&mut self, host: Host) {
        debug!(host = %host.display_name, address = %host.address, "Host added");
        self.hosts.push(host);
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// One `'name' : address` line per host.
    pub fn servers_summary(&self) -> String {
        self.hosts
            .iter()
            .map(|h| format!("'{}' : {}\n", h.display_name, h.address))
            .collect()
    }

    /// Checks every host once and raises an event for each failed check.
    pub async fn poll_once(&self) -> Result<PollReport, ConfigError> {
        let mut report = PollReport::default();
        for host in &self.hosts {
            let event_name = format!("{} Down", host.display_name);

            let ping_ok = match self.pinger.ping(&host.address).await {
                Ok(replied) => replied,
                Err(e) => {
                    warn!(host = %host.display_name, error = %e, "Ping check could not run");
                    false
                }
            };
            if !ping_ok {
                metrics::counter!("monitor_checks_failed_total", "check" => "ping").increment(1);
                let detail = Detail::from([
                    ("System", host.display_name.as_str()),
                    ("Status", "Did not respond to ping"),
                    ("IP", host.address.as_str()),
                ]);
                report
                    .responses
                    .push(self.dispatcher.send(&self.level, &event_name, detail).await?);
            }

            let http_ok = match self.probe.fetch(&host.url()).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(host = %host.display_name, error = %e, "HTTP check failed");
                    false
                }
            };
            if !http_ok {
                metrics::counter!("monitor_checks_failed_total", "check" => "http").increment(1);
                let url = host.redacted_url();
                let detail = Detail::from([
                    ("System", host.display_name.as_str()),
                    ("Status", "Could not open webpage"),
                    ("URL", url.as_str()),
                ]);
                report
                    .responses
                    .push(self.dispatcher.send(&self.level, &event_name, detail).await?);
            }

            report.hosts.push(HostStatus {
                name: host.display_name.clone(),
                ping_ok,
                http_ok,
            });
        }

        if report.all_up() {
            info!(hosts = self.hosts.len(), "All servers appear to be up");
        }
        Ok(report)
    }

    /// Polls every `interval` until the shutdown signal fires.
    pub async fn run(&self, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
        // `tokio::time::interval` panics on a zero period.
        let interval = interval.max(Duration::from_secs(1));
        info!(hosts = self.hosts.len(), interval_seconds = interval.as_secs(), "Host monitor started.");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Host monitor received shutdown signal.");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!(error = %e, "Polling round aborted");
                    }
                }
            }
        }
        info!("Host monitor finished.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Channel;
    use crate::test_utils::{FakeEventStore, FakePinger};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dispatcher(store: Arc<FakeEventStore>) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::builder().log_store(store).build().unwrap())
    }

    #[test]
    fn test_new_rejects_unusable_level() {
        let store = Arc::new(FakeEventStore::new());
        let probe = Arc::new(ReqwestProbe::new(Duration::from_secs(1)).unwrap());
        let pinger = Arc::new(FakePinger::new());

        assert!(matches!(
            Monitor::new(dispatcher(store.clone()), "bogus", pinger.clone(), probe.clone()),
            Err(ConfigError::UnknownSeverity(_))
        ));
        assert!(matches!(
            Monitor::new(dispatcher(store), "im", pinger, probe),
            Err(ConfigError::NoUsableChannels { .. })
        ));
    }

    #[tokio::test]
    async fn test_poll_raises_one_event_per_failed_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let address = server.address();

        let store = Arc::new(FakeEventStore::new());
        let pinger = Arc::new(FakePinger::new());
        pinger.set_reachable(&address.ip().to_string(), true);
        let probe = Arc::new(ReqwestProbe::new(Duration::from_secs(2)).unwrap());
        let mut monitor = Monitor::new(dispatcher(store.clone()), "db", pinger, probe).unwrap();

        monitor.add_host(Host::new(address.ip().to_string(), "Web").with_port(address.port()));
        // Nothing listens on port 9 and the pinger does not know this address.
        monitor.add_host(Host::new("127.0.0.2", "Dead machine").with_port(9));

        let report = monitor.poll_once().await.unwrap();

        assert!(!report.all_up());
        assert!(report.hosts[0].is_up());
        assert!(!report.hosts[1].ping_ok);
        assert!(!report.hosts[1].http_ok);
        assert_eq!(report.responses.len(), 2);
        assert_eq!(report.responses[0].results[0].channel, Channel::Log);

        let events = store.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.name == "Dead machine Down"));
        let details = store.details();
        assert!(details
            .iter()
            .any(|d| d.key == "Status" && d.value == "Did not respond to ping"));
        assert!(details
            .iter()
            .any(|d| d.key == "URL" && d.value == "http://127.0.0.2:9"));
    }

    #[test]
    fn test_servers_summary() {
        let store = Arc::new(FakeEventStore::new());
        let mut monitor = Monitor::new(
            dispatcher(store),
            "info",
            Arc::new(FakePinger::new()),
            Arc::new(ReqwestProbe::new(Duration::from_secs(1)).unwrap()),
        )
        .unwrap();
        monitor.add_host(Host::new("10.0.0.5", "Systems NAS"));
        monitor.add_host(Host::new("10.0.0.6", "Music NAS"));

        assert_eq!(
            monitor.servers_summary(),
            "'Systems NAS' : 10.0.0.5\n'Music NAS' : 10.0.0.6\n"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_accepts_zero_interval() {
        let store = Arc::new(FakeEventStore::new());
        let probe = Arc::new(ReqwestProbe::new(Duration::from_secs(1)).unwrap());
        let monitor = Arc::new(
            Monitor::new(dispatcher(store), "db", Arc::new(FakePinger::new()), probe).unwrap(),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.run(Duration::ZERO, shutdown_rx).await })
        };

        tokio::time::sleep(Duration::from_secs(3)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor should stop")
            .expect("monitor task should not panic");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(FakeEventStore::new());
        let pinger = Arc::new(FakePinger::new());
        let probe = Arc::new(ReqwestProbe::new(Duration::from_secs(1)).unwrap());
        let monitor = Arc::new(Monitor::new(dispatcher(store), "db", pinger.clone(), probe).unwrap());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.run(Duration::from_secs(60), shutdown_rx).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor should stop")
            .unwrap();
    }
}
