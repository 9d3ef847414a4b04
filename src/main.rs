//! eventnotify - host monitor
//!
//! Polls the configured hosts and raises a notification through the
//! configured channels whenever one stops answering.

use anyhow::Result;
use clap::Parser;
use eventnotify::{
    cli::Cli,
    config::Config,
    services::{build_dispatcher, build_monitor},
};
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            tracing_subscriber::fmt().init();
            error!("Failed to load configuration: {:#}", err);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("eventnotify starting up...");

    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!(
        "Event Log: {}",
        if config.log.enabled {
            config.log.database_path.display().to_string()
        } else {
            "Disabled".to_string()
        }
    );
    info!(
        "Mail Transport: {}",
        config
            .mail
            .as_ref()
            .map(|m| m.endpoint.as_str())
            .unwrap_or("Not configured")
    );
    info!(
        "Email: {}",
        if config.email.enabled { "Enabled" } else { "Disabled" }
    );
    info!(
        "IM: {}",
        match &config.im {
            Some(im) if im.enabled => "Enabled",
            _ => "Disabled",
        }
    );
    info!("SMS: {}", if config.sms.enabled { "Enabled" } else { "Disabled" });
    info!("Monitor Level: {}", config.monitor.level);
    info!("Monitor Interval: {}s", config.monitor.interval_seconds);
    info!("Monitored Hosts: {}", config.monitor.hosts.len());
    info!("-------------------------------------------------------");

    let dispatcher = Arc::new(build_dispatcher(&config).await?);
    let monitor = build_monitor(&config, dispatcher)?;

    if cli.once {
        let report = monitor.poll_once().await?;
        if report.all_up() {
            println!("All servers appear to be up:");
            print!("{}", monitor.servers_summary());
        } else {
            for response in &report.responses {
                println!("{}", response);
            }
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_task = {
        let monitor = Arc::new(monitor);
        let interval = Duration::from_secs(config.monitor.interval_seconds.max(1));
        tokio::spawn(async move { monitor.run(interval, shutdown_rx).await })
    };

    info!("eventnotify initialized successfully. Monitoring hosts...");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Shutting down gracefully...");
    let _ = shutdown_tx.send(true);

    if let Err(e) = monitor_task.await {
        error!("Monitor task panicked: {:?}", e);
    }

    info!("All tasks shut down. Exiting.");
    Ok(())
}
