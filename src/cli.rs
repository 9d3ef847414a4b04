//! Command-Line Interface (CLI) argument parsing.
//!
//! The binary only runs the host monitor. These arguments are parsed at
//! startup and merged over the `eventnotify.toml` file and environment
//! variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Polls a list of hosts and raises notifications when one is unreachable.
#[derive(Parser, Debug, Default, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Severity level used when a host is down.
    #[arg(long, value_name = "LEVEL")]
    pub level: Option<String>,

    /// Run a single polling round, print the results and exit.
    #[arg(long)]
    pub once: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(log_level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(log_level.clone()));
        }

        if let Some(level) = &self.level {
            let mut monitor = Dict::new();
            monitor.insert("level".into(), Value::from(level.clone()));
            dict.insert("monitor".into(), Value::from(monitor));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
