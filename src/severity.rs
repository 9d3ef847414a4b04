//! Severity policy: which channels fire for which level.
//!
//! Besides the urgency tiers, every channel name is itself a level that maps
//! to just that channel, so a caller can address one channel directly and
//! bypass severity semantics (`send("im", ...)` only sends instant messages).

use crate::core::{Channel, ChannelSet};
use crate::errors::ConfigError;
use std::collections::{BTreeMap, HashMap};

/// A validated mapping from severity level to channel set.
#[derive(Debug, Clone, PartialEq)]
pub struct SeverityPolicy {
    levels: HashMap<String, ChannelSet>,
}

impl SeverityPolicy {
    /// Builds the default policy and applies configured levels on top of it.
    ///
    /// Configured levels may add new tiers or redefine `info`, `low`,
    /// `moderate` and `critical`. Redefining a direct channel level, or mapping
    /// a level to no channels, is rejected.
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<Channel>>) -> Result<Self, ConfigError> {
        let mut policy = Self::default();
        for (level, channels) in overrides {
            let level = normalize(level);
            if level.is_empty() {
                return Err(ConfigError::InvalidPolicy("empty severity level name".into()));
            }
            if level.parse::<Channel>().is_ok() {
                return Err(ConfigError::InvalidPolicy(format!(
                    "'{}' is a channel name and always maps to that channel",
                    level
                )));
            }
            let set: ChannelSet = channels.iter().copied().collect();
            if set.is_empty() {
                return Err(ConfigError::InvalidPolicy(format!(
                    "level '{}' maps to no channels",
                    level
                )));
            }
            policy.levels.insert(level, set);
        }
        Ok(policy)
    }

    /// Resolves a level to its channels.
    pub fn channels_for(&self, level: &str) -> Result<ChannelSet, ConfigError> {
        self.levels
            .get(&normalize(level))
            .cloned()
            .ok_or_else(|| ConfigError::UnknownSeverity(level.to_string()))
    }

    /// All known level names, sorted.
    pub fn levels(&self) -> Vec<&str> {
        let mut levels: Vec<&str> = self.levels.keys().map(String::as_str).collect();
        levels.sort_unstable();
        levels
    }
}

impl Default for SeverityPolicy {
    fn default() -> Self {
        use Channel::*;

        let mut levels = HashMap::new();
        for channel in Channel::ALL {
            levels.insert(channel.as_str().to_string(), ChannelSet::from([channel]));
        }
        levels.insert("info".to_string(), ChannelSet::from([Log]));
        levels.insert("low".to_string(), ChannelSet::from([Log, Email]));
        levels.insert("moderate".to_string(), ChannelSet::from([Log, Email, Im]));
        levels.insert("critical".to_string(), ChannelSet::from([Log, Email, Im, Sms]));
        Self { levels }
    }
}

/// Levels are matched case-insensitively, ignoring surrounding whitespace.
pub fn normalize(level: &str) -> String {
    level.trim().to_ascii_lowercase()
}
