//! Engine configuration.
//!
//! [`GeofenceConfig`] is built in code with `with_*` methods or loaded from
//! an INI file through [`ConfigFile`].

mod file;

pub use file::{default_config_path, ConfigError, ConfigFile};

use std::fmt;
use std::str::FromStr;

use crate::position::ListenSettings;

/// Default capacity of the status event broadcast buffer.
///
/// An observer that falls more than this many events behind skips the
/// oldest ones.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// When the engine emits a status event for a fence whose status is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmitPolicy {
    /// Emit on every fix, even if the status did not change.
    #[default]
    EveryUpdate,
    /// Emit only when the status actually flips.
    TransitionsOnly,
}

impl EmitPolicy {
    /// Config file spelling of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmitPolicy::EveryUpdate => "every_update",
            EmitPolicy::TransitionsOnly => "transitions_only",
        }
    }
}

impl fmt::Display for EmitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EmitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "every_update" | "every-update" => Ok(EmitPolicy::EveryUpdate),
            "transitions_only" | "transitions-only" => Ok(EmitPolicy::TransitionsOnly),
            other => Err(format!("unknown emit policy '{}'", other)),
        }
    }
}

/// Configuration for a [`GeofenceEngine`](crate::engine::GeofenceEngine).
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceConfig {
    /// Parameters passed to the position source when the stream activates.
    pub listen: ListenSettings,

    /// Event emission rule for fences with a known status.
    pub emit_policy: EmitPolicy,

    /// Broadcast buffer size per observer.
    pub event_capacity: usize,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self {
            listen: ListenSettings::default(),
            emit_policy: EmitPolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl GeofenceConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the position source parameters.
    pub fn with_listen_settings(mut self, listen: ListenSettings) -> Self {
        self.listen = listen;
        self
    }

    /// Set the emission rule.
    pub fn with_emit_policy(mut self, policy: EmitPolicy) -> Self {
        self.emit_policy = policy;
        self
    }

    /// Set the broadcast buffer size. Zero is raised to one.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = GeofenceConfig::default();
        assert_eq!(config.listen, ListenSettings::default());
        assert_eq!(config.emit_policy, EmitPolicy::EveryUpdate);
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn test_builder_pattern() {
        let config = GeofenceConfig::new()
            .with_listen_settings(
                ListenSettings::default().with_min_interval(Duration::from_secs(5)),
            )
            .with_emit_policy(EmitPolicy::TransitionsOnly)
            .with_event_capacity(0);

        assert_eq!(config.listen.min_interval, Duration::from_secs(5));
        assert_eq!(config.emit_policy, EmitPolicy::TransitionsOnly);
        assert_eq!(config.event_capacity, 1);
    }

    #[test]
    fn test_emit_policy_parse() {
        assert_eq!(
            "every_update".parse::<EmitPolicy>(),
            Ok(EmitPolicy::EveryUpdate)
        );
        assert_eq!(
            "Transitions-Only".parse::<EmitPolicy>(),
            Ok(EmitPolicy::TransitionsOnly)
        );
        assert!("sometimes".parse::<EmitPolicy>().is_err());
    }
}
