//! Connection configuration
//!
//! Channel capacities and the overflow policy are explicit settings rather
//! than runtime defaults hidden in the dispatch loop. Configuration can be
//! built in code or loaded from YAML; missing keys fall back to defaults.
//!
//! ```rust
//! use simlink::{ConnectionConfig, OverflowPolicy};
//!
//! let config = ConnectionConfig::from_yaml_str(
//!     "client_name: Tower\nperiodic_capacity: 8\noverflow: DropOldest\n",
//! )
//! .unwrap();
//!
//! assert_eq!(config.client_name, "Tower");
//! assert_eq!(config.overflow, OverflowPolicy::DropOldest);
//! assert_eq!(config.event_capacity, ConnectionConfig::default().event_capacity);
//! ```

use serde::{Deserialize, Serialize};

use crate::{Result, SimError};

/// What a bounded delivery channel does when its consumer falls behind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum OverflowPolicy {
    /// Discard the incoming item and count the drop
    #[default]
    DropNewest,
    /// Evict the oldest queued item to make room
    DropOldest,
    /// Make the dispatch loop wait for space (still interrupted by close)
    Block,
}

/// Settings for one host connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(default)]
pub struct ConnectionConfig {
    /// Application name announced to the host
    pub client_name: String,
    /// Queue depth of each periodic data subscription
    pub periodic_capacity: usize,
    /// Overflow policy for subscription and event queues
    pub overflow: OverflowPolicy,
    /// Queue depth of each event subscription
    pub event_capacity: usize,
    /// Buffer of the unattributed exception broadcast
    pub exception_capacity: usize,
    /// Number of recent send ids kept to attribute host exceptions
    pub send_history: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            client_name: "simlink".to_string(),
            periodic_capacity: 64,
            overflow: OverflowPolicy::default(),
            event_capacity: 64,
            exception_capacity: 32,
            send_history: 256,
        }
    }
}

impl ConnectionConfig {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self { client_name: client_name.into(), ..Self::default() }
    }

    pub fn with_periodic_capacity(mut self, capacity: usize) -> Self {
        self.periodic_capacity = capacity;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_exception_capacity(mut self, capacity: usize) -> Self {
        self.exception_capacity = capacity;
        self
    }

    pub fn with_send_history(mut self, entries: usize) -> Self {
        self.send_history = entries;
        self
    }

    /// Check that every capacity is usable.
    pub fn validate(&self) -> Result<()> {
        let capacities = [
            ("periodic_capacity", self.periodic_capacity),
            ("event_capacity", self.event_capacity),
            ("exception_capacity", self.exception_capacity),
            ("send_history", self.send_history),
        ];

        for (name, value) in capacities {
            if value == 0 {
                return Err(SimError::Parse {
                    context: "Connection config".to_string(),
                    details: format!("{name} must be greater than zero"),
                });
            }
        }

        if self.client_name.trim().is_empty() {
            return Err(SimError::Parse {
                context: "Connection config".to_string(),
                details: "client_name must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| SimError::Parse {
            context: "Connection config YAML".to_string(),
            details: format!("YAML parsing failed: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ConnectionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.periodic_capacity, 64);
        assert_eq!(config.overflow, OverflowPolicy::DropNewest);
        assert_eq!(config.send_history, 256);
    }

    #[test]
    fn builder_setters_override_defaults() {
        let config = ConnectionConfig::new("Tower")
            .with_periodic_capacity(4)
            .with_overflow(OverflowPolicy::Block)
            .with_event_capacity(2)
            .with_exception_capacity(1)
            .with_send_history(16);

        assert_eq!(config.client_name, "Tower");
        assert_eq!(config.periodic_capacity, 4);
        assert_eq!(config.overflow, OverflowPolicy::Block);
        assert_eq!(config.event_capacity, 2);
        assert_eq!(config.exception_capacity, 1);
        assert_eq!(config.send_history, 16);
    }

    #[test]
    fn zero_capacities_are_rejected() {
        let result = ConnectionConfig::default().with_periodic_capacity(0).validate();
        match result {
            Err(SimError::Parse { details, .. }) => assert!(details.contains("periodic_capacity")),
            other => panic!("Expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn yaml_errors_are_parse_errors() {
        assert!(matches!(
            ConnectionConfig::from_yaml_str("periodic_capacity: lots"),
            Err(SimError::Parse { .. })
        ));
        assert!(matches!(
            ConnectionConfig::from_yaml_str("event_capacity: 0"),
            Err(SimError::Parse { .. })
        ));
    }

    #[test]
    fn yaml_round_trips() {
        let config = ConnectionConfig::new("Tower").with_overflow(OverflowPolicy::DropOldest);
        let yaml = serde_yaml_ng::to_string(&config).unwrap();
        assert_eq!(ConnectionConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
