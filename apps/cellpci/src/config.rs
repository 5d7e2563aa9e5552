//! # Configuration
//!
//! Application settings, loaded with precedence:
//! environment (`CELLPCI_*`) > TOML file (`--config`) > defaults.
//!
//! ```toml
//! pools = [{ lower = 1, upper = 503 }, { lower = 600, upper = 700 }]
//!
//! [controller]
//! ack_timeout_ms = 5000
//! event_queue = 1024
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [transport]
//! ack_delay_ms = 10
//! reject = false
//! ```

use cellpci_core::primitives::{
    DEFAULT_ACK_TIMEOUT_MS, EVENT_QUEUE_CAPACITY, MAX_NR_PCI, MAX_POOLS_PER_CELL,
};
use cellpci_core::{ControllerConfig, PciError, PciPool};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Acknowledgement timeout override.
pub const ENV_ACK_TIMEOUT_MS: &str = "CELLPCI_ACK_TIMEOUT_MS";

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSection {
    /// Bound on each acknowledgement wait, in milliseconds.
    pub ack_timeout_ms: u64,
    /// Change feed queue length per subscriber.
    pub event_queue: usize,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
            event_queue: EVENT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Behaviour of the loopback transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    /// Delay before the simulated network element answers.
    pub ack_delay_ms: u64,
    /// Answer every action with a rejection.
    pub reject: bool,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            ack_delay_ms: 10,
            reject: false,
        }
    }
}

// =============================================================================
// APP CONFIG
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Pools assigned to reports that do not carry their own.
    pub pools: Vec<PciPool>,
    pub controller: ControllerSection,
    pub server: ServerSection,
    pub transport: TransportSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pools: vec![PciPool::default()],
            controller: ControllerSection::default(),
            server: ServerSection::default(),
            transport: TransportSection::default(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document. The result is not validated.
    pub fn from_toml(content: &str) -> Result<Self, PciError> {
        toml::from_str(content)
            .map_err(|e| PciError::Config(format!("Invalid configuration: {}", e)))
    }

    /// Load from an optional file, apply environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, PciError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    PciError::Io(format!("Cannot read config '{}': {}", path.display(), e))
                })?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), PciError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_ACK_TIMEOUT_MS) {
            self.controller.ack_timeout_ms = value.trim().parse().map_err(|_| {
                PciError::Config(format!("{} must be an integer, got '{}'", ENV_ACK_TIMEOUT_MS, value))
            })?;
        }
        Ok(())
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), PciError> {
        if self.pools.is_empty() {
            return Err(PciError::Config("At least one PCI pool is required".to_string()));
        }
        if self.pools.len() > MAX_POOLS_PER_CELL {
            return Err(PciError::Config(format!(
                "{} pools configured, at most {} allowed",
                self.pools.len(),
                MAX_POOLS_PER_CELL
            )));
        }
        for pool in &self.pools {
            pool.validate()
                .map_err(|e| PciError::Config(e.to_string()))?;
            if pool.upper.value() > MAX_NR_PCI {
                return Err(PciError::Config(format!(
                    "PCI pool upper bound {} exceeds {}",
                    pool.upper, MAX_NR_PCI
                )));
            }
        }
        if self.controller.ack_timeout_ms == 0 {
            return Err(PciError::Config("controller.ack_timeout_ms must be positive".to_string()));
        }
        if self.controller.event_queue == 0 {
            return Err(PciError::Config("controller.event_queue must be positive".to_string()));
        }
        Ok(())
    }

    #[must_use]
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            ack_timeout: Duration::from_millis(self.controller.ack_timeout_ms),
        }
    }

    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// =============================================================================
// TESTS
// =============================================================================
