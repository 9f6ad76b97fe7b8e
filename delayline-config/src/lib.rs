//! Route table loading.
//!
//! A route table is a JSON document listing the router's static routes:
//!
//! ```json
//! {
//!     "description": "earth-mars relay",
//!     "routes": [
//!         {
//!             "name": "echo-10s",
//!             "port_in": 4479,
//!             "target": { "name": "earth-echo", "address": "10.1.1.83", "port": 4478 },
//!             "delay": 10
//!         }
//!     ]
//! }
//! ```
//!
//! `delay` is in whole seconds. Inbound ports must be unique.

use std::{
    collections::HashSet,
    net::{IpAddr, Ipv4Addr},
    path::Path,
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use delayline_router::{RouteConfig, Target};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0:?}")]
    Io(#[from] std::io::Error),
    #[error("Invalid route table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Duplicate inbound port {0}")]
    DuplicatePort(u16),
    #[error("Route {0}: delay must not be negative")]
    NegativeDelay(String),
}

/// An on-disk route table.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteFile {
    /// Free-form description of this deployment.
    #[serde(default)]
    pub description: Option<String>,
    pub routes: Vec<RouteEntry>,
}

/// One route in the table.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteEntry {
    pub name: String,
    /// Inbound UDP port.
    pub port_in: u16,
    /// Local address to bind; defaults to all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    pub target: TargetEntry,
    /// Hold time before forwarding, in whole seconds.
    #[serde(default)]
    pub delay: i64,
}

/// A forwarding destination in the table.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetEntry {
    pub name: String,
    pub address: String,
    pub port: u16,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

impl RouteFile {
    /// Parses a route table from a JSON string and validates it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let file: Self = serde_json::from_str(json)?;
        file.validate()?;
        Ok(file)
    }

    /// Loads and validates a route table from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();

        for route in &self.routes {
            if route.delay < 0 {
                return Err(ConfigError::NegativeDelay(route.name.clone()));
            }

            if route.port_in != 0 && !seen.insert(route.port_in) {
                return Err(ConfigError::DuplicatePort(route.port_in));
            }
        }

        Ok(())
    }

    /// Converts the table into router route configurations.
    pub fn into_routes(self) -> Vec<RouteConfig> {
        self.routes.into_iter().map(RouteEntry::into_route).collect()
    }
}

impl RouteEntry {
    fn into_route(self) -> RouteConfig {
        RouteConfig::new(
            self.name,
            self.port_in,
            Target::new(self.target.name, self.target.address, self.target.port),
        )
        .with_bind_addr(self.bind_address)
        .with_delay(Duration::from_secs(self.delay as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "description": "earth-mars relay",
        "routes": [
            {
                "name": "echo-10s",
                "port_in": 4479,
                "target": { "name": "earth-echo", "address": "10.1.1.83", "port": 4478 },
                "delay": 10
            },
            {
                "name": "mars-alpha",
                "port_in": 4481,
                "target": { "name": "mars-alpha", "address": "10.1.1.193", "port": 4478 }
            }
        ]
    }"#;

    #[test]
    fn parses_sample_table() {
        let file = RouteFile::from_json(SAMPLE).unwrap();
        assert_eq!(file.description.as_deref(), Some("earth-mars relay"));
        assert_eq!(file.routes.len(), 2);

        let routes = file.into_routes();
        assert_eq!(routes[0].name, "echo-10s");
        assert_eq!(routes[0].port_in, 4479);
        assert_eq!(routes[0].delay, Duration::from_secs(10));
        assert_eq!(routes[0].target, Target::new("earth-echo", "10.1.1.83", 4478));

        // Delay defaults to zero, bind address to all interfaces.
        assert_eq!(routes[1].delay, Duration::ZERO);
        assert_eq!(routes[1].bind_addr, default_bind_address());
    }

    #[test]
    fn rejects_duplicate_ports() {
        let json = r#"{
            "routes": [
                { "name": "a", "port_in": 4479,
                  "target": { "name": "t", "address": "10.0.0.1", "port": 1 } },
                { "name": "b", "port_in": 4479,
                  "target": { "name": "t", "address": "10.0.0.2", "port": 2 } }
            ]
        }"#;

        assert!(matches!(
            RouteFile::from_json(json),
            Err(ConfigError::DuplicatePort(4479))
        ));
    }

    #[test]
    fn rejects_negative_delay() {
        let json = r#"{
            "routes": [
                { "name": "backwards", "port_in": 4479, "delay": -5,
                  "target": { "name": "t", "address": "10.0.0.1", "port": 1 } }
            ]
        }"#;

        assert!(matches!(
            RouteFile::from_json(json),
            Err(ConfigError::NegativeDelay(name)) if name == "backwards"
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            RouteFile::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
