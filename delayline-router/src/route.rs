use std::{
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};

/// A forwarding destination. Immutable once a route is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Human-readable name, used in logs and the monitor display.
    pub name: String,
    /// Destination host. May be a DNS name; resolved once when the router
    /// binds.
    pub host: String,
    /// Destination UDP port.
    pub port: u16,
}

impl Target {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self { name: name.into(), host: host.into(), port }
    }
}

/// Static configuration for one store-and-forward route.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Route name, used in logs and snapshots.
    pub name: String,
    /// Local address the inbound socket binds to.
    pub bind_addr: IpAddr,
    /// Inbound UDP port. Port 0 binds an ephemeral port; the actual port is
    /// reported in [`RouteSnapshot`](crate::RouteSnapshot).
    pub port_in: u16,
    /// Downstream target.
    pub target: Target,
    /// How long a received message is held before it is forwarded.
    pub delay: Duration,
}

impl RouteConfig {
    /// Creates a route listening on all interfaces with no delay.
    pub fn new(name: impl Into<String>, port_in: u16, target: Target) -> Self {
        Self {
            name: name.into(),
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port_in,
            target,
            delay: Duration::ZERO,
        }
    }

    /// Sets the local address the inbound socket binds to.
    pub fn with_bind_addr(mut self, addr: IpAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the hold time before a message is forwarded.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}
