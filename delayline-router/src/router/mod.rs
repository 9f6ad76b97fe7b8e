use std::{
    io,
    net::SocketAddr,
    sync::atomic::AtomicBool,
    time::Duration,
};

use thiserror::Error;

mod driver;
mod listener;
mod socket;
mod stats;

pub use socket::*;
pub use stats::{RouteStats, RouterStats};

use crate::{queue::Message, route::Target, RouteQueue};

/// Default capacity of the event channel to the front-end.
const DEFAULT_EVENT_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("IO error: {0:?}")]
    Io(#[from] io::Error),
    #[error("Failed to bind inbound port {port}: {source}")]
    Bind { port: u16, source: io::Error },
    #[error("Failed to create outbound socket: {0:?}")]
    SocketCreate(io::Error),
    #[error("Could not resolve target {0}")]
    Resolve(String),
    #[error("Duplicate inbound port {0}")]
    DuplicatePort(u16),
    #[error("No routes configured")]
    NoRoutes,
}

/// What to do when an inbound socket fails to bind at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BindPolicy {
    /// Abort startup on the first bind failure.
    #[default]
    FailFast,
    /// Log the failure and carry the route as permanently offline.
    SkipOffline,
}

#[derive(Debug)]
enum Command {
    /// Shut down the driver.
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// How often the scheduler checks queues for matured messages.
    tick_interval: Duration,
    /// Startup behavior when an inbound socket cannot be bound.
    bind_policy: BindPolicy,
    /// Capacity of the event channel to the front-end. Events are dropped
    /// when the front-end lags.
    event_buffer_size: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(250),
            bind_policy: BindPolicy::default(),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl RouterOptions {
    /// Sets the scheduler tick interval.
    pub fn tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Sets the startup behavior for bind failures.
    pub fn bind_policy(mut self, bind_policy: BindPolicy) -> Self {
        self.bind_policy = bind_policy;
        self
    }

    /// Sets the event channel capacity.
    pub fn event_buffer_size(mut self, event_buffer_size: usize) -> Self {
        self.event_buffer_size = event_buffer_size;
        self
    }
}

/// An observation emitted by the router driver. Yielded by the
/// [`Router`]'s `Stream` implementation for the monitor collaborator.
#[derive(Debug, Clone)]
pub enum RouterEvent {
    /// A matured message was forwarded to its target.
    Forwarded {
        route: String,
        target: SocketAddr,
        len: usize,
        /// Wall-clock arrival stamp of the forwarded message, UNIX micros.
        timestamp: u64,
    },
    /// A message was discarded after a failed forward.
    Dropped { route: String, target: SocketAddr, len: usize },
    /// A listener stopped servicing its socket; the route is offline.
    ListenerClosed { route: String, port_in: u16 },
}

/// What a [`DeliveryPolicy`] decides for a message whose forward failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The message is lost.
    Discard,
    /// The message goes back to the head of its queue and is retried on the
    /// next tick.
    Requeue,
}

/// Decides the fate of messages whose forward send failed.
///
/// The router is fire-and-forget by default ([`FireAndForget`]); stricter
/// deployments can plug in a policy that requeues.
pub trait DeliveryPolicy: Send + Sync + 'static {
    fn on_send_error(&self, route: &str, err: &io::Error, msg: &Message) -> Disposition;
}

/// The default policy: a failed forward loses the message.
#[derive(Debug, Default, Clone, Copy)]
pub struct FireAndForget;

impl DeliveryPolicy for FireAndForget {
    fn on_send_error(&self, _route: &str, _err: &io::Error, _msg: &Message) -> Disposition {
        Disposition::Discard
    }
}

/// A read-only view of one route, safe to take while the driver is running.
#[derive(Debug, Clone)]
pub struct RouteSnapshot {
    pub name: String,
    /// The actual bound inbound port.
    pub port_in: u16,
    pub target: Target,
    /// The resolved target address forwards are sent to.
    pub target_addr: SocketAddr,
    pub delay: Duration,
    /// Number of buffered messages.
    pub pending: usize,
    /// Wall-clock stamp of the oldest buffered message, UNIX micros.
    pub head_arrival: Option<u64>,
    /// False once the listener has stopped servicing (bind failure or a
    /// fatal socket error).
    pub online: bool,
    pub received: u64,
    pub forwarded: u64,
    pub dropped: u64,
}

/// A runtime route: one queue plus its static metadata and counters.
#[derive(Debug)]
pub(crate) struct Route {
    pub(crate) name: String,
    pub(crate) port_in: u16,
    pub(crate) target: Target,
    pub(crate) target_addr: SocketAddr,
    pub(crate) delay: Duration,
    pub(crate) queue: RouteQueue,
    pub(crate) stats: RouteStats,
    pub(crate) online: AtomicBool,
}

/// The router state, shared between the driver task and the front-end.
#[derive(Debug, Default)]
pub(crate) struct RouterState {
    pub(crate) stats: RouterStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteConfig;

    #[tokio::test]
    async fn bind_without_routes_fails() {
        let mut router = Router::new(Vec::new());
        assert!(matches!(router.bind().await, Err(RouterError::NoRoutes)));
    }

    #[tokio::test]
    async fn duplicate_ports_are_rejected() {
        let routes = vec![
            RouteConfig::new("a", 47811, Target::new("t", "127.0.0.1", 45000)),
            RouteConfig::new("b", 47811, Target::new("t", "127.0.0.1", 45001)),
        ];

        let mut router = Router::new(routes);
        assert!(matches!(
            router.bind().await,
            Err(RouterError::DuplicatePort(47811))
        ));
    }

    #[tokio::test]
    async fn unresolvable_target_fails_bind() {
        let routes = vec![RouteConfig::new(
            "a",
            0,
            Target::new("nowhere", "definitely-not-a-real-host.invalid", 4478),
        )];

        let mut router = Router::new(routes);
        assert!(matches!(router.bind().await, Err(RouterError::Resolve(_))));
    }

    #[test]
    fn options_builder() {
        let options = RouterOptions::default()
            .tick_interval(Duration::from_millis(10))
            .bind_policy(BindPolicy::SkipOffline)
            .event_buffer_size(16);

        assert_eq!(options.tick_interval, Duration::from_millis(10));
        assert_eq!(options.bind_policy, BindPolicy::SkipOffline);
        assert_eq!(options.event_buffer_size, 16);
    }
}
