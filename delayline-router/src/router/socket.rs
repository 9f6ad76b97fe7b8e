use std::{
    net::{Ipv4Addr, SocketAddr},
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::{Context, Poll},
};

use futures::Stream;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::{
    net::{lookup_host, UdpSocket},
    sync::mpsc,
    task::JoinHandle,
    time,
};
use tokio_stream::{StreamMap, StreamNotifyClose};
use tracing::{info, warn};

use super::{
    driver::RouterDriver, listener::DatagramStream, stats::RouteStats, BindPolicy, Command,
    DeliveryPolicy, FireAndForget, Route, RouteSnapshot, RouterError, RouterEvent, RouterOptions,
    RouterState,
};
use crate::{
    queue::RouteQueue,
    route::{RouteConfig, Target},
};

/// The store-and-forward router front-end.
///
/// Owns the set of routes, binds one inbound socket per route and spawns a
/// single driver task servicing them all. Implements [`Stream`], yielding
/// [`RouterEvent`]s as messages are forwarded or dropped.
pub struct Router {
    /// The router options, shared with the driver.
    options: RouterOptions,
    /// Route configurations, consumed by `bind`.
    configs: Vec<RouteConfig>,
    /// Runtime routes keyed by bound inbound port. Populated by `bind` and
    /// never mutated afterwards.
    routes: Arc<FxHashMap<u16, Arc<Route>>>,
    /// The router state, shared with the driver.
    state: Arc<RouterState>,
    /// Events from the driver.
    from_driver: Option<mpsc::Receiver<RouterEvent>>,
    /// Commands to the driver.
    to_driver: Option<mpsc::Sender<Command>>,
    /// Decides the fate of messages whose forward failed.
    policy: Arc<dyn DeliveryPolicy>,
    /// Internal task representing the running [`RouterDriver`].
    driver_task: Option<JoinHandle<()>>,
}

impl Router {
    /// Creates a router over the given routes with the default
    /// [`RouterOptions`].
    pub fn new(routes: Vec<RouteConfig>) -> Self {
        Self::with_options(routes, RouterOptions::default())
    }

    /// Sets the options for this router.
    pub fn with_options(routes: Vec<RouteConfig>, options: RouterOptions) -> Self {
        Self {
            options,
            configs: routes,
            routes: Arc::new(FxHashMap::default()),
            state: Arc::new(RouterState::default()),
            from_driver: None,
            to_driver: None,
            policy: Arc::new(FireAndForget),
            driver_task: None,
        }
    }

    /// Sets the delivery policy consulted when a forward send fails.
    pub fn with_delivery_policy<P: DeliveryPolicy>(mut self, policy: P) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Resolves every target, binds every route's inbound socket according
    /// to the bind policy and spawns the driver task.
    pub async fn bind(&mut self) -> Result<(), RouterError> {
        if self.configs.is_empty() {
            return Err(RouterError::NoRoutes);
        }

        // Configured ports must be unique before any socket is touched.
        let mut seen = FxHashSet::default();
        for cfg in &self.configs {
            if cfg.port_in != 0 && !seen.insert(cfg.port_in) {
                return Err(RouterError::DuplicatePort(cfg.port_in));
            }
        }

        let mut routes = FxHashMap::default();
        let mut listeners = StreamMap::with_capacity(self.configs.len());

        for cfg in std::mem::take(&mut self.configs) {
            let target_addr = resolve(&cfg.target).await?;

            let (socket, port, online) = match UdpSocket::bind((cfg.bind_addr, cfg.port_in)).await
            {
                Ok(socket) => {
                    let port = socket.local_addr()?.port();
                    (Some(Arc::new(socket)), port, true)
                }
                Err(e) => match self.options.bind_policy {
                    BindPolicy::FailFast => {
                        return Err(RouterError::Bind { port: cfg.port_in, source: e });
                    }
                    BindPolicy::SkipOffline => {
                        warn!(
                            route = cfg.name.as_str(),
                            port = cfg.port_in,
                            err = ?e,
                            "failed to bind, route is offline"
                        );
                        (None, cfg.port_in, false)
                    }
                },
            };

            let route = Arc::new(Route {
                name: cfg.name,
                port_in: port,
                target: cfg.target,
                target_addr,
                delay: cfg.delay,
                queue: RouteQueue::new(cfg.delay),
                stats: RouteStats::default(),
                online: AtomicBool::new(online),
            });

            if routes.insert(port, Arc::clone(&route)).is_some() {
                return Err(RouterError::DuplicatePort(port));
            }

            if let Some(socket) = socket {
                info!(
                    route = route.name.as_str(),
                    port,
                    target = %route.target_addr,
                    delay = ?route.delay,
                    "route listening"
                );
                listeners.insert(port, StreamNotifyClose::new(DatagramStream::new(socket)));
            }
        }

        let outbound = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(RouterError::SocketCreate)?;

        let (to_socket, from_driver) = mpsc::channel(self.options.event_buffer_size);
        let (to_driver, from_socket) = mpsc::channel(16);

        let routes = Arc::new(routes);
        self.routes = Arc::clone(&routes);

        let driver = RouterDriver {
            routes,
            listeners,
            outbound,
            tick: time::interval(self.options.tick_interval),
            state: Arc::clone(&self.state),
            from_socket,
            to_socket,
            policy: Arc::clone(&self.policy),
        };

        self.driver_task = Some(tokio::spawn(driver));
        self.from_driver = Some(from_driver);
        self.to_driver = Some(to_driver);

        Ok(())
    }

    /// Stops the driver: every listener is deregistered from the
    /// multiplexer and the scheduler tick is cancelled before the sockets
    /// are released. Buffered messages are not flushed.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.to_driver.take() {
            let _ = tx.send(Command::Shutdown).await;
        }

        if let Some(task) = self.driver_task.take() {
            let _ = task.await;
        }
    }

    /// Returns a read-only snapshot of every route, ordered by inbound
    /// port. Safe to call while the driver is running; each route's pending
    /// count and head stamp are read under a single lock.
    pub fn routes(&self) -> Vec<RouteSnapshot> {
        let mut snapshots: Vec<_> = self
            .routes
            .values()
            .map(|route| {
                let queue = route.queue.snapshot();

                RouteSnapshot {
                    name: route.name.clone(),
                    port_in: route.port_in,
                    target: route.target.clone(),
                    target_addr: route.target_addr,
                    delay: route.delay,
                    pending: queue.pending,
                    head_arrival: queue.head_arrival,
                    online: route.online.load(Ordering::Relaxed),
                    received: route.stats.received(),
                    forwarded: route.stats.forwarded(),
                    dropped: route.stats.dropped(),
                }
            })
            .collect();

        snapshots.sort_by_key(|s| s.port_in);
        snapshots
    }

    /// Returns the statistics for this router.
    pub fn stats(&self) -> &super::RouterStats {
        &self.state.stats
    }
}

impl Stream for Router {
    type Item = RouterEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut()
            .from_driver
            .as_mut()
            .expect("Router not bound")
            .poll_recv(cx)
    }
}

async fn resolve(target: &Target) -> Result<SocketAddr, RouterError> {
    let endpoint = format!("{}:{}", target.host, target.port);

    lookup_host((target.host.as_str(), target.port))
        .await
        .map_err(|_| RouterError::Resolve(endpoint.clone()))?
        .next()
        .ok_or(RouterError::Resolve(endpoint))
}
