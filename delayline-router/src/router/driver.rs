use std::{
    io,
    net::SocketAddr,
    pin::Pin,
    sync::{atomic::Ordering, Arc},
    task::{Context, Poll},
    time::Instant,
};

use bytes::Bytes;
use futures::{Future, StreamExt};
use rustc_hash::FxHashMap;
use tokio::{net::UdpSocket, sync::mpsc, time::Interval};
use tokio_stream::{StreamMap, StreamNotifyClose};
use tracing::{debug, error, trace, warn};

use super::{
    listener::DatagramStream, Command, DeliveryPolicy, Disposition, Route, RouterEvent,
    RouterState,
};
use crate::queue::Message;

/// The router driver task: a single event loop servicing every inbound
/// socket plus the scheduler tick.
pub(crate) struct RouterDriver {
    /// Routes keyed by bound inbound port. Shared with the front-end.
    pub(crate) routes: Arc<FxHashMap<u16, Arc<Route>>>,
    /// Inbound datagram streams keyed by bound inbound port. A stream that
    /// ends is removed from the map; the other routes keep servicing.
    pub(crate) listeners: StreamMap<u16, StreamNotifyClose<DatagramStream>>,
    /// The shared outbound socket used for every forward.
    pub(crate) outbound: UdpSocket,
    /// The scheduler tick.
    pub(crate) tick: Interval,
    /// Router state, shared with the front-end.
    pub(crate) state: Arc<RouterState>,
    /// Commands from the front-end.
    pub(crate) from_socket: mpsc::Receiver<Command>,
    /// Events to the front-end. Dropped when the front-end lags.
    pub(crate) to_socket: mpsc::Sender<RouterEvent>,
    /// Decides the fate of messages whose forward failed.
    pub(crate) policy: Arc<dyn DeliveryPolicy>,
}

impl Future for RouterDriver {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        loop {
            // Commands take priority so shutdown is prompt. A closed channel
            // means the front-end is gone, which is an implicit shutdown.
            match this.from_socket.poll_recv(cx) {
                Poll::Ready(Some(Command::Shutdown)) | Poll::Ready(None) => {
                    debug!(listeners = this.listeners.len(), "shutting down driver");
                    // Deregister every listener before the sockets go away.
                    this.listeners = StreamMap::new();
                    return Poll::Ready(());
                }
                Poll::Pending => {}
            }

            // The scheduler pass.
            if this.tick.poll_tick(cx).is_ready() {
                this.service_queues();
                continue;
            }

            // Inbound datagrams, one receive per readiness event.
            if let Poll::Ready(Some((port, item))) = this.listeners.poll_next_unpin(cx) {
                this.on_readable(port, item);
                continue;
            }

            return Poll::Pending;
        }
    }
}

impl RouterDriver {
    /// Handles one item from a listener stream: a datagram, a receive error,
    /// or the end of the stream.
    fn on_readable(&self, port: u16, item: Option<io::Result<(Bytes, SocketAddr)>>) {
        let route = match self.routes.get(&port) {
            Some(route) => Arc::clone(route),
            None => {
                warn!(port, "datagram on unknown port, ignoring");
                return;
            }
        };

        match item {
            Some(Ok((payload, from))) => {
                trace!(
                    route = route.name.as_str(),
                    %from,
                    len = payload.len(),
                    "received datagram"
                );
                self.state.stats.increment_rx(payload.len());
                route.stats.increment_received();

                // Zero-length datagrams are queued like any other.
                route.queue.enqueue(Message::new(payload));
            }
            Some(Err(e)) => {
                self.state.stats.increment_recv_errors();
                error!(route = route.name.as_str(), err = ?e, "receive error");
            }
            None => {
                // The listener stream ended and the multiplexer dropped it.
                // Other routes are unaffected.
                warn!(route = route.name.as_str(), port, "listener closed, route offline");
                route.online.store(false, Ordering::Relaxed);

                let _ = self.to_socket.try_send(RouterEvent::ListenerClosed {
                    route: route.name.clone(),
                    port_in: port,
                });
            }
        }
    }

    /// One scheduler pass: for every route, drain every matured head message
    /// and forward it. Strict FIFO within a route; no ordering guarantee
    /// across routes.
    fn service_queues(&self) {
        let now = Instant::now();

        for route in self.routes.values() {
            while let Some(msg) = route.queue.pop_ready(now) {
                if !self.forward(route, msg) {
                    // A requeued message ends this route's drain until the
                    // next tick.
                    break;
                }
            }
        }
    }

    /// Forwards one matured message. Returns whether the caller should keep
    /// draining the route's queue.
    fn forward(&self, route: &Arc<Route>, msg: Message) -> bool {
        let len = msg.payload().len();

        match self.outbound.try_send_to(msg.payload(), route.target_addr) {
            Ok(_) => {
                self.state.stats.increment_tx(len);
                route.stats.increment_forwarded();
                trace!(
                    route = route.name.as_str(),
                    target = %route.target_addr,
                    len,
                    "forwarded message"
                );

                let _ = self.to_socket.try_send(RouterEvent::Forwarded {
                    route: route.name.clone(),
                    target: route.target_addr,
                    len,
                    timestamp: msg.timestamp(),
                });

                true
            }
            Err(e) => {
                self.state.stats.increment_send_errors();
                error!(
                    route = route.name.as_str(),
                    target = %route.target_addr,
                    err = ?e,
                    "failed to forward message"
                );

                match self.policy.on_send_error(&route.name, &e, &msg) {
                    Disposition::Requeue => {
                        route.queue.requeue_front(msg);
                        false
                    }
                    Disposition::Discard => {
                        route.stats.increment_dropped();
                        let _ = self.to_socket.try_send(RouterEvent::Dropped {
                            route: route.name.clone(),
                            target: route.target_addr,
                            len,
                        });

                        true
                    }
                }
            }
        }
    }
}
