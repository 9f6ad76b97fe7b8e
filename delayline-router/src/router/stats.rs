use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the whole router. Shared between the driver task and the
/// front-end.
#[derive(Debug, Default)]
pub struct RouterStats {
    /// Datagrams received across all routes.
    packets_rx: AtomicU64,
    /// Payload bytes received.
    bytes_rx: AtomicU64,
    /// Messages forwarded across all routes.
    packets_tx: AtomicU64,
    /// Payload bytes forwarded.
    bytes_tx: AtomicU64,
    /// Transient receive failures.
    recv_errors: AtomicU64,
    /// Failed forward sends.
    send_errors: AtomicU64,
}

impl RouterStats {
    #[inline]
    pub(crate) fn increment_rx(&self, bytes: usize) {
        self.packets_rx.fetch_add(1, Ordering::Relaxed);
        self.bytes_rx.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_tx(&self, bytes: usize) {
        self.packets_tx.fetch_add(1, Ordering::Relaxed);
        self.bytes_tx.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_recv_errors(&self) {
        self.recv_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_send_errors(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn packets_rx(&self) -> u64 {
        self.packets_rx.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn bytes_rx(&self) -> u64 {
        self.bytes_rx.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn packets_tx(&self) -> u64 {
        self.packets_tx.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn bytes_tx(&self) -> u64 {
        self.bytes_tx.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn recv_errors(&self) -> u64 {
        self.recv_errors.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn send_errors(&self) -> u64 {
        self.send_errors.load(Ordering::Relaxed)
    }
}

/// Per-route counters, surfaced through [`RouteSnapshot`](super::RouteSnapshot).
#[derive(Debug, Default)]
pub struct RouteStats {
    received: AtomicU64,
    forwarded: AtomicU64,
    dropped: AtomicU64,
}

impl RouteStats {
    #[inline]
    pub(crate) fn increment_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
