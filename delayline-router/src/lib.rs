mod queue;
mod route;
mod router;

pub use queue::{Message, QueueError, QueueSnapshot, RouteQueue};
pub use route::{RouteConfig, Target};
pub use router::*;

/// The largest datagram the router will read or forward. Longer datagrams
/// are truncated at receive time.
pub const MAX_DATAGRAM_SIZE: usize = delayline_common::constants::KiB;
