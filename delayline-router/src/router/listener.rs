use std::{
    io,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::Stream;
use tokio::{io::ReadBuf, net::UdpSocket};

use crate::MAX_DATAGRAM_SIZE;

/// A stream of datagrams from one bound inbound socket.
///
/// Each readiness notification performs exactly one receive call, reading at
/// most [`MAX_DATAGRAM_SIZE`] bytes; longer datagrams arrive truncated. A
/// zero-length receive still yields an (empty) payload — the queue records
/// whatever was received.
///
/// A fatal socket error ends the stream, which deregisters it from the
/// driver's multiplexer without disturbing other routes.
#[derive(Debug)]
pub(crate) struct DatagramStream {
    socket: Arc<UdpSocket>,
    buf: Box<[u8]>,
    /// Set after a fatal socket error; the next poll ends the stream.
    failed: bool,
}

impl DatagramStream {
    pub(crate) fn new(socket: Arc<UdpSocket>) -> Self {
        Self { socket, buf: vec![0u8; MAX_DATAGRAM_SIZE].into_boxed_slice(), failed: false }
    }
}

impl Stream for DatagramStream {
    type Item = io::Result<(Bytes, SocketAddr)>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.failed {
            return Poll::Ready(None);
        }

        let mut buf = ReadBuf::new(&mut this.buf);
        match this.socket.poll_recv_from(cx, &mut buf) {
            Poll::Ready(Ok(from)) => {
                let payload = Bytes::copy_from_slice(buf.filled());
                Poll::Ready(Some(Ok((payload, from))))
            }
            Poll::Ready(Err(e)) => {
                // An unusable socket ends the stream once the error has been
                // surfaced; a bad datagram does not.
                this.failed = is_fatal_recv_error(&e);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Receive errors that indicate the socket itself is unusable rather than a
/// bad datagram. Everything else is transient and servicing continues.
fn is_fatal_recv_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe | io::ErrorKind::InvalidInput
    )
}
