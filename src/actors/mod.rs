use std::io;
use std::net::Ipv4Addr;

use bytes::Bytes;
use thiserror::Error;

pub mod renderer_actor;
pub mod session_actor;
pub mod udp_io_actor;

pub type TransportId = usize;
pub type Notify = tokio::sync::mpsc::UnboundedSender<Message>;

/// Events processed, in arrival order, by the session loop.
#[derive(Debug)]
pub enum Message {
    Start(String, u16),
    Datagram(TransportId, Bytes),
    TransportError(TransportId, TransportError),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind UDP port {0}: {1}")]
    Bind(u16, #[source] io::Error),
    #[error("no IPv4 address found for host {0}")]
    Resolve(String),
    #[error("failed to join multicast group {0}: {1}")]
    Multicast(Ipv4Addr, #[source] io::Error),
    #[error("unknown transport session {0}")]
    UnknownSession(TransportId),
    #[error("transport session {0} is not connected")]
    NotConnected(TransportId),
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

/// Datagram transport used by the session loop. Implementations deliver
/// received datagrams and socket failures through the `notify` channel given
/// at bind time.
pub trait Transport {
    fn bind(&mut self, port: u16, notify: Notify) -> Result<TransportId, TransportError>;

    fn connect(&mut self, id: TransportId, remote_host: &str) -> Result<(), TransportError>;

    fn send(&mut self, id: TransportId, packet: Bytes) -> Result<(), TransportError>;

    fn destroy(&mut self, id: TransportId);
}

/// Consumer of forwarded payloads. Queueing never blocks and never fails.
pub trait Renderer {
    fn queue(&mut self, payload: Bytes, extended_seq: u32);
}

pub trait RendererFactory {
    type Output: Renderer;

    fn create(&mut self) -> Self::Output;
}

impl<F, R> RendererFactory for F
where
    F: FnMut() -> R,
    R: Renderer,
{
    type Output = R;

    fn create(&mut self) -> R {
        self()
    }
}
