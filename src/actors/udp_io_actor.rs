use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, info, trace, warn};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::actors::{Message, Notify, Transport, TransportError, TransportId};

/// Largest datagram accepted; longer datagrams are dropped.
pub const MAX_DATAGRAM_LEN: usize = 2048;

struct UdpSession {
    socket: Arc<UdpSocket>,
    local_port: u16,
    notify: Notify,
    rtcp_remote: Option<SocketAddr>,
    reader: Option<JoinHandle<()>>,
}

/// UDP/IPv4 transport. Each bound port is a transport session with its own
/// reader task, spawned once the session is connected to a remote host.
#[derive(Default)]
pub struct UdpTransport {
    sessions: HashMap<TransportId, UdpSession>,
    next_id: TransportId,
}

impl UdpTransport {
    fn session(&mut self, id: TransportId) -> Result<&mut UdpSession, TransportError> {
        self.sessions
            .get_mut(&id)
            .ok_or(TransportError::UnknownSession(id))
    }
}

impl Transport for UdpTransport {
    fn bind(&mut self, port: u16, notify: Notify) -> Result<TransportId, TransportError> {
        let socket = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .map_err(|err| TransportError::Bind(port, err))?;
        socket
            .set_nonblocking(true)
            .map_err(|err| TransportError::Bind(port, err))?;
        let socket = UdpSocket::from_std(socket).map_err(|err| TransportError::Bind(port, err))?;
        let local_port = socket.local_addr()?.port();

        self.next_id += 1;
        let id = self.next_id;
        info!(target: "UDPIO Actor", "Session {} listening on port {}", id, local_port);

        self.sessions.insert(
            id,
            UdpSession {
                socket: Arc::new(socket),
                local_port,
                notify,
                rtcp_remote: None,
                reader: None,
            },
        );
        Ok(id)
    }

    fn connect(&mut self, id: TransportId, remote_host: &str) -> Result<(), TransportError> {
        let session = self.session(id)?;
        let remote_ip = resolve_ipv4(remote_host)?;

        let source_filter = if remote_ip.is_multicast() {
            session
                .socket
                .join_multicast_v4(remote_ip, Ipv4Addr::UNSPECIFIED)
                .map_err(|err| TransportError::Multicast(remote_ip, err))?;
            info!(target: "UDPIO Actor", "Session {} joined multicast group {}", id, remote_ip);
            None
        } else {
            Some(IpAddr::V4(remote_ip))
        };

        let rtcp_remote = SocketAddr::new(IpAddr::V4(remote_ip), session.local_port.wrapping_add(1));
        session.rtcp_remote = Some(rtcp_remote);

        if let Some(reader) = session.reader.take() {
            reader.abort();
        }
        session.reader = Some(tokio::spawn(read_datagrams(
            id,
            session.socket.clone(),
            source_filter,
            session.notify.clone(),
        )));

        debug!(target: "UDPIO Actor", "Session {} connected, reports go to {}", id, rtcp_remote);
        Ok(())
    }

    fn send(&mut self, id: TransportId, packet: Bytes) -> Result<(), TransportError> {
        let session = self.session(id)?;
        let remote = session.rtcp_remote.ok_or(TransportError::NotConnected(id))?;

        session.socket.try_send_to(&packet, remote)?;
        trace!(target: "UDPIO Actor", "Sent {} bytes to {}", packet.len(), remote);
        Ok(())
    }

    fn destroy(&mut self, id: TransportId) {
        if let Some(session) = self.sessions.remove(&id) {
            if let Some(reader) = session.reader {
                reader.abort();
            }
            debug!(target: "UDPIO Actor", "Session {} destroyed", id);
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        for session in self.sessions.values() {
            if let Some(reader) = &session.reader {
                reader.abort();
            }
        }
    }
}

fn resolve_ipv4(host: &str) -> Result<Ipv4Addr, TransportError> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(ip);
    }

    (host, 0)
        .to_socket_addrs()
        .map_err(|_| TransportError::Resolve(host.to_string()))?
        .find_map(|addr| match addr.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| TransportError::Resolve(host.to_string()))
}

async fn read_datagrams(
    id: TransportId,
    socket: Arc<UdpSocket>,
    source_filter: Option<IpAddr>,
    notify: Notify,
) {
    // One spare byte tells an oversized datagram from one that fits exactly
    let mut buffer = [0u8; MAX_DATAGRAM_LEN + 1];
    loop {
        match socket.recv_from(&mut buffer).await {
            Ok((bytes_read, remote)) => {
                if source_filter.is_some_and(|ip| ip != remote.ip()) {
                    trace!(target: "UDPIO Actor", "Ignoring datagram from {}", remote);
                    continue;
                }
                if bytes_read > MAX_DATAGRAM_LEN {
                    debug!(target: "UDPIO Actor", "Dropping datagram over {} bytes from {}", MAX_DATAGRAM_LEN, remote);
                    continue;
                }
                let datagram = Bytes::copy_from_slice(&buffer[..bytes_read]);
                if notify.send(Message::Datagram(id, datagram)).is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!(target: "UDPIO Actor", "Session {} read failed with error: {}", id, err);
                let _ = notify.send(Message::TransportError(id, TransportError::Io(err)));
                break;
            }
        }
    }

    debug!(target: "UDPIO Actor", "Reader for session {} finished", id);
}
