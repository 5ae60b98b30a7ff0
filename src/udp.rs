//! Non-blocking UDP endpoint and `udp://[host]:port` URI parsing.
//!
//! Grounded on `input::url::Aes67Url::parse` (host/port splitting) and
//! `input::stream::create_multicast_socket` (bind + `join_multicast_v4`
//! + `set_nonblocking`), simplified: the DAB+ back-channel needs no
//! query-string parameters, just an optional multicast group before the
//! port.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Socket, Type};

use crate::error::UdpError;

pub const MAX_DATAGRAM_SIZE: usize = 1500;

/// A parsed `udp://[host:]port` endpoint description.
///
/// `host` is `None` for "bind to all interfaces, no multicast join".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpUri {
    pub host: Option<String>,
    pub port: u16,
}

impl UdpUri {
    pub fn parse(s: &str) -> Result<Self, UdpError> {
        let rest = s
            .strip_prefix("udp://")
            .ok_or_else(|| UdpError::BadUri(s.to_string(), "missing udp:// scheme".into()))?;

        match rest.rsplit_once(':') {
            Some((host, port_str)) => {
                let port: u16 = port_str
                    .parse()
                    .map_err(|_| UdpError::BadUri(s.to_string(), "invalid port".into()))?;
                let host = if host.is_empty() { None } else { Some(host.to_string()) };
                Ok(UdpUri { host, port })
            }
            None => {
                let port: u16 = rest
                    .parse()
                    .map_err(|_| UdpError::BadUri(s.to_string(), "invalid port".into()))?;
                Ok(UdpUri { host: None, port })
            }
        }
    }
}

impl Default for UdpUri {
    fn default() -> Self {
        UdpUri { host: None, port: 0 }
    }
}

/// A single non-blocking UDP socket, optionally joined to a multicast group.
pub struct UdpEndpoint {
    socket: UdpSocket,
    recv_buf: [u8; MAX_DATAGRAM_SIZE],
}

impl UdpEndpoint {
    pub fn bind(uri: &UdpUri) -> Result<Self, UdpError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
        socket.set_reuse_address(true)?;
        let bind_addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, uri.port).into();
        socket.bind(&bind_addr.into())?;

        if let Some(host) = &uri.host {
            let group: Ipv4Addr = host
                .parse()
                .map_err(|_| UdpError::BadUri(host.clone(), "not an IPv4 multicast address".into()))?;
            socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
        }

        socket.set_nonblocking(true)?;
        let socket: UdpSocket = socket.into();
        Ok(UdpEndpoint { socket, recv_buf: [0u8; MAX_DATAGRAM_SIZE] })
    }

    /// Returns an empty vec (never an error) when nothing is pending.
    pub fn recv(&mut self) -> Result<Option<(Vec<u8>, SocketAddr)>, UdpError> {
        match self.socket.recv_from(&mut self.recv_buf) {
            Ok((n, addr)) => Ok(Some((self.recv_buf[..n].to_vec(), addr))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(UdpError::Io(e)),
        }
    }

    pub fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<(), UdpError> {
        self.socket.send_to(buf, addr)?;
        Ok(())
    }

    pub fn set_read_timeout(&self, dur: Option<Duration>) -> Result<(), UdpError> {
        self.socket.set_read_timeout(dur)?;
        Ok(())
    }
}
