//! Establishes the socket an [`RpcClient`](crate::protocol::rpc::RpcClient) runs over.
//!
//! Stream transports are TCP connections; datagram transports are connected
//! UDP sockets. Both may optionally originate from a reserved port
//! (665..=1023), which many servers demand before they answer MOUNT or NFS
//! calls.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tokio::net::{TcpSocket, TcpStream, UdpSocket};
use tracing::{debug, info};

use crate::{Error, Result};

/// Reserved source ports tried when a privileged port is requested, highest first.
const PRIVILEGED_PORTS: std::ops::RangeInclusive<u16> = 665..=1023;

/// How to reach an RPC endpoint.
#[derive(Clone, Debug)]
pub struct DialOptions {
    /// Use UDP instead of TCP.
    pub datagram: bool,
    /// Upper bound on name resolution plus connection setup.
    pub timeout: Duration,
    /// Bind a reserved source port before connecting.
    pub privileged_port: bool,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self { datagram: false, timeout: Duration::from_secs(3), privileged_port: false }
    }
}

/// An established transport.
#[derive(Debug)]
pub enum Transport {
    Stream(TcpStream),
    Datagram(UdpSocket),
}

/// Resolves `host` and connects to the first address that accepts, giving up
/// after `opts.timeout`.
pub async fn dial(host: &str, port: u16, opts: &DialOptions) -> Result<Transport> {
    let target = format!("{host}:{port}");
    info!(%target, datagram = opts.datagram, "dialing");

    let attempt = async {
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|source| Error::Connect { addr: target.clone(), source })?
            .collect();

        let mut last_err = None;
        for addr in addrs {
            let res = if opts.datagram {
                connect_datagram(addr, opts.privileged_port).await.map(Transport::Datagram)
            } else {
                connect_stream(addr, opts.privileged_port).await.map(Transport::Stream)
            };
            match res {
                Ok(transport) => return Ok(transport),
                Err(source) => {
                    debug!(%addr, %source, "connect attempt failed");
                    last_err = Some(Error::Connect { addr: addr.to_string(), source });
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Connect {
            addr: target.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses"),
        }))
    };

    match tokio::time::timeout(opts.timeout, attempt).await {
        Ok(Ok(transport)) => {
            debug!(%target, "connected");
            Ok(transport)
        }
        Ok(Err(e)) => {
            info!(%target, error = %e, "dial failed");
            Err(e)
        }
        Err(_) => {
            info!(%target, timeout = ?opts.timeout, "dial timed out");
            Err(Error::Timeout { what: format!("connection to {target}") })
        }
    }
}

fn unspecified_for(addr: &SocketAddr) -> IpAddr {
    match addr {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}

fn port_taken(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable)
}

fn no_free_port() -> io::Error {
    io::Error::new(io::ErrorKind::AddrInUse, "no free privileged source port")
}

async fn connect_stream(addr: SocketAddr, privileged: bool) -> io::Result<TcpStream> {
    let stream = if !privileged {
        TcpStream::connect(addr).await?
    } else {
        let local = unspecified_for(&addr);
        let mut found = None;
        for port in PRIVILEGED_PORTS.rev() {
            let socket = if addr.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
            if let Err(e) = socket.bind(SocketAddr::new(local, port)) {
                if port_taken(&e) {
                    continue;
                }
                return Err(e);
            }
            match socket.connect(addr).await {
                Ok(stream) => {
                    found = Some(stream);
                    break;
                }
                Err(e) if port_taken(&e) => continue,
                Err(e) => return Err(e),
            }
        }
        found.ok_or_else(no_free_port)?
    };
    stream.set_nodelay(true)?;
    Ok(stream)
}

async fn connect_datagram(addr: SocketAddr, privileged: bool) -> io::Result<UdpSocket> {
    let local = unspecified_for(&addr);
    let socket = if !privileged {
        UdpSocket::bind(SocketAddr::new(local, 0)).await?
    } else {
        let mut found = None;
        for port in PRIVILEGED_PORTS.rev() {
            match UdpSocket::bind(SocketAddr::new(local, port)).await {
                Ok(socket) => {
                    found = Some(socket);
                    break;
                }
                Err(e) if port_taken(&e) => continue,
                Err(e) => return Err(e),
            }
        }
        found.ok_or_else(no_free_port)?
    };
    socket.connect(addr).await?;
    Ok(socket)
}
