use shared::error::*;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use stun::DEFAULT_PORT;

/// A configured STUN server. Host names stay unresolved until the port's
/// resolver answers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServerAddress {
    Resolved(SocketAddr),
    Unresolved { host: String, port: u16 },
}

impl ServerAddress {
    pub fn unresolved(host: &str, port: u16) -> Self {
        ServerAddress::Unresolved {
            host: host.to_owned(),
            port,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            ServerAddress::Resolved(addr) => addr.port(),
            ServerAddress::Unresolved { port, .. } => *port,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, ServerAddress::Unresolved { .. })
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            ServerAddress::Resolved(addr) => Some(*addr),
            ServerAddress::Unresolved { .. } => None,
        }
    }
}

impl From<SocketAddr> for ServerAddress {
    fn from(addr: SocketAddr) -> Self {
        ServerAddress::Resolved(addr)
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerAddress::Resolved(addr) => write!(f, "{addr}"),
            ServerAddress::Unresolved { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

/// Parses `host`, `host:port`, `[v6]:port` or any of those with a `stun:`
/// scheme. The port defaults to 3478.
impl FromStr for ServerAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.strip_prefix("stun:").unwrap_or(s);
        if s.is_empty() {
            return Err(Error::ErrInvalidServerAddress);
        }

        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(ServerAddress::Resolved(addr));
        }
        if let Ok(ip) = s.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
            return Ok(ServerAddress::Resolved(SocketAddr::new(ip, DEFAULT_PORT)));
        }

        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>()?),
            None => (s, DEFAULT_PORT),
        };
        if host.is_empty() || host.contains(':') || host.contains('[') {
            return Err(Error::ErrInvalidServerAddress);
        }

        match host.parse::<IpAddr>() {
            Ok(ip) => Ok(ServerAddress::Resolved(SocketAddr::new(ip, port))),
            Err(_) => Ok(ServerAddress::unresolved(host, port)),
        }
    }
}
