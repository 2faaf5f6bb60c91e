use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Instant;

/// Type of transport protocol, either UDP or TCP
#[derive(
    Default, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum TransportProtocol {
    /// UDP
    #[default]
    #[serde(rename = "udp")]
    UDP,
    /// TCP
    #[serde(rename = "tcp")]
    TCP,
}

impl fmt::Display for TransportProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            TransportProtocol::UDP => "udp",
            TransportProtocol::TCP => "tcp",
        };
        write!(f, "{s}")
    }
}

/// Transport Context with local address, peer address and protocol
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportContext {
    /// Local socket address, either IPv4 or IPv6
    pub local_addr: SocketAddr,
    /// Peer socket address, either IPv4 or IPv6
    pub peer_addr: SocketAddr,
    /// Type of transport protocol, either UDP or TCP
    pub transport_protocol: TransportProtocol,
}

impl Default for TransportContext {
    fn default() -> Self {
        let unspecified = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0);
        Self {
            local_addr: unspecified,
            peer_addr: unspecified,
            transport_protocol: TransportProtocol::UDP,
        }
    }
}

/// A generic transmit with [TransportContext]
#[derive(Debug, Clone)]
pub struct TransportMessage<T> {
    /// Received/Sent time
    pub now: Instant,
    /// A transport context with [local_addr](TransportContext::local_addr) and [peer_addr](TransportContext::peer_addr)
    pub transport: TransportContext,
    /// Message body with generic type
    pub message: T,
}

/// BytesMut type transmit with [TransportContext]
pub type TaggedBytesMut = TransportMessage<BytesMut>;

/// Socket level options a port or channel may carry over to the socket it
/// sends on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SocketOption {
    DontFragment,
    RcvBuf,
    SndBuf,
    NoDelay,
    Ipv6V6Only,
    Dscp,
    RtpSendTimeExtnId,
    SendEcn,
    RecvEcn,
}

impl fmt::Display for SocketOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            SocketOption::DontFragment => "dont-fragment",
            SocketOption::RcvBuf => "rcvbuf",
            SocketOption::SndBuf => "sndbuf",
            SocketOption::NoDelay => "nodelay",
            SocketOption::Ipv6V6Only => "ipv6-v6only",
            SocketOption::Dscp => "dscp",
            SocketOption::RtpSendTimeExtnId => "rtp-sendtime-extn-id",
            SocketOption::SendEcn => "send-ecn",
            SocketOption::RecvEcn => "recv-ecn",
        };
        write!(f, "{s}")
    }
}
