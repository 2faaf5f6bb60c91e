use shared::SocketOption;
use shared::error::Result;

/// Which socket of a transport an option applies to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SocketType {
    Rtp,
    Rtcp,
}

/// The path packets currently take.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct NetworkRoute {
    pub connected: bool,
    pub local_network_id: u16,
    pub remote_network_id: u16,
    pub last_sent_packet_id: i64,
    /// Bytes of IP and transport headers added to every packet.
    pub packet_overhead: usize,
}

/// Transport a channel sends RTP and RTCP over. Only touched on the network
/// context.
pub trait RtpTransport: Send {
    fn transport_name(&self) -> &str;
    fn set_option(&mut self, socket: SocketType, opt: SocketOption, value: i32) -> Result<()>;
    fn get_option(&self, socket: SocketType, opt: SocketOption) -> Option<i32>;
    fn set_rtcp_mux_enabled(&mut self, enabled: bool);
    fn is_rtcp_mux_enabled(&self) -> bool;
    fn is_writable(&self) -> bool;
    fn is_srtp_active(&self) -> bool;
}
