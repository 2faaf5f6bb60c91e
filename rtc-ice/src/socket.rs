//! Seams to the socket layer. Ports never perform I/O themselves; they talk
//! to these traits and are fed completions (bind done, name resolved) through
//! their `handle_*` methods.

use shared::SocketOption;
use shared::address::AddressFamily;
use shared::error::Result;
use std::net::SocketAddr;

/// A UDP socket owned by a port.
pub trait PacketSocket: Send {
    /// The bound local address, `None` while binding is still in progress.
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Sends one datagram, returning the number of bytes written.
    fn send_to(&mut self, buf: &[u8], target: SocketAddr) -> Result<usize>;

    fn set_option(&mut self, opt: SocketOption, value: i32) -> Result<()>;

    fn get_option(&self, opt: SocketOption) -> Result<i32>;
}

/// Asynchronous host name resolution. The answer is delivered back to the
/// requesting port with `handle_resolve_result`.
pub trait AddressResolver: Send {
    fn resolve(&mut self, host: &str, port: u16, family: AddressFamily);
}

/// Creates sockets and resolvers for the gatherer.
pub trait PacketSocketFactory {
    /// Binds a UDP socket on `local` with a port picked from
    /// `min_port..=max_port`; both zero means any port.
    fn create_udp_socket(
        &mut self,
        local: SocketAddr,
        min_port: u16,
        max_port: u16,
    ) -> Result<Box<dyn PacketSocket>>;

    fn create_resolver(&mut self) -> Box<dyn AddressResolver>;
}
