#[cfg(test)]
mod addr_test;

use byteorder::{BigEndian, ByteOrder};
use shared::error::*;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::attributes::*;
use crate::message::*;
use crate::xoraddr::XorMappedAddress;

pub(crate) const FAMILY_IPV4: u16 = 0x01;
pub(crate) const FAMILY_IPV6: u16 = 0x02;
pub(crate) const IPV4LEN: usize = 4;
pub(crate) const IPV6LEN: usize = 16;

/// MappedAddress represents MAPPED-ADDRESS attribute.
///
/// This attribute is used only by servers for achieving backwards
/// compatibility with RFC 3489 clients.
///
/// RFC 5389 Section 15.1
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct MappedAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl fmt::Display for MappedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SocketAddr::new(self.ip, self.port))
    }
}

impl Default for MappedAddress {
    fn default() -> Self {
        MappedAddress {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
        }
    }
}

impl From<SocketAddr> for MappedAddress {
    fn from(addr: SocketAddr) -> Self {
        MappedAddress {
            ip: addr.ip(),
            port: addr.port(),
        }
    }
}

impl Setter for MappedAddress {
    /// add_to adds MAPPED-ADDRESS to message.
    fn add_to(&self, m: &mut Message) -> Result<()> {
        self.add_to_as(m, ATTR_MAPPED_ADDRESS)
    }
}

impl Getter for MappedAddress {
    /// get_from decodes MAPPED-ADDRESS from message.
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.get_from_as(m, ATTR_MAPPED_ADDRESS)
    }
}

impl MappedAddress {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// get_from_as decodes MAPPED-ADDRESS value in message m as an attribute of type t.
    pub fn get_from_as(&mut self, m: &Message, t: AttrType) -> Result<()> {
        let v = m.get(t)?;
        if v.len() <= 4 {
            return Err(Error::ErrUnexpectedEof);
        }

        let family = BigEndian::read_u16(&v[0..2]);
        self.port = BigEndian::read_u16(&v[2..4]);
        let addr = &v[4..];

        self.ip = match family {
            FAMILY_IPV4 => {
                if addr.len() != IPV4LEN {
                    return Err(Error::ErrBadIpLength);
                }
                IpAddr::V4(Ipv4Addr::new(addr[0], addr[1], addr[2], addr[3]))
            }
            FAMILY_IPV6 => {
                let mut ip = [0u8; IPV6LEN];
                if addr.len() != IPV6LEN {
                    return Err(Error::ErrBadIpLength);
                }
                ip.copy_from_slice(addr);
                IpAddr::V6(Ipv6Addr::from(ip))
            }
            _ => return Err(Error::ErrUnsupportedFamily(family as u8)),
        };

        Ok(())
    }

    /// add_to_as adds MAPPED-ADDRESS value to m as t attribute.
    pub fn add_to_as(&self, m: &mut Message, t: AttrType) -> Result<()> {
        let (family, ip) = match self.ip {
            IpAddr::V4(ipv4) => (FAMILY_IPV4, ipv4.octets().to_vec()),
            IpAddr::V6(ipv6) => (FAMILY_IPV6, ipv6.octets().to_vec()),
        };

        let mut value = vec![0u8; 4 + ip.len()];
        BigEndian::write_u16(&mut value[0..2], family);
        BigEndian::write_u16(&mut value[2..4], self.port);
        value[4..].copy_from_slice(&ip);
        m.add(t, &value);
        Ok(())
    }
}

/// mapped_address returns the reflexive address carried by a binding
/// response. XOR-MAPPED-ADDRESS wins over MAPPED-ADDRESS when both are present.
pub fn mapped_address(m: &Message) -> Result<SocketAddr> {
    if m.contains(ATTR_XORMAPPED_ADDRESS) {
        let mut addr = XorMappedAddress::default();
        addr.get_from(m)?;
        return Ok(addr.socket_addr());
    }
    let mut addr = MappedAddress::default();
    addr.get_from(m)?;
    Ok(addr.socket_addr())
}
