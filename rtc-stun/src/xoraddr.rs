
use byteorder::{BigEndian, ByteOrder};
use shared::error::*;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::addr::*;
use crate::attributes::*;
use crate::message::*;

/// xor_bytes xors the bytes in a and b into dst, stopping at the shortest
/// of the three. Returns the number of bytes xor'd.
pub fn xor_bytes(dst: &mut [u8], a: &[u8], b: &[u8]) -> usize {
    let n = a.len().min(b.len()).min(dst.len());
    for i in 0..n {
        dst[i] = a[i] ^ b[i];
    }
    n
}

/// XorMappedAddress implements XOR-MAPPED-ADDRESS attribute.
///
/// RFC 5389 Section 15.2
#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub struct XorMappedAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for XorMappedAddress {
    fn default() -> Self {
        XorMappedAddress {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
        }
    }
}

impl fmt::Display for XorMappedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SocketAddr::new(self.ip, self.port))
    }
}

impl From<SocketAddr> for XorMappedAddress {
    fn from(addr: SocketAddr) -> Self {
        XorMappedAddress {
            ip: addr.ip(),
            port: addr.port(),
        }
    }
}

impl Setter for XorMappedAddress {
    /// add_to adds XOR-MAPPED-ADDRESS to m. Can return ErrBadIPLength
    /// if len(a.IP) is invalid.
    fn add_to(&self, m: &mut Message) -> Result<()> {
        self.add_to_as(m, ATTR_XORMAPPED_ADDRESS)
    }
}

impl Getter for XorMappedAddress {
    /// get_from decodes XOR-MAPPED-ADDRESS attribute in message and returns
    /// error if any. While decoding, a.IP is reused if possible and can be
    /// rendered to invalid state (e.g. if a.IP was set to IPv6 and then
    /// IPv4 value were decoded into it), be careful.
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.get_from_as(m, ATTR_XORMAPPED_ADDRESS)
    }
}

impl XorMappedAddress {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// add_to_as adds XOR-MAPPED-ADDRESS value to m as t attribute.
    pub fn add_to_as(&self, m: &mut Message, t: AttrType) -> Result<()> {
        let (family, ip_len, ip) = match self.ip {
            IpAddr::V4(ipv4) => (FAMILY_IPV4, IPV4LEN, ipv4.octets().to_vec()),
            IpAddr::V6(ipv6) => (FAMILY_IPV6, IPV6LEN, ipv6.octets().to_vec()),
        };

        let mut value = [0u8; 4 + IPV6LEN];
        BigEndian::write_u16(&mut value[0..2], family);
        BigEndian::write_u16(&mut value[2..4], self.port ^ (MAGIC_COOKIE >> 16) as u16);
        let mut xor_value = [0u8; IPV6LEN];
        BigEndian::write_u32(&mut xor_value[0..4], MAGIC_COOKIE);
        xor_value[4..].copy_from_slice(&m.transaction_id.0);
        xor_bytes(&mut value[4..4 + ip_len], &ip, &xor_value);
        m.add(t, &value[..4 + ip_len]);
        Ok(())
    }

    /// get_from_as decodes XOR-MAPPED-ADDRESS attribute value in message
    /// getting it as for t type.
    pub fn get_from_as(&mut self, m: &Message, t: AttrType) -> Result<()> {
        let v = m.get(t)?;
        if v.len() <= 4 {
            return Err(Error::ErrUnexpectedEof);
        }

        let family = BigEndian::read_u16(&v[0..2]);
        if family != FAMILY_IPV6 && family != FAMILY_IPV4 {
            return Err(Error::ErrUnsupportedFamily(family as u8));
        }

        let ip_len = if family == FAMILY_IPV4 {
            IPV4LEN
        } else {
            IPV6LEN
        };
        if v[4..].len() != ip_len {
            return Err(Error::ErrBadIpLength);
        }

        self.port = BigEndian::read_u16(&v[2..4]) ^ (MAGIC_COOKIE >> 16) as u16;
        let mut xor_value = [0u8; IPV6LEN];
        BigEndian::write_u32(&mut xor_value[0..4], MAGIC_COOKIE);
        xor_value[4..].copy_from_slice(&m.transaction_id.0);

        let mut ip = [0u8; IPV6LEN];
        xor_bytes(&mut ip[..ip_len], &v[4..], &xor_value);
        self.ip = if family == FAMILY_IPV4 {
            IpAddr::V4(Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3]))
        } else {
            IpAddr::V6(Ipv6Addr::from(ip))
        };

        Ok(())
    }
}
