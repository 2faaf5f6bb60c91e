//! IP address classification and normalization helpers.
//!
//! Every function here is pure and works on [`std::net::IpAddr`]; IPv4-mapped
//! IPv6 addresses are classified by their IPv6 form unless stated otherwise.

#[cfg(test)]
mod address_test;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Per packet IPv4 header overhead in bytes.
pub const IPV4_HEADER_SIZE: usize = 20;
/// Per packet IPv6 header overhead in bytes.
pub const IPV6_HEADER_SIZE: usize = 40;

/// Address family of an IP address.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddressFamily {
    #[default]
    V4,
    V6,
}

impl AddressFamily {
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => write!(f, "ipv4"),
            AddressFamily::V6 => write!(f, "ipv6"),
        }
    }
}

/// Coarse classification of an address, as reported in gathering statistics.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IpAddressType {
    Any,
    Loopback,
    Private,
    Public,
}

pub fn ip_address_type(ip: &IpAddr) -> IpAddressType {
    if ip_is_any(ip) {
        IpAddressType::Any
    } else if ip_is_loopback(ip) {
        IpAddressType::Loopback
    } else if ip_is_private(ip) {
        IpAddressType::Private
    } else {
        IpAddressType::Public
    }
}

/// 0.0.0.0, :: or ::ffff:0.0.0.0
pub fn ip_is_any(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_unspecified(),
        IpAddr::V6(v6) => v6.is_unspecified() || *v6 == Ipv4Addr::UNSPECIFIED.to_ipv6_mapped(),
    }
}

/// 127.0.0.0/8 or ::1
pub fn ip_is_loopback(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.octets()[0] == 127,
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}

/// 169.254.0.0/16 or fe80::/10
pub fn ip_is_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            o[0] == 169 && o[1] == 254
        }
        IpAddr::V6(v6) => {
            let o = v6.octets();
            o[0] == 0xfe && (o[1] & 0xc0) == 0x80
        }
    }
}

/// RFC 1918 ranges for IPv4, fc00::/7 for IPv6.
pub fn ip_is_private_network(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            o[0] == 10 || (o[0] == 172 && (o[1] & 0xf0) == 16) || (o[0] == 192 && o[1] == 168)
        }
        IpAddr::V6(_) => ip_is_ula(ip),
    }
}

/// 100.64.0.0/10, the carrier-grade NAT range of RFC 6598.
pub fn ip_is_shared_network(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            o[0] == 100 && (o[1] & 0xc0) == 64
        }
        IpAddr::V6(_) => false,
    }
}

/// Any address that is not routable on the public internet.
pub fn ip_is_private(ip: &IpAddr) -> bool {
    ip_is_link_local(ip)
        || ip_is_loopback(ip)
        || ip_is_private_network(ip)
        || ip_is_shared_network(ip)
}

fn v6_octets(ip: &IpAddr) -> Option<[u8; 16]> {
    match ip {
        IpAddr::V4(_) => None,
        IpAddr::V6(v6) => Some(v6.octets()),
    }
}

/// 3ffe::/16
pub fn ip_is_6bone(ip: &IpAddr) -> bool {
    v6_octets(ip).is_some_and(|o| o[0] == 0x3f && o[1] == 0xfe)
}

/// 2002::/16
pub fn ip_is_6to4(ip: &IpAddr) -> bool {
    v6_octets(ip).is_some_and(|o| o[0] == 0x20 && o[1] == 0x02)
}

/// IPv6 interface identifier derived from a MAC address (EUI-64, ff:fe in the middle).
pub fn ip_is_mac_based(ip: &IpAddr) -> bool {
    v6_octets(ip).is_some_and(|o| o[11] == 0xff && o[12] == 0xfe)
}

/// fec0::/10
pub fn ip_is_site_local(ip: &IpAddr) -> bool {
    v6_octets(ip).is_some_and(|o| o[0] == 0xfe && (o[1] & 0xc0) == 0xc0)
}

/// 2001::/32
pub fn ip_is_teredo(ip: &IpAddr) -> bool {
    v6_octets(ip).is_some_and(|o| o[0] == 0x20 && o[1] == 0x01 && o[2] == 0x00 && o[3] == 0x00)
}

/// fc00::/7
pub fn ip_is_ula(ip: &IpAddr) -> bool {
    v6_octets(ip).is_some_and(|o| (o[0] & 0xfe) == 0xfc)
}

/// ::/96, the deprecated IPv4-compatible form.
pub fn ip_is_v4_compatibility(ip: &IpAddr) -> bool {
    v6_octets(ip).is_some_and(|o| o[..12].iter().all(|b| *b == 0))
}

/// ::ffff:0:0/96
pub fn ip_is_v4_mapped(ip: &IpAddr) -> bool {
    v6_octets(ip).is_some_and(|o| o[..10].iter().all(|b| *b == 0) && o[10] == 0xff && o[11] == 0xff)
}

/// Address precedence from the RFC 3484 policy table. Higher is preferred.
pub fn ip_address_precedence(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 30,
        IpAddr::V6(_) => {
            if ip_is_loopback(ip) {
                60
            } else if ip_is_ula(ip) {
                50
            } else if ip_is_v4_mapped(ip) {
                30
            } else if ip_is_6to4(ip) {
                20
            } else if ip_is_teredo(ip) {
                10
            } else if ip_is_v4_compatibility(ip) || ip_is_site_local(ip) || ip_is_6bone(ip) {
                1
            } else {
                40
            }
        }
    }
}

/// Keeps the first `length` bits of `ip` and zeroes the rest.
/// A length beyond the address width returns `ip` unchanged.
pub fn truncate_ip(ip: &IpAddr, length: u32) -> IpAddr {
    match ip {
        IpAddr::V4(v4) => {
            if length >= 32 {
                return *ip;
            }
            let mask = if length == 0 {
                0
            } else {
                u32::MAX << (32 - length)
            };
            IpAddr::V4(Ipv4Addr::from(u32::from(*v4) & mask))
        }
        IpAddr::V6(v6) => {
            if length >= 128 {
                return *ip;
            }
            let mask = if length == 0 {
                0
            } else {
                u128::MAX << (128 - length)
            };
            IpAddr::V6(Ipv6Addr::from(u128::from(*v6) & mask))
        }
    }
}

/// Number of leading one bits in a netmask.
pub fn count_ip_mask_bits(mask: &IpAddr) -> u32 {
    match mask {
        IpAddr::V4(v4) => u32::from(*v4).leading_ones(),
        IpAddr::V6(v6) => u128::from(*v6).leading_ones(),
    }
}

/// Converts an IPv4-mapped IPv6 address back to IPv4.
pub fn normalized(ip: &IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => *ip,
        },
        IpAddr::V4(_) => *ip,
    }
}

/// Converts an IPv4 address to its IPv4-mapped IPv6 form.
pub fn as_ipv6_address(ip: &IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(v4) => IpAddr::V6(v4.to_ipv6_mapped()),
        IpAddr::V6(_) => *ip,
    }
}

pub fn get_loopback_ip(family: AddressFamily) -> IpAddr {
    match family {
        AddressFamily::V4 => IpAddr::V4(Ipv4Addr::LOCALHOST),
        AddressFamily::V6 => IpAddr::V6(Ipv6Addr::LOCALHOST),
    }
}

pub fn get_any_ip(family: AddressFamily) -> IpAddr {
    match family {
        AddressFamily::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        AddressFamily::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}

/// IP header size for the address family.
pub fn ip_overhead(ip: &IpAddr) -> usize {
    match ip {
        IpAddr::V4(_) => IPV4_HEADER_SIZE,
        IpAddr::V6(_) => IPV6_HEADER_SIZE,
    }
}

/// Renders the address with the host part elided, for logging.
pub fn to_sensitive_string(ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            format!("{}.{}.{}.x", o[0], o[1], o[2])
        }
        IpAddr::V6(v6) => {
            let s = v6.segments();
            format!("{:x}:{:x}:{:x}:x:x:x:x:x", s[0], s[1], s[2])
        }
    }
}

/// Whether a socket bound to `local` can talk to `remote`: the families
/// must agree and, for IPv6, both or neither must be link-local.
pub fn is_compatible_address(local: &IpAddr, remote: &IpAddr) -> bool {
    match (local, remote) {
        (IpAddr::V4(_), IpAddr::V4(_)) => true,
        (IpAddr::V6(_), IpAddr::V6(_)) => ip_is_link_local(local) == ip_is_link_local(remote),
        _ => false,
    }
}
