
use serde::{Deserialize, Serialize};
use shared::address::*;
use shared::error::*;
use std::fmt;
use std::net::IpAddr;

/// Represents the type of network.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash, Serialize, Deserialize)]
pub enum NetworkType {
    #[serde(rename = "unspecified")]
    Unspecified,

    /// Indicates UDP over IPv4.
    #[serde(rename = "udp4")]
    Udp4,

    /// Indicates UDP over IPv6.
    #[serde(rename = "udp6")]
    Udp6,
}

impl Default for NetworkType {
    fn default() -> Self {
        Self::Unspecified
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Self::Udp4 => "udp4",
            Self::Udp6 => "udp6",
            Self::Unspecified => "unspecified",
        };
        write!(f, "{s}")
    }
}

impl NetworkType {
    /// Returns the short form of the network type, as it appears in
    /// `a=candidate` lines.
    pub fn network_short(self) -> String {
        match self {
            Self::Udp4 | Self::Udp6 => "udp".to_owned(),
            Self::Unspecified => "Unspecified".to_owned(),
        }
    }

    pub fn is_ipv4(self) -> bool {
        self == Self::Udp4
    }

    pub fn is_ipv6(self) -> bool {
        self == Self::Udp6
    }
}

/// Determines the type of network based on the short network string and an IP address.
pub(crate) fn determine_network_type(network: &str, ip: &IpAddr) -> Result<NetworkType> {
    let ipv4 = ip.is_ipv4();
    if network.to_lowercase().starts_with("udp") {
        if ipv4 {
            return Ok(NetworkType::Udp4);
        }
        return Ok(NetworkType::Udp6);
    }

    Err(Error::Other(format!(
        "{:?}: network {network} {ip}",
        Error::ErrUnknownCandidateType
    )))
}

/// Kind of link a network interface sits on.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AdapterType {
    #[default]
    Unknown,
    Ethernet,
    Wifi,
    Cellular,
    Vpn,
    Loopback,
}

impl fmt::Display for AdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            AdapterType::Unknown => "unknown",
            AdapterType::Ethernet => "ethernet",
            AdapterType::Wifi => "wifi",
            AdapterType::Cellular => "cellular",
            AdapterType::Vpn => "vpn",
            AdapterType::Loopback => "loopback",
        };
        write!(f, "{s}")
    }
}

/// A network interface as reported by the host. Enumerating interfaces is
/// left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub ip: IpAddr,
    pub prefix_length: u32,
    pub adapter_type: AdapterType,
    pub id: u16,
}

impl NetworkInterface {
    pub fn new(name: &str, ip: IpAddr, prefix_length: u32) -> Self {
        Self {
            name: name.to_owned(),
            ip,
            prefix_length,
            adapter_type: if ip.is_loopback() {
                AdapterType::Loopback
            } else {
                AdapterType::Unknown
            },
            id: 0,
        }
    }

    pub fn with_adapter_type(mut self, adapter_type: AdapterType) -> Self {
        self.adapter_type = adapter_type;
        self
    }

    pub fn with_id(mut self, id: u16) -> Self {
        self.id = id;
        self
    }

    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.ip)
    }

    pub fn is_cellular(&self) -> bool {
        self.adapter_type == AdapterType::Cellular
    }

    /// The network prefix, e.g. `192.168.1.0/24`.
    pub fn prefix(&self) -> String {
        format!(
            "{}/{}",
            truncate_ip(&self.ip, self.prefix_length),
            self.prefix_length
        )
    }
}

impl fmt::Display for NetworkInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.prefix(), self.adapter_type)
    }
}
