
pub mod candidate_host;
pub mod candidate_peer_reflexive;
pub mod candidate_relay;
pub mod candidate_server_reflexive;

use crc::{CRC_32_ISCSI, Crc};
use serde::{Deserialize, Serialize};
use shared::error::*;
use shared::util::generate_crypto_random_string;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::candidate::candidate_host::CandidateHostConfig;
use crate::candidate::candidate_peer_reflexive::CandidatePeerReflexiveConfig;
use crate::candidate::candidate_relay::CandidateRelayConfig;
use crate::candidate::candidate_server_reflexive::CandidateServerReflexiveConfig;
use crate::network::{NetworkType, determine_network_type};

pub(crate) const DEFAULT_LOCAL_PREFERENCE: u16 = 65535;

const CANDIDATE_ID_RUNES: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789/+";
const CANDIDATE_ID_LEN: usize = 32;

/// Indicates that the candidate is used for RTP.
pub const COMPONENT_RTP: u16 = 1;
/// Indicates that the candidate is used for RTCP.
pub const COMPONENT_RTCP: u16 = 2;

/// Represents the type of candidate `CandidateType` enum.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateType {
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,
    #[serde(rename = "host")]
    Host,
    #[serde(rename = "srflx")]
    ServerReflexive,
    #[serde(rename = "prflx")]
    PeerReflexive,
    #[serde(rename = "relay")]
    Relay,
}

// String makes CandidateType printable
impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            CandidateType::Host => "host",
            CandidateType::ServerReflexive => "srflx",
            CandidateType::PeerReflexive => "prflx",
            CandidateType::Relay => "relay",
            CandidateType::Unspecified => "Unknown candidate type",
        };
        write!(f, "{s}")
    }
}

impl CandidateType {
    /// Returns the preference weight of a `CandidateType`.
    ///
    /// 4.1.2.2.  Guidelines for Choosing Type and Local Preferences
    /// The RECOMMENDED values are 126 for host candidates, 100
    /// for server reflexive candidates, 110 for peer reflexive candidates,
    /// and 0 for relayed candidates.
    #[must_use]
    pub const fn preference(self) -> u16 {
        match self {
            Self::Host => 126,
            Self::PeerReflexive => 110,
            Self::ServerReflexive => 100,
            Self::Relay | CandidateType::Unspecified => 0,
        }
    }
}

/// Convey transport addresses related to the candidate, useful for diagnostics and other purposes.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct CandidateRelatedAddress {
    pub address: String,
    pub port: u16,
}

// String makes CandidateRelatedAddress printable
impl fmt::Display for CandidateRelatedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " related {}:{}", self.address, self.port)
    }
}

/// Fields shared by every candidate builder.
#[derive(Default, Debug, Clone)]
pub struct CandidateConfig {
    pub candidate_id: String,
    /// Short network name, `udp`.
    pub network: String,
    pub address: String,
    pub port: u16,
    pub component: u16,
    pub priority: u32,
    pub foundation: String,
    /// Local socket address the candidate was obtained from. Defaults to
    /// `address:port` when the address is an IP literal.
    pub base_address: Option<SocketAddr>,
    /// Name of the network interface the candidate belongs to.
    pub network_name: String,
    pub network_id: u16,
    pub generation: u32,
}

/// Candidate is one transport address usable for media, together with how it
/// was learned.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub(crate) id: String,
    pub(crate) network_name: String,
    pub(crate) network_type: NetworkType,
    pub(crate) candidate_type: CandidateType,

    pub(crate) component: u16,
    pub(crate) address: String,
    pub(crate) port: u16,
    pub(crate) base_address: SocketAddr,
    pub(crate) related_address: Option<CandidateRelatedAddress>,

    pub(crate) resolved_addr: SocketAddr,

    pub(crate) foundation_override: String,
    pub(crate) priority_override: u32,

    pub(crate) generation: u32,
    pub(crate) network_id: u16,
    pub(crate) url: String,
}

impl Default for Candidate {
    fn default() -> Self {
        let unspecified = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);
        Self {
            id: String::new(),
            network_name: String::new(),
            network_type: NetworkType::Unspecified,
            candidate_type: CandidateType::default(),

            component: 0,
            address: String::new(),
            port: 0,
            base_address: unspecified,
            related_address: None,

            resolved_addr: unspecified,

            foundation_override: String::new(),
            priority_override: 0,

            generation: 0,
            network_id: 0,
            url: String::new(),
        }
    }
}

// String makes the candidate printable
impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(related_address) = self.related_address() {
            write!(
                f,
                "{} {} {}:{}{}",
                self.network_type(),
                self.candidate_type(),
                self.address(),
                self.port(),
                related_address,
            )
        } else {
            write!(
                f,
                "{} {} {}:{}",
                self.network_type(),
                self.candidate_type(),
                self.address(),
                self.port(),
            )
        }
    }
}

impl Candidate {
    /// Candidates of the same type, base and protocol share a foundation.
    pub fn foundation(&self) -> String {
        if !self.foundation_override.is_empty() {
            return self.foundation_override.clone();
        }

        let mut buf = vec![];
        buf.extend_from_slice(self.candidate_type().to_string().as_bytes());
        buf.extend_from_slice(self.base_address.ip().to_string().as_bytes());
        buf.extend_from_slice(self.network_type().network_short().as_bytes());

        let checksum = Crc::<u32>::new(&CRC_32_ISCSI).checksum(&buf);

        format!("{checksum}")
    }

    /// Returns Candidate ID.
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns candidate component.
    pub fn component(&self) -> u16 {
        self.component
    }

    /// Sets candidate component.
    pub fn set_component(&mut self, component: u16) {
        self.component = component;
    }

    /// Returns candidate NetworkType.
    pub fn network_type(&self) -> NetworkType {
        self.network_type
    }

    /// Name of the network interface the candidate was gathered on.
    pub fn network_name(&self) -> &str {
        self.network_name.as_str()
    }

    pub fn network_id(&self) -> u16 {
        self.network_id
    }

    /// Returns Candidate Address. Either an IP literal or an mDNS name.
    pub fn address(&self) -> &str {
        self.address.as_str()
    }

    /// Returns Candidate Port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Local socket address the candidate was obtained from.
    pub fn base_address(&self) -> SocketAddr {
        self.base_address
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// The STUN/TURN server url a reflexive or relayed candidate was learned from.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Computes the priority for this ICE Candidate.
    pub fn priority(&self) -> u32 {
        if self.priority_override != 0 {
            return self.priority_override;
        }

        // The local preference MUST be an integer from 0 (lowest preference) to
        // 65535 (highest preference) inclusive.  When there is only a single IP
        // address, this value SHOULD be set to 65535.
        (1 << 24) * u32::from(self.candidate_type().preference())
            + (1 << 8) * u32::from(self.local_preference())
            + (256 - u32::from(self.component()))
    }

    /// Returns the local preference for this candidate.
    pub fn local_preference(&self) -> u16 {
        DEFAULT_LOCAL_PREFERENCE
    }

    /// Returns `Option<CandidateRelatedAddress>`.
    pub fn related_address(&self) -> Option<CandidateRelatedAddress> {
        self.related_address.as_ref().cloned()
    }

    /// Returns candidate type.
    pub fn candidate_type(&self) -> CandidateType {
        self.candidate_type
    }

    /// Returns the string representation of the ICECandidate.
    pub fn marshal(&self) -> String {
        let mut val = format!(
            "{} {} {} {} {} {} typ {}",
            self.foundation(),
            self.component(),
            self.network_type().network_short(),
            self.priority(),
            self.address(),
            self.port(),
            self.candidate_type()
        );

        if let Some(related_address) = self.related_address() {
            val += format!(
                " raddr {} rport {}",
                related_address.address, related_address.port,
            )
            .as_str();
        }

        if self.generation != 0 {
            val += format!(" generation {}", self.generation).as_str();
        }

        val
    }

    /// The transport address of the candidate. For mDNS host candidates this
    /// is the base address the name stands for.
    pub fn addr(&self) -> SocketAddr {
        self.resolved_addr
    }

    /// Used to compare two candidates.
    pub fn equal(&self, other: &Candidate) -> bool {
        self.network_type() == other.network_type()
            && self.candidate_type() == other.candidate_type()
            && self.address() == other.address()
            && self.port() == other.port()
            && self.related_address() == other.related_address()
    }

    pub(crate) fn set_ip(&mut self, ip: &IpAddr) -> Result<()> {
        let network_type = determine_network_type(&self.network_type.network_short(), ip)?;

        self.network_type = network_type;
        self.resolved_addr = SocketAddr::new(*ip, self.port);

        Ok(())
    }
}

impl CandidateConfig {
    /// Fills the fields shared by every candidate type. The address is parsed
    /// unless it is an mDNS name.
    pub(crate) fn new_candidate(self, candidate_type: CandidateType) -> Result<Candidate> {
        let mut candidate_id = self.candidate_id;
        if candidate_id.is_empty() {
            candidate_id = generate_candidate_id();
        }

        let ip: Option<IpAddr> = if self.address.ends_with(".local") {
            None
        } else {
            Some(self.address.parse()?)
        };

        let base_address = match (self.base_address, ip) {
            (Some(base_address), _) => base_address,
            (None, Some(ip)) => SocketAddr::new(ip, self.port),
            (None, None) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port),
        };

        let network = if self.network.is_empty() {
            "udp".to_owned()
        } else {
            self.network
        };
        let network_type = determine_network_type(&network, &ip.unwrap_or(base_address.ip()))?;

        let mut c = Candidate {
            id: candidate_id,
            network_name: self.network_name,
            network_type,
            candidate_type,
            component: self.component,
            address: self.address,
            port: self.port,
            base_address,
            resolved_addr: base_address,
            foundation_override: self.foundation,
            priority_override: self.priority,
            generation: self.generation,
            network_id: self.network_id,
            ..Candidate::default()
        };

        if let Some(ip) = ip {
            c.set_ip(&ip)?;
        }

        Ok(c)
    }
}

/// Creates a Candidate from its string representation.
pub fn unmarshal_candidate(raw: &str) -> Result<Candidate> {
    let split: Vec<&str> = raw.split_whitespace().collect();
    if split.len() < 8 {
        return Err(Error::Other(format!(
            "{:?} ({})",
            Error::ErrAttributeTooShortIceCandidate,
            split.len()
        )));
    }

    // Foundation
    let foundation = split[0].to_owned();

    // Component
    let component: u16 = split[1].parse()?;

    // Network
    let network = split[2].to_owned();

    // Priority
    let priority: u32 = split[3].parse()?;

    // Address
    let address = split[4].to_owned();

    // Port
    let port: u16 = split[5].parse()?;

    let typ = split[7];

    let mut rel_addr = String::new();
    let mut rel_port = 0;
    let mut generation = 0;

    let mut rest = &split[8..];
    while !rest.is_empty() {
        match rest[0] {
            "raddr" => {
                if rest.len() < 4 || rest[2] != "rport" {
                    return Err(Error::Other(format!(
                        "{:?}: incorrect length",
                        Error::ErrParseRelatedAddr
                    )));
                }
                rest[1].clone_into(&mut rel_addr);
                rel_port = rest[3].parse()?;
                rest = &rest[4..];
            }
            "generation" if rest.len() >= 2 => {
                generation = rest[1].parse()?;
                rest = &rest[2..];
            }
            // Unknown extension attributes come in name/value pairs.
            _ => rest = &rest[rest.len().min(2)..],
        }
    }

    let base_config = CandidateConfig {
        network,
        address,
        port,
        component,
        priority,
        foundation,
        generation,
        ..CandidateConfig::default()
    };

    match typ {
        "host" => CandidateHostConfig { base_config }.new_candidate_host(),
        "srflx" => CandidateServerReflexiveConfig {
            base_config,
            rel_addr,
            rel_port,
            url: String::new(),
        }
        .new_candidate_server_reflexive(),
        "prflx" => CandidatePeerReflexiveConfig {
            base_config,
            rel_addr,
            rel_port,
        }
        .new_candidate_peer_reflexive(),
        "relay" => CandidateRelayConfig {
            base_config,
            rel_addr,
            rel_port,
            url: String::new(),
        }
        .new_candidate_relay(),
        _ => Err(Error::Other(format!(
            "{:?} ({})",
            Error::ErrUnknownCandidateType,
            typ
        ))),
    }
}

/// Random id of the form `candidate:<ice-chars>`, used when none is configured.
pub(crate) fn generate_candidate_id() -> String {
    format!(
        "candidate:{}",
        generate_crypto_random_string(CANDIDATE_ID_LEN, CANDIDATE_ID_RUNES)
    )
}
