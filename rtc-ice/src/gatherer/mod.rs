
use log::{debug, info, warn};
use sansio::Protocol;
use shared::address::*;
use shared::error::*;
use shared::{SocketOption, TaggedBytesMut};
use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use crate::candidate::{COMPONENT_RTP, Candidate};
use crate::mdns::MulticastDnsMode;
use crate::network::NetworkInterface;
use crate::port::{CandidateErrorEvent, ConnectivityPort, PortConfig, PortEvent, ServerAddress};
use crate::socket::PacketSocketFactory;
use crate::state::GatheringState;

/// Configuration of a [`CandidateGatherer`].
#[derive(Debug, Clone)]
pub struct GathererConfig {
    pub stun_servers: Vec<ServerAddress>,
    pub component: u16,
    pub generation: u32,

    /// Local port range, both zero for any port.
    pub min_port: u16,
    pub max_port: u16,

    pub stun_keepalive_interval: Option<Duration>,
    pub stun_keepalive_lifetime: Option<Duration>,

    pub include_loopback: bool,
    pub include_link_local: bool,
    pub include_any_address: bool,

    pub mdns_mode: MulticastDnsMode,

    /// When a network is bound to the any address, surface the matching
    /// default local address as the host candidate instead.
    pub emit_local_for_any_address: bool,
    pub default_local_addresses: Vec<IpAddr>,
}

impl Default for GathererConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec![],
            component: COMPONENT_RTP,
            generation: 0,
            min_port: 0,
            max_port: 0,
            stun_keepalive_interval: None,
            stun_keepalive_lifetime: None,
            include_loopback: false,
            include_link_local: false,
            include_any_address: false,
            mdns_mode: MulticastDnsMode::default(),
            emit_local_for_any_address: false,
            default_local_addresses: vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub enum GathererEvent {
    CandidateGathered(Candidate),
    CandidateError(CandidateErrorEvent),
    MdnsNameRegistrationRequested { name: String, address: IpAddr },
    /// The port of the named network is ready.
    PortComplete(String),
    /// Every STUN server of the named network failed.
    PortError(String),
    GatheringComplete,
}

/// CandidateGatherer runs one [`ConnectivityPort`] per usable network and
/// routes socket input, resolver answers and timers to them.
pub struct CandidateGatherer {
    config: GathererConfig,
    ports: Vec<ConnectivityPort>,
    state: GatheringState,

    read_outs: VecDeque<TaggedBytesMut>,
    events: VecDeque<GathererEvent>,
}

impl CandidateGatherer {
    pub fn new(config: GathererConfig) -> Self {
        Self {
            config,
            ports: vec![],
            state: GatheringState::New,
            read_outs: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    pub fn state(&self) -> GatheringState {
        self.state
    }

    pub fn ports(&self) -> &[ConnectivityPort] {
        &self.ports
    }

    /// All candidates gathered so far, port by port.
    pub fn candidates(&self) -> Vec<Candidate> {
        self.ports
            .iter()
            .flat_map(|p| p.candidates().iter().cloned())
            .collect()
    }

    /// Creates a socket and a port for every usable network and starts
    /// gathering on them. Networks whose socket cannot be created are skipped.
    pub fn gather(
        &mut self,
        networks: &[NetworkInterface],
        factory: &mut dyn PacketSocketFactory,
        now: Instant,
    ) -> Result<()> {
        if self.state != GatheringState::New {
            return Err(Error::ErrMultipleGatherAttempted);
        }
        self.state = GatheringState::Gathering;

        let allowed: Vec<&NetworkInterface> = networks
            .iter()
            .filter(|n| self.is_network_allowed(n))
            .collect();
        for network in allowed {
            let local = SocketAddr::new(network.ip, 0);
            let socket =
                match factory.create_udp_socket(local, self.config.min_port, self.config.max_port)
                {
                    Ok(socket) => socket,
                    Err(err) => {
                        warn!("failed to create UDP socket on {network}: {err}");
                        continue;
                    }
                };
            let resolver = factory.create_resolver();

            let port = ConnectivityPort::new(self.port_config(network), socket, resolver);
            debug!("created {port} for {network}");
            self.ports.push(port);
        }

        info!(
            "gathering on {} of {} networks",
            self.ports.len(),
            networks.len()
        );

        for port in &mut self.ports {
            port.prepare_address(now)?;
        }
        self.drain_ports();

        Ok(())
    }

    fn is_network_allowed(&self, network: &NetworkInterface) -> bool {
        let ip = &network.ip;
        if ip_is_any(ip) {
            return self.config.include_any_address;
        }
        if ip_is_loopback(ip) {
            return self.config.include_loopback;
        }
        if ip_is_link_local(ip) {
            return self.config.include_link_local;
        }
        true
    }

    fn port_config(&self, network: &NetworkInterface) -> PortConfig {
        let mut config = PortConfig::new(network.clone())
            .with_component(self.config.component)
            .with_generation(self.config.generation)
            .with_stun_servers(self.config.stun_servers.clone())
            .with_stun_keepalive_interval(self.config.stun_keepalive_interval)
            .with_stun_keepalive_lifetime(self.config.stun_keepalive_lifetime)
            .with_mdns_obfuscation(self.config.mdns_mode.obfuscates_host())
            .with_port_range(self.config.min_port, self.config.max_port);

        if self.config.emit_local_for_any_address {
            let family = network.family();
            let default_address = self
                .config
                .default_local_addresses
                .iter()
                .find(|ip| AddressFamily::of(ip) == family)
                .copied();
            config = config.with_default_local_address(default_address);
        }

        config
    }

    fn port_by_network(&mut self, network_name: &str) -> Result<&mut ConnectivityPort> {
        self.ports
            .iter_mut()
            .find(|p| p.network().name == network_name)
            .ok_or(Error::ErrNoInterface)
    }

    /// A socket finished binding after `gather` returned.
    pub fn handle_local_address_ready(
        &mut self,
        network_name: &str,
        addr: SocketAddr,
        now: Instant,
    ) -> Result<()> {
        self.port_by_network(network_name)?
            .handle_local_address_ready(addr, now)?;
        self.drain_ports();
        Ok(())
    }

    /// Resolver answer for the port of `network_name`.
    pub fn handle_resolve_result(
        &mut self,
        network_name: &str,
        host: &str,
        port: u16,
        result: Result<Vec<IpAddr>>,
        now: Instant,
    ) -> Result<()> {
        self.port_by_network(network_name)?
            .handle_resolve_result(host, port, result, now)?;
        self.drain_ports();
        Ok(())
    }

    pub fn handle_mdns_name_registered(&mut self, name: &str, now: Instant) -> Result<()> {
        let Some(port) = self
            .ports
            .iter_mut()
            .find(|p| p.pending_mdns_name() == Some(name))
        else {
            warn!("no port waits for mDNS name {name}");
            return Ok(());
        };
        port.handle_mdns_name_registered(name, now)?;
        self.drain_ports();
        Ok(())
    }

    pub fn set_option(&mut self, opt: SocketOption, value: i32) -> Result<()> {
        let mut errs = vec![];
        for port in &mut self.ports {
            if let Err(err) = port.set_option(opt, value) {
                errs.push(err);
            }
        }
        flatten_errs(errs)
    }

    fn drain_ports(&mut self) {
        for port in &mut self.ports {
            let network = port.network().name.clone();
            while let Some(msg) = port.poll_read() {
                self.read_outs.push_back(msg);
            }
            while let Some(event) = port.poll_event() {
                let event = match event {
                    PortEvent::CandidateReady(c) => GathererEvent::CandidateGathered(c),
                    PortEvent::CandidateError(err) => GathererEvent::CandidateError(err),
                    PortEvent::MdnsNameRegistrationRequested { name, address } => {
                        GathererEvent::MdnsNameRegistrationRequested { name, address }
                    }
                    PortEvent::PortComplete => GathererEvent::PortComplete(network.clone()),
                    PortEvent::PortError => GathererEvent::PortError(network.clone()),
                };
                self.events.push_back(event);
            }
        }

        if self.state == GatheringState::Gathering && self.ports.iter().all(|p| p.is_ready()) {
            info!("gathering complete");
            self.state = GatheringState::Complete;
            self.events.push_back(GathererEvent::GatheringComplete);
        }
    }
}

impl Protocol<TaggedBytesMut, TaggedBytesMut, ()> for CandidateGatherer {
    type Rout = TaggedBytesMut;
    type Wout = TaggedBytesMut;
    type Eout = GathererEvent;
    type Error = Error;
    type Time = Instant;

    /// Routes a datagram to the port bound to its local address.
    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        let local = msg.transport.local_addr;
        let port = self
            .ports
            .iter_mut()
            .find(|p| p.local_addr() == Some(local))
            .ok_or(Error::ErrNoPortForAddress(local))?;
        port.handle_read(msg)?;
        self.drain_ports();
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.read_outs.pop_front()
    }

    /// Sends through the port bound to the message's local address.
    fn handle_write(&mut self, msg: TaggedBytesMut) -> Result<()> {
        let local = msg.transport.local_addr;
        let port = self
            .ports
            .iter_mut()
            .find(|p| p.local_addr() == Some(local))
            .ok_or(Error::ErrNoPortForAddress(local))?;
        port.handle_write(msg)
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        None
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.events.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        let mut errs = vec![];
        for port in &mut self.ports {
            if port.poll_timeout().is_some_and(|t| t <= now) {
                if let Err(err) = port.handle_timeout(now) {
                    warn!("{port}: timeout handling failed: {err}");
                    errs.push(err);
                }
            }
        }
        self.drain_ports();
        flatten_errs(errs)
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        self.ports.iter_mut().filter_map(|p| p.poll_timeout()).min()
    }

    fn close(&mut self) -> Result<()> {
        let mut errs = vec![];
        for port in &mut self.ports {
            if let Err(err) = port.close() {
                errs.push(err);
            }
        }
        self.read_outs.clear();
        self.events.clear();
        flatten_errs(errs)
    }
}
