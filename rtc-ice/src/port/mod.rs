
mod server;

pub use server::ServerAddress;

use log::{debug, error, info, trace, warn};
use shared::address::*;
use shared::error::*;
use shared::{SocketOption, TaggedBytesMut};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use stun::addr::mapped_address;
use stun::binding::{
    BindingConfig, BindingEvent, BindingRequest, BindingRequestEngine, DEFAULT_RETRY_TIMEOUT,
    LogDumper,
};
use stun::error_code::*;
use stun::message::Getter;

use crate::candidate::candidate_host::CandidateHostConfig;
use crate::candidate::candidate_server_reflexive::CandidateServerReflexiveConfig;
use crate::candidate::{COMPONENT_RTP, Candidate, CandidateConfig, CandidateType};
use crate::mdns::generate_multicast_dns_name;
use crate::network::NetworkInterface;
use crate::socket::{AddressResolver, PacketSocket};
use crate::state::PortState;
use crate::stats::StunStats;

/// Interval between keepalive binding requests to a server that answered.
pub const DEFAULT_STUN_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);
/// Keepalive lifetime on networks where every packet costs.
pub const HIGH_COST_PORT_KEEPALIVE_LIFETIME: Duration = Duration::from_secs(2 * 60);

pub(crate) const SEND_ERROR_LOG_LIMIT: usize = 5;

const UDP_PROTOCOL_NAME: &str = "udp";

/// Configuration of a [`ConnectivityPort`].
#[derive(Debug, Clone)]
pub struct PortConfig {
    pub network: NetworkInterface,
    pub component: u16,
    pub stun_servers: Vec<ServerAddress>,

    /// Delay between keepalive binding requests. Defaults to 10 seconds.
    pub stun_keepalive_interval: Option<Duration>,
    /// How long keepalives go on after the first request to a server.
    /// `None` means 2 minutes on cellular networks and forever elsewhere.
    pub stun_keepalive_lifetime: Option<Duration>,
    /// Retry budget for servers answering with errors. Defaults to 50 seconds.
    pub retry_timeout: Option<Duration>,

    /// The socket is shared with other ports of the same network.
    pub shared_socket: bool,
    /// Host addresses are replaced with mDNS names.
    pub mdns_obfuscation: bool,
    /// Surface `default_local_address` instead of an any-address bind.
    pub emit_local_for_any_address: bool,
    /// Answer of the default local address provider for this network's
    /// family, `None` when there is no provider.
    pub default_local_address: Option<IpAddr>,

    pub min_port: u16,
    pub max_port: u16,

    /// Only gather server reflexive candidates.
    pub stun_only: bool,
    pub generation: u32,
}

impl PortConfig {
    pub fn new(network: NetworkInterface) -> Self {
        Self {
            network,
            component: COMPONENT_RTP,
            stun_servers: vec![],
            stun_keepalive_interval: None,
            stun_keepalive_lifetime: None,
            retry_timeout: None,
            shared_socket: false,
            mdns_obfuscation: false,
            emit_local_for_any_address: false,
            default_local_address: None,
            min_port: 0,
            max_port: 0,
            stun_only: false,
            generation: 0,
        }
    }

    pub fn with_component(mut self, component: u16) -> Self {
        self.component = component;
        self
    }

    pub fn with_stun_servers(mut self, servers: Vec<ServerAddress>) -> Self {
        self.stun_servers = servers;
        self
    }

    pub fn with_stun_keepalive_interval(mut self, interval: Option<Duration>) -> Self {
        self.stun_keepalive_interval = interval;
        self
    }

    pub fn with_stun_keepalive_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.stun_keepalive_lifetime = lifetime;
        self
    }

    pub fn with_retry_timeout(mut self, retry_timeout: Duration) -> Self {
        self.retry_timeout = Some(retry_timeout);
        self
    }

    pub fn with_shared_socket(mut self, shared_socket: bool) -> Self {
        self.shared_socket = shared_socket;
        self
    }

    pub fn with_mdns_obfuscation(mut self, mdns_obfuscation: bool) -> Self {
        self.mdns_obfuscation = mdns_obfuscation;
        self
    }

    pub fn with_default_local_address(mut self, default_local_address: Option<IpAddr>) -> Self {
        self.emit_local_for_any_address = true;
        self.default_local_address = default_local_address;
        self
    }

    pub fn with_port_range(mut self, min_port: u16, max_port: u16) -> Self {
        self.min_port = min_port;
        self.max_port = max_port;
        self
    }

    pub fn with_stun_only(mut self, stun_only: bool) -> Self {
        self.stun_only = stun_only;
        self
    }

    pub fn with_generation(mut self, generation: u32) -> Self {
        self.generation = generation;
        self
    }
}

/// Details of a failed binding or host lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateErrorEvent {
    /// Local address of the port.
    pub address: String,
    pub port: u16,
    /// `stun:host:port` of the failing server.
    pub url: String,
    pub error_code: u16,
    pub error_text: String,
}

#[derive(Debug, Clone)]
pub enum PortEvent {
    CandidateReady(Candidate),
    CandidateError(CandidateErrorEvent),
    /// The caller must register `name` for `address` with its mDNS responder
    /// and report back with `handle_mdns_name_registered`.
    MdnsNameRegistrationRequested { name: String, address: IpAddr },
    PortComplete,
    PortError,
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum MdnsNameRegistrationStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

/// ConnectivityPort gathers the host and server reflexive candidates of one
/// UDP socket.
///
/// The port drives a [`BindingRequestEngine`] against its STUN servers and
/// signals `PortComplete` once every server succeeded or failed, or
/// `PortError` when all of them failed.
pub struct ConnectivityPort {
    config: PortConfig,
    keepalive_interval: Duration,
    keepalive_lifetime: Option<Duration>,
    retry_timeout: Duration,

    socket: Box<dyn PacketSocket>,
    resolver: Box<dyn AddressResolver>,
    engine: BindingRequestEngine,
    local_addr: Option<SocketAddr>,

    server_addresses: BTreeSet<ServerAddress>,
    server_hostnames: BTreeMap<SocketAddr, String>,
    resolving: BTreeSet<ServerAddress>,
    succeeded_servers: BTreeSet<ServerAddress>,
    failed_servers: BTreeSet<ServerAddress>,

    candidates: Vec<Candidate>,
    pending_mdns_candidate: Option<Candidate>,
    mdns_status: MdnsNameRegistrationStatus,

    stats: StunStats,
    send_error_count: usize,
    dscp: Option<i32>,

    state: PortState,
    prepared: bool,
    ready: bool,
    closed: bool,

    read_outs: VecDeque<TaggedBytesMut>,
    events: VecDeque<PortEvent>,
}

impl fmt::Display for ConnectivityPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.local_addr {
            Some(addr) => write!(
                f,
                "Port[{}:{}:{}]",
                self.config.network.name,
                to_sensitive_string(&addr.ip()),
                addr.port()
            ),
            None => write!(f, "Port[{}:unbound]", self.config.network.name),
        }
    }
}

impl ConnectivityPort {
    pub fn new(
        config: PortConfig,
        socket: Box<dyn PacketSocket>,
        resolver: Box<dyn AddressResolver>,
    ) -> Self {
        let keepalive_interval = if let Some(interval) = config.stun_keepalive_interval {
            interval
        } else {
            DEFAULT_STUN_KEEPALIVE_INTERVAL
        };

        let keepalive_lifetime = if let Some(lifetime) = config.stun_keepalive_lifetime {
            Some(lifetime)
        } else if config.network.is_cellular() {
            Some(HIGH_COST_PORT_KEEPALIVE_LIFETIME)
        } else {
            None
        };

        let retry_timeout = if let Some(retry_timeout) = config.retry_timeout {
            retry_timeout
        } else {
            DEFAULT_RETRY_TIMEOUT
        };

        let local_addr = socket.local_addr();
        let engine = BindingRequestEngine::new(
            BindingConfig::default()
                .with_retry_timeout(retry_timeout)
                .with_lifetime(keepalive_lifetime),
            local_addr
                .unwrap_or_else(|| SocketAddr::new(get_any_ip(config.network.family()), 0)),
            Box::new(LogDumper),
        );

        let server_addresses = config.stun_servers.iter().cloned().collect();

        Self {
            config,
            keepalive_interval,
            keepalive_lifetime,
            retry_timeout,

            socket,
            resolver,
            engine,
            local_addr,

            server_addresses,
            server_hostnames: BTreeMap::new(),
            resolving: BTreeSet::new(),
            succeeded_servers: BTreeSet::new(),
            failed_servers: BTreeSet::new(),

            candidates: vec![],
            pending_mdns_candidate: None,
            mdns_status: MdnsNameRegistrationStatus::NotStarted,

            stats: StunStats::default(),
            send_error_count: 0,
            dscp: None,

            state: PortState::Created,
            prepared: false,
            ready: false,
            closed: false,

            read_outs: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    pub fn network(&self) -> &NetworkInterface {
        &self.config.network
    }

    pub fn component(&self) -> u16 {
        self.config.component
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn state(&self) -> PortState {
        self.state
    }

    /// True once the port signalled either `PortComplete` or `PortError`.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn stun_stats(&self) -> StunStats {
        self.stats
    }

    pub fn server_addresses(&self) -> impl Iterator<Item = &ServerAddress> {
        self.server_addresses.iter()
    }

    pub fn stun_keepalive_delay(&self) -> Duration {
        self.keepalive_interval
    }

    pub fn set_stun_keepalive_delay(&mut self, delay: Option<Duration>) {
        self.keepalive_interval = delay.unwrap_or(DEFAULT_STUN_KEEPALIVE_INTERVAL);
    }

    pub fn stun_keepalive_lifetime(&self) -> Option<Duration> {
        self.keepalive_lifetime
    }

    pub fn mdns_name_registration_status(&self) -> MdnsNameRegistrationStatus {
        self.mdns_status
    }

    /// The mDNS name waiting for registration, if any.
    pub fn pending_mdns_name(&self) -> Option<&str> {
        self.pending_mdns_candidate.as_ref().map(|c| c.address())
    }

    /// DSCP value stamped on STUN packets.
    pub fn stun_dscp_value(&self) -> Option<i32> {
        self.dscp
    }

    /// Adds a STUN server. Only honoured before `prepare_address`.
    pub fn add_server_address(&mut self, server: ServerAddress) -> bool {
        if self.prepared {
            warn!("{self}: ignoring STUN server {server} added after gathering started");
            return false;
        }
        self.server_addresses.insert(server)
    }

    /// Starts gathering. Surfaces the host candidate right away when the
    /// socket is bound, otherwise waits for `handle_local_address_ready`.
    ///
    /// # Panics
    ///
    /// When called twice.
    pub fn prepare_address(&mut self, now: Instant) -> Result<()> {
        assert!(!self.prepared, "{self}: prepare_address called twice");
        if self.closed {
            return Err(Error::ErrPortClosed);
        }

        self.prepared = true;
        self.state = PortState::Gathering;

        if let Some(addr) = self.local_addr {
            self.on_local_address_ready(addr, now)?;
        }
        self.flush(now)
    }

    /// The socket finished binding to `addr`.
    pub fn handle_local_address_ready(&mut self, addr: SocketAddr, now: Instant) -> Result<()> {
        if self.closed {
            return Err(Error::ErrPortClosed);
        }
        if self.local_addr.is_some() && self.prepared {
            debug!("{self}: local address already known, ignoring {addr}");
            return Ok(());
        }

        self.local_addr = Some(addr);
        self.engine.set_local_addr(addr);
        if self.prepared {
            self.on_local_address_ready(addr, now)?;
            self.flush(now)?;
        }
        Ok(())
    }

    /// Answer of the resolver for `host:port`. The first address of the
    /// network's family is used.
    pub fn handle_resolve_result(
        &mut self,
        host: &str,
        port: u16,
        result: Result<Vec<IpAddr>>,
        now: Instant,
    ) -> Result<()> {
        if self.closed {
            return Err(Error::ErrPortClosed);
        }

        let input = ServerAddress::unresolved(host, port);
        if !self.resolving.contains(&input) {
            debug!("{self}: unexpected resolve result for {input}");
            return Ok(());
        }

        let family = self.config.network.family();
        let resolved = match result {
            Ok(ips) => ips.into_iter().find(|ip| AddressFamily::of(ip) == family),
            Err(err) => {
                debug!("{self}: lookup of {input} failed: {err}");
                None
            }
        };

        let Some(ip) = resolved else {
            warn!("{self}: stun host lookup received error for {input}");
            self.on_binding_or_resolve_failed(
                input,
                STUN_ERROR_SERVER_NOT_REACHABLE,
                "STUN host lookup received error.",
            );
            return Ok(());
        };

        let resolved = SocketAddr::new(ip, port);
        self.server_addresses.remove(&input);
        self.server_hostnames.insert(resolved, host.to_owned());

        let resolved = ServerAddress::Resolved(resolved);
        if self.server_addresses.insert(resolved.clone()) {
            self.send_stun_binding_request(&resolved, now)?;
            self.flush(now)
        } else {
            // Another configured server resolved to the same address.
            self.maybe_set_port_complete_or_error();
            Ok(())
        }
    }

    /// The mDNS responder registered `name` for the host address.
    pub fn handle_mdns_name_registered(&mut self, name: &str, now: Instant) -> Result<()> {
        if self.closed {
            return Err(Error::ErrPortClosed);
        }

        let matches = self
            .pending_mdns_candidate
            .as_ref()
            .is_some_and(|c| c.address() == name);
        if !matches {
            warn!("{self}: unexpected mDNS registration for {name}");
            return Ok(());
        }

        if let Some(candidate) = self.pending_mdns_candidate.take() {
            self.mdns_status = MdnsNameRegistrationStatus::Completed;
            self.add_candidate(candidate);
            self.maybe_set_port_complete_or_error();
        }
        self.flush(now)
    }

    /// Sends a datagram on the port's socket. Failures are logged at most
    /// five times in a row.
    pub fn send_to(&mut self, payload: &[u8], addr: SocketAddr, _now: Instant) -> Result<usize> {
        if self.closed {
            return Err(Error::ErrPortClosed);
        }
        self.send_to_socket(payload, addr)
    }

    pub fn set_option(&mut self, opt: SocketOption, value: i32) -> Result<()> {
        if opt == SocketOption::Dscp {
            self.dscp = Some(value);
        }
        self.socket.set_option(opt, value)
    }

    pub fn get_option(&self, opt: SocketOption) -> Result<i32> {
        self.socket.get_option(opt)
    }

    fn on_local_address_ready(&mut self, addr: SocketAddr, now: Instant) -> Result<()> {
        if !self.config.stun_only {
            let mut host = addr;
            // When no default address is available the any address is kept
            // so the port at least listens.
            self.maybe_set_default_local_address(&mut host);
            self.add_host_candidate(host)?;
        }
        self.maybe_prepare_stun_candidate(now)
    }

    fn maybe_set_default_local_address(&self, addr: &mut SocketAddr) -> bool {
        if !ip_is_any(&addr.ip()) || !self.config.emit_local_for_any_address {
            return true;
        }
        let Some(default_address) = self.config.default_local_address else {
            return true;
        };
        if ip_is_any(&default_address)
            || AddressFamily::of(&default_address) != AddressFamily::of(&addr.ip())
        {
            return false;
        }
        addr.set_ip(default_address);
        true
    }

    fn add_host_candidate(&mut self, addr: SocketAddr) -> Result<()> {
        let mut base_config = self.candidate_config(addr);

        if self.config.mdns_obfuscation {
            let name = generate_multicast_dns_name();
            base_config.address = name.clone();
            let candidate = CandidateHostConfig { base_config }.new_candidate_host()?;

            debug!("{self}: registering {name} for the host candidate");
            self.pending_mdns_candidate = Some(candidate);
            self.mdns_status = MdnsNameRegistrationStatus::InProgress;
            self.events.push_back(PortEvent::MdnsNameRegistrationRequested {
                name,
                address: addr.ip(),
            });
            return Ok(());
        }

        let candidate = CandidateHostConfig { base_config }.new_candidate_host()?;
        self.add_candidate(candidate);
        self.maybe_set_port_complete_or_error();
        Ok(())
    }

    fn candidate_config(&self, addr: SocketAddr) -> CandidateConfig {
        CandidateConfig {
            network: UDP_PROTOCOL_NAME.to_owned(),
            address: addr.ip().to_string(),
            port: addr.port(),
            component: self.config.component,
            base_address: Some(addr),
            network_name: self.config.network.name.clone(),
            network_id: self.config.network.id,
            generation: self.config.generation,
            ..Default::default()
        }
    }

    fn add_candidate(&mut self, candidate: Candidate) {
        info!("{self}: gathered candidate {candidate}");
        self.candidates.push(candidate.clone());
        self.events.push_back(PortEvent::CandidateReady(candidate));
    }

    fn maybe_prepare_stun_candidate(&mut self, now: Instant) -> Result<()> {
        if !self.server_addresses.is_empty() {
            self.send_stun_binding_requests(now)
        } else {
            self.maybe_set_port_complete_or_error();
            Ok(())
        }
    }

    fn send_stun_binding_requests(&mut self, now: Instant) -> Result<()> {
        // Resolution may rewrite the set, iterate over a snapshot.
        let servers: Vec<ServerAddress> = self.server_addresses.iter().cloned().collect();
        for server in servers {
            self.send_stun_binding_request(&server, now)?;
        }
        Ok(())
    }

    fn send_stun_binding_request(&mut self, server: &ServerAddress, now: Instant) -> Result<()> {
        let addr = match server {
            ServerAddress::Resolved(addr) => *addr,
            ServerAddress::Unresolved { host, port } => {
                self.resolve_stun_address(server, host, *port);
                return Ok(());
            }
        };

        let Some(local) = self.local_addr else {
            return Ok(());
        };

        if !is_compatible_address(&local.ip(), &addr.ip()) {
            warn!("{self}: STUN server address is incompatible.");
            self.on_binding_or_resolve_failed(
                server.clone(),
                STUN_ERROR_NOT_AN_ERROR,
                "STUN server address is incompatible.",
            );
            return Ok(());
        }

        trace!(
            "{self}: binding to {:?} server {}",
            ip_address_type(&addr.ip()),
            to_sensitive_string(&addr.ip())
        );
        self.engine.send(BindingRequest::new(addr, now), now)?;
        Ok(())
    }

    fn resolve_stun_address(&mut self, server: &ServerAddress, host: &str, port: u16) {
        if !self.resolving.insert(server.clone()) {
            return;
        }
        info!("{self}: Starting STUN host lookup for {host}");
        self.resolver
            .resolve(host, port, self.config.network.family());
    }

    /// Drains the engine: binding outcomes first, then datagrams to send.
    fn flush(&mut self, now: Instant) -> Result<()> {
        loop {
            let mut progressed = false;
            while let Some(event) = self.engine.poll_event() {
                self.handle_binding_event(event, now)?;
                progressed = true;
            }
            while let Some(transmit) = self.engine.poll_transmit() {
                self.stats.on_request_sent();
                // Errors are logged and counted by send_to_socket; the engine
                // retransmits on its own schedule.
                let _ = self.send_to_socket(&transmit.message, transmit.transport.peer_addr);
                progressed = true;
            }
            if !progressed {
                return Ok(());
            }
        }
    }

    fn send_to_socket(&mut self, buf: &[u8], addr: SocketAddr) -> Result<usize> {
        match self.socket.send_to(buf, addr) {
            Ok(n) => {
                self.send_error_count = 0;
                Ok(n)
            }
            Err(err) => {
                if self.send_error_count < SEND_ERROR_LOG_LIMIT {
                    self.send_error_count += 1;
                    error!(
                        "{self}: UDP send of {} bytes to host {} failed with error {err}",
                        buf.len(),
                        to_sensitive_string(&addr.ip())
                    );
                }
                Err(err)
            }
        }
    }

    fn handle_binding_event(&mut self, event: BindingEvent, now: Instant) -> Result<()> {
        match event {
            BindingEvent::Response {
                request,
                message,
                rtt,
                ..
            } => {
                match mapped_address(&message) {
                    Ok(reflected) => self.on_binding_succeeded(rtt, request.server, reflected)?,
                    Err(err) => error!(
                        "{self}: binding response from {} has no usable mapped address: {err}",
                        request.server
                    ),
                }

                if self.within_lifetime(&request, now) {
                    self.engine.send_delayed(
                        BindingRequest::new(request.server, request.start_time),
                        self.keepalive_interval,
                        now,
                    )?;
                }
            }
            BindingEvent::ErrorResponse {
                request, message, ..
            } => {
                let mut attr = ErrorCodeAttribute::default();
                let (code, reason) = match attr.get_from(&message) {
                    Ok(()) => {
                        error!(
                            "{self}: Binding error response: class={} number={} reason={}",
                            attr.code.class(),
                            attr.code.number(),
                            String::from_utf8_lossy(&attr.reason)
                        );
                        (attr.code, String::from_utf8_lossy(&attr.reason).into_owned())
                    }
                    Err(_) => {
                        error!("{self}: Missing binding response error code.");
                        (
                            STUN_ERROR_GLOBAL_FAILURE,
                            "STUN binding response with no error code attribute.".to_owned(),
                        )
                    }
                };
                self.on_binding_or_resolve_failed(
                    ServerAddress::Resolved(request.server),
                    code,
                    &reason,
                );

                if self.within_lifetime(&request, now) && request.elapsed(now) < self.retry_timeout
                {
                    self.engine.send_delayed(
                        BindingRequest::new(request.server, request.start_time),
                        self.keepalive_interval,
                        now,
                    )?;
                }
            }
            BindingEvent::Timeout { request, .. } => {
                error!(
                    "{self}: Binding request to {} timed out ({})",
                    to_sensitive_string(&request.server.ip()),
                    self.config.network.name
                );
                self.on_binding_or_resolve_failed(
                    ServerAddress::Resolved(request.server),
                    STUN_ERROR_SERVER_NOT_REACHABLE,
                    "STUN binding request timed out.",
                );
            }
        }
        Ok(())
    }

    fn within_lifetime(&self, request: &BindingRequest, now: Instant) -> bool {
        match self.keepalive_lifetime {
            Some(lifetime) => request.elapsed(now) <= lifetime,
            None => true,
        }
    }

    fn on_binding_succeeded(
        &mut self,
        rtt: Duration,
        server: SocketAddr,
        reflected: SocketAddr,
    ) -> Result<()> {
        self.stats.on_response(rtt.as_millis() as u64);

        let server = ServerAddress::Resolved(server);
        if !self.succeeded_servers.insert(server.clone()) {
            return Ok(());
        }

        let local = self.local_addr.unwrap_or_else(|| self.engine.local_addr());
        if (!self.config.shared_socket || reflected != local || self.config.mdns_obfuscation)
            && !self.has_stun_candidate_with_address(&reflected)
        {
            debug_assert!(
                !self.config.shared_socket
                    || self
                        .candidates
                        .first()
                        .is_some_and(|c| c.candidate_type() == CandidateType::Host)
                    || self.mdns_status != MdnsNameRegistrationStatus::NotStarted,
                "host candidate must come first on a shared socket"
            );

            let any = SocketAddr::new(get_any_ip(AddressFamily::of(&local.ip())), 0);
            let mut related = local;
            if self.config.mdns_obfuscation || !self.maybe_set_default_local_address(&mut related)
            {
                related = any;
            }

            let url = format!("stun:{}", self.server_url(&server));
            let mut base_config = self.candidate_config(local);
            base_config.address = reflected.ip().to_string();
            base_config.port = reflected.port();

            let candidate = CandidateServerReflexiveConfig {
                base_config,
                rel_addr: related.ip().to_string(),
                rel_port: related.port(),
                url,
            }
            .new_candidate_server_reflexive()?;
            self.add_candidate(candidate);
        }

        self.maybe_set_port_complete_or_error();
        Ok(())
    }

    fn has_stun_candidate_with_address(&self, addr: &SocketAddr) -> bool {
        self.candidates
            .iter()
            .any(|c| c.candidate_type() == CandidateType::ServerReflexive && c.addr() == *addr)
    }

    /// `host:port` of a server, preferring the configured host name of a
    /// resolved address.
    fn server_url(&self, server: &ServerAddress) -> String {
        if let ServerAddress::Resolved(addr) = server {
            if let Some(host) = self.server_hostnames.get(addr) {
                return format!("{host}:{}", addr.port());
            }
        }
        server.to_string()
    }

    fn on_binding_or_resolve_failed(&mut self, server: ServerAddress, code: ErrorCode, reason: &str) {
        if code != STUN_ERROR_NOT_AN_ERROR {
            let (address, port) = match self.local_addr {
                Some(addr) => (addr.ip().to_string(), addr.port()),
                None => (String::new(), 0),
            };
            self.events
                .push_back(PortEvent::CandidateError(CandidateErrorEvent {
                    address,
                    port,
                    url: format!("stun:{}", self.server_url(&server)),
                    error_code: code.0,
                    error_text: reason.to_owned(),
                }));
        }

        if !self.failed_servers.insert(server) {
            return;
        }
        self.maybe_set_port_complete_or_error();
    }

    fn maybe_set_port_complete_or_error(&mut self) {
        if self.mdns_status == MdnsNameRegistrationStatus::InProgress {
            return;
        }
        if self.ready {
            return;
        }

        // Still waiting for binding responses. A server retried after an
        // error can sit in both sets.
        let pending = self
            .server_addresses
            .iter()
            .any(|s| !self.succeeded_servers.contains(s) && !self.failed_servers.contains(s));
        if pending {
            return;
        }

        self.ready = true;

        if self.server_addresses.is_empty()
            || !self.succeeded_servers.is_empty()
            || self.config.shared_socket
        {
            info!("{self}: port complete with {} candidates", self.candidates.len());
            self.state = PortState::Ready;
            self.events.push_back(PortEvent::PortComplete);
        } else {
            warn!("{self}: every STUN server failed");
            self.state = PortState::Error;
            self.events.push_back(PortEvent::PortError);
        }
    }
}

impl sansio::Protocol<TaggedBytesMut, TaggedBytesMut, ()> for ConnectivityPort {
    type Rout = TaggedBytesMut;
    type Wout = TaggedBytesMut;
    type Eout = PortEvent;
    type Error = Error;
    type Time = Instant;

    /// Responses from STUN servers are consumed by the port, even unmatched
    /// ones which may answer a retransmission. Everything else is handed
    /// back through `poll_read`.
    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if self.closed {
            return Err(Error::ErrPortClosed);
        }

        let from = ServerAddress::Resolved(msg.transport.peer_addr);
        if self.server_addresses.contains(&from) {
            self.engine
                .check_response(&msg.message, msg.transport.peer_addr, msg.now);
            return self.flush(msg.now);
        }

        self.read_outs.push_back(msg);
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.read_outs.pop_front()
    }

    /// Writes straight to the socket.
    fn handle_write(&mut self, msg: TaggedBytesMut) -> Result<()> {
        self.send_to(&msg.message, msg.transport.peer_addr, msg.now)
            .map(|_| ())
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
        if self.closed {
            return Err(Error::ErrPortClosed);
        }
        // Whatever the engine managed to queue still goes out.
        let result = self.engine.handle_timeout(now);
        self.flush(now)?;
        result
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        if self.closed {
            return None;
        }
        self.engine.poll_timeout()
    }

    /// Drops every in-flight binding request; nothing is signalled afterwards.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ErrPortClosed);
        }
        self.closed = true;
        self.read_outs.clear();
        self.events.clear();
        self.engine.close()
    }
}
