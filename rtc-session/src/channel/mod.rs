
pub mod rtcp_mux_policy;
pub mod rtp_transport;

pub use rtcp_mux_policy::RtcpMuxPolicy;
pub use rtp_transport::{NetworkRoute, RtpTransport, SocketType};

use log::{debug, error, trace};
use shared::SocketOption;
use shared::error::*;
use std::sync::{Arc, Mutex};

use crate::context::{ContextToken, ExecutionContext};
use crate::description::{MediaContentDescription, MediaType, StreamParams};
use crate::negotiator::{
    ContentNegotiator, ContentSource, MediaReceiveChannel, MediaSendChannel, ReceiverParameters,
    SdpType, SenderParameters,
};

/// Bytes SRTP adds to every packet.
pub const SRTP_PACKET_OVERHEAD: usize = 10;

/// Configuration of a [`ChannelCoordinator`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub mid: String,
    pub media_type: MediaType,
    pub rtcp_mux_policy: RtcpMuxPolicy,
    /// Media is only sent once SRTP is active on the transport.
    pub srtp_required: bool,
    pub enable_encrypted_rtp_header_extensions: bool,
}

impl ChannelConfig {
    pub fn new(mid: &str, media_type: MediaType) -> Self {
        ChannelConfig {
            mid: mid.to_owned(),
            media_type,
            rtcp_mux_policy: RtcpMuxPolicy::Negotiate,
            srtp_required: true,
            enable_encrypted_rtp_header_extensions: false,
        }
    }

    pub fn with_rtcp_mux_policy(mut self, policy: RtcpMuxPolicy) -> Self {
        self.rtcp_mux_policy = policy;
        self
    }

    pub fn with_srtp_required(mut self, required: bool) -> Self {
        self.srtp_required = required;
        self
    }

    pub fn with_encrypted_rtp_header_extensions(mut self, enable: bool) -> Self {
        self.enable_encrypted_rtp_header_extensions = enable;
        self
    }
}

/// Owned by the worker context.
struct WorkerState {
    negotiator: ContentNegotiator,
    send: Box<dyn MediaSendChannel>,
    recv: Box<dyn MediaReceiveChannel>,
    enabled: bool,
    has_transport: bool,
    writable: bool,
    srtp_active: bool,
    srtp_required: bool,
}

impl WorkerState {
    fn update_media_send_recv_state(&mut self, mid: &str) {
        let playout = self.enabled
            && self.negotiator.local_direction().has_recv()
            && self.has_transport;
        self.recv.set_playout(playout);

        let send = self.enabled
            && self.negotiator.local_direction().has_send()
            && self.negotiator.remote_direction().has_recv()
            && self.writable
            && (self.srtp_active || !self.srtp_required);
        self.send.set_send(send);

        trace!("mid={} playout={} send={}", mid, playout, send);
    }
}

/// Owned by the network context.
struct NetworkState {
    transport: Option<Box<dyn RtpTransport>>,
    rtcp_mux_active: bool,
    socket_options: Vec<(SocketOption, i32)>,
    rtcp_socket_options: Vec<(SocketOption, i32)>,
}

/// ChannelCoordinator ties one content section to a media channel pair and
/// an RTP transport.
///
/// Negotiation and media state live on the worker context. The transport and
/// socket options live on the network context, and methods touching them take
/// the [`ContextToken`] of that context. Results cross between the two by
/// posting tasks, so neither side blocks on the other.
#[derive(Clone)]
pub struct ChannelCoordinator {
    config: ChannelConfig,
    worker: ExecutionContext,
    network: ExecutionContext,
    worker_state: Arc<Mutex<WorkerState>>,
    network_state: Arc<Mutex<NetworkState>>,
}

impl ChannelCoordinator {
    /// Must not be called from the network context when `transport` is set.
    pub fn new(
        config: ChannelConfig,
        worker: ExecutionContext,
        network: ExecutionContext,
        send: Box<dyn MediaSendChannel>,
        recv: Box<dyn MediaReceiveChannel>,
        transport: Option<Box<dyn RtpTransport>>,
    ) -> Result<Self> {
        let rtcp_mux_required = config.rtcp_mux_policy.is_required();
        let negotiator = ContentNegotiator::new(&config.mid, config.media_type)
            .with_rtcp_mux_required(rtcp_mux_required)
            .with_encrypted_header_extensions(config.enable_encrypted_rtp_header_extensions);

        let coordinator = ChannelCoordinator {
            worker,
            network,
            worker_state: Arc::new(Mutex::new(WorkerState {
                negotiator,
                send,
                recv,
                enabled: false,
                has_transport: false,
                writable: false,
                srtp_active: false,
                srtp_required: config.srtp_required,
            })),
            network_state: Arc::new(Mutex::new(NetworkState {
                transport: None,
                rtcp_mux_active: rtcp_mux_required,
                socket_options: vec![],
                rtcp_socket_options: vec![],
            })),
            config,
        };

        if let Some(transport) = transport {
            let this = coordinator.clone();
            coordinator.network.invoke(move |token| {
                this.set_rtp_transport(token, Some(transport)).map(|_| ())
            })??;
        }

        Ok(coordinator)
    }

    pub fn mid(&self) -> &str {
        &self.config.mid
    }

    pub fn media_type(&self) -> MediaType {
        self.config.media_type
    }

    pub fn worker(&self) -> &ExecutionContext {
        &self.worker
    }

    pub fn network(&self) -> &ExecutionContext {
        &self.network
    }

    /// Turns media on or off. Playout and sending also depend on the
    /// negotiated directions and the transport.
    pub fn enable(&self, enable: bool) -> Result<()> {
        let this = self.clone();
        self.worker.invoke(move |token| -> Result<()> {
            this.worker.check(token);
            let mut ws = this.worker_state.lock()?;
            if ws.enabled != enable {
                debug!("mid={} enable={}", this.config.mid, enable);
                ws.enabled = enable;
                ws.update_media_send_recv_state(&this.config.mid);
            }
            Ok(())
        })?
    }

    pub fn set_local_content(
        &self,
        content: MediaContentDescription,
        sdp_type: SdpType,
    ) -> Result<()> {
        let this = self.clone();
        self.worker.invoke(move |token| {
            this.set_content_w(token, &content, sdp_type, ContentSource::Local)
        })?
    }

    pub fn set_remote_content(
        &self,
        content: MediaContentDescription,
        sdp_type: SdpType,
    ) -> Result<()> {
        let this = self.clone();
        self.worker.invoke(move |token| {
            this.set_content_w(token, &content, sdp_type, ContentSource::Remote)
        })?
    }

    fn set_content_w(
        &self,
        token: &ContextToken,
        content: &MediaContentDescription,
        sdp_type: SdpType,
        src: ContentSource,
    ) -> Result<()> {
        self.worker.check(token);

        let rtcp_mux_active = {
            let mut guard = self.worker_state.lock()?;
            let ws = &mut *guard;
            match src {
                ContentSource::Local => ws.negotiator.set_local_content(
                    content,
                    sdp_type,
                    ws.send.as_mut(),
                    ws.recv.as_mut(),
                )?,
                ContentSource::Remote => ws.negotiator.set_remote_content(
                    content,
                    sdp_type,
                    ws.send.as_mut(),
                    ws.recv.as_mut(),
                )?,
            }
            ws.update_media_send_recv_state(&self.config.mid);
            ws.negotiator.is_rtcp_mux_active()
        };

        let this = self.clone();
        self.network
            .post(move |token| this.apply_rtcp_mux_n(token, rtcp_mux_active))
    }

    fn apply_rtcp_mux_n(&self, token: &ContextToken, active: bool) {
        self.with_network_state(token, |ns| {
            ns.rtcp_mux_active = active;
            if let Some(transport) = ns.transport.as_mut() {
                if transport.is_rtcp_mux_enabled() != active {
                    debug!(
                        "mid={} rtcp mux {} on {}",
                        self.config.mid,
                        if active { "enabled" } else { "disabled" },
                        transport.transport_name()
                    );
                    transport.set_rtcp_mux_enabled(active);
                }
            }
        });
    }

    /// Binds the channel to `transport` and returns the one it replaces.
    /// Socket options set on the channel so far are applied to the new
    /// transport first.
    pub fn set_rtp_transport(
        &self,
        token: &ContextToken,
        transport: Option<Box<dyn RtpTransport>>,
    ) -> Result<Option<Box<dyn RtpTransport>>> {
        self.network.check(token);

        let mut ns = self.network_state.lock()?;
        let (old, has_transport, writable, srtp_active) = match transport {
            Some(mut transport) => {
                for (opt, value) in &ns.socket_options {
                    transport.set_option(SocketType::Rtp, *opt, *value)?;
                }
                if ns.rtcp_mux_active {
                    transport.set_rtcp_mux_enabled(true);
                } else {
                    for (opt, value) in &ns.rtcp_socket_options {
                        transport.set_option(SocketType::Rtcp, *opt, *value)?;
                    }
                }
                debug!(
                    "mid={} bound to transport {}",
                    self.config.mid,
                    transport.transport_name()
                );
                let writable = transport.is_writable();
                let srtp_active = transport.is_srtp_active();
                (ns.transport.replace(transport), true, writable, srtp_active)
            }
            None => (ns.transport.take(), false, false, false),
        };
        drop(ns);

        let this = self.clone();
        self.worker.post(move |token| {
            this.with_worker_state(token, |ws| {
                ws.has_transport = has_transport;
                ws.writable = writable;
                ws.srtp_active = srtp_active;
                ws.send.on_ready_to_send(writable);
                ws.update_media_send_recv_state(&this.config.mid);
            })
        })?;

        Ok(old)
    }

    /// Remembers `opt` for the channel and applies it to the current
    /// transport, if any.
    pub fn set_option(
        &self,
        token: &ContextToken,
        socket: SocketType,
        opt: SocketOption,
        value: i32,
    ) -> Result<()> {
        self.network.check(token);

        let mut ns = self.network_state.lock()?;
        let options = match socket {
            SocketType::Rtp => &mut ns.socket_options,
            SocketType::Rtcp => &mut ns.rtcp_socket_options,
        };
        match options.iter_mut().find(|(o, _)| *o == opt) {
            Some(entry) => entry.1 = value,
            None => options.push((opt, value)),
        }

        match ns.transport.as_mut() {
            Some(transport) => transport.set_option(socket, opt, value),
            None => Ok(()),
        }
    }

    pub fn on_transport_ready_to_send(&self, token: &ContextToken, ready: bool) -> Result<()> {
        self.network.check(token);
        let this = self.clone();
        self.worker.post(move |token| {
            this.with_worker_state(token, |ws| ws.send.on_ready_to_send(ready))
        })
    }

    pub fn on_transport_writable_state(&self, token: &ContextToken, writable: bool) -> Result<()> {
        self.network.check(token);
        let srtp_active = self.srtp_active_n()?;
        let this = self.clone();
        self.worker.post(move |token| {
            this.with_worker_state(token, |ws| {
                ws.writable = writable;
                ws.srtp_active = srtp_active;
                ws.update_media_send_recv_state(&this.config.mid);
            })
        })
    }

    /// Forwards a route change to the send channel. `None` means the route
    /// was lost.
    pub fn on_network_route_changed(
        &self,
        token: &ContextToken,
        route: Option<NetworkRoute>,
    ) -> Result<()> {
        self.network.check(token);
        let route = route.unwrap_or_default();
        let mut overhead = route.packet_overhead;
        if self.srtp_active_n()? {
            overhead += SRTP_PACKET_OVERHEAD;
        }

        let this = self.clone();
        self.worker.post(move |token| {
            this.with_worker_state(token, |ws| ws.send.on_network_route_changed(&route, overhead))
        })
    }

    pub fn local_streams(&self) -> Result<Vec<StreamParams>> {
        self.read_worker_state(|ws| ws.negotiator.local_streams().to_vec())
    }

    pub fn remote_streams(&self) -> Result<Vec<StreamParams>> {
        self.read_worker_state(|ws| ws.negotiator.remote_streams().to_vec())
    }

    pub fn send_params(&self) -> Result<SenderParameters> {
        self.read_worker_state(|ws| ws.negotiator.send_params().clone())
    }

    pub fn recv_params(&self) -> Result<ReceiverParameters> {
        self.read_worker_state(|ws| ws.negotiator.recv_params().clone())
    }

    pub fn is_rtcp_mux_enabled(&self) -> Result<bool> {
        self.read_network_state(|ns| {
            ns.transport
                .as_ref()
                .is_some_and(|t| t.is_rtcp_mux_enabled())
        })
    }

    pub fn is_srtp_active(&self) -> Result<bool> {
        self.read_network_state(|ns| ns.transport.as_ref().is_some_and(|t| t.is_srtp_active()))
    }

    fn srtp_active_n(&self) -> Result<bool> {
        let ns = self.network_state.lock()?;
        Ok(ns.transport.as_ref().is_some_and(|t| t.is_srtp_active()))
    }

    fn with_worker_state(&self, token: &ContextToken, f: impl FnOnce(&mut WorkerState)) {
        self.worker.check(token);
        match self.worker_state.lock() {
            Ok(mut ws) => f(&mut ws),
            Err(err) => error!("mid={} worker state poisoned: {}", self.config.mid, err),
        }
    }

    fn with_network_state(&self, token: &ContextToken, f: impl FnOnce(&mut NetworkState)) {
        self.network.check(token);
        match self.network_state.lock() {
            Ok(mut ns) => f(&mut ns),
            Err(err) => error!("mid={} network state poisoned: {}", self.config.mid, err),
        }
    }

    fn read_worker_state<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&WorkerState) -> R + Send + 'static,
        R: Send + 'static,
    {
        let this = self.clone();
        self.worker.invoke(move |token| -> Result<R> {
            this.worker.check(token);
            let ws = this.worker_state.lock()?;
            Ok(f(&ws))
        })?
    }

    fn read_network_state<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&NetworkState) -> R + Send + 'static,
        R: Send + 'static,
    {
        let this = self.clone();
        self.network.invoke(move |token| -> Result<R> {
            this.network.check(token);
            let ns = this.network_state.lock()?;
            Ok(f(&ns))
        })?
    }
}
