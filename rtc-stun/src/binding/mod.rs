#[cfg(test)]
mod binding_test;

mod request;

use bytes::BytesMut;
use log::{debug, trace, warn};
use shared::error::*;
use shared::{TaggedBytesMut, TransportContext, TransportMessage, TransportProtocol};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::message::*;
use crate::textattrs::Software;

pub use request::BindingRequest;
pub(crate) use request::{PendingBindingRequest, ScheduledBindingRequest};

/// Total budget for re-sending binding requests to a server that keeps
/// answering with errors or not answering at all.
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(50);
pub const DEFAULT_INITIAL_RTO: Duration = Duration::from_millis(250);
pub const DEFAULT_MAX_RTO: Duration = Duration::from_millis(8000);
pub const DEFAULT_MAX_RETRANSMISSIONS: u32 = 8;
pub const DEFAULT_SOFTWARE: &str = "rtc-stun";

/// BindingConfig tunes the retransmission policy of a [`BindingRequestEngine`].
/// Unset fields fall back to the `DEFAULT_*` constants.
#[derive(Default, Debug, Clone)]
pub struct BindingConfig {
    pub retry_timeout: Option<Duration>,
    pub initial_rto: Option<Duration>,
    pub max_rto: Option<Duration>,
    pub max_retransmissions: Option<u32>,
    /// How long a chain of requests to one server may be kept alive.
    /// `None` keeps it alive forever.
    pub lifetime: Option<Duration>,
    pub software: Option<String>,
}

impl BindingConfig {
    pub fn with_retry_timeout(mut self, retry_timeout: Duration) -> Self {
        self.retry_timeout = Some(retry_timeout);
        self
    }

    pub fn with_initial_rto(mut self, rto: Duration) -> Self {
        self.initial_rto = Some(rto);
        self
    }

    pub fn with_max_rto(mut self, rto: Duration) -> Self {
        self.max_rto = Some(rto);
        self
    }

    pub fn with_max_retransmissions(mut self, n: u32) -> Self {
        self.max_retransmissions = Some(n);
        self
    }

    pub fn with_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn with_software(mut self, software: &str) -> Self {
        self.software = Some(software.to_owned());
        self
    }
}

#[derive(Debug, Clone)]
struct BindingSettings {
    retry_timeout: Duration,
    initial_rto: Duration,
    max_rto: Duration,
    max_retransmissions: u32,
    lifetime: Option<Duration>,
    software: Software,
}

impl From<BindingConfig> for BindingSettings {
    fn from(config: BindingConfig) -> Self {
        let initial_rto = config.initial_rto.unwrap_or(DEFAULT_INITIAL_RTO);
        BindingSettings {
            retry_timeout: config.retry_timeout.unwrap_or(DEFAULT_RETRY_TIMEOUT),
            initial_rto,
            max_rto: config.max_rto.unwrap_or(DEFAULT_MAX_RTO).max(initial_rto),
            max_retransmissions: config
                .max_retransmissions
                .unwrap_or(DEFAULT_MAX_RETRANSMISSIONS),
            lifetime: config.lifetime,
            software: Software::new(config.software.as_deref().unwrap_or(DEFAULT_SOFTWARE)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DumpDirection {
    Outbound,
    Inbound,
}

impl fmt::Display for DumpDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DumpDirection::Outbound => write!(f, "->"),
            DumpDirection::Inbound => write!(f, "<-"),
        }
    }
}

/// PacketDumper receives every STUN buffer the engine sends or inspects.
pub trait PacketDumper: Send {
    fn dump(&mut self, direction: DumpDirection, peer: SocketAddr, buf: &[u8]);
}

/// LogDumper writes packet summaries to the `log` facade at trace level.
#[derive(Default, Debug)]
pub struct LogDumper;

impl PacketDumper for LogDumper {
    fn dump(&mut self, direction: DumpDirection, peer: SocketAddr, buf: &[u8]) {
        trace!("stun {direction} {peer}: {} bytes", buf.len());
    }
}

/// BindingEvent is the outcome of a single binding transaction.
#[derive(Debug, Clone)]
pub enum BindingEvent {
    Response {
        request: BindingRequest,
        id: TransactionId,
        message: Message,
        rtt: Duration,
    },
    ErrorResponse {
        request: BindingRequest,
        id: TransactionId,
        message: Message,
        rtt: Duration,
    },
    Timeout {
        request: BindingRequest,
        id: TransactionId,
    },
}

impl BindingEvent {
    pub fn request(&self) -> &BindingRequest {
        match self {
            BindingEvent::Response { request, .. }
            | BindingEvent::ErrorResponse { request, .. }
            | BindingEvent::Timeout { request, .. } => request,
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        match self {
            BindingEvent::Response { id, .. }
            | BindingEvent::ErrorResponse { id, .. }
            | BindingEvent::Timeout { id, .. } => *id,
        }
    }
}

/// BindingRequestEngine sends STUN binding requests, retransmits them on an
/// exponential back-off and matches responses by transaction id.
///
/// The engine never touches a socket: outgoing datagrams are drained with
/// [`poll_transmit`](BindingRequestEngine::poll_transmit) and incoming ones are
/// offered through [`check_response`](BindingRequestEngine::check_response).
pub struct BindingRequestEngine {
    local_addr: SocketAddr,
    settings: BindingSettings,
    pending: HashMap<TransactionId, PendingBindingRequest>,
    scheduled: Vec<ScheduledBindingRequest>,
    transmits: VecDeque<TaggedBytesMut>,
    events: VecDeque<BindingEvent>,
    dumper: Box<dyn PacketDumper>,
    closed: bool,
}

impl BindingRequestEngine {
    pub fn new(config: BindingConfig, local_addr: SocketAddr, dumper: Box<dyn PacketDumper>) -> Self {
        Self {
            local_addr,
            settings: config.into(),
            pending: HashMap::new(),
            scheduled: vec![],
            transmits: VecDeque::new(),
            events: VecDeque::new(),
            dumper,
            closed: false,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn set_local_addr(&mut self, local_addr: SocketAddr) {
        self.local_addr = local_addr;
    }

    pub fn retry_timeout(&self) -> Duration {
        self.settings.retry_timeout
    }

    pub fn lifetime(&self) -> Option<Duration> {
        self.settings.lifetime
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of transactions waiting for a response.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of sends waiting for their scheduled time.
    pub fn scheduled_len(&self) -> usize {
        self.scheduled.len()
    }

    pub fn is_pending(&self, id: &TransactionId) -> bool {
        self.pending.contains_key(id)
    }

    /// send encodes a new binding request to `request.server` and queues it
    /// for transmission. Returns the transaction id of the request.
    pub fn send(&mut self, request: BindingRequest, now: Instant) -> Result<TransactionId> {
        self.send_with_id(request, TransactionId::new(), now)
    }

    pub(crate) fn send_with_id(
        &mut self,
        request: BindingRequest,
        id: TransactionId,
        now: Instant,
    ) -> Result<TransactionId> {
        if self.closed {
            return Err(Error::ErrEngineClosed);
        }
        if self.pending.contains_key(&id) {
            return Err(Error::ErrTransactionExists);
        }

        let mut m = Message::new();
        m.build(&[&id, &BINDING_REQUEST, &self.settings.software])?;

        let raw = BytesMut::from(&m.raw[..]);
        let pending =
            PendingBindingRequest::new(id, request, raw, now, self.settings.initial_rto);
        debug!("sending binding request {} to {}", id, request.server);
        self.transmit(&pending, now);
        self.pending.insert(id, pending);

        Ok(id)
    }

    /// send_delayed queues `request` to be sent once `delay` has elapsed.
    pub fn send_delayed(
        &mut self,
        request: BindingRequest,
        delay: Duration,
        now: Instant,
    ) -> Result<()> {
        if self.closed {
            return Err(Error::ErrEngineClosed);
        }
        self.scheduled.push(ScheduledBindingRequest {
            at: now + delay,
            request,
        });
        Ok(())
    }

    /// check_response offers an inbound datagram to the engine. Returns true
    /// when it answered one of the pending requests; the matching
    /// [`BindingEvent`] is then available from `poll_event`.
    pub fn check_response(&mut self, buf: &[u8], from: SocketAddr, now: Instant) -> bool {
        if self.closed {
            return false;
        }
        self.dumper.dump(DumpDirection::Inbound, from, buf);

        if !is_message(buf) {
            return false;
        }
        let mut m = Message::new();
        if let Err(err) = m.unmarshal_binary(buf) {
            debug!("dropping malformed stun message from {from}: {err}");
            return false;
        }

        let class = m.typ.class;
        if class != CLASS_SUCCESS_RESPONSE && class != CLASS_ERROR_RESPONSE {
            return false;
        }

        let Some(pending) = self.pending.remove(&m.transaction_id) else {
            trace!(
                "no pending binding request for {} from {from}",
                m.transaction_id
            );
            return false;
        };

        if m.typ.method != METHOD_BINDING {
            warn!(
                "unexpected {} for binding request {}",
                m.typ, pending.id
            );
        }

        let rtt = now.saturating_duration_since(pending.sent_at);
        let event = if class == CLASS_SUCCESS_RESPONSE {
            BindingEvent::Response {
                request: pending.request,
                id: pending.id,
                message: m,
                rtt,
            }
        } else {
            BindingEvent::ErrorResponse {
                request: pending.request,
                id: pending.id,
                message: m,
                rtt,
            }
        };
        self.events.push_back(event);

        true
    }

    /// cancel drops a pending request, and any of its datagrams not drained
    /// yet, without emitting any event.
    pub fn cancel(&mut self, id: &TransactionId) -> bool {
        if self.pending.remove(id).is_none() {
            return false;
        }
        self.transmits
            .retain(|t| transaction_id_of(&t.message) != Some(&id.0[..]));
        true
    }

    /// handle_timeout fires due scheduled sends and retransmits or expires
    /// pending requests whose deadline has passed.
    pub fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        if self.closed {
            return Err(Error::ErrEngineClosed);
        }

        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut self.scheduled)
            .into_iter()
            .partition(|s| s.at <= now);
        self.scheduled = later;
        let mut errs = vec![];
        for s in due {
            if let Err(err) = self.send(s.request, now) {
                warn!(
                    "failed to send scheduled binding request to {}: {err}",
                    s.request.server
                );
                errs.push(err);
            }
        }

        let mut expired: Vec<(Instant, TransactionId)> = self
            .pending
            .values()
            .filter(|p| p.deadline <= now)
            .map(|p| (p.deadline, p.id))
            .collect();
        expired.sort_by_key(|(deadline, _)| *deadline);

        for (_, id) in expired {
            let retransmit = match self.pending.get(&id) {
                Some(pending) => self.can_retransmit(pending, now),
                None => continue,
            };

            if retransmit {
                if let Some(mut pending) = self.pending.remove(&id) {
                    pending.on_retransmit(now, self.settings.max_rto);
                    trace!(
                        "retransmitting binding request {} to {} (attempt {})",
                        id,
                        pending.request.server,
                        pending.retries()
                    );
                    self.transmit(&pending, now);
                    self.pending.insert(id, pending);
                }
            } else if let Some(pending) = self.pending.remove(&id) {
                debug!(
                    "binding request {} to {} timed out after {} retransmissions",
                    id,
                    pending.request.server,
                    pending.retries()
                );
                self.events.push_back(BindingEvent::Timeout {
                    request: pending.request,
                    id,
                });
            }
        }

        flatten_errs(errs)
    }

    /// poll_timeout returns the earliest instant at which `handle_timeout`
    /// has work to do.
    pub fn poll_timeout(&self) -> Option<Instant> {
        let pending = self.pending.values().map(|p| p.deadline);
        let scheduled = self.scheduled.iter().map(|s| s.at);
        pending.chain(scheduled).min()
    }

    pub fn poll_transmit(&mut self) -> Option<TaggedBytesMut> {
        self.transmits.pop_front()
    }

    pub fn poll_event(&mut self) -> Option<BindingEvent> {
        self.events.pop_front()
    }

    /// close drops every pending and scheduled request. No event is emitted
    /// for them and later sends fail with `ErrEngineClosed`.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ErrEngineClosed);
        }
        self.closed = true;
        self.pending.clear();
        self.scheduled.clear();
        self.transmits.clear();
        self.events.clear();
        Ok(())
    }

    /// A request is retransmitted while attempts remain and the chain it
    /// belongs to is still within both the retry budget and the lifetime.
    fn can_retransmit(&self, pending: &PendingBindingRequest, now: Instant) -> bool {
        if pending.retries() >= self.settings.max_retransmissions {
            return false;
        }
        let elapsed = pending.request.elapsed(now);
        let window = match self.settings.lifetime {
            Some(lifetime) => lifetime.min(self.settings.retry_timeout),
            None => self.settings.retry_timeout,
        };
        elapsed < window
    }

    fn transmit(&mut self, pending: &PendingBindingRequest, now: Instant) {
        self.dumper
            .dump(DumpDirection::Outbound, pending.request.server, &pending.raw);
        self.transmits.push_back(TransportMessage {
            now,
            transport: TransportContext {
                local_addr: self.local_addr,
                peer_addr: pending.request.server,
                transport_protocol: TransportProtocol::UDP,
            },
            message: pending.raw.clone(),
        });
    }
}

fn transaction_id_of(raw: &[u8]) -> Option<&[u8]> {
    raw.get(MESSAGE_HEADER_SIZE - TRANSACTION_ID_SIZE..MESSAGE_HEADER_SIZE)
}

impl sansio::Protocol<TaggedBytesMut, BindingRequest, ()> for BindingRequestEngine {
    type Rout = ();
    type Wout = TaggedBytesMut;
    type Eout = BindingEvent;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        self.check_response(&msg.message, msg.transport.peer_addr, msg.now);
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        None
    }

    /// Sends a request whose chain starts now, at `request.start_time`.
    fn handle_write(&mut self, request: BindingRequest) -> Result<()> {
        self.send(request, request.start_time).map(|_| ())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.poll_transmit()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        BindingRequestEngine::poll_event(self)
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        BindingRequestEngine::handle_timeout(self, now)
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        BindingRequestEngine::poll_timeout(self)
    }

    fn close(&mut self) -> Result<()> {
        BindingRequestEngine::close(self)
    }
}
