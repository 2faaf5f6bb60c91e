use bytes::BytesMut;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::message::TransactionId;

/// A binding request as seen by the owner of the engine: where it goes and
/// when the chain of requests to that server started.
///
/// `start_time` is carried over to keepalive and retry re-sends so that the
/// retry ceiling and the keepalive lifetime are measured from the first send.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BindingRequest {
    pub server: SocketAddr,
    pub start_time: Instant,
}

impl BindingRequest {
    pub fn new(server: SocketAddr, start_time: Instant) -> Self {
        Self { server, start_time }
    }

    /// Time since the first request of the chain was sent.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start_time)
    }
}

/// PendingBindingRequest is an outstanding transaction waiting for a
/// response, a retransmission or its final timeout.
#[derive(Debug)]
pub(crate) struct PendingBindingRequest {
    pub(crate) id: TransactionId,
    pub(crate) request: BindingRequest,
    pub(crate) raw: BytesMut,
    pub(crate) sent_at: Instant,
    pub(crate) n_rtx: u32,
    pub(crate) rto: Duration,
    pub(crate) deadline: Instant,
}

impl PendingBindingRequest {
    pub(crate) fn new(
        id: TransactionId,
        request: BindingRequest,
        raw: BytesMut,
        now: Instant,
        rto: Duration,
    ) -> Self {
        Self {
            id,
            request,
            raw,
            sent_at: now,
            n_rtx: 0,
            rto,
            deadline: now + rto,
        }
    }

    /// Arms the next retransmission, doubling the interval up to `max_rto`.
    pub(crate) fn on_retransmit(&mut self, now: Instant, max_rto: Duration) {
        self.n_rtx += 1;
        self.rto = (self.rto * 2).min(max_rto);
        self.sent_at = now;
        self.deadline = now + self.rto;
    }

    pub(crate) fn retries(&self) -> u32 {
        self.n_rtx
    }
}

/// A request waiting for its scheduled send time.
#[derive(Debug)]
pub(crate) struct ScheduledBindingRequest {
    pub(crate) at: Instant,
    pub(crate) request: BindingRequest,
}
