
/// Binding statistics of one port, accumulated over its whole lifetime.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct StunStats {
    /// Binding requests put on the wire, retransmissions and keepalives included.
    pub stun_binding_requests_sent: u64,
    pub stun_binding_responses_received: u64,
    pub stun_binding_rtt_ms_total: u64,
    pub stun_binding_rtt_ms_squared_total: u64,
}

impl StunStats {
    pub(crate) fn on_request_sent(&mut self) {
        self.stun_binding_requests_sent += 1;
    }

    pub(crate) fn on_response(&mut self, rtt_ms: u64) {
        self.stun_binding_responses_received += 1;
        self.stun_binding_rtt_ms_total += rtt_ms;
        self.stun_binding_rtt_ms_squared_total += rtt_ms * rtt_ms;
    }

    /// Mean binding round trip time, `None` before the first response.
    pub fn average_rtt_ms(&self) -> Option<f64> {
        if self.stun_binding_responses_received == 0 {
            return None;
        }
        Some(self.stun_binding_rtt_ms_total as f64 / self.stun_binding_responses_received as f64)
    }

    /// Population variance of the binding round trip time.
    pub fn rtt_variance_ms(&self) -> Option<f64> {
        let mean = self.average_rtt_ms()?;
        let n = self.stun_binding_responses_received as f64;
        Some(self.stun_binding_rtt_ms_squared_total as f64 / n - mean * mean)
    }
}
