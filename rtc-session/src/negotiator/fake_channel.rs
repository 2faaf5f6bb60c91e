use super::media_channel::*;
use crate::channel::rtp_transport::NetworkRoute;
use crate::description::{Codec, MediaType, StreamParams};
use shared::error::{Error, Result};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default, Debug)]
pub(crate) struct SendState {
    pub(crate) params: Option<SenderParameters>,
    pub(crate) streams: Vec<StreamParams>,
    pub(crate) added: usize,
    pub(crate) sending: bool,
    pub(crate) ready_to_send: bool,
    pub(crate) route: Option<(NetworkRoute, usize)>,
    pub(crate) reject_params: bool,
    pub(crate) reject_ssrcs: HashSet<u32>,
}

/// Records what the negotiator pushed to it. Clones share state.
#[derive(Clone)]
pub(crate) struct FakeSendChannel {
    media_type: MediaType,
    state: Arc<Mutex<SendState>>,
}

impl FakeSendChannel {
    pub(crate) fn new(media_type: MediaType) -> Self {
        FakeSendChannel {
            media_type,
            state: Arc::new(Mutex::new(SendState::default())),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, SendState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn codecs(&self) -> Vec<Codec> {
        self.state()
            .params
            .as_ref()
            .map(|p| p.codecs.clone())
            .unwrap_or_default()
    }

    pub(crate) fn ssrcs(&self) -> Vec<u32> {
        self.state()
            .streams
            .iter()
            .filter_map(|s| s.first_ssrc())
            .collect()
    }
}

impl MediaSendChannel for FakeSendChannel {
    fn media_type(&self) -> MediaType {
        self.media_type
    }

    fn set_sender_parameters(&mut self, params: &SenderParameters) -> Result<()> {
        let mut state = self.state();
        if state.reject_params {
            return Err(Error::ErrCodecsRejected);
        }
        state.params = Some(params.clone());
        Ok(())
    }

    fn add_send_stream(&mut self, stream: &StreamParams) -> Result<()> {
        let mut state = self.state();
        let ssrc = stream.first_ssrc().unwrap_or_default();
        if state.reject_ssrcs.contains(&ssrc) || state.streams.iter().any(|s| s.has_ssrc(ssrc)) {
            return Err(Error::ErrStreamRejected(ssrc));
        }
        state.streams.push(stream.clone());
        state.added += 1;
        Ok(())
    }

    fn remove_send_stream(&mut self, ssrc: u32) -> Result<()> {
        let mut state = self.state();
        let before = state.streams.len();
        state.streams.retain(|s| !s.has_ssrc(ssrc));
        if state.streams.len() == before {
            return Err(Error::ErrStreamRejected(ssrc));
        }
        Ok(())
    }

    fn set_send(&mut self, send: bool) {
        self.state().sending = send;
    }

    fn on_ready_to_send(&mut self, ready: bool) {
        self.state().ready_to_send = ready;
    }

    fn on_network_route_changed(
        &mut self,
        route: &NetworkRoute,
        transport_overhead_per_packet: usize,
    ) {
        self.state().route = Some((route.clone(), transport_overhead_per_packet));
    }
}

#[derive(Default, Debug)]
pub(crate) struct RecvState {
    pub(crate) params: Option<ReceiverParameters>,
    pub(crate) streams: Vec<StreamParams>,
    pub(crate) playout: bool,
    pub(crate) rtcp_mode: RtcpMode,
    pub(crate) unsignaled_resets: usize,
    pub(crate) reject_params: bool,
}

#[derive(Clone, Default)]
pub(crate) struct FakeRecvChannel {
    state: Arc<Mutex<RecvState>>,
}

impl FakeRecvChannel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, RecvState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn codecs(&self) -> Vec<Codec> {
        self.state()
            .params
            .as_ref()
            .map(|p| p.codecs.clone())
            .unwrap_or_default()
    }

    pub(crate) fn ssrcs(&self) -> Vec<u32> {
        self.state()
            .streams
            .iter()
            .filter_map(|s| s.first_ssrc())
            .collect()
    }
}

impl MediaReceiveChannel for FakeRecvChannel {
    fn set_receiver_parameters(&mut self, params: &ReceiverParameters) -> Result<()> {
        let mut state = self.state();
        if state.reject_params {
            return Err(Error::ErrCodecsRejected);
        }
        state.params = Some(params.clone());
        Ok(())
    }

    fn add_recv_stream(&mut self, stream: &StreamParams) -> Result<()> {
        self.state().streams.push(stream.clone());
        Ok(())
    }

    fn remove_recv_stream(&mut self, ssrc: u32) -> Result<()> {
        let mut state = self.state();
        let before = state.streams.len();
        state.streams.retain(|s| !s.has_ssrc(ssrc));
        if state.streams.len() == before {
            return Err(Error::ErrStreamRejected(ssrc));
        }
        Ok(())
    }

    fn reset_unsignaled_recv_stream(&mut self) {
        let mut state = self.state();
        state.unsignaled_resets += 1;
        state.streams.retain(|s| s.has_ssrcs());
    }

    fn set_playout(&mut self, playout: bool) {
        self.state().playout = playout;
    }

    fn set_rtcp_mode(&mut self, mode: RtcpMode) {
        self.state().rtcp_mode = mode;
    }
}
