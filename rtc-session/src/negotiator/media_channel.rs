use crate::channel::rtp_transport::NetworkRoute;
use crate::description::{Codec, MediaType, RtpExtension, StreamParams};
use shared::error::Result;

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RtcpMode {
    #[default]
    Compound,
    ReducedSize,
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct RtcpParameters {
    pub reduced_size: bool,
    pub remote_estimate: bool,
}

/// What the media engine needs to encode and send one content section.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct SenderParameters {
    pub codecs: Vec<Codec>,
    pub extensions: Vec<RtpExtension>,
    pub rtcp: RtcpParameters,
    /// `None` leaves the bitrate unlimited.
    pub max_bandwidth_bps: Option<u32>,
    pub extmap_allow_mixed: bool,
    pub mid: String,
    pub conference_mode: bool,
    pub is_stream_active: bool,
}

/// What the media engine needs to decode one content section.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ReceiverParameters {
    pub codecs: Vec<Codec>,
    pub extensions: Vec<RtpExtension>,
    pub rtcp: RtcpParameters,
    pub is_stream_active: bool,
}

/// Sending half of a media engine channel. Errors returned here are
/// rejections; the caller reports them with its own context.
pub trait MediaSendChannel: Send {
    fn media_type(&self) -> MediaType;
    fn set_sender_parameters(&mut self, params: &SenderParameters) -> Result<()>;
    fn add_send_stream(&mut self, stream: &StreamParams) -> Result<()>;
    fn remove_send_stream(&mut self, ssrc: u32) -> Result<()>;
    fn set_send(&mut self, send: bool);
    fn on_ready_to_send(&mut self, ready: bool);
    fn on_network_route_changed(
        &mut self,
        route: &NetworkRoute,
        transport_overhead_per_packet: usize,
    );
}

/// Receiving half of a media engine channel.
pub trait MediaReceiveChannel: Send {
    fn set_receiver_parameters(&mut self, params: &ReceiverParameters) -> Result<()>;
    fn add_recv_stream(&mut self, stream: &StreamParams) -> Result<()>;
    fn remove_recv_stream(&mut self, ssrc: u32) -> Result<()>;
    /// Drops the cached parameters used for streams without signaled SSRCs.
    fn reset_unsignaled_recv_stream(&mut self);
    fn set_playout(&mut self, playout: bool);
    fn set_rtcp_mode(&mut self, mode: RtcpMode);
}
