#[cfg(test)]
pub(crate) mod fake_channel;
#[cfg(test)]
mod negotiator_test;

pub mod media_channel;
pub mod rtcp_mux_filter;
pub mod sdp_type;

pub use media_channel::{
    MediaReceiveChannel, MediaSendChannel, ReceiverParameters, RtcpMode, RtcpParameters,
    SenderParameters,
};
pub use rtcp_mux_filter::{ContentSource, RtcpMuxFilter, RtcpMuxState};
pub use sdp_type::SdpType;

use log::{debug, info, warn};
use shared::error::*;
use std::collections::BTreeSet;

use crate::description::codec::find_all_matching_codecs;
use crate::description::content::AUTO_BANDWIDTH;
use crate::description::rtp_extension::deduplicate_header_extensions;
use crate::description::stream::{get_stream_by_ssrc, has_stream_with_no_ssrcs};
use crate::description::{
    Codec, MediaContentDescription, MediaDirection, MediaType, RtpExtension, StreamParams,
};

/// Packets the transport should route to this content section.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct DemuxerCriteria {
    pub mid: String,
    pub ssrcs: BTreeSet<u32>,
    pub payload_types: BTreeSet<u8>,
}

/// ContentNegotiator applies local and remote descriptions of one content
/// section to a media channel pair and keeps what was negotiated.
pub struct ContentNegotiator {
    mid: String,
    media_type: MediaType,
    rtcp_mux_required: bool,
    prefer_encrypted_header_extensions: bool,

    rtcp_mux_filter: RtcpMuxFilter,
    local_content: Option<MediaContentDescription>,
    remote_content: Option<MediaContentDescription>,
    local_direction: MediaDirection,
    remote_direction: MediaDirection,

    last_send_params: SenderParameters,
    last_recv_params: ReceiverParameters,
    local_streams: Vec<StreamParams>,
    remote_streams: Vec<StreamParams>,
    demuxer_criteria: DemuxerCriteria,
}

impl ContentNegotiator {
    pub fn new(mid: &str, media_type: MediaType) -> Self {
        ContentNegotiator {
            mid: mid.to_owned(),
            media_type,
            rtcp_mux_required: false,
            prefer_encrypted_header_extensions: false,

            rtcp_mux_filter: RtcpMuxFilter::new(),
            local_content: None,
            remote_content: None,
            local_direction: MediaDirection::Unspecified,
            remote_direction: MediaDirection::Unspecified,

            last_send_params: SenderParameters {
                mid: mid.to_owned(),
                ..Default::default()
            },
            last_recv_params: ReceiverParameters::default(),
            local_streams: vec![],
            remote_streams: vec![],
            demuxer_criteria: DemuxerCriteria {
                mid: mid.to_owned(),
                ..Default::default()
            },
        }
    }

    /// Every description must then carry `a=rtcp-mux`, and mux is active
    /// from the start.
    pub fn with_rtcp_mux_required(mut self, required: bool) -> Self {
        self.rtcp_mux_required = required;
        if required {
            self.rtcp_mux_filter.set_active();
        }
        self
    }

    /// Keep the encrypted variant of header extensions offered both ways.
    pub fn with_encrypted_header_extensions(mut self, prefer_encrypted: bool) -> Self {
        self.prefer_encrypted_header_extensions = prefer_encrypted;
        self
    }

    pub fn mid(&self) -> &str {
        &self.mid
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn local_content(&self) -> Option<&MediaContentDescription> {
        self.local_content.as_ref()
    }

    pub fn remote_content(&self) -> Option<&MediaContentDescription> {
        self.remote_content.as_ref()
    }

    pub fn local_direction(&self) -> MediaDirection {
        self.local_direction
    }

    pub fn remote_direction(&self) -> MediaDirection {
        self.remote_direction
    }

    pub fn send_params(&self) -> &SenderParameters {
        &self.last_send_params
    }

    pub fn recv_params(&self) -> &ReceiverParameters {
        &self.last_recv_params
    }

    pub fn local_streams(&self) -> &[StreamParams] {
        &self.local_streams
    }

    pub fn remote_streams(&self) -> &[StreamParams] {
        &self.remote_streams
    }

    pub fn demuxer_criteria(&self) -> &DemuxerCriteria {
        &self.demuxer_criteria
    }

    pub fn rtcp_mux_filter(&self) -> &RtcpMuxFilter {
        &self.rtcp_mux_filter
    }

    pub fn is_rtcp_mux_active(&self) -> bool {
        self.rtcp_mux_filter.is_active()
    }

    /// Applies a description this side produced. The receive parameters
    /// follow its codecs; when it answers, send codecs are checked against
    /// it for packetization.
    pub fn set_local_content(
        &mut self,
        content: &MediaContentDescription,
        sdp_type: SdpType,
        send: &mut dyn MediaSendChannel,
        recv: &mut dyn MediaReceiveChannel,
    ) -> Result<()> {
        self.check_content(content, sdp_type)?;
        debug!("set_local_content {} for mid={}", sdp_type, self.mid);

        let rtcp_mux_filter =
            self.negotiate_rtcp_mux(content.rtcp_mux, sdp_type, ContentSource::Local)?;

        let mut recv_params = self.last_recv_params.clone();
        self.media_params_from_content(
            content,
            &mut recv_params.codecs,
            &mut recv_params.extensions,
        );
        recv_params.rtcp = RtcpParameters {
            reduced_size: content.rtcp_reduced_size,
            remote_estimate: content.remote_estimate,
        };
        recv_params.is_stream_active = content.direction.has_recv();

        let mut send_params = self.last_send_params.clone();
        let mut needs_send_params_update = false;
        if sdp_type.is_answer() {
            needs_send_params_update = verify_codec_packetization(
                &mut send_params.codecs,
                &recv_params.codecs,
                ContentSource::Local,
                &self.mid,
            )?;
        }

        if let Err(err) = recv.set_receiver_parameters(&recv_params) {
            warn!("mid={} rejected receiver parameters: {}", self.mid, err);
            return Err(Error::ErrSetRecvParameters(
                self.media_type.to_string(),
                self.mid.clone(),
            ));
        }
        // payload types follow the latest receive codecs
        self.demuxer_criteria.payload_types = if content.direction.has_recv() {
            recv_params.codecs.iter().map(|c| c.id).collect()
        } else {
            BTreeSet::new()
        };
        self.last_recv_params = recv_params;

        if needs_send_params_update {
            if let Err(err) = send.set_sender_parameters(&send_params) {
                warn!("mid={} rejected sender parameters: {}", self.mid, err);
                return Err(Error::ErrSetSendParameters(
                    self.media_type.to_string(),
                    self.mid.clone(),
                ));
            }
            self.last_send_params = send_params;
        }

        self.update_local_streams(&content.streams, send)?;

        self.rtcp_mux_filter = rtcp_mux_filter;
        self.local_direction = content.direction;
        self.local_content = Some(content.clone());
        Ok(())
    }

    /// Applies a description the peer produced. Send codecs are taken from
    /// it as is; when it answers, receive codecs are checked against it for
    /// packetization.
    pub fn set_remote_content(
        &mut self,
        content: &MediaContentDescription,
        sdp_type: SdpType,
        send: &mut dyn MediaSendChannel,
        recv: &mut dyn MediaReceiveChannel,
    ) -> Result<()> {
        self.check_content(content, sdp_type)?;
        debug!("set_remote_content {} for mid={}", sdp_type, self.mid);

        let rtcp_mux_filter =
            self.negotiate_rtcp_mux(content.rtcp_mux, sdp_type, ContentSource::Remote)?;

        let mut send_params = self.last_send_params.clone();
        self.media_params_from_content(
            content,
            &mut send_params.codecs,
            &mut send_params.extensions,
        );
        send_params.rtcp = RtcpParameters {
            reduced_size: content.rtcp_reduced_size,
            remote_estimate: content.remote_estimate,
        };
        send_params.is_stream_active = content.direction.has_recv();
        send_params.max_bandwidth_bps = if content.bandwidth == AUTO_BANDWIDTH {
            None
        } else {
            u32::try_from(content.bandwidth).ok()
        };
        send_params.extmap_allow_mixed = content.extmap_allow_mixed();
        send_params.mid = self.mid.clone();
        send_params.conference_mode = content.conference_mode;

        let mut recv_params = self.last_recv_params.clone();
        let mut needs_recv_params_update = false;
        if sdp_type.is_answer() {
            needs_recv_params_update = verify_codec_packetization(
                &mut recv_params.codecs,
                &send_params.codecs,
                ContentSource::Remote,
                &self.mid,
            )?;
        }

        if let Err(err) = send.set_sender_parameters(&send_params) {
            warn!("mid={} rejected sender parameters: {}", self.mid, err);
            return Err(Error::ErrSetSendParameters(
                self.media_type.to_string(),
                self.mid.clone(),
            ));
        }
        self.last_send_params = send_params;

        if needs_recv_params_update {
            if let Err(err) = recv.set_receiver_parameters(&recv_params) {
                warn!("mid={} rejected receiver parameters: {}", self.mid, err);
                return Err(Error::ErrSetRecvParameters(
                    self.media_type.to_string(),
                    self.mid.clone(),
                ));
            }
            self.last_recv_params = recv_params;
        }

        recv.set_rtcp_mode(if content.rtcp_reduced_size {
            RtcpMode::ReducedSize
        } else {
            RtcpMode::Compound
        });

        self.update_remote_streams(&content.streams, recv)?;

        self.rtcp_mux_filter = rtcp_mux_filter;
        self.remote_direction = content.direction;
        self.remote_content = Some(content.clone());
        Ok(())
    }

    fn check_content(&self, content: &MediaContentDescription, sdp_type: SdpType) -> Result<()> {
        if !content.is_rtp() {
            return Err(Error::ErrContentNotRtp);
        }
        match sdp_type {
            SdpType::Offer | SdpType::PrAnswer | SdpType::Answer => Ok(()),
            _ => Err(Error::ErrUnknownSdpType(sdp_type.to_string())),
        }
    }

    /// Runs the mux filter on a copy so a failed negotiation leaves the
    /// current state untouched.
    fn negotiate_rtcp_mux(
        &self,
        enable: bool,
        sdp_type: SdpType,
        src: ContentSource,
    ) -> Result<RtcpMuxFilter> {
        if self.rtcp_mux_required && !enable {
            return Err(Error::ErrRtcpMuxRequired);
        }

        let mut filter = self.rtcp_mux_filter;
        let ok = match sdp_type {
            SdpType::Offer => filter.set_offer(enable, src),
            SdpType::PrAnswer => filter.set_provisional_answer(enable, src),
            SdpType::Answer => filter.set_answer(enable, src),
            _ => false,
        };
        if !ok {
            return Err(Error::ErrSetupRtcpMuxFilter(self.mid.clone()));
        }
        Ok(filter)
    }

    fn media_params_from_content(
        &self,
        content: &MediaContentDescription,
        codecs: &mut Vec<Codec>,
        extensions: &mut Vec<RtpExtension>,
    ) {
        if content.has_codecs() {
            *codecs = content.codecs.clone();
        }
        if content.rtp_header_extensions_set {
            *extensions = deduplicate_header_extensions(
                &content.rtp_header_extensions,
                self.prefer_encrypted_header_extensions,
            );
        }
    }

    /// Removes send streams that are gone, adds the new ones and keeps the
    /// rest. The stream list is updated even if the channel rejected some
    /// of the changes.
    fn update_local_streams(
        &mut self,
        streams: &[StreamParams],
        send: &mut dyn MediaSendChannel,
    ) -> Result<()> {
        let mut result = Ok(());

        for old_stream in &self.local_streams {
            let Some(ssrc) = old_stream.first_ssrc() else {
                continue;
            };
            if streams.iter().any(|s| s.same_stream(old_stream)) {
                continue;
            }
            if let Err(err) = send.remove_send_stream(ssrc) {
                warn!("mid={} failed to remove send stream {}: {}", self.mid, ssrc, err);
                result = Err(Error::ErrRemoveSendStream(ssrc, self.mid.clone()));
            }
        }

        let mut all_streams = Vec::with_capacity(streams.len());
        for stream in streams {
            if let Some(existing) = self.local_streams.iter().find(|s| s.same_stream(stream)) {
                all_streams.push(existing.clone());
                continue;
            }

            all_streams.push(stream.clone());
            let Some(ssrc) = stream.first_ssrc() else {
                continue;
            };
            match send.add_send_stream(stream) {
                Ok(()) => info!("add send stream ssrc: {} into mid={}", ssrc, self.mid),
                Err(err) => {
                    warn!("mid={} failed to add send stream {}: {}", self.mid, ssrc, err);
                    result = Err(Error::ErrAddSendStream(ssrc, self.mid.clone()));
                }
            }
        }

        self.local_streams = all_streams;
        result
    }

    /// Mirrors the remote stream list onto the receive channel. A stream
    /// without SSRCs stands for every unsignaled stream.
    fn update_remote_streams(
        &mut self,
        streams: &[StreamParams],
        recv: &mut dyn MediaReceiveChannel,
    ) -> Result<()> {
        let new_has_unsignaled = has_stream_with_no_ssrcs(streams);
        let old_has_unsignaled = has_stream_with_no_ssrcs(&self.remote_streams);

        for old_stream in &self.remote_streams {
            match old_stream.first_ssrc() {
                None if !new_has_unsignaled => {
                    recv.reset_unsignaled_recv_stream();
                    info!("reset unsignaled remote stream for mid={}", self.mid);
                }
                Some(ssrc) if get_stream_by_ssrc(streams, ssrc).is_none() => {
                    if let Err(err) = recv.remove_recv_stream(ssrc) {
                        warn!("mid={} failed to remove recv stream {}: {}", self.mid, ssrc, err);
                        return Err(Error::ErrRemoveRecvStream(ssrc, self.mid.clone()));
                    }
                    info!("remove remote ssrc: {} from mid={}", ssrc, self.mid);
                }
                _ => {}
            }
        }

        let mut ssrcs = BTreeSet::new();
        for stream in streams {
            let is_new = match stream.first_ssrc() {
                None => !old_has_unsignaled,
                Some(ssrc) => get_stream_by_ssrc(&self.remote_streams, ssrc).is_none(),
            };
            if is_new {
                let ssrc = stream.first_ssrc().unwrap_or_default();
                if let Err(err) = recv.add_recv_stream(stream) {
                    warn!("mid={} failed to add recv stream {}: {}", self.mid, ssrc, err);
                    return Err(Error::ErrAddRecvStream(ssrc, self.mid.clone()));
                }
                info!("add remote ssrc: {} into mid={}", ssrc, self.mid);
            }
            ssrcs.extend(stream.ssrcs.iter().copied());
        }

        self.demuxer_criteria.ssrcs = ssrcs;
        self.remote_streams = streams.to_vec();
        Ok(())
    }
}

/// Checks every codec of `codecs` that has a counterpart in `answer_codecs`
/// for a compatible packetization. A counterpart without packetization
/// accepts any value, in which case the codec drops its own. The scan of
/// counterparts stops at the first one that settles the codec, and a codec
/// is skipped when an already verified one matches it.
///
/// Returns whether `codecs` was changed.
pub(crate) fn verify_codec_packetization(
    codecs: &mut [Codec],
    answer_codecs: &[Codec],
    src: ContentSource,
    mid: &str,
) -> Result<bool> {
    let mut updated = false;
    let mut matched: Vec<Codec> = vec![];

    for codec in codecs.iter_mut() {
        if matched.iter().any(|m| codec.matches(m)) {
            continue;
        }

        let counterparts = find_all_matching_codecs(answer_codecs, codec);
        if counterparts.is_empty() {
            continue;
        }

        let mut may_ignore_packetization = false;
        let mut has_matching_packetization = false;
        for other in counterparts {
            if other.packetization.is_none() && codec.packetization.is_some() {
                may_ignore_packetization = true;
            } else if other.packetization == codec.packetization {
                has_matching_packetization = true;
                break;
            }
        }

        if may_ignore_packetization {
            codec.packetization = None;
            updated = true;
        } else if !has_matching_packetization {
            let side = match src {
                ContentSource::Local => "local",
                ContentSource::Remote => "remote",
            };
            return Err(Error::ErrInvalidCodecPacketization(
                side.to_owned(),
                mid.to_owned(),
            ));
        }

        if has_matching_packetization {
            matched.push(codec.clone());
        }
    }

    Ok(updated)
}
