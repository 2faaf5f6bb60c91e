use super::fake_channel::{FakeRecvChannel, FakeSendChannel};
use super::*;
use crate::description::codec::PACKETIZATION_PARAM_RAW;
use crate::description::content::AUTO_BANDWIDTH;

const MID: &str = "0";

fn vp8(id: u8) -> Codec {
    Codec::video(id, "VP8")
}

fn vp8_with(id: u8, packetization: &str) -> Codec {
    Codec::video(id, "VP8").with_packetization(packetization)
}

fn video_with_codecs(codecs: Vec<Codec>) -> MediaContentDescription {
    let mut video = MediaContentDescription::video();
    video.set_codecs(codecs);
    video
}

fn audio_with_ssrcs(ssrcs: &[u32]) -> MediaContentDescription {
    let mut audio = MediaContentDescription::audio();
    audio.add_codec(Codec::audio(111, "opus", 48000, 2));
    for ssrc in ssrcs {
        audio.add_legacy_stream(*ssrc);
    }
    audio
}

struct Harness {
    negotiator: ContentNegotiator,
    send: FakeSendChannel,
    recv: FakeRecvChannel,
}

impl Harness {
    fn new(media_type: MediaType) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Harness {
            negotiator: ContentNegotiator::new(MID, media_type),
            send: FakeSendChannel::new(media_type),
            recv: FakeRecvChannel::new(),
        }
    }

    fn set_local(&mut self, content: &MediaContentDescription, sdp_type: SdpType) -> Result<()> {
        let (mut send, mut recv) = (self.send.clone(), self.recv.clone());
        self.negotiator
            .set_local_content(content, sdp_type, &mut send, &mut recv)
    }

    fn set_remote(&mut self, content: &MediaContentDescription, sdp_type: SdpType) -> Result<()> {
        let (mut send, mut recv) = (self.send.clone(), self.recv.clone());
        self.negotiator
            .set_remote_content(content, sdp_type, &mut send, &mut recv)
    }
}

fn packetizations(codecs: &[Codec]) -> Vec<(u8, Option<String>)> {
    codecs
        .iter()
        .map(|c| (c.id, c.packetization.clone()))
        .collect()
}

fn raw() -> Option<String> {
    Some(PACKETIZATION_PARAM_RAW.to_owned())
}

#[test]
fn test_set_local_offer_with_packetization() -> Result<()> {
    let mut h = Harness::new(MediaType::Video);
    let video = video_with_codecs(vec![vp8(96), vp8_with(97, PACKETIZATION_PARAM_RAW)]);

    h.set_local(&video, SdpType::Offer)?;

    assert!(h.send.codecs().is_empty());
    assert_eq!(
        packetizations(&h.recv.codecs()),
        vec![(96, None), (97, raw())]
    );
    Ok(())
}

#[test]
fn test_set_remote_offer_with_packetization() -> Result<()> {
    let mut h = Harness::new(MediaType::Video);
    let video = video_with_codecs(vec![vp8(96), vp8_with(97, PACKETIZATION_PARAM_RAW)]);

    h.set_remote(&video, SdpType::Offer)?;

    assert!(h.recv.codecs().is_empty());
    assert_eq!(
        packetizations(&h.send.codecs()),
        vec![(96, None), (97, raw())]
    );
    Ok(())
}

#[test]
fn test_set_remote_answer_with_packetization() -> Result<()> {
    let mut h = Harness::new(MediaType::Video);
    let offer = video_with_codecs(vec![vp8(96), vp8_with(97, PACKETIZATION_PARAM_RAW)]);
    let answer = video_with_codecs(vec![vp8_with(97, PACKETIZATION_PARAM_RAW), vp8(96)]);

    h.set_local(&offer, SdpType::Offer)?;
    h.set_remote(&answer, SdpType::Answer)?;

    assert_eq!(
        packetizations(&h.recv.codecs()),
        vec![(96, None), (97, raw())]
    );
    assert_eq!(
        packetizations(&h.send.codecs()),
        vec![(97, raw()), (96, None)]
    );
    Ok(())
}

#[test]
fn test_set_local_answer_with_packetization() -> Result<()> {
    let mut h = Harness::new(MediaType::Video);
    let offer = video_with_codecs(vec![vp8(96), vp8_with(97, PACKETIZATION_PARAM_RAW)]);
    let answer = video_with_codecs(vec![vp8_with(97, PACKETIZATION_PARAM_RAW), vp8(96)]);

    h.set_remote(&offer, SdpType::Offer)?;
    h.set_local(&answer, SdpType::Answer)?;

    assert_eq!(
        packetizations(&h.recv.codecs()),
        vec![(97, raw()), (96, None)]
    );
    assert_eq!(
        packetizations(&h.send.codecs()),
        vec![(96, None), (97, raw())]
    );
    Ok(())
}

#[test]
fn test_set_remote_answer_with_compatible_packetization() -> Result<()> {
    let mut h = Harness::new(MediaType::Video);
    let offer = video_with_codecs(vec![
        vp8_with(96, "foo"),
        vp8_with(97, "bar"),
        Codec::video(99, "VP9").with_packetization("bar"),
    ]);
    let answer = video_with_codecs(vec![vp8_with(96, "foo"), Codec::video(98, "VP9")]);

    h.set_local(&offer, SdpType::Offer)?;
    h.set_remote(&answer, SdpType::Answer)?;

    // the verified VP8 codec covers 97, VP9 falls back to no packetization
    assert_eq!(
        packetizations(&h.recv.codecs()),
        vec![
            (96, Some("foo".to_owned())),
            (97, Some("bar".to_owned())),
            (99, None)
        ]
    );
    assert_eq!(
        packetizations(&h.send.codecs()),
        vec![(96, Some("foo".to_owned())), (98, None)]
    );
    Ok(())
}

#[test]
fn test_set_remote_answer_with_invalid_packetization() -> Result<()> {
    let mut h = Harness::new(MediaType::Video);
    let offer = video_with_codecs(vec![vp8_with(96, PACKETIZATION_PARAM_RAW)]);
    let answer = video_with_codecs(vec![vp8_with(96, "foo")]);

    h.set_local(&offer, SdpType::Offer)?;
    let result = h.set_remote(&answer, SdpType::Answer);

    assert_eq!(
        result,
        Err(Error::ErrInvalidCodecPacketization(
            "remote".to_owned(),
            MID.to_owned()
        ))
    );
    if let Err(err) = result {
        assert_eq!(
            err.to_string(),
            "Failed to set remote answer due to invalid codec packetization specified in m-section with mid='0'."
        );
    }
    assert_eq!(packetizations(&h.recv.codecs()), vec![(96, raw())]);
    assert!(h.send.codecs().is_empty());
    assert!(h.negotiator.remote_content().is_none());
    assert_eq!(h.negotiator.remote_direction(), MediaDirection::Unspecified);
    Ok(())
}

#[test]
fn test_set_local_answer_with_invalid_packetization() -> Result<()> {
    let mut h = Harness::new(MediaType::Video);
    let offer = video_with_codecs(vec![vp8_with(96, "foo")]);
    let answer = video_with_codecs(vec![vp8_with(96, PACKETIZATION_PARAM_RAW)]);

    h.set_remote(&offer, SdpType::Offer)?;
    let result = h.set_local(&answer, SdpType::Answer);

    assert_eq!(
        result,
        Err(Error::ErrInvalidCodecPacketization(
            "local".to_owned(),
            MID.to_owned()
        ))
    );
    assert!(h.recv.codecs().is_empty());
    assert_eq!(
        packetizations(&h.send.codecs()),
        vec![(96, Some("foo".to_owned()))]
    );
    Ok(())
}

#[test]
fn test_channel_rejections() -> Result<()> {
    let mut h = Harness::new(MediaType::Video);
    h.recv.state().reject_params = true;
    let video = video_with_codecs(vec![vp8(96)]);

    let result = h.set_local(&video, SdpType::Offer);
    assert_eq!(
        result.map_err(|e| e.to_string()),
        Err(
            "Failed to set local video description recv parameters for m-section with mid='0'."
                .to_owned()
        )
    );
    assert!(h.negotiator.local_content().is_none());
    assert_eq!(h.negotiator.local_direction(), MediaDirection::Unspecified);

    h.send.state().reject_params = true;
    let result = h.set_remote(&video, SdpType::Offer);
    assert_eq!(
        result.map_err(|e| e.to_string()),
        Err(
            "Failed to set remote video description send parameters for m-section with mid='0'."
                .to_owned()
        )
    );
    assert!(h.negotiator.remote_content().is_none());
    Ok(())
}

#[test]
fn test_rejects_bad_content_and_sdp_type() {
    let mut h = Harness::new(MediaType::Data);

    let tests = vec![
        (
            MediaContentDescription::sctp(),
            SdpType::Offer,
            "content is not RTP media",
        ),
        (
            MediaContentDescription::unsupported("application"),
            SdpType::Answer,
            "content is not RTP media",
        ),
        (
            MediaContentDescription::audio(),
            SdpType::Rollback,
            "unknown sdp type: rollback",
        ),
        (
            MediaContentDescription::audio(),
            SdpType::Unspecified,
            "unknown sdp type: Unspecified",
        ),
    ];

    for (content, sdp_type, expected) in tests {
        let local = h.set_local(&content, sdp_type).map_err(|e| e.to_string());
        assert_eq!(local, Err(expected.to_owned()));
        let remote = h.set_remote(&content, sdp_type).map_err(|e| e.to_string());
        assert_eq!(remote, Err(expected.to_owned()));
    }
}

#[test]
fn test_directions_follow_content() -> Result<()> {
    let mut h = Harness::new(MediaType::Audio);
    assert_eq!(h.negotiator.local_direction(), MediaDirection::Unspecified);
    assert_eq!(h.negotiator.remote_direction(), MediaDirection::Unspecified);

    let mut offer = audio_with_ssrcs(&[]);
    offer.direction = MediaDirection::SendOnly;
    h.set_local(&offer, SdpType::Offer)?;
    assert_eq!(h.negotiator.local_direction(), MediaDirection::SendOnly);
    assert!(!h.recv.state().params.as_ref().is_some_and(|p| p.is_stream_active));
    assert!(h.negotiator.demuxer_criteria().payload_types.is_empty());

    let mut answer = audio_with_ssrcs(&[]);
    answer.direction = MediaDirection::RecvOnly;
    h.set_remote(&answer, SdpType::Answer)?;
    assert_eq!(h.negotiator.remote_direction(), MediaDirection::RecvOnly);
    assert!(h.send.state().params.as_ref().is_some_and(|p| p.is_stream_active));
    Ok(())
}

#[test]
fn test_local_stream_replacement() -> Result<()> {
    let mut h = Harness::new(MediaType::Audio);

    h.set_local(&audio_with_ssrcs(&[1]), SdpType::Offer)?;
    assert_eq!(h.send.ssrcs(), vec![1]);

    h.set_local(&audio_with_ssrcs(&[2]), SdpType::Offer)?;
    assert_eq!(h.send.ssrcs(), vec![2]);
    assert_eq!(
        h.negotiator
            .local_streams()
            .iter()
            .filter_map(|s| s.first_ssrc())
            .collect::<Vec<_>>(),
        vec![2]
    );
    Ok(())
}

#[test]
fn test_set_local_content_is_idempotent() -> Result<()> {
    let mut h = Harness::new(MediaType::Audio);
    let content = audio_with_ssrcs(&[1, 2]);

    h.set_local(&content, SdpType::Offer)?;
    let codecs = h.recv.codecs();
    h.set_local(&content, SdpType::Offer)?;

    assert_eq!(h.recv.codecs(), codecs);
    assert_eq!(h.send.ssrcs(), vec![1, 2]);
    assert_eq!(h.send.state().added, 2);
    assert_eq!(h.negotiator.local_streams().len(), 2);
    Ok(())
}

#[test]
fn test_demuxer_payload_types_follow_local_content() -> Result<()> {
    let mut h = Harness::new(MediaType::Video);

    h.set_local(&video_with_codecs(vec![vp8(96), vp8(97)]), SdpType::Offer)?;
    assert_eq!(
        h.negotiator.demuxer_criteria().payload_types,
        BTreeSet::from([96, 97])
    );

    h.set_local(&video_with_codecs(vec![vp8(96)]), SdpType::Offer)?;
    assert_eq!(
        h.negotiator.demuxer_criteria().payload_types,
        BTreeSet::from([96])
    );

    let mut send_only = video_with_codecs(vec![vp8(96)]);
    send_only.direction = MediaDirection::SendOnly;
    h.set_local(&send_only, SdpType::Offer)?;
    assert!(h.negotiator.demuxer_criteria().payload_types.is_empty());
    Ok(())
}

#[test]
fn test_local_stream_without_ssrcs() -> Result<()> {
    let mut h = Harness::new(MediaType::Audio);
    let mut content = audio_with_ssrcs(&[]);
    content.add_stream(StreamParams {
        id: "rid-only".to_owned(),
        ..Default::default()
    });

    h.set_local(&content, SdpType::Offer)?;
    assert!(h.send.ssrcs().is_empty());
    assert_eq!(h.send.state().added, 0);
    assert_eq!(h.negotiator.local_streams().len(), 1);
    Ok(())
}

#[test]
fn test_add_send_stream_failure_keeps_stream_list() {
    let mut h = Harness::new(MediaType::Audio);
    h.send.state().reject_ssrcs.insert(7);

    let result = h.set_local(&audio_with_ssrcs(&[5, 7]), SdpType::Offer);
    assert_eq!(result, Err(Error::ErrAddSendStream(7, MID.to_owned())));
    if let Err(err) = result {
        assert_eq!(
            err.to_string(),
            "Failed to add send stream ssrc: 7 into m-section with mid='0'."
        );
    }
    assert_eq!(h.send.ssrcs(), vec![5]);
    assert_eq!(h.negotiator.local_streams().len(), 2);
    assert!(h.negotiator.local_content().is_none());
}

#[test]
fn test_remote_streams() -> Result<()> {
    let mut h = Harness::new(MediaType::Audio);

    let mut offer = audio_with_ssrcs(&[1]);
    offer.add_stream(StreamParams::default());
    h.set_remote(&offer, SdpType::Offer)?;
    assert_eq!(h.recv.state().streams.len(), 2);
    assert_eq!(
        h.negotiator.demuxer_criteria().ssrcs.iter().copied().collect::<Vec<_>>(),
        vec![1]
    );

    // re-applying adds nothing
    h.set_remote(&offer, SdpType::Offer)?;
    assert_eq!(h.recv.state().streams.len(), 2);
    assert_eq!(h.recv.state().unsignaled_resets, 0);

    h.set_remote(&audio_with_ssrcs(&[2]), SdpType::Offer)?;
    assert_eq!(h.recv.ssrcs(), vec![2]);
    assert_eq!(h.recv.state().unsignaled_resets, 1);
    assert_eq!(
        h.negotiator.demuxer_criteria().ssrcs.iter().copied().collect::<Vec<_>>(),
        vec![2]
    );
    assert_eq!(h.negotiator.remote_streams().len(), 1);
    Ok(())
}

#[test]
fn test_remote_rtcp_mode() -> Result<()> {
    let mut h = Harness::new(MediaType::Video);
    assert_eq!(h.recv.state().rtcp_mode, RtcpMode::Compound);

    let mut content = video_with_codecs(vec![vp8(96)]);
    content.rtcp_reduced_size = true;
    h.set_remote(&content, SdpType::Offer)?;
    assert_eq!(h.recv.state().rtcp_mode, RtcpMode::ReducedSize);

    content.rtcp_reduced_size = false;
    h.set_remote(&content, SdpType::Offer)?;
    assert_eq!(h.recv.state().rtcp_mode, RtcpMode::Compound);
    Ok(())
}

#[test]
fn test_remote_send_parameters() -> Result<()> {
    let mut h = Harness::new(MediaType::Video);

    let tests = vec![
        (AUTO_BANDWIDTH, false, None),
        (300_000, true, Some(300_000)),
    ];

    for (bandwidth, conference_mode, expected) in tests {
        let mut content = video_with_codecs(vec![vp8(96)]);
        content.bandwidth = bandwidth;
        content.conference_mode = conference_mode;
        h.set_remote(&content, SdpType::Offer)?;

        let state = h.send.state();
        let params = state.params.as_ref();
        assert_eq!(params.and_then(|p| p.max_bandwidth_bps), expected);
        assert_eq!(params.map(|p| p.conference_mode), Some(conference_mode));
        assert_eq!(params.map(|p| p.mid.as_str()), Some(MID));
        assert_eq!(params.map(|p| p.extmap_allow_mixed), Some(true));
    }

    let mut content = video_with_codecs(vec![vp8(96)]);
    content.set_extmap_allow_mixed_enum(crate::description::ExtmapAllowMixed::No);
    h.set_remote(&content, SdpType::Offer)?;
    assert_eq!(
        h.send.state().params.as_ref().map(|p| p.extmap_allow_mixed),
        Some(false)
    );
    Ok(())
}

#[test]
fn test_rtcp_mux_negotiation() -> Result<()> {
    let tests = vec![
        (true, true, true),
        (true, false, false),
        (false, false, false),
    ];

    for (offer_mux, answer_mux, expected) in tests {
        let mut h = Harness::new(MediaType::Audio);
        let mut offer = audio_with_ssrcs(&[]);
        offer.rtcp_mux = offer_mux;
        let mut answer = audio_with_ssrcs(&[]);
        answer.rtcp_mux = answer_mux;

        h.set_local(&offer, SdpType::Offer)?;
        assert!(!h.negotiator.is_rtcp_mux_active());
        h.set_remote(&answer, SdpType::Answer)?;
        assert_eq!(h.negotiator.is_rtcp_mux_active(), expected);
    }
    Ok(())
}

#[test]
fn test_repeated_answer_declining_rtcp_mux() -> Result<()> {
    let mut h = Harness::new(MediaType::Audio);
    let mut offer = audio_with_ssrcs(&[]);
    offer.rtcp_mux = true;
    let answer = audio_with_ssrcs(&[1]);

    h.set_remote(&offer, SdpType::Offer)?;
    h.set_local(&answer, SdpType::Answer)?;
    h.set_local(&answer, SdpType::Answer)?;

    assert!(!h.negotiator.is_rtcp_mux_active());
    assert_eq!(h.negotiator.rtcp_mux_filter().state(), RtcpMuxState::Init);
    assert_eq!(h.send.ssrcs(), vec![1]);

    // an answer that now asks for mux is out of turn
    let mut muxed = answer.clone();
    muxed.rtcp_mux = true;
    assert_eq!(
        h.set_local(&muxed, SdpType::Answer),
        Err(Error::ErrSetupRtcpMuxFilter(MID.to_owned()))
    );
    Ok(())
}

#[test]
fn test_rtcp_mux_provisional_answer() -> Result<()> {
    let mut h = Harness::new(MediaType::Audio);
    let mut content = audio_with_ssrcs(&[]);
    content.rtcp_mux = true;

    h.set_remote(&content, SdpType::Offer)?;
    h.set_local(&content, SdpType::PrAnswer)?;
    assert!(h.negotiator.rtcp_mux_filter().is_provisionally_active());

    h.set_local(&content, SdpType::Answer)?;
    assert!(h.negotiator.rtcp_mux_filter().is_fully_active());
    Ok(())
}

#[test]
fn test_rtcp_mux_failures_keep_state() -> Result<()> {
    let mut h = Harness::new(MediaType::Audio);
    let content = audio_with_ssrcs(&[1]);

    h.set_local(&content, SdpType::Offer)?;
    // two offers from different sides
    assert_eq!(
        h.set_remote(&content, SdpType::Offer),
        Err(Error::ErrSetupRtcpMuxFilter(MID.to_owned()))
    );
    assert_eq!(h.negotiator.rtcp_mux_filter().state(), RtcpMuxState::SentOffer);
    assert!(h.negotiator.remote_content().is_none());
    assert!(h.recv.state().streams.is_empty());

    let mut required = Harness::new(MediaType::Audio);
    required.negotiator =
        ContentNegotiator::new(MID, MediaType::Audio).with_rtcp_mux_required(true);
    assert!(required.negotiator.is_rtcp_mux_active());
    assert_eq!(
        required.set_local(&content, SdpType::Offer),
        Err(Error::ErrRtcpMuxRequired)
    );

    let mut muxed = content.clone();
    muxed.rtcp_mux = true;
    required.set_local(&muxed, SdpType::Offer)?;
    assert!(required.negotiator.rtcp_mux_filter().is_fully_active());
    Ok(())
}

#[test]
fn test_header_extensions_deduplicated() -> Result<()> {
    let mut h = Harness::new(MediaType::Audio);
    h.negotiator =
        ContentNegotiator::new(MID, MediaType::Audio).with_encrypted_header_extensions(true);

    let mut content = audio_with_ssrcs(&[]);
    content.set_rtp_header_extensions(vec![
        RtpExtension::new("urn:level", 1),
        RtpExtension::new("urn:level", 2).with_encrypt(true),
    ]);
    h.set_local(&content, SdpType::Offer)?;

    assert_eq!(
        h.negotiator
            .recv_params()
            .extensions
            .iter()
            .map(|e| e.id)
            .collect::<Vec<_>>(),
        vec![2]
    );
    assert!(h.negotiator.demuxer_criteria().payload_types.contains(&111));
    Ok(())
}
