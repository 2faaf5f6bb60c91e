use super::codec::Codec;
use super::direction::MediaDirection;
use super::rtp_extension::RtpExtension;
use super::stream::StreamParams;

use std::fmt;
use std::net::SocketAddr;

/// Bandwidth value meaning "let the media engine decide".
pub const AUTO_BANDWIDTH: i32 = -1;
pub const DEFAULT_BANDWIDTH_TYPE: &str = "AS";

pub const DEFAULT_SCTP_PORT: u16 = 5000;
pub const DEFAULT_SCTP_MAX_MESSAGE_SIZE: u32 = 64 * 1024;

pub const MEDIA_PROTOCOL_SAVPF: &str = "UDP/TLS/RTP/SAVPF";
pub const MEDIA_PROTOCOL_DTLS_SCTP: &str = "UDP/DTLS/SCTP";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SctpParameters {
    pub use_sctpmap: bool,
    pub port: u16,
    pub max_message_size: u32,
}

impl Default for SctpParameters {
    fn default() -> Self {
        SctpParameters {
            use_sctpmap: true,
            port: DEFAULT_SCTP_PORT,
            max_message_size: DEFAULT_SCTP_MAX_MESSAGE_SIZE,
        }
    }
}

/// What a content section carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaContentKind {
    Audio,
    Video,
    Sctp(SctpParameters),
    /// Keeps the media type string of a section nobody understands.
    Unsupported(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MediaType {
    Audio,
    Video,
    Data,
    Unsupported,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            MediaType::Audio => "audio",
            MediaType::Video => "video",
            MediaType::Data => "data",
            MediaType::Unsupported => "unsupported",
        };
        write!(f, "{s}")
    }
}

/// Where `a=extmap-allow-mixed` was signaled.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExtmapAllowMixed {
    No,
    Session,
    #[default]
    Media,
}

/// One content section of a session description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaContentDescription {
    kind: MediaContentKind,
    pub protocol: String,
    pub direction: MediaDirection,
    pub rtcp_mux: bool,
    pub rtcp_reduced_size: bool,
    pub remote_estimate: bool,
    /// Bits per second, or [`AUTO_BANDWIDTH`].
    pub bandwidth: i32,
    pub bandwidth_type: String,
    pub rtp_header_extensions: Vec<RtpExtension>,
    pub rtp_header_extensions_set: bool,
    pub streams: Vec<StreamParams>,
    pub conference_mode: bool,
    pub connection_address: Option<SocketAddr>,
    /// Ordered by preference, first is most preferred.
    pub codecs: Vec<Codec>,
    extmap_allow_mixed: ExtmapAllowMixed,
}

impl MediaContentDescription {
    fn new(kind: MediaContentKind, protocol: &str) -> Self {
        MediaContentDescription {
            kind,
            protocol: protocol.to_owned(),
            direction: MediaDirection::SendRecv,
            rtcp_mux: false,
            rtcp_reduced_size: false,
            remote_estimate: false,
            bandwidth: AUTO_BANDWIDTH,
            bandwidth_type: DEFAULT_BANDWIDTH_TYPE.to_owned(),
            rtp_header_extensions: vec![],
            rtp_header_extensions_set: false,
            streams: vec![],
            conference_mode: false,
            connection_address: None,
            codecs: vec![],
            extmap_allow_mixed: ExtmapAllowMixed::default(),
        }
    }

    pub fn audio() -> Self {
        Self::new(MediaContentKind::Audio, MEDIA_PROTOCOL_SAVPF)
    }

    pub fn video() -> Self {
        Self::new(MediaContentKind::Video, MEDIA_PROTOCOL_SAVPF)
    }

    pub fn sctp() -> Self {
        Self::new(
            MediaContentKind::Sctp(SctpParameters::default()),
            MEDIA_PROTOCOL_DTLS_SCTP,
        )
    }

    pub fn unsupported(media_type: &str) -> Self {
        Self::new(MediaContentKind::Unsupported(media_type.to_owned()), "")
    }

    pub fn kind(&self) -> &MediaContentKind {
        &self.kind
    }

    pub fn media_type(&self) -> MediaType {
        match self.kind {
            MediaContentKind::Audio => MediaType::Audio,
            MediaContentKind::Video => MediaType::Video,
            MediaContentKind::Sctp(_) => MediaType::Data,
            MediaContentKind::Unsupported(_) => MediaType::Unsupported,
        }
    }

    pub fn is_rtp(&self) -> bool {
        matches!(self.kind, MediaContentKind::Audio | MediaContentKind::Video)
    }

    pub fn as_sctp(&self) -> Option<&SctpParameters> {
        match &self.kind {
            MediaContentKind::Sctp(params) => Some(params),
            _ => None,
        }
    }

    pub fn as_sctp_mut(&mut self) -> Option<&mut SctpParameters> {
        match &mut self.kind {
            MediaContentKind::Sctp(params) => Some(params),
            _ => None,
        }
    }

    /// The media type string of an unsupported section.
    pub fn unsupported_media_type(&self) -> Option<&str> {
        match &self.kind {
            MediaContentKind::Unsupported(media_type) => Some(media_type),
            _ => None,
        }
    }

    /// Only RTP sections carry codecs.
    pub fn has_codecs(&self) -> bool {
        self.is_rtp() && !self.codecs.is_empty()
    }

    pub fn add_codec(&mut self, codec: Codec) {
        self.codecs.push(codec);
    }

    /// Replaces the codec with the same payload type, or appends `codec`.
    /// Returns whether a codec was replaced.
    pub fn add_or_replace_codec(&mut self, codec: Codec) -> bool {
        if let Some(existing) = self.codecs.iter_mut().find(|c| c.id == codec.id) {
            *existing = codec;
            true
        } else {
            self.codecs.push(codec);
            false
        }
    }

    pub fn has_codec(&self, id: u8) -> bool {
        self.codecs.iter().any(|c| c.id == id)
    }

    pub fn set_codecs(&mut self, codecs: Vec<Codec>) {
        self.codecs = codecs;
    }

    pub fn add_stream(&mut self, stream: StreamParams) {
        self.streams.push(stream);
    }

    pub fn add_legacy_stream(&mut self, ssrc: u32) {
        self.streams.push(StreamParams::create_legacy(ssrc));
    }

    /// First SSRC of the first stream.
    pub fn first_ssrc(&self) -> Option<u32> {
        self.streams.first().and_then(|s| s.first_ssrc())
    }

    pub fn has_ssrcs(&self) -> bool {
        self.streams.first().is_some_and(|s| s.has_ssrcs())
    }

    pub fn set_rtp_header_extensions(&mut self, extensions: Vec<RtpExtension>) {
        self.rtp_header_extensions = extensions;
        self.rtp_header_extensions_set = true;
    }

    pub fn add_rtp_header_extension(&mut self, extension: RtpExtension) {
        self.rtp_header_extensions.push(extension);
        self.rtp_header_extensions_set = true;
    }

    /// A section already allowed at session level is not narrowed to media
    /// level.
    pub fn set_extmap_allow_mixed_enum(&mut self, mixed: ExtmapAllowMixed) {
        if mixed == ExtmapAllowMixed::Media
            && self.extmap_allow_mixed == ExtmapAllowMixed::Session
        {
            return;
        }
        self.extmap_allow_mixed = mixed;
    }

    pub fn extmap_allow_mixed_enum(&self) -> ExtmapAllowMixed {
        self.extmap_allow_mixed
    }

    pub fn extmap_allow_mixed(&self) -> bool {
        self.extmap_allow_mixed != ExtmapAllowMixed::No
    }
}
