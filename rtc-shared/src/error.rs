#![allow(dead_code)]

use std::io;
use std::net;
use std::num::ParseIntError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("no interface is available")]
    ErrNoInterface,

    //STUN errors
    #[error("unexpected EOF: not enough bytes to read header")]
    ErrUnexpectedHeaderEof,
    #[error("unexpected EOF")]
    ErrUnexpectedEof,
    #[error("0x{0:08x} is invalid magic cookie (should be 0x2112a442)")]
    ErrInvalidMagicCookie(u32),
    #[error("buffer length {0} is less than {1} (expected message size)")]
    ErrBufferTooSmall(usize, usize),
    #[error("attribute not found")]
    ErrAttributeNotFound,
    #[error("attribute size overflow")]
    ErrAttributeSizeOverflow,
    #[error("invalid length of IP value")]
    ErrBadIpLength,
    #[error("unsupported address family {0}")]
    ErrUnsupportedFamily(u8),
    #[error("error code {0} is out of range")]
    ErrErrorCodeOutOfRange(u16),
    #[error("transaction exists with same id")]
    ErrTransactionExists,
    #[error("binding request engine is closed")]
    ErrEngineClosed,

    //ICE errors
    #[error("port is closed")]
    ErrPortClosed,
    #[error("socket is not bound")]
    ErrSocketNotBound,
    #[error("invalid STUN server address")]
    ErrInvalidServerAddress,
    #[error("unknown candidate type")]
    ErrUnknownCandidateType,
    #[error("no port is bound to {0}")]
    ErrNoPortForAddress(net::SocketAddr),
    #[error("attribute not long enough to be ICE candidate")]
    ErrAttributeTooShortIceCandidate,
    #[error("could not parse related addresses")]
    ErrParseRelatedAddr,
    #[error("failed to create socket in port range {0}-{1}")]
    ErrNoSocketInPortRange(u16, u16),
    #[error("attempting to gather candidates during gathering state")]
    ErrMultipleGatherAttempted,

    //Session errors
    #[error("content is not RTP media")]
    ErrContentNotRtp,
    #[error("unknown sdp type: {0}")]
    ErrUnknownSdpType(String),
    #[error("media channel rejected codecs")]
    ErrCodecsRejected,
    #[error("media channel rejected stream with ssrc {0}")]
    ErrStreamRejected(u32),
    #[error("Failed to set {0} answer due to invalid codec packetization specified in m-section with mid='{1}'.")]
    ErrInvalidCodecPacketization(String, String),
    #[error("Failed to set local {0} description recv parameters for m-section with mid='{1}'.")]
    ErrSetRecvParameters(String, String),
    #[error("Failed to set remote {0} description send parameters for m-section with mid='{1}'.")]
    ErrSetSendParameters(String, String),
    #[error("Failed to add send stream ssrc: {0} into m-section with mid='{1}'.")]
    ErrAddSendStream(u32, String),
    #[error("Failed to remove send stream with ssrc {0} from m-section with mid='{1}'.")]
    ErrRemoveSendStream(u32, String),
    #[error("Failed to add remote stream ssrc: {0} into m-section with mid='{1}'.")]
    ErrAddRecvStream(u32, String),
    #[error("Failed to remove remote stream with ssrc {0} from m-section with mid='{1}'.")]
    ErrRemoveRecvStream(u32, String),
    #[error("rtcpMuxPolicy is 'require', but media description does not contain 'a=rtcp-mux'.")]
    ErrRtcpMuxRequired,
    #[error("Failed to setup RTCP mux filter for m-section with mid='{0}'.")]
    ErrSetupRtcpMuxFilter(String),
    #[error("execution context {0} is closed")]
    ErrContextClosed(String),
    #[error("task panicked on execution context {0}")]
    ErrContextTaskPanicked(String),

    #[error("parse int: {0}")]
    ParseInt(#[from] ParseIntError),
    #[error("parse addr: {0}")]
    ParseIp(#[from] net::AddrParseError),
    #[error("{0}")]
    Io(#[source] IoError),
    #[error("mutex poison: {0}")]
    PoisonError(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Error::PoisonError(e.to_string())
    }
}

/// flatten_errs flattens multiple errors into one
pub fn flatten_errs(errs: Vec<impl Into<Error>>) -> Result<()> {
    if errs.is_empty() {
        Ok(())
    } else {
        let errs_strs: Vec<String> = errs.into_iter().map(|e| e.into().to_string()).collect();
        Err(Error::Other(errs_strs.join("\n")))
    }
}
