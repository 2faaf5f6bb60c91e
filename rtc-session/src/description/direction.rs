use super::UNSPECIFIED_STR;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of media flow declared by a content section.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaDirection {
    /// No content has declared a direction yet.
    #[default]
    Unspecified,

    #[serde(rename = "sendrecv")]
    SendRecv,

    #[serde(rename = "sendonly")]
    SendOnly,

    #[serde(rename = "recvonly")]
    RecvOnly,

    #[serde(rename = "inactive")]
    Inactive,
}

const MEDIA_DIRECTION_SENDRECV_STR: &str = "sendrecv";
const MEDIA_DIRECTION_SENDONLY_STR: &str = "sendonly";
const MEDIA_DIRECTION_RECVONLY_STR: &str = "recvonly";
const MEDIA_DIRECTION_INACTIVE_STR: &str = "inactive";

impl From<&str> for MediaDirection {
    fn from(raw: &str) -> Self {
        match raw {
            MEDIA_DIRECTION_SENDRECV_STR => MediaDirection::SendRecv,
            MEDIA_DIRECTION_SENDONLY_STR => MediaDirection::SendOnly,
            MEDIA_DIRECTION_RECVONLY_STR => MediaDirection::RecvOnly,
            MEDIA_DIRECTION_INACTIVE_STR => MediaDirection::Inactive,
            _ => MediaDirection::Unspecified,
        }
    }
}

impl fmt::Display for MediaDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            MediaDirection::SendRecv => MEDIA_DIRECTION_SENDRECV_STR,
            MediaDirection::SendOnly => MEDIA_DIRECTION_SENDONLY_STR,
            MediaDirection::RecvOnly => MEDIA_DIRECTION_RECVONLY_STR,
            MediaDirection::Inactive => MEDIA_DIRECTION_INACTIVE_STR,
            MediaDirection::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl MediaDirection {
    /// The direction as seen from the other end: sendonly and recvonly swap.
    pub fn reverse(&self) -> MediaDirection {
        match *self {
            MediaDirection::SendOnly => MediaDirection::RecvOnly,
            MediaDirection::RecvOnly => MediaDirection::SendOnly,
            _ => *self,
        }
    }

    /// Sends only if both directions send, receives only if both receive.
    pub fn intersect(&self, other: MediaDirection) -> MediaDirection {
        Self::from_send_recv(
            self.has_send() && other.has_send(),
            self.has_recv() && other.has_recv(),
        )
    }

    pub fn from_send_recv(send: bool, recv: bool) -> MediaDirection {
        match (send, recv) {
            (true, true) => Self::SendRecv,
            (true, false) => Self::SendOnly,
            (false, true) => Self::RecvOnly,
            (false, false) => Self::Inactive,
        }
    }

    pub fn has_send(&self) -> bool {
        matches!(self, Self::SendRecv | Self::SendOnly)
    }

    pub fn has_recv(&self) -> bool {
        matches!(self, Self::SendRecv | Self::RecvOnly)
    }
}
