use std::fmt;

use crate::description::UNSPECIFIED_STR;
use serde::{Deserialize, Serialize};

/// Whether RTCP may run on its own transport or must share the RTP one.
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum RtcpMuxPolicy {
    #[default]
    Unspecified = 0,

    /// Keep a separate RTCP path unless both sides agree on mux.
    #[serde(rename = "negotiate")]
    Negotiate = 1,

    /// Mux from the start. Descriptions without `a=rtcp-mux` are rejected.
    #[serde(rename = "require")]
    Require = 2,
}

const RTCP_MUX_POLICY_NEGOTIATE_STR: &str = "negotiate";
const RTCP_MUX_POLICY_REQUIRE_STR: &str = "require";

impl From<&str> for RtcpMuxPolicy {
    fn from(raw: &str) -> Self {
        match raw {
            RTCP_MUX_POLICY_NEGOTIATE_STR => RtcpMuxPolicy::Negotiate,
            RTCP_MUX_POLICY_REQUIRE_STR => RtcpMuxPolicy::Require,
            _ => RtcpMuxPolicy::Unspecified,
        }
    }
}

impl fmt::Display for RtcpMuxPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RtcpMuxPolicy::Negotiate => RTCP_MUX_POLICY_NEGOTIATE_STR,
            RtcpMuxPolicy::Require => RTCP_MUX_POLICY_REQUIRE_STR,
            RtcpMuxPolicy::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl RtcpMuxPolicy {
    pub fn is_required(&self) -> bool {
        *self == RtcpMuxPolicy::Require
    }
}
