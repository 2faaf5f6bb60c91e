use std::fmt;

use crate::description::UNSPECIFIED_STR;
use serde::{Deserialize, Serialize};

/// Role of a description in the offer/answer exchange.
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum SdpType {
    #[default]
    Unspecified = 0,

    #[serde(rename = "offer")]
    Offer,

    /// A provisional answer. It may be followed by further provisional
    /// answers or a final one.
    #[serde(rename = "pranswer")]
    PrAnswer,

    #[serde(rename = "answer")]
    Answer,

    /// Cancels the current negotiation. Content is never applied with it.
    #[serde(rename = "rollback")]
    Rollback,
}

const SDP_TYPE_OFFER_STR: &str = "offer";
const SDP_TYPE_PRANSWER_STR: &str = "pranswer";
const SDP_TYPE_ANSWER_STR: &str = "answer";
const SDP_TYPE_ROLLBACK_STR: &str = "rollback";

impl From<&str> for SdpType {
    fn from(raw: &str) -> Self {
        match raw {
            SDP_TYPE_OFFER_STR => SdpType::Offer,
            SDP_TYPE_PRANSWER_STR => SdpType::PrAnswer,
            SDP_TYPE_ANSWER_STR => SdpType::Answer,
            SDP_TYPE_ROLLBACK_STR => SdpType::Rollback,
            _ => SdpType::Unspecified,
        }
    }
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SdpType::Offer => write!(f, "{SDP_TYPE_OFFER_STR}"),
            SdpType::PrAnswer => write!(f, "{SDP_TYPE_PRANSWER_STR}"),
            SdpType::Answer => write!(f, "{SDP_TYPE_ANSWER_STR}"),
            SdpType::Rollback => write!(f, "{SDP_TYPE_ROLLBACK_STR}"),
            _ => write!(f, "{UNSPECIFIED_STR}"),
        }
    }
}

impl SdpType {
    /// Answers and provisional answers.
    pub fn is_answer(&self) -> bool {
        matches!(self, SdpType::Answer | SdpType::PrAnswer)
    }
}
