use log::warn;

/// Which side produced a description.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Local,
    Remote,
}

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RtcpMuxState {
    /// No offer/answer exchange in progress and mux not active.
    #[default]
    Init,
    SentOffer,
    ReceivedOffer,
    SentPrAnswer,
    ReceivedPrAnswer,
    /// Mux was agreed on by a final answer and can no longer be turned off.
    Active,
}

/// Tracks whether RTCP shares the RTP transport across offer/answer rounds.
/// Mux becomes active only when both the offer and the answer ask for it.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub struct RtcpMuxFilter {
    state: RtcpMuxState,
    offer_enable: bool,
    /// Final answer that closed the last exchange without activating mux.
    last_answer: Option<(ContentSource, bool)>,
}

impl RtcpMuxFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RtcpMuxState {
        self.state
    }

    pub fn is_fully_active(&self) -> bool {
        self.state == RtcpMuxState::Active
    }

    /// Activated by a provisional answer; a final answer may still undo it.
    pub fn is_provisionally_active(&self) -> bool {
        matches!(
            self.state,
            RtcpMuxState::SentPrAnswer | RtcpMuxState::ReceivedPrAnswer
        )
    }

    pub fn is_active(&self) -> bool {
        self.is_fully_active() || self.is_provisionally_active()
    }

    /// Forces the filter active, e.g. when mux is required by policy.
    pub fn set_active(&mut self) {
        self.state = RtcpMuxState::Active;
    }

    pub fn set_offer(&mut self, offer_enable: bool, src: ContentSource) -> bool {
        if self.state == RtcpMuxState::Active {
            // deactivating is not possible, re-activating is a no-op
            return offer_enable;
        }

        if !self.expect_offer(offer_enable, src) {
            warn!("invalid state for rtcp mux offer: {:?}", self.state);
            return false;
        }

        self.offer_enable = offer_enable;
        self.last_answer = None;
        self.state = match src {
            ContentSource::Local => RtcpMuxState::SentOffer,
            ContentSource::Remote => RtcpMuxState::ReceivedOffer,
        };
        true
    }

    pub fn set_provisional_answer(&mut self, answer_enable: bool, src: ContentSource) -> bool {
        if self.state == RtcpMuxState::Active {
            return answer_enable;
        }

        if !self.expect_answer(src) {
            warn!("invalid state for rtcp mux provisional answer: {:?}", self.state);
            return false;
        }

        if self.offer_enable {
            self.state = match (answer_enable, src) {
                (true, ContentSource::Remote) => RtcpMuxState::ReceivedPrAnswer,
                (true, ContentSource::Local) => RtcpMuxState::SentPrAnswer,
                // back to the post-offer state, waiting for the next answer
                (false, ContentSource::Remote) => RtcpMuxState::SentOffer,
                (false, ContentSource::Local) => RtcpMuxState::ReceivedOffer,
            };
        } else if answer_enable {
            // the answer cannot enable what the offer did not
            return false;
        }

        true
    }

    pub fn set_answer(&mut self, answer_enable: bool, src: ContentSource) -> bool {
        if self.state == RtcpMuxState::Active {
            return answer_enable;
        }

        if self.state == RtcpMuxState::Init && self.last_answer == Some((src, answer_enable)) {
            // the same answer applied again
            return true;
        }

        if !self.expect_answer(src) {
            warn!("invalid state for rtcp mux answer: {:?}", self.state);
            return false;
        }

        if self.offer_enable && answer_enable {
            self.state = RtcpMuxState::Active;
        } else if answer_enable {
            return false;
        } else {
            self.state = RtcpMuxState::Init;
            self.last_answer = Some((src, answer_enable));
        }

        true
    }

    fn expect_offer(&self, offer_enable: bool, src: ContentSource) -> bool {
        match self.state {
            RtcpMuxState::Init => true,
            RtcpMuxState::Active => offer_enable == self.offer_enable,
            RtcpMuxState::SentOffer => src == ContentSource::Local,
            RtcpMuxState::ReceivedOffer => src == ContentSource::Remote,
            _ => false,
        }
    }

    fn expect_answer(&self, src: ContentSource) -> bool {
        matches!(
            (self.state, src),
            (RtcpMuxState::SentOffer, ContentSource::Remote)
                | (RtcpMuxState::ReceivedOffer, ContentSource::Local)
                | (RtcpMuxState::SentPrAnswer, ContentSource::Local)
                | (RtcpMuxState::ReceivedPrAnswer, ContentSource::Remote)
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ContentSource::*;

    #[test]
    fn test_rtcp_mux_filter_offer_answer() {
        // (offer source, offer enable, answer enable, active afterwards)
        let tests = vec![
            (Local, true, true, true),
            (Remote, true, true, true),
            (Local, true, false, false),
            (Remote, true, false, false),
            (Local, false, false, false),
        ];

        for (src, offer, answer, expected) in tests {
            let answerer = if src == Local { Remote } else { Local };
            let mut filter = RtcpMuxFilter::new();
            assert!(!filter.is_active());
            assert!(filter.set_offer(offer, src));
            assert!(!filter.is_active());
            assert!(filter.set_answer(answer, answerer));
            assert_eq!(filter.is_active(), expected, "{src:?} {offer} {answer}");
        }
    }

    #[test]
    fn test_rtcp_mux_filter_repeated_declining_answer() {
        let mut filter = RtcpMuxFilter::new();
        assert!(filter.set_offer(true, Remote));
        assert!(filter.set_answer(false, Local));
        assert_eq!(filter.state(), RtcpMuxState::Init);

        assert!(filter.set_answer(false, Local));
        assert_eq!(filter.state(), RtcpMuxState::Init);
        assert!(!filter.is_active());

        // a different answer still needs an offer first
        assert!(!filter.set_answer(true, Local));
        assert!(!filter.set_answer(false, Remote));

        // a new exchange forgets the previous answer
        assert!(filter.set_offer(true, Local));
        assert!(filter.set_answer(false, Remote));
        assert!(!filter.set_answer(false, Local));
    }

    #[test]
    fn test_rtcp_mux_filter_answer_cannot_enable() {
        let mut filter = RtcpMuxFilter::new();
        assert!(filter.set_offer(false, Local));
        assert!(!filter.set_provisional_answer(true, Remote));
        assert!(!filter.set_answer(true, Remote));
        assert!(!filter.is_active());
    }

    #[test]
    fn test_rtcp_mux_filter_wrong_source() {
        let mut filter = RtcpMuxFilter::new();
        assert!(!filter.set_answer(true, Local));

        assert!(filter.set_offer(true, Local));
        // a second local offer is fine, a remote one is not
        assert!(filter.set_offer(true, Local));
        assert!(!filter.set_offer(true, Remote));
        // the answer has to come from the other side
        assert!(!filter.set_answer(true, Local));
        assert_eq!(filter.state(), RtcpMuxState::SentOffer);
    }

    #[test]
    fn test_rtcp_mux_filter_provisional_answers() {
        let mut filter = RtcpMuxFilter::new();
        assert!(filter.set_offer(true, Local));

        assert!(filter.set_provisional_answer(true, Remote));
        assert!(filter.is_provisionally_active());
        assert!(filter.is_active());
        assert!(!filter.is_fully_active());

        assert!(filter.set_provisional_answer(false, Remote));
        assert_eq!(filter.state(), RtcpMuxState::SentOffer);
        assert!(!filter.is_active());

        assert!(filter.set_provisional_answer(true, Remote));
        assert!(filter.set_answer(true, Remote));
        assert!(filter.is_fully_active());
    }

    #[test]
    fn test_rtcp_mux_filter_active_is_sticky() {
        let mut filter = RtcpMuxFilter::new();
        assert!(filter.set_offer(true, Remote));
        assert!(filter.set_answer(true, Local));
        assert!(filter.is_fully_active());

        assert!(filter.set_offer(true, Local));
        assert!(!filter.set_offer(false, Local));
        assert!(filter.set_answer(true, Remote));
        assert!(!filter.set_answer(false, Remote));
        assert!(filter.is_fully_active());

        let mut forced = RtcpMuxFilter::new();
        forced.set_active();
        assert!(forced.is_active());
    }
}
