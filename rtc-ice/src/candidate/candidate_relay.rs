use super::*;

/// The config required to create a new `CandidateRelay`. Relayed candidates
/// are only ever parsed from a remote description here.
#[derive(Default)]
pub struct CandidateRelayConfig {
    pub base_config: CandidateConfig,

    pub rel_addr: String,
    pub rel_port: u16,

    pub url: String,
}

impl CandidateRelayConfig {
    /// Creates a new relay candidate.
    pub fn new_candidate_relay(self) -> Result<Candidate> {
        let mut c = self.base_config.new_candidate(CandidateType::Relay)?;

        c.related_address = Some(CandidateRelatedAddress {
            address: self.rel_addr,
            port: self.rel_port,
        });
        c.url = self.url;

        Ok(c)
    }
}
