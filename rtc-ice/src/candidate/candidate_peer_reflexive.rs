use super::*;

/// The config required to create a new `CandidatePeerReflexive`.
#[derive(Default)]
pub struct CandidatePeerReflexiveConfig {
    pub base_config: CandidateConfig,

    pub rel_addr: String,
    pub rel_port: u16,
}

impl CandidatePeerReflexiveConfig {
    /// Creates a new peer reflective candidate.
    pub fn new_candidate_peer_reflexive(self) -> Result<Candidate> {
        let mut c = self.base_config.new_candidate(CandidateType::PeerReflexive)?;

        c.related_address = Some(CandidateRelatedAddress {
            address: self.rel_addr,
            port: self.rel_port,
        });

        Ok(c)
    }
}
