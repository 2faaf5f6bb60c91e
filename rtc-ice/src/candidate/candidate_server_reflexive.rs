use super::*;

/// The config required to create a new server reflexive candidate.
#[derive(Default)]
pub struct CandidateServerReflexiveConfig {
    pub base_config: CandidateConfig,

    /// Related address, empty when it must not be revealed.
    pub rel_addr: String,
    pub rel_port: u16,

    /// `stun:host:port` of the server that reported the address.
    pub url: String,
}

impl CandidateServerReflexiveConfig {
    /// Creates a new server reflective candidate.
    pub fn new_candidate_server_reflexive(self) -> Result<Candidate> {
        let mut c = self
            .base_config
            .new_candidate(CandidateType::ServerReflexive)?;

        c.related_address = Some(CandidateRelatedAddress {
            address: self.rel_addr,
            port: self.rel_port,
        });
        c.url = self.url;

        Ok(c)
    }
}
