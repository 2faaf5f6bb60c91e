use super::*;

/// The config required to create a new host candidate.
#[derive(Default)]
pub struct CandidateHostConfig {
    pub base_config: CandidateConfig,
}

impl CandidateHostConfig {
    /// Creates a new host candidate. The address may be an mDNS name, in
    /// which case `base_config.base_address` carries the real address.
    pub fn new_candidate_host(self) -> Result<Candidate> {
        self.base_config.new_candidate(CandidateType::Host)
    }
}
