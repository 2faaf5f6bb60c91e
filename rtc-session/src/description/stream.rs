pub const FID_SSRC_GROUP_SEMANTICS: &str = "FID";
pub const SIM_SSRC_GROUP_SEMANTICS: &str = "SIM";

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct SsrcGroup {
    pub semantics: String,
    pub ssrcs: Vec<u32>,
}

/// One media source carried by a content section.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct StreamParams {
    pub id: String,
    pub ssrcs: Vec<u32>,
    pub ssrc_groups: Vec<SsrcGroup>,
    pub cname: String,
    pub stream_ids: Vec<String>,
}

impl StreamParams {
    /// A stream that only has an SSRC.
    pub fn create_legacy(ssrc: u32) -> Self {
        StreamParams {
            ssrcs: vec![ssrc],
            ..Default::default()
        }
    }

    pub fn first_ssrc(&self) -> Option<u32> {
        self.ssrcs.first().copied()
    }

    pub fn has_ssrcs(&self) -> bool {
        !self.ssrcs.is_empty()
    }

    pub fn has_ssrc(&self, ssrc: u32) -> bool {
        self.ssrcs.contains(&ssrc)
    }

    /// Adds `fid_ssrc` as the retransmission flow of `primary_ssrc`.
    /// Fails when `primary_ssrc` is not part of the stream.
    pub fn add_fid_ssrc(&mut self, primary_ssrc: u32, fid_ssrc: u32) -> bool {
        if !self.has_ssrc(primary_ssrc) {
            return false;
        }
        self.ssrcs.push(fid_ssrc);
        self.ssrc_groups.push(SsrcGroup {
            semantics: FID_SSRC_GROUP_SEMANTICS.to_owned(),
            ssrcs: vec![primary_ssrc, fid_ssrc],
        });
        true
    }

    /// Whether `other` refers to the same source: by first SSRC when both
    /// carry SSRCs, by id when neither does.
    pub fn same_stream(&self, other: &StreamParams) -> bool {
        match (self.first_ssrc(), other.first_ssrc()) {
            (Some(ssrc), Some(_)) => other.has_ssrc(ssrc),
            (None, None) => self.id == other.id,
            _ => false,
        }
    }
}

pub fn get_stream_by_ssrc(streams: &[StreamParams], ssrc: u32) -> Option<&StreamParams> {
    streams.iter().find(|s| s.has_ssrc(ssrc))
}

pub fn has_stream_with_no_ssrcs(streams: &[StreamParams]) -> bool {
    streams.iter().any(|s| !s.has_ssrcs())
}
