
pub mod codec;
pub mod content;
pub mod direction;
pub mod rtp_extension;
pub mod stream;
pub mod transport_info;

pub use codec::{Codec, CodecKind, FeedbackParam};
pub use content::{
    ExtmapAllowMixed, MediaContentDescription, MediaContentKind, MediaType, SctpParameters,
};
pub use direction::MediaDirection;
pub use rtp_extension::RtpExtension;
pub use stream::{SsrcGroup, StreamParams};
pub use transport_info::{TransportDescription, TransportInfo};

use bitflags::bitflags;
use std::fmt;

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";

pub const GROUP_TYPE_BUNDLE: &str = "BUNDLE";

/// Transport protocol family of a content section.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum MediaProtocolType {
    #[default]
    Rtp,
    Sctp,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentInfo {
    pub name: String,
    pub content_type: MediaProtocolType,
    pub rejected: bool,
    pub bundle_only: bool,
    pub description: MediaContentDescription,
}

impl ContentInfo {
    pub fn new(
        name: &str,
        content_type: MediaProtocolType,
        description: MediaContentDescription,
    ) -> Self {
        ContentInfo {
            name: name.to_owned(),
            content_type,
            rejected: false,
            bundle_only: false,
            description,
        }
    }
}

/// Ordered set of content names sharing some semantics, e.g. BUNDLE.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ContentGroup {
    semantics: String,
    content_names: Vec<String>,
}

impl ContentGroup {
    pub fn new(semantics: &str) -> Self {
        ContentGroup {
            semantics: semantics.to_owned(),
            content_names: vec![],
        }
    }

    pub fn semantics(&self) -> &str {
        &self.semantics
    }

    pub fn content_names(&self) -> &[String] {
        &self.content_names
    }

    pub fn first_content_name(&self) -> Option<&str> {
        self.content_names.first().map(|n| n.as_str())
    }

    pub fn has_content_name(&self, name: &str) -> bool {
        self.content_names.iter().any(|n| n == name)
    }

    /// Names are kept unique; adding a present name does nothing.
    pub fn add_content_name(&mut self, name: &str) {
        if !self.has_content_name(name) {
            self.content_names.push(name.to_owned());
        }
    }

    pub fn remove_content_name(&mut self, name: &str) -> bool {
        if let Some(pos) = self.content_names.iter().position(|n| n == name) {
            self.content_names.remove(pos);
            true
        } else {
            false
        }
    }
}

impl fmt::Display for ContentGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.semantics)?;
        for (i, name) in self.content_names.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{name}")?;
        }
        write!(f, ")")
    }
}

bitflags! {
    /// How MediaStream ids are signaled.
    pub struct MsidSignaling: u32 {
        const NOT_USED = 0;
        /// `a=msid` in the media section.
        const MEDIA_SECTION = 1;
        /// `a=ssrc:.. msid` lines.
        const SSRC_ATTRIBUTE = 2;
        /// `a=msid-semantic` at session level.
        const SEMANTIC = 4;
    }
}

impl Default for MsidSignaling {
    fn default() -> Self {
        MsidSignaling::MEDIA_SECTION | MsidSignaling::SEMANTIC
    }
}

/// A full offer or answer: contents in m-line order, their transports and
/// the groups binding them together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    contents: Vec<ContentInfo>,
    transport_infos: Vec<TransportInfo>,
    content_groups: Vec<ContentGroup>,
    msid_signaling: MsidSignaling,
    extmap_allow_mixed: bool,
}

impl Default for SessionDescription {
    fn default() -> Self {
        SessionDescription {
            contents: vec![],
            transport_infos: vec![],
            content_groups: vec![],
            msid_signaling: MsidSignaling::default(),
            extmap_allow_mixed: true,
        }
    }
}

impl SessionDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> &[ContentInfo] {
        &self.contents
    }

    pub fn get_content_by_name(&self, name: &str) -> Option<&ContentInfo> {
        self.contents.iter().find(|c| c.name == name)
    }

    pub fn get_content_by_name_mut(&mut self, name: &str) -> Option<&mut ContentInfo> {
        self.contents.iter_mut().find(|c| c.name == name)
    }

    pub fn get_content_description_by_name(
        &self,
        name: &str,
    ) -> Option<&MediaContentDescription> {
        self.get_content_by_name(name).map(|c| &c.description)
    }

    pub fn first_content_by_type(&self, content_type: MediaProtocolType) -> Option<&ContentInfo> {
        self.contents.iter().find(|c| c.content_type == content_type)
    }

    pub fn first_content(&self) -> Option<&ContentInfo> {
        self.contents.first()
    }

    pub fn add_content(
        &mut self,
        name: &str,
        content_type: MediaProtocolType,
        description: MediaContentDescription,
    ) {
        self.add_content_with_flags(name, content_type, false, false, description);
    }

    /// Appends a content section. The session-level extmap-allow-mixed
    /// setting is pushed down to the new section.
    pub fn add_content_with_flags(
        &mut self,
        name: &str,
        content_type: MediaProtocolType,
        rejected: bool,
        bundle_only: bool,
        mut description: MediaContentDescription,
    ) {
        if self.extmap_allow_mixed {
            description.set_extmap_allow_mixed_enum(ExtmapAllowMixed::Session);
        }
        let mut content = ContentInfo::new(name, content_type, description);
        content.rejected = rejected;
        content.bundle_only = bundle_only;
        self.contents.push(content);
    }

    pub fn remove_content_by_name(&mut self, name: &str) -> bool {
        if let Some(pos) = self.contents.iter().position(|c| c.name == name) {
            self.contents.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn transport_infos(&self) -> &[TransportInfo] {
        &self.transport_infos
    }

    pub fn add_transport_info(&mut self, transport_info: TransportInfo) {
        self.transport_infos.push(transport_info);
    }

    pub fn get_transport_info_by_name(&self, name: &str) -> Option<&TransportInfo> {
        self.transport_infos.iter().find(|t| t.content_name == name)
    }

    pub fn get_transport_info_by_name_mut(&mut self, name: &str) -> Option<&mut TransportInfo> {
        self.transport_infos
            .iter_mut()
            .find(|t| t.content_name == name)
    }

    pub fn remove_transport_info_by_name(&mut self, name: &str) -> bool {
        if let Some(pos) = self
            .transport_infos
            .iter()
            .position(|t| t.content_name == name)
        {
            self.transport_infos.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn groups(&self) -> &[ContentGroup] {
        &self.content_groups
    }

    pub fn get_group_by_name(&self, semantics: &str) -> Option<&ContentGroup> {
        self.content_groups
            .iter()
            .find(|g| g.semantics == semantics)
    }

    pub fn get_groups_by_name(&self, semantics: &str) -> Vec<&ContentGroup> {
        self.content_groups
            .iter()
            .filter(|g| g.semantics == semantics)
            .collect()
    }

    pub fn has_group(&self, semantics: &str) -> bool {
        self.get_group_by_name(semantics).is_some()
    }

    pub fn add_group(&mut self, group: ContentGroup) {
        self.content_groups.push(group);
    }

    /// Removes the first group with `semantics`.
    pub fn remove_group_by_name(&mut self, semantics: &str) -> bool {
        if let Some(pos) = self
            .content_groups
            .iter()
            .position(|g| g.semantics == semantics)
        {
            self.content_groups.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn msid_signaling(&self) -> MsidSignaling {
        self.msid_signaling
    }

    pub fn set_msid_signaling(&mut self, msid_signaling: MsidSignaling) {
        self.msid_signaling = msid_signaling;
    }

    pub fn msid_supported(&self) -> bool {
        self.msid_signaling.contains(MsidSignaling::SEMANTIC)
    }

    pub fn extmap_allow_mixed(&self) -> bool {
        self.extmap_allow_mixed
    }

    /// Applies the session-level attribute to every section. Disabling skips
    /// sections that carry their own media-level attribute.
    pub fn set_extmap_allow_mixed(&mut self, supported: bool) {
        self.extmap_allow_mixed = supported;
        let media_level = if supported {
            ExtmapAllowMixed::Session
        } else {
            ExtmapAllowMixed::No
        };
        for content in &mut self.contents {
            if supported
                || content.description.extmap_allow_mixed_enum() != ExtmapAllowMixed::Media
            {
                content.description.set_extmap_allow_mixed_enum(media_level);
            }
        }
    }
}
