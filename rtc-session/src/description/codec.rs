use std::collections::BTreeMap;
use std::fmt;

/// Packetization attribute value for raw (unfragmented) payloads.
pub const PACKETIZATION_PARAM_RAW: &str = "raw";

pub const VIDEO_CLOCK_RATE: u32 = 90000;

// Payload types in these ranges are dynamically assigned and compared by
// name; anything else is a static assignment compared by id.
const LOWER_DYNAMIC_RANGE: std::ops::RangeInclusive<u8> = 35..=65;
const UPPER_DYNAMIC_RANGE: std::ops::RangeInclusive<u8> = 96..=127;

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CodecKind {
    #[default]
    Audio,
    Video,
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CodecKind::Audio => write!(f, "audio"),
            CodecKind::Video => write!(f, "video"),
        }
    }
}

/// An `a=rtcp-fb` entry, e.g. `nack pli`.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct FeedbackParam {
    pub id: String,
    pub param: String,
}

/// One payload type of a content section.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Codec {
    /// RTP payload type.
    pub id: u8,
    pub name: String,
    pub clock_rate: u32,
    /// Audio channel count; 0 and 1 both mean mono.
    pub channels: u16,
    pub packetization: Option<String>,
    pub params: BTreeMap<String, String>,
    pub feedback_params: Vec<FeedbackParam>,
    pub kind: CodecKind,
}

impl Codec {
    pub fn audio(id: u8, name: &str, clock_rate: u32, channels: u16) -> Self {
        Codec {
            id,
            name: name.to_owned(),
            clock_rate,
            channels,
            kind: CodecKind::Audio,
            ..Default::default()
        }
    }

    pub fn video(id: u8, name: &str) -> Self {
        Codec {
            id,
            name: name.to_owned(),
            clock_rate: VIDEO_CLOCK_RATE,
            kind: CodecKind::Video,
            ..Default::default()
        }
    }

    pub fn with_packetization(mut self, packetization: &str) -> Self {
        self.packetization = Some(packetization.to_owned());
        self
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn with_feedback_param(mut self, id: &str, param: &str) -> Self {
        self.feedback_params.push(FeedbackParam {
            id: id.to_owned(),
            param: param.to_owned(),
        });
        self
    }

    fn has_dynamic_id(&self) -> bool {
        LOWER_DYNAMIC_RANGE.contains(&self.id) || UPPER_DYNAMIC_RANGE.contains(&self.id)
    }

    /// Whether `other` describes the same codec. Dynamic payload types
    /// compare by case-insensitive name, static ones by id. Audio codecs also
    /// need the same clock rate (0 matches any) and channel count. The
    /// packetization attribute is not considered.
    pub fn matches(&self, other: &Codec) -> bool {
        if self.kind != other.kind {
            return false;
        }

        let matches_id = if self.has_dynamic_id() && other.has_dynamic_id() {
            self.name.eq_ignore_ascii_case(&other.name)
        } else {
            self.id == other.id
        };
        if !matches_id {
            return false;
        }

        match self.kind {
            CodecKind::Audio => {
                (other.clock_rate == 0 || self.clock_rate == other.clock_rate)
                    && ((self.channels < 2 && other.channels < 2) || self.channels == other.channels)
            }
            CodecKind::Video => self.clock_rate == other.clock_rate,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.id, self.name, self.clock_rate)?;
        if self.channels > 1 {
            write!(f, "/{}", self.channels)?;
        }
        if let Some(packetization) = &self.packetization {
            write!(f, " packetization={packetization}")?;
        }
        Ok(())
    }
}

/// Every codec of `haystack` that [`Codec::matches`] `needle`, in list order.
pub fn find_all_matching_codecs<'a>(haystack: &'a [Codec], needle: &Codec) -> Vec<&'a Codec> {
    haystack.iter().filter(|c| c.matches(needle)).collect()
}
