
use std::fmt;

/// Lifecycle of a [`ConnectivityPort`](crate::port::ConnectivityPort).
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum PortState {
    Unspecified,

    /// Port has been created but `prepare_address` was not called yet.
    #[default]
    Created,

    /// Port is waiting for its socket or its STUN servers.
    Gathering,

    /// Every STUN server answered or failed, and at least one usable path exists.
    Ready,

    /// Every STUN server failed.
    Error,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Self::Unspecified => "Unspecified",
            Self::Created => "Created",
            Self::Gathering => "Gathering",
            Self::Ready => "Ready",
            Self::Error => "Error",
        };
        write!(f, "{s}")
    }
}

impl From<u8> for PortState {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Created,
            2 => Self::Gathering,
            3 => Self::Ready,
            4 => Self::Error,
            _ => Self::Unspecified,
        }
    }
}

/// Describes the state of the candidate gathering process.
#[derive(Default, PartialEq, Eq, Copy, Clone, Debug)]
pub enum GatheringState {
    Unspecified,

    /// Indicates candidate gathering is not yet started.
    #[default]
    New,

    /// Indicates candidate gathering is ongoing.
    Gathering,

    /// Indicates candidate gathering has been completed.
    Complete,
}

impl fmt::Display for GatheringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Self::New => "new",
            Self::Gathering => "gathering",
            Self::Complete => "complete",
            Self::Unspecified => "unspecified",
        };
        write!(f, "{s}")
    }
}

impl From<u8> for GatheringState {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::New,
            2 => Self::Gathering,
            3 => Self::Complete,
            _ => Self::Unspecified,
        }
    }
}
