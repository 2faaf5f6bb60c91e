#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod address;
pub mod error;
pub(crate) mod transport;
pub mod util;

pub use transport::{
    SocketOption, TaggedBytesMut, TransportContext, TransportMessage, TransportProtocol,
};
