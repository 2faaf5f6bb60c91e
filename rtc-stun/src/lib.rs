#![warn(rust_2018_idioms)]

pub mod addr;
pub mod attributes;
pub mod binding;
pub mod error_code;
pub mod message;
pub mod textattrs;
pub mod xoraddr;

// IANA assigned port for "stun" protocol.
pub const DEFAULT_PORT: u16 = 3478;
