#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod candidate;
pub mod gatherer;
pub mod mdns;
pub mod network;
pub mod port;
pub mod socket;
pub mod state;
pub mod stats;
