#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod channel;
pub mod context;
pub mod description;
pub mod negotiator;
