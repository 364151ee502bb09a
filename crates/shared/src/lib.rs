//! Wire types shared by the control channel and the lifecycle controller

pub mod protocol;

pub use protocol::*;
