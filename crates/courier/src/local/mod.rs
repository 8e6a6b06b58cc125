//! Local backend adapter
//!
//! The desktop client is driven through an automation host process.
//! [`BridgeClient`] is a narrow adapter over that host's line protocol;
//! the rest of the crate only sees [`LocalMailClient`](crate::backends::LocalMailClient).

mod bridge;

pub use bridge::{BridgeClient, BridgeError};
