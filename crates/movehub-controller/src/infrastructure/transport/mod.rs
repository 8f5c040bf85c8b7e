//! [`HubTransport`](crate::application::transport::HubTransport)
//! implementations.
//!
//! Only an in-process simulation ships here; a radio-backed transport plugs
//! in through the same trait.
pub mod simulated;
