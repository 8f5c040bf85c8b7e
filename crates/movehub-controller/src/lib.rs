//! movehub-controller library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the controller do?
//!
//! [`movehub_core`] only turns commands into bytes and bytes into
//! notifications.  This crate owns the connection:
//!
//! 1. Opens a [`HubTransport`](application::transport::HubTransport) to a hub
//!    advertising the Move Hub service.
//! 2. Enables notifications and spawns a receive task that decodes every
//!    inbound frame, keeps the port registry current, and hands the result
//!    to registered callbacks.
//! 3. Offers one async method per command so callers never build frames by
//!    hand.

/// Application layer: the controller facade and the transport seam.
pub mod application;

/// Infrastructure layer: transport implementations and config storage.
pub mod infrastructure;
