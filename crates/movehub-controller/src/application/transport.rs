//! The byte-stream collaborator the controller talks through.
//!
//! Discovering the hub, opening the wireless connection, and locating its
//! characteristic are outside this crate.  Whatever does that work exposes
//! it to the controller as a [`HubTransport`].

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Failure reported by a transport implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to connect: {0}")]
    ConnectFailed(String),
    #[error("failed to write frame: {0}")]
    SendFailed(String),
    #[error("failed to enable notifications: {0}")]
    SubscribeFailed(String),
    #[error("transport is closed")]
    Closed,
}

/// A single bidirectional characteristic on a connected hub.
///
/// Implementations must be shareable between the task issuing commands and
/// the task draining notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HubTransport: Send + Sync {
    /// Locates a peripheral advertising `service` and opens its characteristic.
    async fn connect(&self, service: Uuid) -> Result<(), TransportError>;

    /// Writes one complete frame to the characteristic.
    async fn send(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Turns on notifications and returns the stream of inbound frames, in
    /// the order the hub sent them.  The stream ends when the link closes.
    async fn enable_notifications(&self) -> Result<mpsc::Receiver<Vec<u8>>, TransportError>;

    /// Closes the link.  Closing an already-closed link is not an error.
    async fn disconnect(&self) -> Result<(), TransportError>;
}
