//! # movehub-core
//!
//! Frame codec, port/device tables, and the port registry for controlling a
//! Move Hub over its single wireless characteristic.
//!
//! This crate has no I/O.  It is shared by the controller application and
//! anything else that needs to speak the hub's byte protocol.
//!
//! # Architecture overview
//!
//! The hub accepts short command frames (drive a motor, set the LED color,
//! enable sensor reports) and answers with notification frames (identity
//! strings, port attach/detach events, sensor readings).
//!
//! - **`protocol`** – The [`Command`] and [`Notification`] sum types and the
//!   codec that turns them into bytes and back.  Encoding is infallible;
//!   decoding reports a [`ProtocolError`].
//!
//! - **`domain`** – The [`PortRegistry`].  Sensor frames do not describe
//!   their own layout, so decoding one requires knowing which device type
//!   was last attached to the reporting port.

pub mod domain;
pub mod protocol;

pub use domain::registry::PortRegistry;
pub use protocol::codec::{decode_notification, encode_command, ProtocolError};
pub use protocol::messages::{
    Color, Command, DeviceType, Notification, Port, RegistryUpdate, SERVICE_UUID,
};
