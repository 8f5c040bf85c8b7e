//! Protocol module containing the frame value types and the binary codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_notification, encode_command, ProtocolError};
pub use messages::*;
