//! Move Hub protocol value types: port and device tables, the color palette,
//! outbound [`Command`]s and inbound [`Notification`]s.
//!
//! Every frame on the wire starts with its own total length:
//!
//! ```text
//! outbound: [frame_len:1][0x00][msg_type:1][port:1][payload:N]
//! inbound:  [frame_len:1][version:1][msg_type:1][body:N]
//! ```
//!
//! Multi-byte integers are little-endian.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Protocol constants ────────────────────────────────────────────────────────

/// GATT service advertised by the hub.  The hub exposes exactly one
/// characteristic under it, used for writes and notifications alike.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x00001623_1212_efde_1623_785feabcd123);

/// Size of the outbound header: length, spacer, message type, port.
pub const COMMAND_HEADER_SIZE: usize = 4;

/// Size of the inbound header: length, version, message type.
pub const NOTIFICATION_HEADER_SIZE: usize = 3;

/// Message type of every direct command (color and motor frames).
pub const MSG_DIRECT_COMMAND: u8 = 0x81;

/// Message type of the sensor subscription frame.
pub const MSG_SUBSCRIBE: u8 = 0x41;

/// Selects direct write mode in a direct command.
pub const DIRECT_WRITE_MODE: u8 = 0x11;

/// Max power (100 %), use profile, acceleration profile.  Appended to every
/// motor command.
pub const MOTOR_TRAILER: [u8; 3] = [0x64, 0x7F, 0x03];

/// Command ids carried after [`DIRECT_WRITE_MODE`].
pub mod command_ids {
    pub const SET_COLOR: u8 = 0x51;
    pub const MOTOR_FOR_TIME: u8 = 0x09;
    pub const MOTOR_PAIR_FOR_TIME: u8 = 0x0A;
    pub const MOTOR_TO_ANGLE: u8 = 0x0B;
    pub const MOTOR_PAIR_TO_ANGLE: u8 = 0x0C;
}

/// Inbound message types.
pub mod notification_types {
    pub const DEVICE_INFO: u8 = 0x01;
    pub const PORT_INFO: u8 = 0x04;
    pub const SENSOR_DATA: u8 = 0x45;
}

/// Device-info sub-types whose body is text.
pub const TEXT_INFO_TYPES: [u8; 2] = [0x01, 0x08];

// ── Ports ─────────────────────────────────────────────────────────────────────

/// Physical or virtual attachment point on the hub.
///
/// The hub may report ports outside the named set (internal current and
/// voltage sensors, for example); those are kept as [`Port::Other`] so the
/// original byte survives a decode.
///
/// Equality and hashing go by wire byte, so `Port::Other(0x02)` and
/// `Port::D` name the same port.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Port {
    C,
    D,
    Led,
    A,
    B,
    /// Virtual port driving A and B in lockstep.
    AB,
    Tilt,
    Other(u8),
}

impl Port {
    /// Converts a wire byte to a [`Port`].  Never fails.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x01 => Port::C,
            0x02 => Port::D,
            0x32 => Port::Led,
            0x37 => Port::A,
            0x38 => Port::B,
            0x39 => Port::AB,
            0x3A => Port::Tilt,
            other => Port::Other(other),
        }
    }

    /// The wire byte for this port.
    pub fn as_u8(self) -> u8 {
        match self {
            Port::C => 0x01,
            Port::D => 0x02,
            Port::Led => 0x32,
            Port::A => 0x37,
            Port::B => 0x38,
            Port::AB => 0x39,
            Port::Tilt => 0x3A,
            Port::Other(value) => value,
        }
    }
}

impl From<u8> for Port {
    fn from(value: u8) -> Self {
        Port::from_u8(value)
    }
}

impl From<Port> for u8 {
    fn from(port: Port) -> Self {
        port.as_u8()
    }
}

impl PartialEq for Port {
    fn eq(&self, other: &Self) -> bool {
        self.as_u8() == other.as_u8()
    }
}

impl Eq for Port {}

impl Hash for Port {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_u8().hash(state);
    }
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Port::Other(value) => write!(f, "0x{value:02X}"),
            named => write!(f, "{named:?}"),
        }
    }
}

// ── Device types ──────────────────────────────────────────────────────────────

/// Category of the device attached to a port, as reported by attach events.
///
/// Like [`Port`], compares and hashes by wire byte.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum DeviceType {
    Unknown,
    PowerVoltage,
    CircuitPower,
    Led,
    DistanceColorSensor,
    InternalMotor,
    ExternalMotor,
    TiltSensor,
    /// A type byte outside the named table.  Sensor frames from such a
    /// device decode to [`Notification::Raw`].
    Other(u8),
}

impl DeviceType {
    /// Converts a wire byte to a [`DeviceType`].  Never fails.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => DeviceType::Unknown,
            0x14 => DeviceType::PowerVoltage,
            0x15 => DeviceType::CircuitPower,
            0x17 => DeviceType::Led,
            0x25 => DeviceType::DistanceColorSensor,
            0x26 => DeviceType::InternalMotor,
            0x27 => DeviceType::ExternalMotor,
            0x28 => DeviceType::TiltSensor,
            other => DeviceType::Other(other),
        }
    }

    /// The wire byte for this device type.
    pub fn as_u8(self) -> u8 {
        match self {
            DeviceType::Unknown => 0x00,
            DeviceType::PowerVoltage => 0x14,
            DeviceType::CircuitPower => 0x15,
            DeviceType::Led => 0x17,
            DeviceType::DistanceColorSensor => 0x25,
            DeviceType::InternalMotor => 0x26,
            DeviceType::ExternalMotor => 0x27,
            DeviceType::TiltSensor => 0x28,
            DeviceType::Other(value) => value,
        }
    }

    /// Returns `true` for both the built-in and the external motor.
    pub fn is_motor(self) -> bool {
        matches!(self, DeviceType::InternalMotor | DeviceType::ExternalMotor)
    }
}

impl From<u8> for DeviceType {
    fn from(value: u8) -> Self {
        DeviceType::from_u8(value)
    }
}

impl From<DeviceType> for u8 {
    fn from(device_type: DeviceType) -> Self {
        device_type.as_u8()
    }
}

impl PartialEq for DeviceType {
    fn eq(&self, other: &Self) -> bool {
        self.as_u8() == other.as_u8()
    }
}

impl Eq for DeviceType {}

impl Hash for DeviceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_u8().hash(state);
    }
}

// ── Colors ────────────────────────────────────────────────────────────────────

/// Fixed palette of the hub LED, indexed 0–10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Color {
    Off = 0,
    Pink = 1,
    Purple = 2,
    Blue = 3,
    LightBlue = 4,
    Cyan = 5,
    Green = 6,
    Yellow = 7,
    Orange = 8,
    Red = 9,
    White = 10,
}

impl Color {
    /// Looks up a palette index.  Returns `None` above 10; the color sensor
    /// uses 0xFF for "nothing detected".
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Color::Off),
            1 => Some(Color::Pink),
            2 => Some(Color::Purple),
            3 => Some(Color::Blue),
            4 => Some(Color::LightBlue),
            5 => Some(Color::Cyan),
            6 => Some(Color::Green),
            7 => Some(Color::Yellow),
            8 => Some(Color::Orange),
            9 => Some(Color::Red),
            10 => Some(Color::White),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Color {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Color::from_u8(value).ok_or(())
    }
}

// ── Outbound commands ─────────────────────────────────────────────────────────

/// An outbound command.  Each variant maps to exactly one frame layout in
/// [`crate::protocol::codec::encode_command`].
///
/// Power values are signed percentages in `[-100, 100]`; they are written
/// as-is, so anything outside that range is the caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Sets the hub LED.  Always addressed to [`Port::Led`].
    SetColor(Color),
    RunMotorForTime {
        port: Port,
        time_ms: u16,
        power: i8,
    },
    /// Runs A and B together for `time_ms`.  Always addressed to [`Port::AB`].
    RunMotorPairForTime {
        time_ms: u16,
        power_a: i8,
        power_b: i8,
    },
    RunMotorToAngle {
        port: Port,
        angle: u32,
        power: i8,
    },
    /// Turns A and B together by `angle` degrees.  Always addressed to
    /// [`Port::AB`].
    RunMotorPairToAngle {
        angle: u32,
        power_a: i8,
        power_b: i8,
    },
    /// Enables sensor reporting on `port` in the given mode.
    Subscribe { port: Port, option: u8 },
}

impl Command {
    /// The port byte written in the frame header.
    pub fn port(&self) -> Port {
        match self {
            Command::SetColor(_) => Port::Led,
            Command::RunMotorForTime { port, .. }
            | Command::RunMotorToAngle { port, .. }
            | Command::Subscribe { port, .. } => *port,
            Command::RunMotorPairForTime { .. } | Command::RunMotorPairToAngle { .. } => Port::AB,
        }
    }

    /// The message type byte written in the frame header.
    pub fn message_type(&self) -> u8 {
        match self {
            Command::Subscribe { .. } => MSG_SUBSCRIBE,
            _ => MSG_DIRECT_COMMAND,
        }
    }
}

// ── Inbound notifications ─────────────────────────────────────────────────────

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// Hub identity text (name, firmware string).
    DeviceInfoString { info_type: u8, text: String },
    PortAttached { port: Port, device_type: DeviceType },
    PortDetached { port: Port },
    /// A virtual port formed from two physical ports.  The sub-ports are kept
    /// as raw bytes, exactly as reported.
    GroupAttached {
        port: Port,
        device_type: DeviceType,
        sub_port_1: u8,
        sub_port_2: u8,
    },
    /// Cumulative motor position in degrees.
    MotorSensor { port: Port, angle: i32 },
    TiltSensor { roll: i8, pitch: i8 },
    /// `color` is the raw sensor byte; see [`Color::from_u8`].
    ColorDistanceSensor { color: u8, distance: f32 },
    /// Anything not decoded further.  `sub_type` is the device-info sub-type
    /// or the sensor port when the top-level type was understood.
    Raw {
        msg_type: u8,
        sub_type: Option<u8>,
        payload: Vec<u8>,
    },
}

/// How a notification changes the port registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryUpdate {
    Upsert(Port, DeviceType),
    Remove(Port),
}

impl Notification {
    /// Returns the registry change implied by this notification, if any.
    ///
    /// Group attach only maps the group port; the sub-ports keep whatever
    /// mapping they already had.
    pub fn registry_update(&self) -> Option<RegistryUpdate> {
        match self {
            Notification::PortAttached { port, device_type }
            | Notification::GroupAttached {
                port, device_type, ..
            } => Some(RegistryUpdate::Upsert(*port, *device_type)),
            Notification::PortDetached { port } => Some(RegistryUpdate::Remove(*port)),
            _ => None,
        }
    }
}
