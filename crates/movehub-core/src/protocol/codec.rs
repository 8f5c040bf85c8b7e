//! Binary codec for Move Hub frames.
//!
//! Outbound wire format:
//! ```text
//! [frame_len:1][0x00][msg_type:1][port:1][payload:N]      frame_len = N + 4
//! ```
//! Inbound wire format:
//! ```text
//! [frame_len:1][version:1][msg_type:1][body:N]
//! ```
//! All multi-byte integers are little-endian.  The inbound length byte is
//! informational and is not checked against the buffer.

use crate::domain::registry::PortRegistry;
use crate::protocol::messages::{
    command_ids, notification_types, Command, DeviceType, Notification, Port, COMMAND_HEADER_SIZE,
    DIRECT_WRITE_MODE, MOTOR_TRAILER, NOTIFICATION_HEADER_SIZE, TEXT_INFO_TYPES,
};
use thiserror::Error;

/// Errors that can occur while decoding an inbound frame.
///
/// Encoding never fails.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// A discriminant is not valid here, or the frame is too short for the
    /// fixed fields of its variant.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// A sensor-data frame names a port with no attached device on record.
    #[error("sensor data for unmapped port {0}")]
    UnmappedPort(Port),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Command`] into a complete outbound frame.
///
/// # Examples
///
/// ```rust
/// use movehub_core::{encode_command, Color, Command};
///
/// let frame = encode_command(&Command::SetColor(Color::Red));
/// assert_eq!(frame, [0x08, 0x00, 0x81, 0x32, 0x11, 0x51, 0x00, 0x09]);
/// ```
pub fn encode_command(cmd: &Command) -> Vec<u8> {
    let payload = encode_payload(cmd);
    let frame_len = COMMAND_HEADER_SIZE + payload.len();

    let mut buf = Vec::with_capacity(frame_len);
    buf.push(frame_len as u8);
    buf.push(0x00);
    buf.push(cmd.message_type());
    buf.push(cmd.port().as_u8());
    buf.extend_from_slice(&payload);
    buf
}

/// Decodes one inbound frame.
///
/// `registry` is consulted only for sensor-data frames, whose payload layout
/// depends on the device attached to the reporting port.  The decoder never
/// modifies it; applying attach/detach events is the caller's job.
///
/// Unrecognised top-level message types are not an error; they decode to
/// [`Notification::Raw`].
///
/// # Errors
///
/// - [`ProtocolError::MalformedFrame`] for an unknown port-info mode or a
///   frame too short for its fields.
/// - [`ProtocolError::UnmappedPort`] for sensor data on a port with no
///   registry entry.
///
/// # Examples
///
/// ```rust
/// use movehub_core::{decode_notification, DeviceType, Notification, Port, PortRegistry};
///
/// let registry = PortRegistry::new();
/// let n = decode_notification(&[0x05, 0x00, 0x04, 0x02, 0x01, 0x27], &registry).unwrap();
/// assert_eq!(
///     n,
///     Notification::PortAttached { port: Port::D, device_type: DeviceType::ExternalMotor }
/// );
/// ```
pub fn decode_notification(
    bytes: &[u8],
    registry: &PortRegistry,
) -> Result<Notification, ProtocolError> {
    require_len(bytes, NOTIFICATION_HEADER_SIZE, "header")?;

    // bytes[0] is the frame length, bytes[1] the protocol version; neither
    // affects decoding.
    let msg_type = bytes[2];
    let body = &bytes[NOTIFICATION_HEADER_SIZE..];

    match msg_type {
        notification_types::DEVICE_INFO => decode_device_info(body),
        notification_types::PORT_INFO => decode_port_info(body),
        notification_types::SENSOR_DATA => decode_sensor_data(body, registry),
        other => Ok(Notification::Raw {
            msg_type: other,
            sub_type: None,
            payload: body.to_vec(),
        }),
    }
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_payload(cmd: &Command) -> Vec<u8> {
    let mut buf = Vec::new();
    match *cmd {
        Command::SetColor(color) => {
            buf.extend_from_slice(&[DIRECT_WRITE_MODE, command_ids::SET_COLOR, 0x00]);
            buf.push(color as u8);
        }
        Command::RunMotorForTime { time_ms, power, .. } => {
            buf.extend_from_slice(&[DIRECT_WRITE_MODE, command_ids::MOTOR_FOR_TIME]);
            buf.extend_from_slice(&time_ms.to_le_bytes());
            encode_motor_tail(&mut buf, &[power]);
        }
        Command::RunMotorPairForTime {
            time_ms,
            power_a,
            power_b,
        } => {
            buf.extend_from_slice(&[DIRECT_WRITE_MODE, command_ids::MOTOR_PAIR_FOR_TIME]);
            buf.extend_from_slice(&time_ms.to_le_bytes());
            encode_motor_tail(&mut buf, &[power_a, power_b]);
        }
        Command::RunMotorToAngle { angle, power, .. } => {
            buf.extend_from_slice(&[DIRECT_WRITE_MODE, command_ids::MOTOR_TO_ANGLE]);
            buf.extend_from_slice(&angle.to_le_bytes());
            encode_motor_tail(&mut buf, &[power]);
        }
        Command::RunMotorPairToAngle {
            angle,
            power_a,
            power_b,
        } => {
            buf.extend_from_slice(&[DIRECT_WRITE_MODE, command_ids::MOTOR_PAIR_TO_ANGLE]);
            buf.extend_from_slice(&angle.to_le_bytes());
            encode_motor_tail(&mut buf, &[power_a, power_b]);
        }
        Command::Subscribe { option, .. } => {
            buf.push(option);
            buf.extend_from_slice(&[0x01, 0x00, 0x00, 0x00, 0x01]);
        }
    }
    buf
}

/// Writes the power byte(s) followed by the fixed motor trailer.
fn encode_motor_tail(buf: &mut Vec<u8>, powers: &[i8]) {
    buf.extend(powers.iter().map(|p| *p as u8));
    buf.extend_from_slice(&MOTOR_TRAILER);
}

// ── Payload decoding ──────────────────────────────────────────────────────────

fn decode_device_info(p: &[u8]) -> Result<Notification, ProtocolError> {
    // info_type (1) + spacer (1)
    require_len(p, 2, "DeviceInfo")?;
    let info_type = p[0];
    let rest = &p[2..];
    if TEXT_INFO_TYPES.contains(&info_type) {
        Ok(Notification::DeviceInfoString {
            info_type,
            text: String::from_utf8_lossy(rest).into_owned(),
        })
    } else {
        Ok(Notification::Raw {
            msg_type: notification_types::DEVICE_INFO,
            sub_type: Some(info_type),
            payload: rest.to_vec(),
        })
    }
}

fn decode_port_info(p: &[u8]) -> Result<Notification, ProtocolError> {
    // port (1) + mode (1)
    require_len(p, 2, "PortInfo")?;
    let port = Port::from_u8(p[0]);
    match p[1] {
        0x00 => Ok(Notification::PortDetached { port }),
        0x01 => {
            require_len(p, 3, "PortAttached")?;
            Ok(Notification::PortAttached {
                port,
                device_type: DeviceType::from_u8(p[2]),
            })
        }
        0x02 => {
            // device_type (1) + spacer (1) + sub_port_1 (1) + sub_port_2 (1)
            require_len(p, 6, "GroupAttached")?;
            Ok(Notification::GroupAttached {
                port,
                device_type: DeviceType::from_u8(p[2]),
                sub_port_1: p[4],
                sub_port_2: p[5],
            })
        }
        mode => Err(ProtocolError::MalformedFrame(format!(
            "unknown port info mode: 0x{mode:02X}"
        ))),
    }
}

fn decode_sensor_data(p: &[u8], registry: &PortRegistry) -> Result<Notification, ProtocolError> {
    // port (1) + unused (1)
    require_len(p, 2, "SensorData")?;
    let port = Port::from_u8(p[0]);
    let device_type = registry
        .lookup(port)
        .ok_or(ProtocolError::UnmappedPort(port))?;
    let v = &p[2..];

    match device_type {
        DeviceType::InternalMotor | DeviceType::ExternalMotor => {
            require_len(v, 4, "MotorSensor")?;
            let angle = i32::from_le_bytes([v[0], v[1], v[2], v[3]]);
            Ok(Notification::MotorSensor { port, angle })
        }
        DeviceType::TiltSensor => {
            require_len(v, 2, "TiltSensor")?;
            Ok(Notification::TiltSensor {
                roll: v[0] as i8,
                pitch: v[1] as i8,
            })
        }
        DeviceType::DistanceColorSensor => {
            // color (1) + value (1) + spacer (1) + partial (1)
            require_len(v, 4, "ColorDistanceSensor")?;
            let color = v[0];
            let value = v[1];
            let partial = v[3];
            Ok(Notification::ColorDistanceSensor {
                color,
                distance: distance_from_parts(value, partial),
            })
        }
        _ => Ok(Notification::Raw {
            msg_type: notification_types::SENSOR_DATA,
            sub_type: Some(port.as_u8()),
            payload: v.to_vec(),
        }),
    }
}

/// Whole units plus a `1/partial` fraction; a zero `partial` adds nothing.
fn distance_from_parts(value: u8, partial: u8) -> f32 {
    let fraction = if partial != 0 {
        1.0 / f32::from(partial)
    } else {
        0.0
    };
    f32::from(value) + fraction
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::MalformedFrame(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
