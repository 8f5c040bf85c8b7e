//! In-memory hub that speaks the frame protocol without a radio.
//!
//! `SimulatedHub` stands in for a real wireless adapter.  It:
//!
//! - accepts a connection only for the hub service UUID,
//! - announces its name and every configured device as attach frames when
//!   notifications are enabled,
//! - records every written frame so tests can inspect exactly what was sent,
//! - tracks motor positions and, for ports that were subscribed, answers
//!   motor commands with a sensor frame carrying the new position.
//!
//! Set `fail_sends` to make every write fail, for exercising error paths.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use movehub_core::protocol::messages::{
    command_ids, notification_types, DIRECT_WRITE_MODE, MSG_DIRECT_COMMAND, MSG_SUBSCRIBE,
};
use movehub_core::{DeviceType, Port, SERVICE_UUID};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::transport::{HubTransport, TransportError};

/// Capacity of the inbound frame channel.
const INBOUND_CAPACITY: usize = 128;

/// Name reported in the device-info frame.
const DEFAULT_NAME: &str = "LEGO Move Hub";

/// Longest name that fits a device-info frame behind its 5-byte header.
pub const MAX_NAME_LEN: usize = u8::MAX as usize - 5;

/// A software hub implementing [`HubTransport`].
pub struct SimulatedHub {
    name: String,
    devices: Vec<(Port, DeviceType)>,
    /// Every frame passed to `send`, in order.
    pub sent: Mutex<Vec<Vec<u8>>>,
    /// When `true`, every `send` fails with [`TransportError::SendFailed`].
    pub fail_sends: AtomicBool,
    connected: AtomicBool,
    inbound: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    subscribed: Mutex<HashSet<u8>>,
    positions: Mutex<HashMap<u8, i32>>,
}

impl SimulatedHub {
    /// Creates a hub reporting `devices` as attached.  [`Port::AB`] is
    /// announced as a group of A and B.
    pub fn new(devices: Vec<(Port, DeviceType)>) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            devices,
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            inbound: Mutex::new(None),
            subscribed: Mutex::new(HashSet::new()),
            positions: Mutex::new(HashMap::new()),
        }
    }

    /// The device set of a stock hub: two built-in motors and their group,
    /// LED, tilt sensor, a color/distance sensor on C and a motor on D.
    pub fn move_hub() -> Self {
        Self::new(vec![
            (Port::A, DeviceType::InternalMotor),
            (Port::B, DeviceType::InternalMotor),
            (Port::AB, DeviceType::InternalMotor),
            (Port::Led, DeviceType::Led),
            (Port::Tilt, DeviceType::TiltSensor),
            (Port::C, DeviceType::DistanceColorSensor),
            (Port::D, DeviceType::ExternalMotor),
        ])
    }

    /// Overrides the reported hub name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns a copy of every frame written so far.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Pushes `frame` to the controller as if the hub had sent it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] when notifications are not enabled
    /// or the inbound channel is full.
    pub fn inject(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        let guard = self.inbound.lock().unwrap_or_else(|e| e.into_inner());
        let sender = guard.as_ref().ok_or(TransportError::Closed)?;
        sender.try_send(frame).map_err(|e| {
            warn!("simulated hub dropped inbound frame: {e}");
            TransportError::Closed
        })
    }

    /// Reports a device attached to `port`.
    pub fn attach(&self, port: Port, device_type: DeviceType) -> Result<(), TransportError> {
        self.inject(attach_frame(port, device_type))
    }

    /// Reports the device on `port` as removed.
    pub fn detach(&self, port: Port) -> Result<(), TransportError> {
        self.inject(detach_frame(port))
    }

    /// Current simulated position of the motor on `port`, in degrees.
    pub fn position(&self, port: Port) -> i32 {
        let positions = self.positions.lock().unwrap_or_else(|e| e.into_inner());
        positions.get(&port.as_u8()).copied().unwrap_or(0)
    }

    /// Reacts to one outbound frame.
    fn process(&self, frame: &[u8]) {
        if frame.len() < 4 {
            return;
        }
        let port = frame[3];
        match frame[2] {
            MSG_SUBSCRIBE => {
                self.subscribed
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(port);
            }
            MSG_DIRECT_COMMAND if frame.len() >= 6 && frame[4] == DIRECT_WRITE_MODE => {
                if let Some((targets, delta)) = motor_motion(port, &frame[5..]) {
                    for (target, degrees) in targets.into_iter().zip(delta) {
                        self.advance(target, degrees);
                    }
                }
            }
            _ => {}
        }
    }

    /// Moves the motor on `port` and reports the new angle if subscribed.
    fn advance(&self, port: u8, degrees: i32) {
        let angle = {
            let mut positions = self.positions.lock().unwrap_or_else(|e| e.into_inner());
            let angle = positions.entry(port).or_insert(0);
            *angle = angle.wrapping_add(degrees);
            *angle
        };
        let subscribed = self
            .subscribed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&port);
        if subscribed {
            debug!(port, angle, "simulated motor moved");
            if let Err(e) = self.inject(motor_sensor_frame(Port::from_u8(port), angle)) {
                debug!(port, "motor report not delivered: {e}");
            }
        }
    }
}

#[async_trait]
impl HubTransport for SimulatedHub {
    async fn connect(&self, service: Uuid) -> Result<(), TransportError> {
        if service != SERVICE_UUID {
            return Err(TransportError::ConnectFailed(format!(
                "no peripheral advertises service {service}"
            )));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("simulated write failure".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frame.to_vec());
        self.process(frame);
        Ok(())
    }

    async fn enable_notifications(&self) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::SubscribeFailed("not connected".to_string()));
        }
        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
        *self.inbound.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);

        self.inject(name_frame(&self.name))?;
        for (port, device_type) in &self.devices {
            let frame = if *port == Port::AB {
                group_frame(*port, *device_type, Port::A, Port::B)
            } else {
                attach_frame(*port, *device_type)
            };
            self.inject(frame)?;
        }
        Ok(rx)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        self.inbound.lock().unwrap_or_else(|e| e.into_inner()).take();
        Ok(())
    }
}

/// Decodes a motor command body (starting at the command id) into the ports
/// it moves and the signed number of degrees for each.
///
/// Timed commands move `time_ms * power / 100` degrees; angle commands move
/// `angle` degrees in the direction of the power sign.
fn motor_motion(port: u8, body: &[u8]) -> Option<(Vec<u8>, Vec<i32>)> {
    let pair = vec![Port::A.as_u8(), Port::B.as_u8()];
    match *body.first()? {
        command_ids::MOTOR_FOR_TIME if body.len() >= 4 => {
            let time = i32::from(u16::from_le_bytes([body[1], body[2]]));
            Some((vec![port], vec![time * i32::from(body[3] as i8) / 100]))
        }
        command_ids::MOTOR_PAIR_FOR_TIME if body.len() >= 5 => {
            let time = i32::from(u16::from_le_bytes([body[1], body[2]]));
            let a = time * i32::from(body[3] as i8) / 100;
            let b = time * i32::from(body[4] as i8) / 100;
            Some((pair, vec![a, b]))
        }
        command_ids::MOTOR_TO_ANGLE if body.len() >= 6 => {
            let angle = u32::from_le_bytes([body[1], body[2], body[3], body[4]]) as i32;
            Some((vec![port], vec![angle.wrapping_mul(i32::from((body[5] as i8).signum()))]))
        }
        command_ids::MOTOR_PAIR_TO_ANGLE if body.len() >= 7 => {
            let angle = u32::from_le_bytes([body[1], body[2], body[3], body[4]]) as i32;
            let a = angle.wrapping_mul(i32::from((body[5] as i8).signum()));
            let b = angle.wrapping_mul(i32::from((body[6] as i8).signum()));
            Some((pair, vec![a, b]))
        }
        _ => None,
    }
}

// ── Inbound frame builders ────────────────────────────────────────────────────

/// Device-info frame carrying the hub name, cut to [`MAX_NAME_LEN`] bytes so
/// the length byte cannot overflow.
pub fn name_frame(name: &str) -> Vec<u8> {
    let name = name.as_bytes();
    let mut frame = vec![0x00, 0x00, notification_types::DEVICE_INFO, 0x01, 0x06];
    frame.extend_from_slice(&name[..name.len().min(MAX_NAME_LEN)]);
    frame[0] = frame.len() as u8;
    frame
}

/// Port-info frame reporting `device_type` attached to `port`.
pub fn attach_frame(port: Port, device_type: DeviceType) -> Vec<u8> {
    vec![
        0x06,
        0x00,
        notification_types::PORT_INFO,
        port.as_u8(),
        0x01,
        device_type.as_u8(),
    ]
}

/// Port-info frame reporting `port` as a group of `first` and `second`.
pub fn group_frame(port: Port, device_type: DeviceType, first: Port, second: Port) -> Vec<u8> {
    vec![
        0x09,
        0x00,
        notification_types::PORT_INFO,
        port.as_u8(),
        0x02,
        device_type.as_u8(),
        0x00,
        first.as_u8(),
        second.as_u8(),
    ]
}

/// Port-info frame reporting the device on `port` as removed.
pub fn detach_frame(port: Port) -> Vec<u8> {
    vec![0x05, 0x00, notification_types::PORT_INFO, port.as_u8(), 0x00]
}

/// Sensor-data frame carrying a motor angle.
pub fn motor_sensor_frame(port: Port, angle: i32) -> Vec<u8> {
    let mut frame = vec![0x09, 0x00, notification_types::SENSOR_DATA, port.as_u8(), 0x00];
    frame.extend_from_slice(&angle.to_le_bytes());
    frame
}
