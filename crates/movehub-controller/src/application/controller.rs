//! HubController: intent-level facade over the frame codec and a transport.
//!
//! Outbound, every operation builds a [`Command`], encodes it, and writes the
//! frame through the injected [`HubTransport`].  Inbound, a receive task
//! decodes each frame against the [`PortRegistry`], applies attach/detach
//! events to the registry, and only then hands the notification to the
//! registered callbacks.  A callback that reacts to an attach event therefore
//! always sees the registry already updated.
//!
//! # Architecture
//!
//! The controller depends only on the transport trait and `movehub-core`.
//! The simulated hub in the infrastructure layer, or any real wireless
//! adapter, is injected at construction time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use movehub_core::{
    decode_notification, encode_command, Color, Command, DeviceType, Notification, Port,
    PortRegistry, SERVICE_UUID,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::transport::{HubTransport, TransportError};

/// Error type for controller operations.
#[derive(Debug, Error, PartialEq)]
pub enum ControllerError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("hub is not connected")]
    NotConnected,
}

type NotificationHandler = Arc<dyn Fn(&Notification) + Send + Sync>;
type ConnectedHandler = Arc<dyn Fn() + Send + Sync>;

/// Controls one hub over one transport.
///
/// Construct with [`HubController::new`], register callbacks, then call
/// [`connect`](Self::connect).  The controller is shared as an `Arc` so the
/// receive task and command callers can use it concurrently.
pub struct HubController {
    transport: Arc<dyn HubTransport>,
    registry: Mutex<PortRegistry>,
    notification_handlers: Mutex<Vec<NotificationHandler>>,
    connected_handlers: Mutex<Vec<ConnectedHandler>>,
    /// Id of the live connection, or 0 when disconnected.
    active_connection: AtomicU64,
    next_connection: AtomicU64,
    dropped_frames: AtomicU64,
    receive_task: Mutex<Option<JoinHandle<()>>>,
}

impl HubController {
    /// Creates a disconnected controller with an empty port registry.
    pub fn new(transport: Arc<dyn HubTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            registry: Mutex::new(PortRegistry::new()),
            notification_handlers: Mutex::new(Vec::new()),
            connected_handlers: Mutex::new(Vec::new()),
            active_connection: AtomicU64::new(0),
            next_connection: AtomicU64::new(0),
            dropped_frames: AtomicU64::new(0),
            receive_task: Mutex::new(None),
        })
    }

    // ── Registration ─────────────────────────────────────────────────────────

    /// Registers a callback for every successfully decoded notification.
    ///
    /// Callbacks run on the receive task, in registration order.
    pub fn on_notification<F>(&self, callback: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        lock(&self.notification_handlers).push(Arc::new(callback));
    }

    /// Registers a callback fired once the link is up and notifications are on.
    pub fn on_connected<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.connected_handlers).push(Arc::new(callback));
    }

    // ── Connection lifecycle ─────────────────────────────────────────────────

    /// Connects to the hub service, enables notifications, and starts the
    /// receive task.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Transport`] if the transport cannot connect
    /// or cannot enable notifications.  In the latter case the transport is
    /// closed again.  No retry is attempted.
    pub async fn connect(self: &Arc<Self>) -> Result<(), ControllerError> {
        self.transport.connect(SERVICE_UUID).await?;
        let frames = match self.transport.enable_notifications().await {
            Ok(frames) => frames,
            Err(e) => {
                if let Err(close) = self.transport.disconnect().await {
                    warn!("failed to close transport after subscribe error: {close}");
                }
                return Err(e.into());
            }
        };

        let connection = self.next_connection.fetch_add(1, Ordering::SeqCst) + 1;
        self.active_connection.store(connection, Ordering::SeqCst);
        info!(connection, "connected to hub service {SERVICE_UUID}");

        let handle = tokio::spawn(receive_loop(Arc::downgrade(self), frames, connection));
        if let Some(previous) = lock(&self.receive_task).replace(handle) {
            previous.abort();
        }

        let handlers = lock(&self.connected_handlers).clone();
        for handler in handlers {
            handler();
        }
        Ok(())
    }

    /// Stops the receive task and closes the transport.
    ///
    /// The port registry is kept; it is only changed by hub notifications.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Transport`] if the transport fails to close.
    pub async fn disconnect(&self) -> Result<(), ControllerError> {
        self.active_connection.store(0, Ordering::SeqCst);
        if let Some(handle) = lock(&self.receive_task).take() {
            handle.abort();
        }
        self.transport.disconnect().await?;
        info!("disconnected from hub");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.active_connection.load(Ordering::SeqCst) != 0
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    /// Encodes `command` and writes it to the hub.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotConnected`] before [`connect`](Self::connect)
    /// succeeds, or [`ControllerError::Transport`] if the write fails.
    pub async fn send_command(&self, command: &Command) -> Result<(), ControllerError> {
        if !self.is_connected() {
            return Err(ControllerError::NotConnected);
        }
        let frame = encode_command(command);
        debug!(?command, ?frame, "sending command");
        self.transport.send(&frame).await?;
        Ok(())
    }

    /// Sets the hub LED color.
    pub async fn set_color(&self, color: Color) -> Result<(), ControllerError> {
        self.send_command(&Command::SetColor(color)).await
    }

    /// Runs the motor on `port` for `time_ms` at `power` percent.
    pub async fn run_motor_for_time(
        &self,
        port: Port,
        time_ms: u16,
        power: i8,
    ) -> Result<(), ControllerError> {
        self.send_command(&Command::RunMotorForTime {
            port,
            time_ms,
            power,
        })
        .await
    }

    /// Runs motors A and B together for `time_ms`.
    pub async fn run_motor_pair_for_time(
        &self,
        time_ms: u16,
        power_a: i8,
        power_b: i8,
    ) -> Result<(), ControllerError> {
        self.send_command(&Command::RunMotorPairForTime {
            time_ms,
            power_a,
            power_b,
        })
        .await
    }

    /// Turns the motor on `port` by `angle` degrees.
    pub async fn run_motor_to_angle(
        &self,
        port: Port,
        angle: u32,
        power: i8,
    ) -> Result<(), ControllerError> {
        self.send_command(&Command::RunMotorToAngle { port, angle, power })
            .await
    }

    /// Turns motors A and B together by `angle` degrees.
    pub async fn run_motor_pair_to_angle(
        &self,
        angle: u32,
        power_a: i8,
        power_b: i8,
    ) -> Result<(), ControllerError> {
        self.send_command(&Command::RunMotorPairToAngle {
            angle,
            power_a,
            power_b,
        })
        .await
    }

    /// Enables sensor reports from `port` in mode `option`.
    pub async fn subscribe(&self, port: Port, option: u8) -> Result<(), ControllerError> {
        self.send_command(&Command::Subscribe { port, option }).await
    }

    /// Drives straight: both motors at the same power.
    pub async fn drive_for_time(&self, time_ms: u16, power: i8) -> Result<(), ControllerError> {
        self.run_motor_pair_for_time(time_ms, power, power).await
    }

    /// Spins in place: A at `power`, B at the opposite power.
    pub async fn turn_for_time(&self, time_ms: u16, power: i8) -> Result<(), ControllerError> {
        self.run_motor_pair_for_time(time_ms, power, power.wrapping_neg())
            .await
    }

    // ── Inbound path ─────────────────────────────────────────────────────────

    /// Decodes one inbound frame, updates the registry, and delivers the
    /// notification to every callback.
    ///
    /// A frame that fails to decode is logged, counted, and dropped; it
    /// never stops processing of later frames.
    pub fn handle_frame(&self, frame: &[u8]) -> Option<Notification> {
        let decoded = {
            let mut registry = lock(&self.registry);
            let result = decode_notification(frame, &registry);
            if let Ok(notification) = &result {
                registry.apply(notification);
            }
            result
        };

        match decoded {
            Ok(notification) => {
                debug!(?notification, "notification received");
                let handlers = lock(&self.notification_handlers).clone();
                for handler in handlers {
                    handler(&notification);
                }
                Some(notification)
            }
            Err(e) => {
                self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                warn!(?frame, "dropping inbound frame: {e}");
                None
            }
        }
    }

    /// Number of inbound frames dropped because they failed to decode.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Device type currently attached to `port`, as last reported by the hub.
    pub fn device_type(&self, port: Port) -> Option<DeviceType> {
        lock(&self.registry).lookup(port)
    }

    /// Copy of the current port registry.
    pub fn registry_snapshot(&self) -> PortRegistry {
        lock(&self.registry).clone()
    }
}

/// Drains inbound frames until the transport closes the stream or the
/// controller is dropped.
///
/// On stream end the controller is marked disconnected only if `connection`
/// is still the live one; a reconnect in the meantime is left untouched.
async fn receive_loop(
    weak: Weak<HubController>,
    mut frames: mpsc::Receiver<Vec<u8>>,
    connection: u64,
) {
    while let Some(frame) = frames.recv().await {
        let Some(controller) = weak.upgrade() else {
            return;
        };
        controller.handle_frame(&frame);
    }

    if let Some(controller) = weak.upgrade() {
        let superseded = controller
            .active_connection
            .compare_exchange(connection, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_err();
        if superseded {
            debug!(connection, "stream of a superseded connection ended");
        }
    }
    info!(connection, "hub notification stream closed");
}

/// Locks `mutex`, recovering the data if a callback panicked while holding it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::transport::MockHubTransport;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    const ATTACH_D_MOTOR: [u8; 6] = [0x06, 0x00, 0x04, 0x02, 0x01, 0x27];
    const SENSOR_D: [u8; 9] = [0x09, 0x00, 0x45, 0x02, 0x00, 0x2D, 0x00, 0x00, 0x00];

    /// A mock that connects, enables notifications on `rx`, and accepts sends.
    fn connected_mock(rx: mpsc::Receiver<Vec<u8>>) -> MockHubTransport {
        let mut mock = MockHubTransport::new();
        mock.expect_connect()
            .withf(|service| *service == SERVICE_UUID)
            .returning(|_| Ok(()));
        mock.expect_enable_notifications()
            .return_once(move || Ok(rx));
        mock
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_command_before_connect_is_rejected() {
        // Arrange
        let controller = HubController::new(Arc::new(MockHubTransport::new()));

        // Act
        let result = controller.set_color(Color::Red).await;

        // Assert
        assert_eq!(result, Err(ControllerError::NotConnected));
    }

    #[tokio::test]
    async fn test_set_color_writes_encoded_frame() {
        // Arrange
        let (_tx, rx) = mpsc::channel(8);
        let mut mock = connected_mock(rx);
        mock.expect_send()
            .withf(|frame| frame == [0x08, 0x00, 0x81, 0x32, 0x11, 0x51, 0x00, 0x09])
            .times(1)
            .returning(|_| Ok(()));
        let controller = HubController::new(Arc::new(mock));
        controller.connect().await.unwrap();

        // Act
        let result = controller.set_color(Color::Red).await;

        // Assert
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_turn_for_time_negates_power_for_motor_b() {
        // Arrange
        let (_tx, rx) = mpsc::channel(8);
        let mut mock = connected_mock(rx);
        mock.expect_send()
            .withf(|frame| frame[5] == 0x0A && frame[8] == 100 && frame[9] == (-100i8) as u8)
            .times(1)
            .returning(|_| Ok(()));
        let controller = HubController::new(Arc::new(mock));
        controller.connect().await.unwrap();

        // Act + Assert
        controller.turn_for_time(1000, 100).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_failure_surfaces_as_transport_error() {
        // Arrange
        let (_tx, rx) = mpsc::channel(8);
        let mut mock = connected_mock(rx);
        mock.expect_send()
            .returning(|_| Err(TransportError::SendFailed("link lost".to_string())));
        let controller = HubController::new(Arc::new(mock));
        controller.connect().await.unwrap();

        // Act
        let result = controller.run_motor_for_time(Port::A, 100, 10).await;

        // Assert
        assert_eq!(
            result,
            Err(ControllerError::Transport(TransportError::SendFailed(
                "link lost".to_string()
            )))
        );
    }

    // ── Connection ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_connect_failure_leaves_controller_disconnected() {
        // Arrange
        let mut mock = MockHubTransport::new();
        mock.expect_connect()
            .returning(|_| Err(TransportError::ConnectFailed("no hub in range".to_string())));
        let controller = HubController::new(Arc::new(mock));

        // Act
        let result = controller.connect().await;

        // Assert
        assert!(matches!(
            result,
            Err(ControllerError::Transport(TransportError::ConnectFailed(_)))
        ));
        assert!(!controller.is_connected());
    }

    #[tokio::test]
    async fn test_enable_notifications_failure_closes_transport() {
        // Arrange
        let mut mock = MockHubTransport::new();
        mock.expect_connect().returning(|_| Ok(()));
        mock.expect_enable_notifications().returning(|| {
            Err(TransportError::SubscribeFailed(
                "no notify property".to_string(),
            ))
        });
        mock.expect_disconnect().times(1).returning(|| Ok(()));
        let controller = HubController::new(Arc::new(mock));

        // Act
        let result = controller.connect().await;

        // Assert
        assert!(matches!(
            result,
            Err(ControllerError::Transport(TransportError::SubscribeFailed(_)))
        ));
        assert!(!controller.is_connected());
    }

    #[tokio::test]
    async fn test_connected_callbacks_fire_after_connect() {
        // Arrange
        let (_tx, rx) = mpsc::channel(8);
        let controller = HubController::new(Arc::new(connected_mock(rx)));
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        controller.on_connected(move || flag.store(true, Ordering::SeqCst));

        // Act
        controller.connect().await.unwrap();

        // Assert
        assert!(fired.load(Ordering::SeqCst));
        assert!(controller.is_connected());
    }

    #[tokio::test]
    async fn test_stream_end_marks_controller_disconnected() {
        // Arrange
        let (tx, rx) = mpsc::channel(8);
        let controller = HubController::new(Arc::new(connected_mock(rx)));
        controller.connect().await.unwrap();

        // Act
        drop(tx);
        for _ in 0..50 {
            if !controller.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Assert
        assert!(!controller.is_connected());
    }

    #[tokio::test]
    async fn test_stale_stream_end_keeps_newer_connection() {
        // Arrange
        let (_tx, rx) = mpsc::channel(8);
        let controller = HubController::new(Arc::new(connected_mock(rx)));
        controller.connect().await.unwrap();
        let live = controller.active_connection.load(Ordering::SeqCst);
        let (stale_tx, stale_rx) = mpsc::channel(1);
        drop(stale_tx);

        // Act
        receive_loop(Arc::downgrade(&controller), stale_rx, live + 1).await;

        // Assert
        assert!(controller.is_connected());
        assert_eq!(controller.active_connection.load(Ordering::SeqCst), live);
    }

    #[tokio::test]
    async fn test_reconnect_starts_a_new_connection() {
        // Arrange
        let (tx1, rx1) = mpsc::channel(8);
        let (_tx2, rx2) = mpsc::channel(8);
        let mut streams = vec![rx2, rx1];
        let mut mock = MockHubTransport::new();
        mock.expect_connect().times(2).returning(|_| Ok(()));
        mock.expect_enable_notifications()
            .times(2)
            .returning(move || streams.pop().ok_or(TransportError::Closed));
        let controller = HubController::new(Arc::new(mock));
        controller.connect().await.unwrap();
        let first = controller.active_connection.load(Ordering::SeqCst);

        // Act
        controller.connect().await.unwrap();
        drop(tx1);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Assert
        assert!(controller.is_connected());
        assert_ne!(controller.active_connection.load(Ordering::SeqCst), first);
    }

    // ── Inbound path ─────────────────────────────────────────────────────────

    #[test]
    fn test_handle_frame_updates_registry_before_delivery() {
        // Arrange
        let controller = HubController::new(Arc::new(MockHubTransport::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let weak = Arc::downgrade(&controller);
        let sink = Arc::clone(&seen);
        controller.on_notification(move |_| {
            let c = weak.upgrade().expect("controller alive");
            sink.lock().unwrap().push(c.device_type(Port::D));
        });

        // Act
        controller.handle_frame(&ATTACH_D_MOTOR);

        // Assert
        assert_eq!(*seen.lock().unwrap(), vec![Some(DeviceType::ExternalMotor)]);
    }

    #[test]
    fn test_handle_frame_drops_unmapped_sensor_frame_and_continues() {
        // Arrange
        let controller = HubController::new(Arc::new(MockHubTransport::new()));

        // Act
        let first = controller.handle_frame(&SENSOR_D);
        controller.handle_frame(&ATTACH_D_MOTOR);
        let second = controller.handle_frame(&SENSOR_D);

        // Assert
        assert_eq!(first, None);
        assert_eq!(
            second,
            Some(Notification::MotorSensor {
                port: Port::D,
                angle: 45
            })
        );
        assert_eq!(controller.dropped_frames(), 1);
    }

    #[test]
    fn test_handle_frame_delivers_in_registration_order() {
        // Arrange
        let controller = HubController::new(Arc::new(MockHubTransport::new()));
        let order = Arc::new(Mutex::new(Vec::new()));
        for id in 0..3 {
            let order = Arc::clone(&order);
            controller.on_notification(move |_| order.lock().unwrap().push(id));
        }

        // Act
        controller.handle_frame(&ATTACH_D_MOTOR);

        // Assert
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_failed_frame_is_not_delivered() {
        // Arrange
        let controller = HubController::new(Arc::new(MockHubTransport::new()));
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        controller.on_notification(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // Act
        controller.handle_frame(&[0x05, 0x00, 0x04, 0x02, 0x05]);

        // Assert
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(controller.dropped_frames(), 1);
    }

    #[tokio::test]
    async fn test_receive_task_processes_frames_in_order() {
        // Arrange
        let (tx, rx) = mpsc::channel(8);
        let controller = HubController::new(Arc::new(connected_mock(rx)));
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        controller.on_notification(move |n| {
            let _ = seen_tx.send(n.clone());
        });
        controller.connect().await.unwrap();

        // Act
        tx.send(ATTACH_D_MOTOR.to_vec()).await.unwrap();
        tx.send(SENSOR_D.to_vec()).await.unwrap();

        // Assert
        let first = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv()).await.unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv()).await.unwrap();
        assert!(matches!(first, Some(Notification::PortAttached { port: Port::D, .. })));
        assert_eq!(
            second,
            Some(Notification::MotorSensor {
                port: Port::D,
                angle: 45
            })
        );
    }
}
