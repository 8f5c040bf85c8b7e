//! Move Hub demo program entry point.
//!
//! Loads the config, builds a transport, connects a [`HubController`], and
//! runs a short scripted sequence of commands while logging every
//! notification the hub sends back.
//!
//! # Transport
//!
//! The `SimulatedHub` used here answers in-process and never touches a
//! radio.  A wireless transport implements the same `HubTransport` trait and
//! replaces it without any other change.
//!
//! # Script
//!
//! ```text
//! subscribe D        -- ask for motor D angle reports
//! set_color(config)
//! run D for time     -- produces a sensor notification for D
//! drive_for_time
//! set_color(Blue)
//! turn_for_time
//! ```
//!
//! Ctrl-C at any point disconnects and exits.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use movehub_controller::application::controller::{ControllerError, HubController};
use movehub_controller::infrastructure::storage::config::{config_file_path, load_config, AppConfig};
use movehub_controller::infrastructure::transport::simulated::SimulatedHub;
use movehub_core::{Color, Notification, Port};

/// Subscription option requesting continuous angle reports.
const ANGLE_REPORTS: u8 = 0x02;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = config_file_path()?;
    let config = load_config(&config_path)?;

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.log_level)),
        )
        .init();

    info!(path = %config_path.display(), "Move Hub controller starting");

    let devices = config
        .hub
        .attached_devices
        .iter()
        .map(|device| device.as_pair())
        .collect();
    let transport = Arc::new(SimulatedHub::new(devices).with_name(config.hub.name.clone()));
    let controller = HubController::new(transport);

    controller.on_notification(log_notification);
    controller.on_connected(|| info!("hub connected, notifications enabled"));

    controller.connect().await?;

    tokio::select! {
        result = run_script(&controller, &config) => {
            if let Err(e) = result {
                error!("demo script failed: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
        }
    }

    info!(
        dropped_frames = controller.dropped_frames(),
        ports = controller.registry_snapshot().len(),
        "shutting down"
    );
    controller.disconnect().await?;
    Ok(())
}

async fn run_script(controller: &HubController, config: &AppConfig) -> Result<(), ControllerError> {
    let demo = &config.demo;
    let pause = Duration::from_millis(demo.pause_ms);

    // Give the attach burst time to populate the registry.
    tokio::time::sleep(Duration::from_millis(100)).await;
    if let Some(device_type) = controller.device_type(Port::D) {
        info!(?device_type, "port D");
    }

    controller.subscribe(Port::D, ANGLE_REPORTS).await?;
    controller.set_color(demo.color).await?;
    tokio::time::sleep(pause).await;

    controller
        .run_motor_for_time(Port::D, demo.motor_time_ms, demo.motor_power)
        .await?;
    controller
        .drive_for_time(demo.motor_time_ms, demo.motor_power)
        .await?;
    tokio::time::sleep(pause).await;

    controller.set_color(Color::Blue).await?;
    controller
        .turn_for_time(demo.motor_time_ms, demo.turn_power)
        .await?;
    tokio::time::sleep(pause).await;
    Ok(())
}

fn log_notification(notification: &Notification) {
    match notification {
        Notification::DeviceInfoString { text, .. } => info!(%text, "hub info"),
        Notification::PortAttached { port, device_type } => {
            info!(%port, ?device_type, "device attached")
        }
        Notification::GroupAttached { port, .. } => info!(%port, "port group attached"),
        Notification::PortDetached { port } => info!(%port, "device detached"),
        Notification::MotorSensor { port, angle } => info!(%port, angle, "motor angle"),
        Notification::TiltSensor { roll, pitch } => info!(roll, pitch, "tilt"),
        Notification::ColorDistanceSensor { color, distance } => {
            info!(color, distance, "color/distance")
        }
        Notification::Raw { .. } => info!(?notification, "unrecognised notification"),
    }
}
