//! TOML-based configuration for the controller program.
//!
//! The file lives at the platform-appropriate location:
//! - Windows:  `%APPDATA%\MoveHub\config.toml`
//! - Linux:    `~/.config/movehub/config.toml`
//! - macOS:    `~/Library/Application Support/MoveHub/config.toml`
//!
//! Setting `MOVEHUB_CONFIG` overrides the path.
//!
//! Example:
//!
//! ```toml
//! [logging]
//! log_level = "debug"
//!
//! [hub]
//! name = "LEGO Move Hub"
//!
//! [[hub.attached_devices]]
//! port = 0x02
//! device_type = 0x27
//!
//! [demo]
//! color = "Red"
//! motor_time_ms = 1000
//! motor_power = 50
//! ```
//!
//! Every field has a serde default, so a missing file or a partial file both
//! load.

use std::path::{Path, PathBuf};

use movehub_core::{Color, DeviceType, Port};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "MOVEHUB_CONFIG";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"movehub_controller=debug"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Settings for the simulated hub the demo program drives.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubConfig {
    /// Name the hub reports in its device-info frame.
    #[serde(default = "default_hub_name")]
    pub name: String,
    /// Devices announced when notifications are enabled.
    #[serde(default = "default_attached_devices")]
    pub attached_devices: Vec<AttachedDevice>,
}

/// One port/device pair, as raw wire bytes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachedDevice {
    pub port: u8,
    pub device_type: u8,
}

impl AttachedDevice {
    pub fn as_pair(&self) -> (Port, DeviceType) {
        (Port::from_u8(self.port), DeviceType::from_u8(self.device_type))
    }
}

/// Parameters of the demo script in `main.rs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DemoConfig {
    /// LED color shown first.
    #[serde(default = "default_color")]
    pub color: Color,
    /// Duration of each timed motor move.
    #[serde(default = "default_motor_time_ms")]
    pub motor_time_ms: u16,
    /// Power used when driving straight.
    #[serde(default = "default_motor_power")]
    pub motor_power: i8,
    /// Power used when spinning in place.
    #[serde(default = "default_turn_power")]
    pub turn_power: i8,
    /// Pause between script steps.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_hub_name() -> String {
    "LEGO Move Hub".to_string()
}
fn default_attached_devices() -> Vec<AttachedDevice> {
    [
        (Port::A, DeviceType::InternalMotor),
        (Port::B, DeviceType::InternalMotor),
        (Port::AB, DeviceType::InternalMotor),
        (Port::Led, DeviceType::Led),
        (Port::Tilt, DeviceType::TiltSensor),
        (Port::D, DeviceType::ExternalMotor),
    ]
    .into_iter()
    .map(|(port, device_type)| AttachedDevice {
        port: port.as_u8(),
        device_type: device_type.as_u8(),
    })
    .collect()
}
fn default_color() -> Color {
    Color::Red
}
fn default_motor_time_ms() -> u16 {
    1000
}
fn default_motor_power() -> i8 {
    50
}
fn default_turn_power() -> i8 {
    100
}
fn default_pause_ms() -> u64 {
    1000
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            name: default_hub_name(),
            attached_devices: default_attached_devices(),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            color: default_color(),
            motor_time_ms: default_motor_time_ms(),
            motor_power: default_motor_power(),
            turn_power: default_turn_power(),
            pause_ms: default_pause_ms(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the config file path: `MOVEHUB_CONFIG` if set, otherwise
/// `config.toml` in the platform config directory.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if neither is available.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }
    let dir = platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)?;
    Ok(dir.join("config.toml"))
}

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("MoveHub"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("movehub"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("MoveHub")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
