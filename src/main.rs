//! # DroneDrop
//!
//! Fly a quadcopter and release its payload from a remote joystick.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load TOML configuration (first argument, default `config/default.toml`)
//!    - Set up logging (stdout, plus daily files when `[logging] dir` is set)
//!    - Load or create the persisted state file
//!    - Open the servo controller (payload commands fail if it is missing)
//!      and prepare the drone link
//!    - Apply the persisted operating mode
//!
//! 2. **Running**
//!    - Two control loops send speed commands every tick
//!    - The command server routes remote commands to the hub
//!
//! 3. **Shutdown**
//!    - Ctrl+C stops the process
//!
//! Expected output:
//! ```text
//! INFO dronedrop: DroneDrop v0.3.0 starting...
//! INFO dronedrop::actuator::serial: Opened servo controller at /dev/ttyACM0 (9600 baud, channel 0)
//! INFO dronedrop::platform::ardrone: Connected to drone at 192.168.1.1:5556
//! INFO dronedrop::api: Command server listening on 0.0.0.0:8080
//! ```

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use dronedrop::actuator::serial::SerialServo;
use dronedrop::actuator::{Actuator, ActuatorController, UnavailableActuator};
use dronedrop::api;
use dronedrop::config::Config;
use dronedrop::control::loops::spawn_control_loops;
use dronedrop::control::stick::stick_state;
use dronedrop::flight::FlightGate;
use dronedrop::hub::CommandHub;
use dronedrop::platform::ardrone::ArDrone;
use dronedrop::platform::Platform;
use dronedrop::store::{ConfigStore, PersistedConfig};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Log file name prefix inside `[logging] dir`
const LOG_FILE_PREFIX: &str = "dronedrop.log";

/// Initialize logging
///
/// Returns the file writer guard, which must live as long as the process.
fn init_logging(log_dir: &str) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    if log_dir.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout.and(file_writer))
        .init();
    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging.dir);
    info!("DroneDrop v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    // Persisted state: read failures are not fatal
    let defaults = config.persisted_defaults();
    let persisted = PersistedConfig::load_or_create(Path::new(&config.storage.path), defaults)
        .await
        .unwrap_or_else(|e| {
            warn!("Failed to read persisted state from {}: {}", config.storage.path, e);
            defaults
        });
    info!(
        "Persisted state: commander={} grab={} load={} drop={}",
        persisted.commander, persisted.grab, persisted.load, persisted.drop
    );
    let store = Arc::new(ConfigStore::new(&config.storage.path, persisted));

    let servo: Arc<dyn Actuator> = match SerialServo::open(
        &config.actuator.port,
        config.actuator.baud_rate,
        config.actuator.channel,
    ) {
        Ok(servo) => Arc::new(servo),
        Err(e) => {
            warn!("Servo controller unavailable, payload commands will fail: {}", e);
            Arc::new(UnavailableActuator::new(e.to_string()))
        }
    };

    let drone = ArDrone::new(config.platform.address.clone());
    info!("Drone link target: {}", drone.address());
    let platform: Arc<dyn Platform> = Arc::new(drone);

    let flight = FlightGate::new(platform.clone(), store.clone(), config.retry_policy());
    if let Err(e) = flight.startup().await {
        warn!("Failed to apply operating mode at startup: {}", e);
    }

    let (sticks, readers) = stick_state();
    let _loops = spawn_control_loops(readers, platform, config.loop_settings());

    let hub = Arc::new(CommandHub::new(
        sticks,
        ActuatorController::new(servo, store),
        flight,
    ));

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind command server to {}", config.server.bind))?;

    info!("Press Ctrl+C to exit");
    tokio::select! {
        result = api::serve(listener, hub) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path_exists() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        assert!(path.exists(), "{} should ship with the crate", DEFAULT_CONFIG_PATH);
    }

    #[test]
    fn test_log_file_prefix() {
        assert_eq!(LOG_FILE_PREFIX, "dronedrop.log");
    }
}
