//! # Command Hub
//!
//! Routes named remote invocations to stick updates, actuator moves and
//! flight-gate transitions.
//!
//! ## Commands
//!
//! | Name | Parameters | Effect | Result |
//! |------|------------|--------|--------|
//! | `joystick_event` | `name`: left/right, `position`: {x, y} | Replace stick position | null |
//! | `button_event` | `name`: A/B/X/Y, `action` | `press`: A arm, B grab, X load, Y drop | null |
//! | `grab` / `close` | | Move to grab position | bool |
//! | `load` | | Move to load position | bool |
//! | `drop` | | Move to drop position | bool |
//! | `version` | | | version string |
//! | `config` | `grab`?, `load`?, `drop`? | Update and persist targets | null |
//! | `commander` | `enable`? (default true) | Enable / disable commander mode | null |
//!
//! Parameters of the wrong shape fail that one command with
//! [`DroneDropError::BadRequest`].

pub mod params;

use serde_json::Value;
use tracing::{debug, warn};

use crate::actuator::{ActuatorController, PositionUpdate, Target};
use crate::control::stick::{Stick, StickPosition, StickWriter};
use crate::error::{DroneDropError, Result};
use crate::flight::FlightGate;
use params::{optional_bool, optional_position_byte, require_position, require_str, Params};

/// Version string returned by the `version` command.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A parsed remote invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `None` stick: unknown name, ignored.
    Joystick {
        stick: Option<Stick>,
        position: StickPosition,
    },
    Button {
        name: String,
        pressed: bool,
    },
    Actuate(Target),
    Version,
    Configure(PositionUpdate),
    Commander {
        enable: bool,
    },
}

impl Command {
    /// Resolve `name` and validate `params`.
    ///
    /// # Errors
    ///
    /// [`DroneDropError::UnknownCommand`] for unregistered names,
    /// [`DroneDropError::BadRequest`] for malformed parameters.
    pub fn parse(name: &str, params: &Params) -> Result<Self> {
        match name {
            "joystick_event" => {
                let stick = Stick::from_name(require_str(params, "name")?);
                let position = require_position(params, "position")?;
                Ok(Command::Joystick { stick, position })
            }
            "button_event" => Ok(Command::Button {
                name: require_str(params, "name")?.to_string(),
                pressed: require_str(params, "action")? == "press",
            }),
            "grab" | "close" => Ok(Command::Actuate(Target::Grab)),
            "load" => Ok(Command::Actuate(Target::Load)),
            "drop" => Ok(Command::Actuate(Target::Drop)),
            "version" => Ok(Command::Version),
            "config" => Ok(Command::Configure(PositionUpdate {
                grab: optional_position_byte(params, "grab")?,
                load: optional_position_byte(params, "load")?,
                drop: optional_position_byte(params, "drop")?,
            })),
            "commander" => Ok(Command::Commander {
                enable: optional_bool(params, "enable")?.unwrap_or(true),
            }),
            other => Err(DroneDropError::UnknownCommand(other.to_string())),
        }
    }
}

/// Dispatch hub shared by every transport connection.
pub struct CommandHub {
    sticks: StickWriter,
    actuator: ActuatorController,
    flight: FlightGate,
}

impl CommandHub {
    pub fn new(sticks: StickWriter, actuator: ActuatorController, flight: FlightGate) -> Self {
        Self {
            sticks,
            actuator,
            flight,
        }
    }

    pub fn sticks(&self) -> &StickWriter {
        &self.sticks
    }

    pub fn actuator(&self) -> &ActuatorController {
        &self.actuator
    }

    pub fn flight(&self) -> &FlightGate {
        &self.flight
    }

    /// Runs the command `name` with `params` and returns its result value.
    pub async fn invoke(&self, name: &str, params: &Params) -> Result<Value> {
        let command = Command::parse(name, params)?;
        debug!("Dispatching {:?}", command);
        self.execute(command).await
    }

    pub async fn execute(&self, command: Command) -> Result<Value> {
        match command {
            Command::Joystick { stick, position } => {
                if let Some(stick) = stick {
                    self.sticks.set(stick, position);
                }
                Ok(Value::Null)
            }
            Command::Button { name, pressed } => {
                if pressed {
                    self.press(&name).await?;
                }
                Ok(Value::Null)
            }
            Command::Actuate(target) => Ok(Value::Bool(self.actuate(target).await)),
            Command::Version => Ok(Value::String(VERSION.to_string())),
            Command::Configure(update) => {
                self.actuator.configure(update).await?;
                Ok(Value::Null)
            }
            Command::Commander { enable } => {
                if enable {
                    self.flight.enable_commander().await?;
                } else {
                    self.flight.disable_commander().await?;
                }
                Ok(Value::Null)
            }
        }
    }

    async fn press(&self, button: &str) -> Result<()> {
        match button {
            "A" => self.flight.toggle_arm().await.map(|_| ()),
            "B" => {
                self.actuate(Target::Grab).await;
                Ok(())
            }
            "X" => {
                self.actuate(Target::Load).await;
                Ok(())
            }
            "Y" => {
                self.actuate(Target::Drop).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Fire-and-forget actuator move; the outcome is only logged and reported.
    async fn actuate(&self, target: Target) -> bool {
        match self.actuator.move_to(target).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Actuator move to {:?} failed: {}", target, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::MockActuator;
    use crate::flight::{ArmState, OperatingMode, RetryPolicy};
    use crate::platform::mocks::{PlatformCall, RecordingPlatform};
    use crate::store::{ConfigStore, PersistedConfig};
    use mockall::predicate::eq;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    const DEFAULTS: PersistedConfig = PersistedConfig {
        commander: true,
        grab: 40,
        drop: 153,
        load: 50,
    };

    struct Fixture {
        hub: CommandHub,
        platform: RecordingPlatform,
        store: Arc<ConfigStore>,
        _dir: TempDir,
    }

    fn fixture(actuator: MockActuator, platform: RecordingPlatform) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ConfigStore::new(dir.path().join("state.json"), DEFAULTS));
        let (writer, _readers) = crate::control::stick::stick_state();
        let retry = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(1),
        };

        let hub = CommandHub::new(
            writer,
            ActuatorController::new(Arc::new(actuator), store.clone()),
            FlightGate::new(Arc::new(platform.clone()), store.clone(), retry),
        );
        Fixture {
            hub,
            platform,
            store,
            _dir: dir,
        }
    }

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("test params must be an object"),
        }
    }

    fn joystick(name: &str, x: f64, y: f64) -> Params {
        params(json!({"name": name, "position": {"x": x, "y": y}}))
    }

    fn button(name: &str, action: &str) -> Params {
        params(json!({"name": name, "action": action}))
    }

    #[tokio::test]
    async fn test_joystick_event_updates_stick() {
        let f = fixture(MockActuator::new(), RecordingPlatform::new());

        let result = f.hub.invoke("joystick_event", &joystick("left", 0.05, 0.5)).await;

        assert_eq!(assert_ok!(result), Value::Null);
        assert_eq!(f.hub.sticks().get(Stick::Translation), StickPosition::new(0.05, 0.5));
        assert_eq!(f.hub.sticks().get(Stick::Rotation), StickPosition::CENTERED);
    }

    #[tokio::test]
    async fn test_joystick_event_unknown_name_is_ignored() {
        let f = fixture(MockActuator::new(), RecordingPlatform::new());

        let result = f.hub.invoke("joystick_event", &joystick("dpad", 1.0, 1.0)).await;

        assert_ok!(result);
        assert_eq!(f.hub.sticks().get(Stick::Translation), StickPosition::CENTERED);
        assert_eq!(f.hub.sticks().get(Stick::Rotation), StickPosition::CENTERED);
    }

    #[tokio::test]
    async fn test_malformed_joystick_event_is_bad_request() {
        let f = fixture(MockActuator::new(), RecordingPlatform::new());

        let result = f
            .hub
            .invoke("joystick_event", &params(json!({"name": "left", "position": "up"})))
            .await;

        assert!(matches!(result, Err(DroneDropError::BadRequest(_))));
        assert_eq!(f.hub.sticks().get(Stick::Translation), StickPosition::CENTERED);
    }

    #[tokio::test]
    async fn test_button_a_press_arms() {
        let f = fixture(MockActuator::new(), RecordingPlatform::new());

        assert_ok!(f.hub.invoke("button_event", &button("A", "press")).await);

        assert_eq!(f.hub.flight().arm_state().await, ArmState::Airborne);
        assert_eq!(f.platform.calls(), vec![PlatformCall::Connect, PlatformCall::TakeOff]);
    }

    #[tokio::test]
    async fn test_button_a_connect_failure_returns_errors() {
        let platform = RecordingPlatform::new();
        platform.fail_connect(vec!["timeout".into(), "no navdata".into()]);
        let f = fixture(MockActuator::new(), platform);

        let err = assert_err!(f.hub.invoke("button_event", &button("A", "press")).await);

        assert_eq!(err.connection_errors(), ["timeout".to_string(), "no navdata".to_string()]);
        assert_eq!(f.hub.flight().arm_state().await, ArmState::Landed);
        assert_eq!(f.platform.count(&PlatformCall::TakeOff), 0);
    }

    #[tokio::test]
    async fn test_button_release_is_noop() {
        let f = fixture(MockActuator::new(), RecordingPlatform::new());

        assert_ok!(f.hub.invoke("button_event", &button("A", "release")).await);
        assert_ok!(f.hub.invoke("button_event", &button("B", "hold")).await);

        assert!(f.platform.calls().is_empty());
        assert_eq!(f.hub.flight().arm_state().await, ArmState::Landed);
    }

    #[tokio::test]
    async fn test_face_buttons_move_actuator() {
        let mut actuator = MockActuator::new();
        actuator.expect_move_to().with(eq(40)).times(1).returning(|_| Ok(()));
        actuator.expect_move_to().with(eq(50)).times(1).returning(|_| Ok(()));
        actuator.expect_move_to().with(eq(153)).times(1).returning(|_| Ok(()));
        let f = fixture(actuator, RecordingPlatform::new());

        for name in ["B", "X", "Y", "Z"] {
            assert_ok!(f.hub.invoke("button_event", &button(name, "press")).await);
        }
    }

    #[tokio::test]
    async fn test_direct_actuator_commands_return_success_flag() {
        let mut actuator = MockActuator::new();
        actuator.expect_move_to().with(eq(40)).times(2).returning(|_| Ok(()));
        actuator
            .expect_move_to()
            .with(eq(153))
            .times(1)
            .returning(|_| Err(DroneDropError::Serial("unplugged".into())));
        let f = fixture(actuator, RecordingPlatform::new());

        let empty = Params::new();
        assert_eq!(f.hub.invoke("grab", &empty).await.unwrap(), Value::Bool(true));
        assert_eq!(f.hub.invoke("close", &empty).await.unwrap(), Value::Bool(true));
        assert_eq!(f.hub.invoke("drop", &empty).await.unwrap(), Value::Bool(false));
    }

    #[tokio::test]
    async fn test_version() {
        let f = fixture(MockActuator::new(), RecordingPlatform::new());
        let version = f.hub.invoke("version", &Params::new()).await.unwrap();
        assert_eq!(version, Value::String(env!("CARGO_PKG_VERSION").to_string()));
    }

    #[tokio::test]
    async fn test_config_updates_one_target_and_persists_all() {
        let f = fixture(MockActuator::new(), RecordingPlatform::new());

        let result = f.hub.invoke("config", &params(json!({"grab": 99}))).await;
        assert_eq!(assert_ok!(result), Value::Null);

        let positions = f.hub.actuator().positions().await;
        assert_eq!((positions.grab, positions.load, positions.drop), (99, 50, 153));

        let on_disk = PersistedConfig::load_or_create(f.store.path(), DEFAULTS).await.unwrap();
        assert_eq!(on_disk, PersistedConfig { grab: 99, ..DEFAULTS });
    }

    #[tokio::test]
    async fn test_config_with_bad_value_changes_nothing() {
        let f = fixture(MockActuator::new(), RecordingPlatform::new());

        let result = f.hub.invoke("config", &params(json!({"grab": 12, "drop": 400}))).await;

        assert!(matches!(result, Err(DroneDropError::BadRequest(_))));
        assert_eq!(f.hub.actuator().positions().await.grab, 40);
        assert!(!f.store.path().exists());
    }

    #[tokio::test]
    async fn test_commander_enable_twice() {
        let f = fixture(MockActuator::new(), RecordingPlatform::new());
        let enable = params(json!({"enable": true}));

        assert_ok!(f.hub.invoke("commander", &enable).await);
        assert_ok!(f.hub.invoke("commander", &enable).await);

        assert_eq!(f.hub.flight().mode().await, OperatingMode::Commanded);
        let on_disk = PersistedConfig::load_or_create(f.store.path(), DEFAULTS).await.unwrap();
        assert!(on_disk.commander);
    }

    #[tokio::test]
    async fn test_commander_disable_disconnects_and_persists() {
        let platform = RecordingPlatform::connected();
        platform.fail_disconnect(2, "still bound");
        let f = fixture(MockActuator::new(), platform);

        assert_ok!(f.hub.invoke("commander", &params(json!({"enable": false}))).await);

        assert_eq!(f.platform.count(&PlatformCall::Disconnect), 3);
        assert_eq!(f.hub.flight().mode().await, OperatingMode::Standalone);
        let on_disk = PersistedConfig::load_or_create(f.store.path(), DEFAULTS).await.unwrap();
        assert!(!on_disk.commander);
    }

    #[tokio::test]
    async fn test_commander_without_enable_means_enable() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ConfigStore::new(
            dir.path().join("state.json"),
            PersistedConfig { commander: false, ..DEFAULTS },
        ));
        let (writer, _readers) = crate::control::stick::stick_state();
        let hub = CommandHub::new(
            writer,
            ActuatorController::new(Arc::new(MockActuator::new()), store.clone()),
            FlightGate::new(
                Arc::new(RecordingPlatform::new()),
                store.clone(),
                RetryPolicy::default(),
            ),
        );

        assert_ok!(hub.invoke("commander", &Params::new()).await);
        assert_eq!(hub.flight().mode().await, OperatingMode::Commanded);
    }

    #[tokio::test]
    async fn test_commander_with_non_bool_is_bad_request() {
        let f = fixture(MockActuator::new(), RecordingPlatform::new());
        let result = f.hub.invoke("commander", &params(json!({"enable": "no"}))).await;
        assert!(matches!(result, Err(DroneDropError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let f = fixture(MockActuator::new(), RecordingPlatform::new());
        let result = f.hub.invoke("flip", &Params::new()).await;
        assert!(matches!(result, Err(DroneDropError::UnknownCommand(name)) if name == "flip"));
    }

    #[test]
    fn test_parse_button_event_requires_strings() {
        let p = params(json!({"name": "A", "action": 1}));
        assert!(matches!(Command::parse("button_event", &p), Err(DroneDropError::BadRequest(_))));
    }
}
