//! # Control Loops
//!
//! Two fixed-rate loops that turn the latest stick positions into platform
//! speed commands.
//!
//! | Loop | Stick | Y axis | X axis |
//! |------|-------|--------|--------|
//! | Translation | left | Forward / Backward (±0.1) | Right / Left (±0.1) |
//! | Rotation | right | Up / Down (±0.1) | Clockwise / CounterClockwise (±0.3) |
//!
//! Every tick sends exactly one command per axis, even when the stick is
//! centered (`Forward(0)`, `Right(0)`, `Up(0)`, `Clockwise(0)`): the platform
//! drops into auto-level when commands stop. Send failures are logged and
//! otherwise ignored; the next tick always follows after the fixed period.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, trace};

use super::clamp::InputClamp;
use super::stick::{StickPosition, StickReaders};
use crate::platform::{MoveCommand, Platform};

/// Default loop period (100Hz)
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// Default threshold for the translation axes and altitude.
pub const DEFAULT_AXIS_THRESHOLD: f64 = 0.1;

/// Default threshold for yaw; wider because rotation drifts more.
pub const DEFAULT_YAW_THRESHOLD: f64 = 0.3;

/// Which stick a loop serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    Translation,
    Rotation,
}

/// Per-axis direction thresholds and clamp settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSettings {
    pub tick: Duration,
    pub clamp: InputClamp,
    pub translation_threshold: f64,
    pub vertical_threshold: f64,
    pub rotation_threshold: f64,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            clamp: InputClamp::default(),
            translation_threshold: DEFAULT_AXIS_THRESHOLD,
            vertical_threshold: DEFAULT_AXIS_THRESHOLD,
            rotation_threshold: DEFAULT_YAW_THRESHOLD,
        }
    }
}

/// Picks the command for one axis.
///
/// Above `threshold` the positive command, below `-threshold` the negative
/// one, otherwise the positive command at zero speed.
fn axis_command(
    value: f64,
    threshold: f64,
    clamp: &InputClamp,
    positive: fn(f64) -> MoveCommand,
    negative: fn(f64) -> MoveCommand,
) -> MoveCommand {
    if value > threshold {
        positive(clamp.apply(value))
    } else if value < -threshold {
        negative(clamp.apply(value))
    } else {
        positive(0.0)
    }
}

/// One control loop bound to one stick.
pub struct ControlLoop {
    kind: LoopKind,
    stick: watch::Receiver<StickPosition>,
    platform: Arc<dyn Platform>,
    settings: LoopSettings,
}

impl ControlLoop {
    pub fn new(
        kind: LoopKind,
        stick: watch::Receiver<StickPosition>,
        platform: Arc<dyn Platform>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            kind,
            stick,
            platform,
            settings,
        }
    }

    /// The two commands a tick emits for `position`, y axis first.
    pub fn commands(&self, position: StickPosition) -> [MoveCommand; 2] {
        let s = &self.settings;
        match self.kind {
            LoopKind::Translation => [
                axis_command(
                    position.y,
                    s.translation_threshold,
                    &s.clamp,
                    MoveCommand::Forward,
                    MoveCommand::Backward,
                ),
                axis_command(
                    position.x,
                    s.translation_threshold,
                    &s.clamp,
                    MoveCommand::Right,
                    MoveCommand::Left,
                ),
            ],
            LoopKind::Rotation => [
                axis_command(
                    position.y,
                    s.vertical_threshold,
                    &s.clamp,
                    MoveCommand::Up,
                    MoveCommand::Down,
                ),
                axis_command(
                    position.x,
                    s.rotation_threshold,
                    &s.clamp,
                    MoveCommand::Clockwise,
                    MoveCommand::CounterClockwise,
                ),
            ],
        }
    }

    /// Reads the stick once and sends one command per axis.
    pub async fn tick(&self) {
        let position = *self.stick.borrow();

        for command in self.commands(position) {
            if let Err(e) = self.platform.send(command).await {
                trace!("{:?} loop failed to send {:?}: {}", self.kind, command, e);
            }
        }
    }

    /// Ticks forever at the configured period.
    pub async fn run(self) {
        let mut ticker = interval(self.settings.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("{:?} control loop running every {:?}", self.kind, self.settings.tick);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}

/// Spawns both control loops.
///
/// Consumes the stick readers, so the pair can only be started once per
/// stick state.
pub fn spawn_control_loops(
    readers: StickReaders,
    platform: Arc<dyn Platform>,
    settings: LoopSettings,
) -> [JoinHandle<()>; 2] {
    let translation = ControlLoop::new(
        LoopKind::Translation,
        readers.translation,
        platform.clone(),
        settings,
    );
    let rotation = ControlLoop::new(LoopKind::Rotation, readers.rotation, platform, settings);

    [tokio::spawn(translation.run()), tokio::spawn(rotation.run())]
}
