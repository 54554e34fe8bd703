//! # Actuator Module
//!
//! Payload-release actuator control.
//!
//! This module handles:
//! - The [`Actuator`] trait (move to a byte position)
//! - The three configured target positions: grab, load and drop
//! - Reconfiguring targets and persisting them
//! - The serial servo backend ([`serial`])

pub mod serial;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{DroneDropError, Result};
use crate::store::ConfigStore;

/// Default grab (closed) position.
pub const DEFAULT_GRAB: u8 = 40;

/// Default load position.
pub const DEFAULT_LOAD: u8 = 50;

/// Bounded-range positional actuator (servo).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Moves to `position` (0-255).
    async fn move_to(&self, position: u8) -> Result<()>;
}

/// Stands in for a servo controller that could not be opened.
///
/// Every move fails with [`DroneDropError::Serial`] carrying the open error,
/// so flight control keeps working without the payload servo.
#[derive(Debug, Clone)]
pub struct UnavailableActuator {
    reason: String,
}

impl UnavailableActuator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Actuator for UnavailableActuator {
    async fn move_to(&self, position: u8) -> Result<()> {
        Err(DroneDropError::Serial(format!(
            "servo unavailable, cannot move to {}: {}",
            position, self.reason
        )))
    }
}

/// Configured actuator targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorPositions {
    pub grab: u8,
    pub load: u8,
    pub drop: u8,
}

/// Named actuator target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Grab,
    Load,
    Drop,
}

impl ActuatorPositions {
    pub fn position(&self, target: Target) -> u8 {
        match target {
            Target::Grab => self.grab,
            Target::Load => self.load,
            Target::Drop => self.drop,
        }
    }
}

/// Optional overrides for [`ActuatorController::configure`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionUpdate {
    pub grab: Option<u8>,
    pub load: Option<u8>,
    pub drop: Option<u8>,
}

/// Moves the actuator to its configured targets.
///
/// Targets live in the shared [`ConfigStore`] so that every change is
/// persisted together with the rest of the record.
pub struct ActuatorController {
    actuator: Arc<dyn Actuator>,
    store: Arc<ConfigStore>,
}

impl ActuatorController {
    pub fn new(actuator: Arc<dyn Actuator>, store: Arc<ConfigStore>) -> Self {
        Self { actuator, store }
    }

    /// Current targets.
    pub async fn positions(&self) -> ActuatorPositions {
        let config = self.store.snapshot().await;
        ActuatorPositions {
            grab: config.grab,
            load: config.load,
            drop: config.drop,
        }
    }

    /// Moves to the configured position for `target`.
    pub async fn move_to(&self, target: Target) -> Result<()> {
        let position = self.positions().await.position(target);
        debug!("Moving actuator to {:?} ({})", target, position);
        self.actuator.move_to(position).await
    }

    pub async fn grab(&self) -> Result<()> {
        self.move_to(Target::Grab).await
    }

    pub async fn load(&self) -> Result<()> {
        self.move_to(Target::Load).await
    }

    pub async fn drop(&self) -> Result<()> {
        self.move_to(Target::Drop).await
    }

    /// Replaces any supplied targets, then persists all three together.
    ///
    /// An empty update still re-persists the current record.
    pub async fn configure(&self, update: PositionUpdate) -> Result<ActuatorPositions> {
        let config = self
            .store
            .update(|c| {
                if let Some(grab) = update.grab {
                    c.grab = grab;
                }
                if let Some(load) = update.load {
                    c.load = load;
                }
                if let Some(drop) = update.drop {
                    c.drop = drop;
                }
            })
            .await?;

        info!(
            "Actuator targets: grab={} load={} drop={}",
            config.grab, config.load, config.drop
        );
        Ok(ActuatorPositions {
            grab: config.grab,
            load: config.load,
            drop: config.drop,
        })
    }
}
