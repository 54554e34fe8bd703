//! # Flight Gate
//!
//! Arm state and the platform connection gate.
//!
//! ## Arm state
//!
//! | From | Trigger | Action | To |
//! |------|---------|--------|----|
//! | Landed | arm press | connect if needed, take off | Airborne |
//! | Landed | arm press, connect fails | none | Landed |
//! | Airborne | arm press | land | Landed |
//!
//! ## Operating mode
//!
//! In `Standalone` mode the platform link is forced down and arm presses are
//! refused. `Commanded` mode lets the link come up on demand. The mode is
//! persisted in the [`ConfigStore`] record.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{DroneDropError, Result};
use crate::platform::Platform;
use crate::store::ConfigStore;

/// Whether this process is allowed to command the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Standalone,
    Commanded,
}

impl OperatingMode {
    pub fn from_commander(commander: bool) -> Self {
        if commander {
            OperatingMode::Commanded
        } else {
            OperatingMode::Standalone
        }
    }

    pub fn is_commanded(&self) -> bool {
        *self == OperatingMode::Commanded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArmState {
    #[default]
    Landed,
    Airborne,
}

/// Bounded exponential backoff for forced disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Arm state machine plus commander-mode connection gate.
pub struct FlightGate {
    platform: Arc<dyn Platform>,
    store: Arc<ConfigStore>,
    arm: Mutex<ArmState>,
    retry: RetryPolicy,
}

impl FlightGate {
    pub fn new(platform: Arc<dyn Platform>, store: Arc<ConfigStore>, retry: RetryPolicy) -> Self {
        Self {
            platform,
            store,
            arm: Mutex::new(ArmState::Landed),
            retry,
        }
    }

    pub async fn arm_state(&self) -> ArmState {
        *self.arm.lock().await
    }

    pub async fn mode(&self) -> OperatingMode {
        OperatingMode::from_commander(self.store.snapshot().await.commander)
    }

    /// Applies the persisted mode at process start.
    ///
    /// Commanded: try to bring the link up; failures are logged only, the
    /// next arm press retries. Standalone: force the link down.
    pub async fn startup(&self) -> Result<()> {
        match self.mode().await {
            OperatingMode::Commanded => {
                if let Err(e) = self.platform.connect().await {
                    warn!("Initial platform connect failed: {}", e);
                }
                Ok(())
            }
            OperatingMode::Standalone => {
                info!("Standalone mode, keeping platform disconnected");
                self.force_disconnect().await.map(|_| ())
            }
        }
    }

    /// Handles an arm button press.
    ///
    /// Returns the new arm state. A failed connect leaves the state
    /// unchanged and returns the connection errors.
    pub async fn toggle_arm(&self) -> Result<ArmState> {
        let mut arm = self.arm.lock().await;

        match *arm {
            ArmState::Landed => {
                // Standalone keeps the platform down until commander mode arms it
                if !self.mode().await.is_commanded() {
                    return Err(DroneDropError::Standalone);
                }
                if !self.platform.is_connected() {
                    self.platform.connect().await?;
                }
                if let Err(e) = self.platform.take_off().await {
                    warn!("Take off command failed: {}", e);
                }
                *arm = ArmState::Airborne;
            }
            ArmState::Airborne => {
                if let Err(e) = self.platform.land().await {
                    warn!("Land command failed: {}", e);
                }
                *arm = ArmState::Landed;
            }
        }

        info!("Arm state: {:?}", *arm);
        Ok(*arm)
    }

    /// Switches to Commanded mode and persists it.
    ///
    /// The link is not opened here; the next arm press does that.
    pub async fn enable_commander(&self) -> Result<()> {
        self.store.update(|c| c.commander = true).await?;
        info!("Commander mode enabled");
        Ok(())
    }

    /// Forces the link down, then persists Standalone mode.
    ///
    /// If the link refuses to go down within the retry budget the mode is
    /// left unchanged and [`DroneDropError::DisconnectTimeout`] is returned.
    pub async fn disable_commander(&self) -> Result<()> {
        self.force_disconnect().await?;
        self.store.update(|c| c.commander = false).await?;
        info!("Commander mode disabled");
        Ok(())
    }

    /// Disconnects, retrying with backoff until the platform reports no errors.
    ///
    /// Returns the number of attempts used.
    pub async fn force_disconnect(&self) -> Result<u32> {
        let mut last_errors = Vec::new();

        for attempt in 1..=self.retry.max_attempts {
            match self.platform.disconnect().await {
                Ok(()) => return Ok(attempt),
                Err(e) => {
                    warn!("Disconnect attempt {} failed: {}", attempt, e);
                    last_errors = match e {
                        DroneDropError::Connection(errors) => errors,
                        other => vec![other.to_string()],
                    };
                }
            }
            if attempt < self.retry.max_attempts {
                tokio::time::sleep(self.retry.backoff(attempt)).await;
            }
        }

        Err(DroneDropError::DisconnectTimeout {
            attempts: self.retry.max_attempts,
            errors: last_errors,
        })
    }
}
