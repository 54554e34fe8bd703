//! # Platform Module
//!
//! The flying platform as seen by the control loops and the flight gate.
//!
//! This module handles:
//! - The [`Platform`] trait: directional speed commands, take off / land,
//!   and connection lifecycle
//! - [`MoveCommand`], one directional command with its speed magnitude
//! - The AR.Drone AT-command backend ([`ardrone`], [`at`])

pub mod ardrone;
pub mod at;

use async_trait::async_trait;

use crate::error::Result;

/// A directional speed command. The payload is a magnitude in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveCommand {
    Forward(f64),
    Backward(f64),
    Left(f64),
    Right(f64),
    Up(f64),
    Down(f64),
    Clockwise(f64),
    CounterClockwise(f64),
}

impl MoveCommand {
    /// Speed magnitude carried by the command.
    pub fn speed(&self) -> f64 {
        match *self {
            MoveCommand::Forward(v)
            | MoveCommand::Backward(v)
            | MoveCommand::Left(v)
            | MoveCommand::Right(v)
            | MoveCommand::Up(v)
            | MoveCommand::Down(v)
            | MoveCommand::Clockwise(v)
            | MoveCommand::CounterClockwise(v) => v,
        }
    }
}

/// Flight/mobility collaborator.
///
/// Directional commands are fire-and-forget from the caller's point of view:
/// the control loops log failures and carry on. Connection methods report
/// every failure they hit as [`DroneDropError::Connection`].
///
/// [`DroneDropError::Connection`]: crate::error::DroneDropError::Connection
#[async_trait]
pub trait Platform: Send + Sync {
    /// Sends one directional speed command.
    async fn send(&self, command: MoveCommand) -> Result<()>;

    async fn take_off(&self) -> Result<()>;

    async fn land(&self) -> Result<()>;

    /// Establishes the link to the platform.
    async fn connect(&self) -> Result<()>;

    /// Tears the link down.
    async fn disconnect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::DroneDropError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Everything a [`RecordingPlatform`] was asked to do, in order.
    #[derive(Debug, Clone, PartialEq)]
    pub enum PlatformCall {
        Move(MoveCommand),
        TakeOff,
        Land,
        Connect,
        Disconnect,
    }

    /// Mock platform for testing
    ///
    /// Records every call. Connect/disconnect outcomes can be scripted; once
    /// the script runs out they succeed.
    #[derive(Clone, Default)]
    pub struct RecordingPlatform {
        pub calls: Arc<Mutex<Vec<PlatformCall>>>,
        pub connected: Arc<Mutex<bool>>,
        pub connect_results: Arc<Mutex<VecDeque<Vec<String>>>>,
        pub disconnect_results: Arc<Mutex<VecDeque<Vec<String>>>>,
        pub send_fails: Arc<Mutex<bool>>,
    }

    impl RecordingPlatform {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn connected() -> Self {
            let platform = Self::default();
            *platform.connected.lock().unwrap() = true;
            platform
        }

        pub fn calls(&self) -> Vec<PlatformCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn moves(&self) -> Vec<MoveCommand> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    PlatformCall::Move(command) => Some(command),
                    _ => None,
                })
                .collect()
        }

        pub fn count(&self, wanted: &PlatformCall) -> usize {
            self.calls().iter().filter(|call| *call == wanted).count()
        }

        pub fn clear(&self) {
            self.calls.lock().unwrap().clear();
        }

        /// Next connect attempts fail with these error lists, in order.
        pub fn fail_connect(&self, errors: Vec<String>) {
            self.connect_results.lock().unwrap().push_back(errors);
        }

        /// Next `times` disconnect attempts each fail with `error`.
        pub fn fail_disconnect(&self, times: usize, error: &str) {
            let mut script = self.disconnect_results.lock().unwrap();
            for _ in 0..times {
                script.push_back(vec![error.to_string()]);
            }
        }

        pub fn set_send_fails(&self, fails: bool) {
            *self.send_fails.lock().unwrap() = fails;
        }

        fn record(&self, call: PlatformCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl Platform for RecordingPlatform {
        async fn send(&self, command: MoveCommand) -> Result<()> {
            self.record(PlatformCall::Move(command));
            if *self.send_fails.lock().unwrap() {
                return Err(DroneDropError::NotConnected);
            }
            Ok(())
        }

        async fn take_off(&self) -> Result<()> {
            self.record(PlatformCall::TakeOff);
            Ok(())
        }

        async fn land(&self) -> Result<()> {
            self.record(PlatformCall::Land);
            Ok(())
        }

        async fn connect(&self) -> Result<()> {
            self.record(PlatformCall::Connect);
            match self.connect_results.lock().unwrap().pop_front() {
                Some(errors) if !errors.is_empty() => Err(DroneDropError::Connection(errors)),
                _ => {
                    *self.connected.lock().unwrap() = true;
                    Ok(())
                }
            }
        }

        async fn disconnect(&self) -> Result<()> {
            self.record(PlatformCall::Disconnect);
            match self.disconnect_results.lock().unwrap().pop_front() {
                Some(errors) if !errors.is_empty() => Err(DroneDropError::Connection(errors)),
                _ => {
                    *self.connected.lock().unwrap() = false;
                    Ok(())
                }
            }
        }

        fn is_connected(&self) -> bool {
            *self.connected.lock().unwrap()
        }
    }
}
