//! # DroneDrop Library
//!
//! Fly a quadcopter and release its payload from a remote joystick.
//!
//! This library provides the control-translation and command-dispatch core:
//! stick input becomes continuous platform speed commands, and named remote
//! commands move the payload actuator, arm the platform, and change the
//! persisted configuration.

pub mod actuator;
pub mod api;
pub mod config;
pub mod control;
pub mod error;
pub mod flight;
pub mod hub;
pub mod platform;
pub mod store;
