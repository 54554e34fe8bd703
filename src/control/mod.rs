//! # Control Module
//!
//! Joystick-to-velocity translation.
//!
//! This module handles:
//! - Deadzone, truncation and saturation of raw stick values
//! - The shared latest-position cell for each stick
//! - The two fixed-rate loops that keep the platform supplied with commands

pub mod clamp;
pub mod loops;
pub mod stick;
