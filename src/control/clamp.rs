//! # Input Clamp Module
//!
//! Maps a raw analog stick reading to a bounded, quantized speed.
//!
//! ## Deadzone
//!
//! Readings whose magnitude falls below the deadzone are treated as a
//! centered stick and produce 0.0. Unlike a rescaling deadzone, values just
//! outside it are passed through unchanged (after quantization).
//!
//! ## Quantization
//!
//! Magnitudes inside the usable range are truncated to two decimal places:
//! `floor(|raw| * 100) / 100`. Truncation never exceeds the true input
//! magnitude and gives identical output for identical input.
//!
//! ## Usage
//!
//! ```
//! use dronedrop::control::clamp::{clamp, InputClamp};
//!
//! assert_eq!(clamp(0.05), 0.0);
//! assert_eq!(clamp(-0.5), 0.5);
//! assert_eq!(clamp(3.0), 1.0);
//!
//! let wide = InputClamp::new(0.2);
//! assert_eq!(wide.apply(0.15), 0.0);
//! ```

/// Default deadzone applied to every stick axis.
pub const DEFAULT_DEADZONE: f64 = 0.1;

/// Largest deadzone accepted by [`InputClamp::new`].
pub const MAX_DEADZONE: f64 = 0.5;

/// Maximum speed magnitude handed to the platform.
pub const MAX_SPEED: f64 = 1.0;

/// Deadzone + truncation + saturation for one axis.
///
/// Output is always a magnitude in `0.0..=1.0`; the caller decides the
/// direction from the sign of the raw value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputClamp {
    deadzone: f64,
}

impl Default for InputClamp {
    fn default() -> Self {
        Self {
            deadzone: DEFAULT_DEADZONE,
        }
    }
}

impl InputClamp {
    /// Creates a clamp with the given deadzone.
    ///
    /// # Arguments
    ///
    /// * `deadzone` - Magnitude below which input reads as zero. Clamped to `0.0..=0.5`.
    #[must_use]
    pub fn new(deadzone: f64) -> Self {
        Self {
            deadzone: deadzone.clamp(0.0, MAX_DEADZONE),
        }
    }

    /// Returns the configured deadzone value.
    #[must_use]
    pub fn deadzone(&self) -> f64 {
        self.deadzone
    }

    /// Converts a raw axis reading into a speed magnitude.
    ///
    /// Total over `f64`: NaN reads as a centered stick, infinities saturate.
    ///
    /// # Examples
    ///
    /// ```
    /// use dronedrop::control::clamp::InputClamp;
    ///
    /// let clamp = InputClamp::default();
    /// assert_eq!(clamp.apply(0.567), 0.56);
    /// assert_eq!(clamp.apply(-0.567), 0.56);
    /// assert_eq!(clamp.apply(0.09), 0.0);
    /// ```
    #[must_use]
    pub fn apply(&self, raw: f64) -> f64 {
        let magnitude = raw.abs();

        if magnitude.is_nan() || magnitude < self.deadzone {
            0.0
        } else if magnitude <= MAX_SPEED {
            (magnitude * 100.0).floor() / 100.0
        } else {
            MAX_SPEED
        }
    }
}

/// Clamps `raw` with the default 0.1 deadzone.
#[inline]
#[must_use]
pub fn clamp(raw: f64) -> f64 {
    InputClamp::default().apply(raw)
}
