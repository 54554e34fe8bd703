//! # Stick State
//!
//! Latest position of the two remote analog sticks.
//!
//! Each stick is a single-writer / single-reader cell built on a
//! [`tokio::sync::watch`] channel: the command hub publishes a whole
//! [`StickPosition`] at once and the owning control loop copies out the most
//! recent snapshot every tick. Both axes always come from the same write, so
//! x and y can never tear. Last write wins; intermediate positions published
//! between two ticks are never observed.

use tokio::sync::watch;

/// One 2-axis stick reading, nominally in `-1.0..=1.0` on each axis.
///
/// Values arrive straight from the remote and are not range checked here;
/// the control loops clamp them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StickPosition {
    pub x: f64,
    pub y: f64,
}

impl StickPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both axes centered.
    pub const CENTERED: StickPosition = StickPosition { x: 0.0, y: 0.0 };
}

/// Which physical stick an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stick {
    /// Left stick: forward/back and left/right translation.
    Translation,
    /// Right stick: altitude and yaw.
    Rotation,
}

impl Stick {
    /// Resolves the remote's stick name (`"left"` / `"right"`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "left" => Some(Stick::Translation),
            "right" => Some(Stick::Rotation),
            _ => None,
        }
    }
}

/// Write half, owned by the command hub.
#[derive(Debug)]
pub struct StickWriter {
    translation: watch::Sender<StickPosition>,
    rotation: watch::Sender<StickPosition>,
}

/// Read halves, handed to the control loops once at startup.
#[derive(Debug)]
pub struct StickReaders {
    pub translation: watch::Receiver<StickPosition>,
    pub rotation: watch::Receiver<StickPosition>,
}

/// Creates the shared stick state with both sticks centered.
pub fn stick_state() -> (StickWriter, StickReaders) {
    let (translation_tx, translation_rx) = watch::channel(StickPosition::CENTERED);
    let (rotation_tx, rotation_rx) = watch::channel(StickPosition::CENTERED);

    (
        StickWriter {
            translation: translation_tx,
            rotation: rotation_tx,
        },
        StickReaders {
            translation: translation_rx,
            rotation: rotation_rx,
        },
    )
}

impl StickWriter {
    /// Replaces both axes of `stick` in one step.
    pub fn set(&self, stick: Stick, position: StickPosition) {
        let sender = match stick {
            Stick::Translation => &self.translation,
            Stick::Rotation => &self.rotation,
        };
        // send_replace keeps the value even while no loop is subscribed yet
        sender.send_replace(position);
    }

    /// Current value of `stick`, as the next tick would see it.
    pub fn get(&self, stick: Stick) -> StickPosition {
        match stick {
            Stick::Translation => *self.translation.borrow(),
            Stick::Rotation => *self.rotation.borrow(),
        }
    }
}
