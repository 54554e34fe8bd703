//! # AT Command Encoder
//!
//! Encodes AR.Drone 2.0 control commands (`AT*REF`, `AT*PCMD`).
//!
//! Commands are ASCII, one per line, terminated by a carriage return:
//!
//! ```text
//! AT*REF=<seq>,<input>\r
//! AT*PCMD=<seq>,<flag>,<roll>,<pitch>,<gaz>,<yaw>\r
//! ```
//!
//! The four PCMD arguments are floats in `-1.0..=1.0`, transmitted as the
//! signed 32-bit integer with the same bit pattern as the IEEE-754 `f32`
//! value (`-0.8` is sent as `-1085485875`).

/// Control port the drone listens on for AT commands.
pub const AT_PORT: u16 = 5556;

/// `AT*REF` argument that keeps (or puts) the drone on the ground.
pub const REF_LAND: u32 = 290_717_696;

/// `AT*REF` argument that takes off (or keeps the drone flying).
pub const REF_TAKEOFF: u32 = 290_718_208;

/// PCMD flag: ignore the arguments and hover in place.
pub const PCMD_HOVER: u32 = 0;

/// PCMD flag: apply roll/pitch/gaz/yaw.
pub const PCMD_PROGRESSIVE: u32 = 1;

/// Progressive command state held by the platform.
///
/// Negative pitch tilts the nose down (forward), negative roll banks left,
/// positive gaz climbs, positive yaw turns clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pcmd {
    pub roll: f32,
    pub pitch: f32,
    pub gaz: f32,
    pub yaw: f32,
}

impl Pcmd {
    /// True when every axis is zero, in which case the drone is told to hover.
    pub fn is_hover(&self) -> bool {
        self.roll == 0.0 && self.pitch == 0.0 && self.gaz == 0.0 && self.yaw == 0.0
    }
}

/// Reinterpret an `f32` as the integer the AT protocol expects.
#[inline]
pub fn float_arg(value: f32) -> i32 {
    value.to_bits() as i32
}

/// Encode an `AT*REF` command
///
/// # Arguments
///
/// * `seq` - Sequence number (must increase across every command sent)
/// * `flying` - Whether the drone should be (or stay) airborne
///
/// # Examples
///
/// ```
/// use dronedrop::platform::at::encode_ref;
///
/// assert_eq!(encode_ref(1, true), "AT*REF=1,290718208\r");
/// ```
pub fn encode_ref(seq: u32, flying: bool) -> String {
    let input = if flying { REF_TAKEOFF } else { REF_LAND };
    format!("AT*REF={},{}\r", seq, input)
}

/// Encode an `AT*PCMD` command
///
/// Values are clamped to `-1.0..=1.0` before encoding.
///
/// # Examples
///
/// ```
/// use dronedrop::platform::at::{encode_pcmd, Pcmd};
///
/// assert_eq!(encode_pcmd(7, &Pcmd::default()), "AT*PCMD=7,0,0,0,0,0\r");
/// ```
pub fn encode_pcmd(seq: u32, pcmd: &Pcmd) -> String {
    let flag = if pcmd.is_hover() { PCMD_HOVER } else { PCMD_PROGRESSIVE };
    format!(
        "AT*PCMD={},{},{},{},{},{}\r",
        seq,
        flag,
        float_arg(pcmd.roll.clamp(-1.0, 1.0)),
        float_arg(pcmd.pitch.clamp(-1.0, 1.0)),
        float_arg(pcmd.gaz.clamp(-1.0, 1.0)),
        float_arg(pcmd.yaw.clamp(-1.0, 1.0)),
    )
}

/// Encode the datagram sent for every control update: REF then PCMD.
///
/// Uses two consecutive sequence numbers starting at `seq`.
pub fn encode_control_datagram(seq: u32, flying: bool, pcmd: &Pcmd) -> Vec<u8> {
    let mut datagram = encode_ref(seq, flying);
    datagram.push_str(&encode_pcmd(seq.wrapping_add(1), pcmd));
    datagram.into_bytes()
}
