//! Typed access to the loosely-typed parameter bag of a remote command.
//!
//! Every accessor turns a wrong shape into [`DroneDropError::BadRequest`]
//! naming the offending key.

use serde_json::{Map, Value};

use crate::control::stick::StickPosition;
use crate::error::{DroneDropError, Result};

/// Parameters of one remote invocation.
pub type Params = Map<String, Value>;

fn bad(key: &str, expected: &str, got: &Value) -> DroneDropError {
    DroneDropError::BadRequest(format!("'{}' must be {}, got {}", key, expected, got))
}

fn missing(key: &str) -> DroneDropError {
    DroneDropError::BadRequest(format!("missing parameter '{}'", key))
}

pub fn require_str<'a>(params: &'a Params, key: &str) -> Result<&'a str> {
    match params.get(key) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(bad(key, "a string", other)),
        None => Err(missing(key)),
    }
}

pub fn optional_bool(params: &Params, key: &str) -> Result<Option<bool>> {
    match params.get(key) {
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(bad(key, "a boolean", other)),
        None => Ok(None),
    }
}

fn number_in(map: &Params, key: &str) -> Result<f64> {
    match map.get(key) {
        Some(value) => value.as_f64().ok_or_else(|| bad(key, "a number", value)),
        None => Err(missing(key)),
    }
}

/// A `{x, y}` object. Values are not range checked.
pub fn require_position(params: &Params, key: &str) -> Result<StickPosition> {
    match params.get(key) {
        Some(Value::Object(map)) => {
            Ok(StickPosition::new(number_in(map, "x")?, number_in(map, "y")?))
        }
        Some(other) => Err(bad(key, "an object with x and y", other)),
        None => Err(missing(key)),
    }
}

/// An actuator position: a number in `0..=255`, fractional part truncated.
pub fn optional_position_byte(params: &Params, key: &str) -> Result<Option<u8>> {
    let Some(value) = params.get(key) else {
        return Ok(None);
    };
    let number = value.as_f64().ok_or_else(|| bad(key, "a number", value))?;
    if !(0.0..256.0).contains(&number) {
        return Err(bad(key, "between 0 and 255", value));
    }
    Ok(Some(number.trunc() as u8))
}
