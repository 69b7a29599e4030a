// Copyright (C) 2023, Alex Badics
// This file is part of witmotion-orient
// Licensed under the MIT license. See LICENSE file in the project root for details.

//! Runtime configuration, loaded from JSON with [`tinyjson`]. See [`Config`]
//!
//! Every key is optional, missing keys keep their default:
//! ```json
//! {
//!     "smoothing": { "kind": "exponential", "alpha": 0.3 },
//!     "axes": { "roll_sign": 1, "pitch_sign": 1, "yaw_sign": -1,
//!               "swap_roll_pitch": false, "clamp_degrees": 180 },
//!     "stale_after_ms": 2000,
//!     "channel_capacity": 3,
//!     "serial": { "port": "/dev/ttyUSB0", "baud_rate": 115200 }
//! }
//! ```
//! The other smoothing kind is `{ "kind": "moving_average", "window": 5 }`.

use std::{collections::HashMap, path::Path, sync::Arc, time::Duration};

use tinyjson::JsonValue;

use crate::{
    axis::AxisMapping,
    channel::{self, ReadingReceiver, ReadingSender},
    filter::Smoothing,
    Error, OrientationState, Result,
};

type JsonObject = HashMap<String, JsonValue>;

/// Everything that can be set up before the streams start
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Filter family and strength
    pub smoothing: Smoothing,
    /// Consumer side axis corrections
    pub axes: AxisMapping,
    /// No data for this long means the device is probably gone
    pub stale_after: Duration,
    /// Queue length of [`channel::bounded`]
    pub channel_capacity: usize,
    /// Serial transport settings
    pub serial: SerialConfig,
}

/// Serial transport settings. Only used with the `serial` feature.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialConfig {
    /// Device path. `None` means search for the USB adapter.
    pub port: Option<String>,
    /// Baud rate of the receiver
    pub baud_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            smoothing: Smoothing::default(),
            axes: AxisMapping::default(),
            stale_after: Duration::from_secs(2),
            channel_capacity: 3,
            serial: SerialConfig::default(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115200,
        }
    }
}

impl Config {
    /// Parse and validate a JSON configuration
    pub fn from_json(text: &str) -> Result<Self> {
        let json: JsonValue = text
            .parse()
            .map_err(|e| Error::InvalidConfig(format!("JSON parse error: {e}")))?;
        let root = as_object(&json, "configuration")?;
        let mut config = Config::default();

        if let Some(smoothing) = root.get("smoothing") {
            config.smoothing = parse_smoothing(as_object(smoothing, "smoothing")?)?;
        }
        if let Some(axes) = root.get("axes") {
            config.axes = parse_axes(as_object(axes, "axes")?)?;
        }
        if let Some(ms) = count(root, "stale_after_ms")? {
            config.stale_after = Duration::from_millis(ms as u64);
        }
        if let Some(capacity) = count(root, "channel_capacity")? {
            config.channel_capacity = capacity;
        }
        if let Some(serial) = root.get("serial") {
            let serial = as_object(serial, "serial")?;
            config.serial.port = string(serial, "port")?.map(str::to_owned);
            if let Some(baud_rate) = count(serial, "baud_rate")? {
                config.serial.baud_rate = u32::try_from(baud_rate)
                    .map_err(|_| Error::InvalidConfig("baud_rate out of range".into()))?;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_json(&std::fs::read_to_string(path)?)?;
        tracing::info!(?path, "Loaded config");
        Ok(config)
    }

    /// Reject invalid values. Nothing is clamped or fixed up silently.
    pub fn validate(&self) -> Result<()> {
        self.smoothing.validate()?;
        self.axes.validate()?;
        if self.channel_capacity < 1 {
            return Err(Error::InvalidConfig(
                "channel_capacity must be at least 1".into(),
            ));
        }
        if self.stale_after.is_zero() {
            return Err(Error::InvalidConfig("stale_after_ms must not be 0".into()));
        }
        if self.serial.baud_rate == 0 {
            return Err(Error::InvalidConfig("baud_rate must not be 0".into()));
        }
        Ok(())
    }

    /// Shared state set up with this configuration
    pub fn shared_state(&self) -> Result<Arc<OrientationState>> {
        OrientationState::new_shared(self.smoothing)
    }

    /// Channel pair set up with this configuration
    pub fn channel(&self) -> Result<(ReadingSender, ReadingReceiver)> {
        channel::bounded(self.channel_capacity, self.smoothing)
    }
}

fn parse_smoothing(json: &JsonObject) -> Result<Smoothing> {
    match string(json, "kind")?.unwrap_or("exponential") {
        "exponential" => Ok(Smoothing::Exponential {
            alpha: number(json, "alpha")?.unwrap_or(Smoothing::DEFAULT_ALPHA),
        }),
        "moving_average" => Ok(Smoothing::MovingAverage {
            window: count(json, "window")?.unwrap_or(Smoothing::DEFAULT_WINDOW),
        }),
        other => Err(Error::InvalidConfig(format!(
            "unknown smoothing kind {other:?}"
        ))),
    }
}

fn parse_axes(json: &JsonObject) -> Result<AxisMapping> {
    let defaults = AxisMapping::default();
    Ok(AxisMapping {
        roll_sign: number(json, "roll_sign")?.unwrap_or(defaults.roll_sign),
        pitch_sign: number(json, "pitch_sign")?.unwrap_or(defaults.pitch_sign),
        yaw_sign: number(json, "yaw_sign")?.unwrap_or(defaults.yaw_sign),
        swap_roll_pitch: boolean(json, "swap_roll_pitch")?.unwrap_or(defaults.swap_roll_pitch),
        clamp_degrees: number(json, "clamp_degrees")?.or(defaults.clamp_degrees),
    })
}

fn as_object<'a>(value: &'a JsonValue, what: &str) -> Result<&'a JsonObject> {
    value
        .get::<JsonObject>()
        .ok_or_else(|| Error::InvalidConfig(format!("{what} must be an object")))
}

/// `null` is treated the same as a missing key
fn field<'a>(json: &'a JsonObject, key: &str) -> Option<&'a JsonValue> {
    json.get(key).filter(|value| !value.is_null())
}

fn number(json: &JsonObject, key: &str) -> Result<Option<f64>> {
    field(json, key)
        .map(|value| {
            value
                .get::<f64>()
                .copied()
                .ok_or_else(|| Error::InvalidConfig(format!("{key} must be a number")))
        })
        .transpose()
}

fn count(json: &JsonObject, key: &str) -> Result<Option<usize>> {
    number(json, key)?
        .map(|value| {
            if value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
                Ok(value as usize)
            } else {
                Err(Error::InvalidConfig(format!(
                    "{key} must be a non-negative integer, got {value}"
                )))
            }
        })
        .transpose()
}

fn boolean(json: &JsonObject, key: &str) -> Result<Option<bool>> {
    field(json, key)
        .map(|value| {
            value
                .get::<bool>()
                .copied()
                .ok_or_else(|| Error::InvalidConfig(format!("{key} must be true or false")))
        })
        .transpose()
}

fn string<'a>(json: &'a JsonObject, key: &str) -> Result<Option<&'a str>> {
    field(json, key)
        .map(|value| {
            value
                .get::<String>()
                .map(String::as_str)
                .ok_or_else(|| Error::InvalidConfig(format!("{key} must be a string")))
        })
        .transpose()
}
