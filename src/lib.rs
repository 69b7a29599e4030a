// Copyright (C) 2023, Alex Badics
// This file is part of witmotion-orient
// Licensed under the MIT license. See LICENSE file in the project root for details.
#![warn(missing_docs)]
//! witmotion-orient turns the notification stream of a WitMotion wireless IMU
//! (WT9011DCL and friends) into smoothed, calibrated Euler angles.
//!
//! The device does its own sensor fusion, so all that comes over the wire is
//! roll, pitch and yaw. This crate finds those frames in whatever the transport
//! hands over ([`witmotion`]), smooths them ([`filter`]), and keeps a user-settable
//! zero pose. The producer (transport callback) and the consumer (render tick)
//! talk through [`OrientationState`] or, without a lock, through [`channel`].
//!
//! Example usage:
//! ```ignore
//! let state = Arc::new(OrientationState::default());
//! let producer = Producer::spawn(
//!     Box::new(SerialSource::find(115200)?),
//!     state.clone(),
//!     Duration::from_secs(2),
//! )?;
//! loop {
//!     if let Some(angles) = state.sample() {
//!         // Rotate something by `angles.to_rotation()`
//!     }
//!     std::thread::sleep(Duration::from_millis(10));
//! }
//! ```

use std::ops::{Add, Sub};

pub mod axis;
pub mod channel;
pub mod config;
pub mod filter;
pub mod producer;
pub mod replay;
#[cfg(feature = "serial")]
pub mod serial;
pub mod state;
pub mod witmotion;

pub use state::{OrientationState, OrientationTracker};

/// Possible errors resulting from `witmotion-orient` API calls
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A serialport error happened. See [`serialport::Error`] for specifics
    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    SerialPortError(#[from] serialport::Error),
    /// An I/O error happened while talking to the transport
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    /// No device was found.
    #[error("no device found")]
    NotFound,
    /// The transport went away (device disconnected, replay exhausted, etc.)
    #[error("transport disconnected")]
    Disconnected,
    /// A configuration value was rejected at setup time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Other fatal error, usually a problem with the library itself, or
    /// a device support issue. File a bug if you encounter this.
    #[error("{0}")]
    Other(&'static str),
}

/// Convenience alias used all over the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Orientation as reported by the device, in degrees.
///
/// Values come from a 16 bit fixed point field, so they fall into [-180, 180),
/// but nothing clamps them. Crossing the ±180° boundary shows up as a jump
/// (179 -> -179); this is not unwrapped anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    /// Rotation around the X axis
    pub roll: f64,
    /// Rotation around the Y axis
    pub pitch: f64,
    /// Rotation around the Z axis
    pub yaw: f64,
}

impl Orientation {
    /// Create an orientation from three angles in degrees
    pub const fn new(roll: f64, pitch: f64, yaw: f64) -> Self {
        Self { roll, pitch, yaw }
    }

    /// Apply `f` to each axis independently
    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self::new(f(self.roll), f(self.pitch), f(self.yaw))
    }

    /// Largest per-axis absolute difference to `other`
    pub fn max_abs_diff(&self, other: &Orientation) -> f64 {
        (self.roll - other.roll)
            .abs()
            .max((self.pitch - other.pitch).abs())
            .max((self.yaw - other.yaw).abs())
    }
}

impl Add for Orientation {
    type Output = Orientation;

    fn add(self, rhs: Orientation) -> Orientation {
        Orientation::new(
            self.roll + rhs.roll,
            self.pitch + rhs.pitch,
            self.yaw + rhs.yaw,
        )
    }
}

impl Sub for Orientation {
    type Output = Orientation;

    fn sub(self, rhs: Orientation) -> Orientation {
        Orientation::new(
            self.roll - rhs.roll,
            self.pitch - rhs.pitch,
            self.yaw - rhs.yaw,
        )
    }
}

/// How the buffers of a [`PacketSource`] relate to frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// Every buffer is a complete notification payload (BLE). A truncated frame
    /// at the end of a buffer is not a reading.
    #[default]
    Packets,
    /// Buffers are arbitrary cuts of one byte stream (serial), frames may span them.
    Stream,
}

/// A transport that delivers raw notification payloads, e.g. a serial port or
/// a BLE characteristic. Connection setup and retries are the implementor's business.
pub trait PacketSource: Send {
    /// Get the next raw buffer. Blocks for a bounded time.
    ///
    /// `Ok(None)` means nothing arrived before the transport's timeout.
    /// [`Error::Disconnected`] means an orderly end of the stream.
    fn read_packet(&mut self) -> Result<Option<Vec<u8>>>;

    /// Human readable name of the transport
    fn name(&self) -> &'static str;

    /// Whether frames can be split across buffers
    fn framing(&self) -> Framing {
        Framing::Packets
    }
}

/// The producer side of the orientation boundary. See [`producer::Producer`]
pub trait ReadingSink: Send {
    /// Hand over a freshly decoded reading. Must not block.
    fn push(&self, reading: Orientation);
}

impl From<&'static str> for Error {
    fn from(e: &'static str) -> Self {
        Error::Other(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_arithmetic() {
        let a = Orientation::new(10.0, 20.0, 30.0);
        let b = Orientation::new(1.0, 2.0, 3.0);
        assert_eq!(a - b, Orientation::new(9.0, 18.0, 27.0));
        assert_eq!(a + b, Orientation::new(11.0, 22.0, 33.0));
        assert_eq!(b.map(|v| v * 2.0), Orientation::new(2.0, 4.0, 6.0));
        assert!((a.max_abs_diff(&b) - 27.0).abs() < 1e-12);
    }

    #[test]
    fn error_messages() {
        assert_eq!(Error::NotFound.to_string(), "no device found");
        assert_eq!(
            Error::InvalidConfig("alpha".into()).to_string(),
            "invalid configuration: alpha"
        );
    }
}
