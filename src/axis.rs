// Copyright (C) 2023, Alex Badics
// This file is part of witmotion-orient
// Licensed under the MIT license. See LICENSE file in the project root for details.

//! Consumer side corrections and conversion to [`nalgebra`] rotations.
//!
//! How the sensor is mounted, and which way the renderer's axes point, is
//! not something the device knows about. [`AxisMapping`] flips and swaps the
//! calibrated angles before they are turned into a rotation.

use nalgebra::{Rotation3, UnitQuaternion};

use crate::{Error, Orientation, Result};

/// Sign flips, roll/pitch swap and optional clamping applied to sampled angles.
///
/// Applied in this order: swap, signs, clamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisMapping {
    /// Either 1.0 or -1.0
    pub roll_sign: f64,
    /// Either 1.0 or -1.0
    pub pitch_sign: f64,
    /// Either 1.0 or -1.0. Often -1.0, the renderer's yaw is usually counter clockwise
    pub yaw_sign: f64,
    /// Exchange roll and pitch, for sensors mounted rotated by 90°
    pub swap_roll_pitch: bool,
    /// Clamp every axis into `[-limit, limit]`
    pub clamp_degrees: Option<f64>,
}

impl Default for AxisMapping {
    fn default() -> Self {
        Self {
            roll_sign: 1.0,
            pitch_sign: 1.0,
            yaw_sign: 1.0,
            swap_roll_pitch: false,
            clamp_degrees: None,
        }
    }
}

impl AxisMapping {
    /// Check that the signs are ±1 and the clamp limit is positive
    pub fn validate(&self) -> Result<()> {
        for (name, sign) in [
            ("roll_sign", self.roll_sign),
            ("pitch_sign", self.pitch_sign),
            ("yaw_sign", self.yaw_sign),
        ] {
            if sign != 1.0 && sign != -1.0 {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be 1 or -1, got {sign}"
                )));
            }
        }
        if let Some(limit) = self.clamp_degrees {
            if !(limit > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "clamp_degrees must be positive, got {limit}"
                )));
            }
        }
        Ok(())
    }

    /// Map sampled angles into the consumer's frame
    pub fn apply(&self, orientation: Orientation) -> Orientation {
        let (roll, pitch) = if self.swap_roll_pitch {
            (orientation.pitch, orientation.roll)
        } else {
            (orientation.roll, orientation.pitch)
        };
        let mapped = Orientation::new(
            roll * self.roll_sign,
            pitch * self.pitch_sign,
            orientation.yaw * self.yaw_sign,
        );
        match self.clamp_degrees {
            Some(limit) => mapped.map(|v| v.clamp(-limit, limit)),
            None => mapped,
        }
    }
}

impl Orientation {
    /// Rotation as a quaternion, ZYX (yaw, then pitch, then roll) convention
    pub fn to_unit_quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(
            self.roll.to_radians(),
            self.pitch.to_radians(),
            self.yaw.to_radians(),
        )
    }

    /// Rotation matrix `Rz(yaw) * Ry(pitch) * Rx(roll)`
    pub fn to_rotation(&self) -> Rotation3<f64> {
        Rotation3::from_euler_angles(
            self.roll.to_radians(),
            self.pitch.to_radians(),
            self.yaw.to_radians(),
        )
    }

    /// Inverse of [`Self::to_unit_quaternion`]. Angles come back in [-180, 180]
    pub fn from_unit_quaternion(quaternion: &UnitQuaternion<f64>) -> Self {
        let (roll, pitch, yaw) = quaternion.euler_angles();
        Self::new(roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees())
    }
}
