// Copyright (C) 2023, Alex Badics
// This file is part of witmotion-orient
// Licensed under the MIT license. See LICENSE file in the project root for details.

//! Smoothing filters for the raw angle stream.
//!
//! Two families are available, pick one with [`Smoothing`]:
//!
//! - Exponential moving average (the default):
//!   `filtered = filtered * (1 - alpha) + raw * alpha`.
//!   Lower alpha means smoother but laggier output. 0.2-0.4 is usually fine.
//! - Moving average over the last `window` raw samples. The lag is a fixed
//!   `window / 2` samples, and a single outlier is visible for exactly `window` samples.
//!
//! Both operate on each axis independently and on the raw degree values, so
//! a jump across ±180° is smoothed into a big swing instead of being unwrapped.

use std::collections::VecDeque;

use crate::{Error, Orientation, Result};

/// Smoothing filter selection and strength
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Smoothing {
    /// Exponential moving average. `alpha` must be in (0, 1], 1.0 means no smoothing.
    Exponential {
        /// Weight of the newest raw sample
        alpha: f64,
    },
    /// Plain average of the last `window` samples. `window` must be at least 1.
    MovingAverage {
        /// Number of samples averaged
        window: usize,
    },
}

impl Smoothing {
    /// Default weight of the exponential filter
    pub const DEFAULT_ALPHA: f64 = 0.3;
    /// Default window of the moving average filter
    pub const DEFAULT_WINDOW: usize = 5;

    /// Check the parameters. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Smoothing::Exponential { alpha } => {
                if !(alpha > 0.0 && alpha <= 1.0) {
                    return Err(Error::InvalidConfig(format!(
                        "smoothing alpha must be in (0, 1], got {alpha}"
                    )));
                }
            }
            Smoothing::MovingAverage { window } => {
                if window < 1 {
                    return Err(Error::InvalidConfig(
                        "moving average window must be at least 1".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for Smoothing {
    fn default() -> Self {
        Smoothing::Exponential {
            alpha: Self::DEFAULT_ALPHA,
        }
    }
}

/// Running state of a [`Smoothing`] filter.
#[derive(Debug, Clone)]
pub struct SmoothingFilter {
    smoothing: Smoothing,
    output: Orientation,
    history: VecDeque<Orientation>,
}

impl SmoothingFilter {
    /// Create a filter with zero output. Fails if `smoothing` is invalid.
    pub fn new(smoothing: Smoothing) -> Result<Self> {
        smoothing.validate()?;
        let history = match smoothing {
            Smoothing::Exponential { .. } => VecDeque::new(),
            Smoothing::MovingAverage { window } => VecDeque::with_capacity(window),
        };
        Ok(Self {
            smoothing,
            output: Orientation::default(),
            history,
        })
    }

    /// The configuration this filter was created with
    pub fn smoothing(&self) -> Smoothing {
        self.smoothing
    }

    /// Last filter output
    pub fn output(&self) -> Orientation {
        self.output
    }

    /// Feed one raw sample and get the new output
    pub fn update(&mut self, raw: Orientation) -> Orientation {
        self.output = match self.smoothing {
            Smoothing::Exponential { alpha } => Orientation::new(
                self.output.roll * (1.0 - alpha) + raw.roll * alpha,
                self.output.pitch * (1.0 - alpha) + raw.pitch * alpha,
                self.output.yaw * (1.0 - alpha) + raw.yaw * alpha,
            ),
            Smoothing::MovingAverage { window } => {
                if self.history.len() == window {
                    self.history.pop_front();
                }
                self.history.push_back(raw);
                self.average()
            }
        };
        self.output
    }

    /// Snap the filter to `raw`, as if it had been the input forever
    pub fn reset(&mut self, raw: Orientation) {
        if let Smoothing::MovingAverage { window } = self.smoothing {
            self.history.clear();
            self.history.extend(std::iter::repeat(raw).take(window));
        }
        self.output = raw;
    }

    fn average(&self) -> Orientation {
        let sum = self
            .history
            .iter()
            .fold(Orientation::default(), |acc, sample| acc + *sample);
        let n = self.history.len().max(1) as f64;
        sum.map(|v| v / n)
    }
}

impl Default for SmoothingFilter {
    fn default() -> Self {
        Self {
            smoothing: Smoothing::default(),
            output: Orientation::default(),
            history: VecDeque::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_parameters_are_rejected() {
        for alpha in [0.0, -0.1, 1.0001, f64::NAN, f64::INFINITY] {
            assert!(
                SmoothingFilter::new(Smoothing::Exponential { alpha }).is_err(),
                "alpha {alpha}"
            );
        }
        assert!(SmoothingFilter::new(Smoothing::MovingAverage { window: 0 }).is_err());

        assert!(SmoothingFilter::new(Smoothing::Exponential { alpha: 1.0 }).is_ok());
        assert!(SmoothingFilter::new(Smoothing::Exponential { alpha: 1e-6 }).is_ok());
        assert!(SmoothingFilter::new(Smoothing::MovingAverage { window: 1 }).is_ok());
    }

    #[test]
    fn exponential_step() {
        let mut filter = SmoothingFilter::new(Smoothing::default()).unwrap();
        let out = filter.update(Orientation::new(10.0, -10.0, 100.0));
        assert!(out.max_abs_diff(&Orientation::new(3.0, -3.0, 30.0)) < 1e-12);
        let out = filter.update(Orientation::new(10.0, -10.0, 100.0));
        assert!(out.max_abs_diff(&Orientation::new(5.1, -5.1, 51.0)) < 1e-12);
    }

    #[test]
    fn exponential_converges_without_overshoot() {
        let mut filter = SmoothingFilter::new(Smoothing::default()).unwrap();
        let mut previous = 0.0;
        for _ in 0..60 {
            let roll = filter.update(Orientation::new(100.0, 0.0, 0.0)).roll;
            assert!(roll >= previous);
            assert!(roll <= 100.0);
            previous = roll;
        }
        assert!((previous - 100.0).abs() < 1e-6);
    }

    #[test]
    fn alpha_one_is_passthrough() {
        let mut filter = SmoothingFilter::new(Smoothing::Exponential { alpha: 1.0 }).unwrap();
        let raw = Orientation::new(1.5, 2.5, -3.5);
        assert_eq!(filter.update(raw), raw);
    }

    #[test]
    fn moving_average_uses_last_window_samples() {
        let mut filter = SmoothingFilter::new(Smoothing::MovingAverage { window: 3 }).unwrap();
        assert_eq!(filter.update(Orientation::new(3.0, 0.0, 0.0)).roll, 3.0);
        assert_eq!(filter.update(Orientation::new(6.0, 0.0, 0.0)).roll, 4.5);
        assert_eq!(filter.update(Orientation::new(9.0, 0.0, 0.0)).roll, 6.0);
        // 3.0 falls out
        assert_eq!(filter.update(Orientation::new(12.0, 0.0, 0.0)).roll, 9.0);
    }

    #[test]
    fn reset_snaps_output() {
        let raw = Orientation::new(10.0, 20.0, 30.0);
        for smoothing in [
            Smoothing::default(),
            Smoothing::MovingAverage {
                window: Smoothing::DEFAULT_WINDOW,
            },
        ] {
            let mut filter = SmoothingFilter::new(smoothing).unwrap();
            filter.update(Orientation::new(-50.0, 0.0, 5.0));
            filter.reset(raw);
            assert_eq!(filter.output(), raw);
            assert!(filter.update(raw).max_abs_diff(&raw) < 1e-12);
        }
    }

    #[test]
    fn wraparound_is_not_unwrapped() {
        let mut filter = SmoothingFilter::new(Smoothing::Exponential { alpha: 0.5 }).unwrap();
        filter.reset(Orientation::new(0.0, 0.0, 179.0));
        let out = filter.update(Orientation::new(0.0, 0.0, -179.0));
        assert!((out.yaw - 0.0).abs() < 1e-12);
    }
}
