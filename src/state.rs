// Copyright (C) 2023, Alex Badics
// This file is part of witmotion-orient
// Licensed under the MIT license. See LICENSE file in the project root for details.

//! Orientation state shared between the transport (producer) and the
//! render loop (consumer). See [`OrientationState`]
//!
//! Filtering and calibration are deferred to read time: [`OrientationState::ingest`]
//! only stores the newest raw reading, older unsampled readings are overwritten.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::{
    filter::{Smoothing, SmoothingFilter},
    Orientation, ReadingSink, Result,
};

/// The single threaded part of [`OrientationState`]: latest raw reading,
/// filter, calibration offset and the "unread data" flag.
#[derive(Debug, Clone, Default)]
pub struct OrientationTracker {
    filter: SmoothingFilter,
    raw: Orientation,
    offset: Orientation,
    unread: bool,
    last_update: Option<Instant>,
}

impl OrientationTracker {
    /// Create a tracker with zero orientation and no offset. Fails if `smoothing` is invalid.
    pub fn new(smoothing: Smoothing) -> Result<Self> {
        Ok(Self::from_filter(SmoothingFilter::new(smoothing)?))
    }

    /// Create a tracker around an already configured filter
    pub fn from_filter(filter: SmoothingFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// Store a new raw reading. Overwrites the previous one if it was not sampled yet.
    pub fn ingest(&mut self, reading: Orientation) {
        self.ingest_at(reading, Instant::now());
    }

    pub(crate) fn ingest_at(&mut self, reading: Orientation, received: Instant) {
        self.raw = reading;
        self.unread = true;
        self.last_update = Some(received);
    }

    /// Advance the filter with the latest raw reading and return the calibrated result.
    /// Returns `None` if nothing was ingested since the last call.
    pub fn sample(&mut self) -> Option<Orientation> {
        if !self.unread {
            return None;
        }
        let filtered = self.filter.update(self.raw);
        self.unread = false;
        Some(filtered - self.offset)
    }

    /// Current calibrated filter output, without consuming anything
    pub fn peek(&self) -> Orientation {
        self.filter.output() - self.offset
    }

    /// Make the latest raw reading the zero pose. The filter is snapped to it as
    /// well, so the output does not slide over from the old pose.
    /// Returns the new offset.
    pub fn calibrate(&mut self) -> Orientation {
        self.offset = self.raw;
        self.filter.reset(self.raw);
        self.offset
    }

    /// Go back to absolute angles. The filter is left alone.
    pub fn reset_calibration(&mut self) {
        self.offset = Orientation::default();
    }

    /// Current calibration offset
    pub fn offset(&self) -> Orientation {
        self.offset
    }

    /// Latest raw reading, unfiltered and uncalibrated
    pub fn raw(&self) -> Orientation {
        self.raw
    }

    /// `true` if a reading arrived since the last [`Self::sample`]
    pub fn has_unread(&self) -> bool {
        self.unread
    }

    /// Time of the last [`Self::ingest`]
    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    /// `true` if nothing was ingested within `max_age`, or ever.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.last_update
            .map_or(true, |last_update| last_update.elapsed() > max_age)
    }
}

/// Thread safe orientation state. Share it with `Arc`: the producer calls
/// [`Self::ingest`], the consumer calls [`Self::sample`] on its own schedule.
///
/// Every method holds the lock for a handful of float operations only.
#[derive(Debug, Default)]
pub struct OrientationState {
    inner: Mutex<OrientationTracker>,
}

impl OrientationState {
    /// Create a new state. Fails if `smoothing` is invalid.
    pub fn new(smoothing: Smoothing) -> Result<Self> {
        Ok(Self {
            inner: Mutex::new(OrientationTracker::new(smoothing)?),
        })
    }

    /// Convenience constructor returning a shareable handle
    pub fn new_shared(smoothing: Smoothing) -> Result<Arc<Self>> {
        Ok(Arc::new(Self::new(smoothing)?))
    }

    /// Producer side: store a freshly decoded reading
    pub fn ingest(&self, reading: Orientation) {
        self.inner.lock().ingest(reading);
    }

    /// Consumer side: filtered, calibrated orientation, or `None` if nothing new
    /// arrived since the last call.
    pub fn sample(&self) -> Option<Orientation> {
        self.inner.lock().sample()
    }

    /// Current calibrated output without consuming the unread flag
    pub fn peek(&self) -> Orientation {
        self.inner.lock().peek()
    }

    /// Set the current pose as zero
    pub fn calibrate(&self) {
        let offset = self.inner.lock().calibrate();
        tracing::info!(
            roll = offset.roll,
            pitch = offset.pitch,
            yaw = offset.yaw,
            "Calibrated"
        );
    }

    /// Remove the calibration offset
    pub fn reset_calibration(&self) {
        self.inner.lock().reset_calibration();
        tracing::info!("Calibration reset");
    }

    /// Current calibration offset
    pub fn offset(&self) -> Orientation {
        self.inner.lock().offset()
    }

    /// Time of the last reading
    pub fn last_update(&self) -> Option<Instant> {
        self.inner.lock().last_update()
    }

    /// `true` if no reading arrived within `max_age`
    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.inner.lock().is_stale(max_age)
    }
}

impl ReadingSink for Arc<OrientationState> {
    fn push(&self, reading: Orientation) {
        self.ingest(reading);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn assert_close(actual: Orientation, expected: Orientation) {
        assert!(
            actual.max_abs_diff(&expected) < 1e-9,
            "{actual:?} != {expected:?}"
        );
    }

    #[test]
    fn sample_without_new_data_is_none() {
        let state = OrientationState::default();
        assert!(state.sample().is_none());

        state.ingest(Orientation::new(1.0, 2.0, 3.0));
        assert!(state.sample().is_some());
        assert!(state.sample().is_none());
    }

    #[test]
    fn zero_orientation_is_not_no_update() {
        let state = OrientationState::default();
        state.ingest(Orientation::default());
        assert_eq!(state.sample(), Some(Orientation::default()));
    }

    #[test]
    fn calibration_zeroes_current_pose() {
        let state = OrientationState::default();
        let pose = Orientation::new(10.0, 20.0, 30.0);
        state.ingest(pose);
        state.calibrate();
        state.ingest(pose);
        assert_close(state.sample().unwrap(), Orientation::default());
        assert_eq!(state.offset(), pose);
    }

    #[test]
    fn calibrate_keeps_unread_flag() {
        let mut tracker = OrientationTracker::default();
        tracker.ingest(Orientation::new(5.0, 0.0, 0.0));
        tracker.calibrate();
        assert!(tracker.has_unread());
        assert_close(tracker.sample().unwrap(), Orientation::default());

        tracker.calibrate();
        assert!(!tracker.has_unread());
        assert!(tracker.sample().is_none());
    }

    #[test]
    fn calibrate_is_idempotent() {
        let mut tracker = OrientationTracker::default();
        tracker.ingest(Orientation::new(7.0, -3.0, 45.0));
        let first = tracker.calibrate();
        let second = tracker.calibrate();
        assert_eq!(first, second);
        assert_close(tracker.peek(), Orientation::default());
    }

    #[test]
    fn samples_are_relative_to_calibration() {
        let mut tracker = OrientationTracker::new(Smoothing::Exponential { alpha: 1.0 }).unwrap();
        tracker.ingest(Orientation::new(10.0, 20.0, 30.0));
        tracker.calibrate();
        tracker.ingest(Orientation::new(15.0, 10.0, 30.0));
        assert_close(tracker.sample().unwrap(), Orientation::new(5.0, -10.0, 0.0));
    }

    #[test]
    fn reset_calibration_restores_absolute_angles() {
        let state = OrientationState::new(Smoothing::Exponential { alpha: 0.5 }).unwrap();
        state.ingest(Orientation::new(10.0, 20.0, 30.0));
        state.calibrate();
        state.ingest(Orientation::new(20.0, 40.0, 60.0));
        assert_close(state.sample().unwrap(), Orientation::new(5.0, 10.0, 15.0));

        // The filter keeps its output, only the offset goes away
        let filtered = state.peek() + state.offset();
        state.reset_calibration();
        assert_eq!(state.offset(), Orientation::default());
        assert_close(state.peek(), filtered);
        assert_close(state.peek(), Orientation::new(15.0, 30.0, 45.0));
        assert!(state.sample().is_none());

        state.ingest(Orientation::new(20.0, 40.0, 60.0));
        assert_close(state.sample().unwrap(), Orientation::new(17.5, 35.0, 52.5));
    }

    #[test]
    fn filter_converges_monotonically() {
        let state = OrientationState::default();
        let mut previous = 0.0;
        for _ in 0..60 {
            state.ingest(Orientation::new(100.0, 0.0, 0.0));
            let roll = state.sample().unwrap().roll;
            assert!(roll >= previous && roll <= 100.0);
            previous = roll;
        }
        assert!((previous - 100.0).abs() < 1e-6);
    }

    #[test]
    fn only_latest_raw_reading_counts() {
        let state = OrientationState::new(Smoothing::Exponential { alpha: 1.0 }).unwrap();
        state.ingest(Orientation::new(1.0, 1.0, 1.0));
        state.ingest(Orientation::new(2.0, 2.0, 2.0));
        state.ingest(Orientation::new(3.0, 3.0, 3.0));
        assert_eq!(state.sample(), Some(Orientation::new(3.0, 3.0, 3.0)));
        assert!(state.sample().is_none());
    }

    #[test]
    fn moving_average_state() {
        let state = OrientationState::new(Smoothing::MovingAverage { window: 2 }).unwrap();
        state.ingest(Orientation::new(2.0, 0.0, 0.0));
        assert_close(state.sample().unwrap(), Orientation::new(2.0, 0.0, 0.0));
        state.ingest(Orientation::new(4.0, 0.0, 0.0));
        assert_close(state.sample().unwrap(), Orientation::new(3.0, 0.0, 0.0));
        state.calibrate();
        state.ingest(Orientation::new(6.0, 0.0, 0.0));
        assert_close(state.sample().unwrap(), Orientation::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn invalid_smoothing_is_rejected() {
        assert!(OrientationState::new(Smoothing::Exponential { alpha: 0.0 }).is_err());
        assert!(OrientationState::new(Smoothing::MovingAverage { window: 0 }).is_err());
    }

    #[test]
    fn staleness() {
        let state = OrientationState::default();
        assert!(state.is_stale(Duration::from_secs(3600)));
        assert!(state.last_update().is_none());

        state.ingest(Orientation::default());
        assert!(!state.is_stale(Duration::from_secs(3600)));
        thread::sleep(Duration::from_millis(5));
        assert!(state.is_stale(Duration::from_millis(1)));
    }

    #[test]
    fn concurrent_access_never_tears() {
        // With alpha = 1 the output is the raw reading minus the offset,
        // every ingested reading is (k, 2k, 3k), so any mix-up shows.
        let state = OrientationState::new_shared(Smoothing::Exponential { alpha: 1.0 }).unwrap();

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let state = state.clone();
                thread::spawn(move || {
                    for i in 0..5000 {
                        let k = (p * 10000 + i) as f64;
                        state.push(Orientation::new(k, 2.0 * k, 3.0 * k));
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..2)
            .map(|c| {
                let state = state.clone();
                thread::spawn(move || {
                    for i in 0..5000 {
                        if c == 1 && i % 500 == 0 {
                            state.calibrate();
                        }
                        if let Some(o) = state.sample() {
                            assert_eq!(o.pitch, 2.0 * o.roll, "{o:?}");
                            assert_eq!(o.yaw, 3.0 * o.roll, "{o:?}");
                        }
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        for consumer in consumers {
            consumer.join().unwrap();
        }

        state.reset_calibration();
        state.ingest(Orientation::new(1.0, 2.0, 3.0));
        assert_eq!(state.sample(), Some(Orientation::new(1.0, 2.0, 3.0)));
    }
}
