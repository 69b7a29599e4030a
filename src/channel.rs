// Copyright (C) 2023, Alex Badics
// This file is part of witmotion-orient
// Licensed under the MIT license. See LICENSE file in the project root for details.

//! Message passing alternative to [`crate::OrientationState`].
//!
//! The producer pushes readings into a small bounded queue and never waits:
//! when the queue is full, the oldest reading is dropped. The consumer owns
//! the filter and calibration outright, so there is no shared lock at all.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use crate::{filter::Smoothing, Error, Orientation, OrientationTracker, ReadingSink, Result};

/// Create a connected sender/receiver pair. `capacity` must be at least 1.
pub fn bounded(capacity: usize, smoothing: Smoothing) -> Result<(ReadingSender, ReadingReceiver)> {
    if capacity < 1 {
        return Err(Error::InvalidConfig("channel capacity must be at least 1".into()));
    }
    let tracker = OrientationTracker::new(smoothing)?;
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    let receiver_alive = Arc::new(AtomicBool::new(true));
    Ok((
        ReadingSender {
            tx,
            overflow: rx.clone(),
            receiver_alive: receiver_alive.clone(),
        },
        ReadingReceiver {
            rx,
            tracker,
            disconnected: false,
            receiver_alive,
        },
    ))
}

/// Producer half, see [`bounded`]
#[derive(Clone)]
pub struct ReadingSender {
    tx: Sender<(Orientation, Instant)>,
    // Lets the producer evict the oldest entry instead of blocking. It also keeps
    // the channel connected, so receiver liveness is tracked separately.
    overflow: Receiver<(Orientation, Instant)>,
    receiver_alive: Arc<AtomicBool>,
}

impl ReadingSender {
    /// Queue a reading without blocking. Drops the oldest queued reading if full.
    pub fn send(&self, reading: Orientation) {
        if !self.is_connected() {
            tracing::trace!("Reading receiver gone, dropping reading");
            return;
        }
        let mut message = (reading, Instant::now());
        // Never disconnected while `overflow` is alive
        while let Err(TrySendError::Full(rejected)) = self.tx.try_send(message) {
            if self.overflow.try_recv().is_ok() {
                tracing::trace!("Reading queue full, dropped oldest reading");
            }
            message = rejected;
        }
    }

    /// `false` once the [`ReadingReceiver`] was dropped
    pub fn is_connected(&self) -> bool {
        self.receiver_alive.load(Ordering::Acquire)
    }

    /// Number of readings waiting for the consumer
    pub fn queued(&self) -> usize {
        self.tx.len()
    }
}

impl ReadingSink for ReadingSender {
    fn push(&self, reading: Orientation) {
        self.send(reading);
    }
}

/// Consumer half, see [`bounded`]. Behaves like [`crate::OrientationState`],
/// but needs `&mut self` as it is meant to live on the consumer thread.
pub struct ReadingReceiver {
    rx: Receiver<(Orientation, Instant)>,
    tracker: OrientationTracker,
    disconnected: bool,
    receiver_alive: Arc<AtomicBool>,
}

impl ReadingReceiver {
    fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok((reading, received)) => self.tracker.ingest_at(reading, received),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        tracing::debug!("All reading senders dropped");
                    }
                    self.disconnected = true;
                    break;
                }
            }
        }
    }

    /// Filtered, calibrated orientation from the newest queued reading, or
    /// `None` if nothing arrived since the last call.
    pub fn sample(&mut self) -> Option<Orientation> {
        self.drain();
        self.tracker.sample()
    }

    /// Current calibrated output without consuming anything
    pub fn peek(&self) -> Orientation {
        self.tracker.peek()
    }

    /// Set the newest reading as the zero pose
    pub fn calibrate(&mut self) {
        self.drain();
        let offset = self.tracker.calibrate();
        tracing::info!(
            roll = offset.roll,
            pitch = offset.pitch,
            yaw = offset.yaw,
            "Calibrated"
        );
    }

    /// Remove the calibration offset
    pub fn reset_calibration(&mut self) {
        self.tracker.reset_calibration();
        tracing::info!("Calibration reset");
    }

    /// Current calibration offset
    pub fn offset(&self) -> Orientation {
        self.tracker.offset()
    }

    /// `true` if no reading arrived within `max_age`. Queued readings count as arrived.
    pub fn is_stale(&mut self, max_age: Duration) -> bool {
        self.drain();
        self.tracker.is_stale(max_age)
    }

    /// `true` once every [`ReadingSender`] is gone and the queue was drained
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }
}

impl Drop for ReadingReceiver {
    fn drop(&mut self) {
        self.receiver_alive.store(false, Ordering::Release);
        // Nobody will read these anymore
        while self.rx.try_recv().is_ok() {}
    }
}
