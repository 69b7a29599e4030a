// Copyright (C) 2023, Alex Badics
// This file is part of witmotion-orient
// Licensed under the MIT license. See LICENSE file in the project root for details.

//! Producer side plumbing: feed transport buffers into a [`ReadingSink`].
//!
//! Callback style transports (BLE notifications) should call [`ingest_packet`]
//! from the callback. Blocking transports can be pumped by a [`Producer`] thread.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::{
    witmotion::{self, StreamDecoder},
    Error, Framing, Orientation, PacketSource, ReadingSink, Result,
};

/// Decode every frame of a single notification payload and push them into `sink`.
/// Returns the number of readings found, which is zero for other packet types.
pub fn ingest_packet(packet: &[u8], sink: &impl ReadingSink) -> usize {
    let mut count = 0;
    for reading in witmotion::frames(packet) {
        sink.push(reading);
        count += 1;
    }
    count
}

/// Background thread reading a [`PacketSource`]
pub struct Producer {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl Producer {
    /// Start pumping `source` into `sink`. A warning is logged whenever no
    /// reading arrived for `stale_after`.
    pub fn spawn<S: ReadingSink + 'static>(
        mut source: Box<dyn PacketSource>,
        sink: S,
        stale_after: Duration,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();
        let handle = thread::Builder::new()
            .name(format!("{}-producer", source.name()))
            .spawn(move || pump(source.as_mut(), &sink, &stop_clone, stale_after))?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// `true` if the thread exited on its own (disconnect or error)
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the thread and wait for it. Returns the error that ended it, if any.
    pub fn stop(mut self) -> Result<()> {
        self.stop.store(true, Ordering::Relaxed);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::Other("Producer thread panicked"))?,
            None => Ok(()),
        }
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        // The thread exits after its current read
        self.stop.store(true, Ordering::Relaxed);
    }
}

fn pump(
    source: &mut dyn PacketSource,
    sink: &dyn ReadingSink,
    stop: &AtomicBool,
    stale_after: Duration,
) -> Result<()> {
    let framing = source.framing();
    let mut decoder = StreamDecoder::new();
    let mut last_reading = Instant::now();
    let mut stale = false;
    let mut reading_count: u64 = 0;
    tracing::info!(source = source.name(), ?framing, "Producer started");

    while !stop.load(Ordering::Relaxed) {
        match source.read_packet() {
            Ok(Some(packet)) => {
                let before = reading_count;
                match framing {
                    Framing::Packets => {
                        for reading in witmotion::frames(&packet) {
                            deliver(sink, reading, &mut reading_count);
                        }
                    }
                    Framing::Stream => {
                        decoder.push(&packet);
                        while let Some(reading) = decoder.next_reading() {
                            deliver(sink, reading, &mut reading_count);
                        }
                    }
                }
                if reading_count != before {
                    last_reading = Instant::now();
                }
            }
            Ok(None) => (),
            Err(Error::Disconnected) => {
                tracing::info!(reading_count, "Source disconnected");
                return Ok(());
            }
            Err(e) => {
                tracing::error!(?e, "Source read error");
                return Err(e);
            }
        }

        let silent = last_reading.elapsed() > stale_after;
        if silent && !stale {
            tracing::warn!(?stale_after, "No orientation data, check the connection");
        } else if !silent && stale {
            tracing::info!("Orientation data is flowing again");
        }
        stale = silent;
    }

    tracing::info!(reading_count, "Producer stopped");
    Ok(())
}

fn deliver(sink: &dyn ReadingSink, reading: Orientation, reading_count: &mut u64) {
    sink.push(reading);
    *reading_count += 1;
    if *reading_count % 1000 == 0 {
        tracing::debug!(reading_count = *reading_count, "Orientation readings decoded");
    }
}
