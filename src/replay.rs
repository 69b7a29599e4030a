// Copyright (C) 2023, Alex Badics
// This file is part of witmotion-orient
// Licensed under the MIT license. See LICENSE file in the project root for details.

//! A [`PacketSource`] that plays back recorded buffers. See [`ReplaySource`]

use std::{collections::VecDeque, thread::sleep, time::Duration};

use crate::{witmotion, Error, Framing, Orientation, PacketSource, Result};

/// Plays back a fixed list of buffers, then reports [`Error::Disconnected`]
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    packets: VecDeque<Vec<u8>>,
    interval: Duration,
    framing: Framing,
}

impl ReplaySource {
    /// Replay `packets` as-is, one per [`PacketSource::read_packet`] call.
    /// Each one is decoded on its own, like a BLE notification.
    pub fn new(packets: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            packets: packets.into_iter().collect(),
            interval: Duration::ZERO,
            framing: Framing::Packets,
        }
    }

    /// One encoded frame per reading, like a BLE notification stream
    pub fn from_readings(readings: impl IntoIterator<Item = Orientation>) -> Self {
        Self::new(
            readings
                .into_iter()
                .map(|reading| witmotion::encode(&reading).to_vec()),
        )
    }

    /// Cut a continuous byte stream into `chunk_len` sized reads, like a serial port
    pub fn chunked(stream: &[u8], chunk_len: usize) -> Self {
        Self {
            framing: Framing::Stream,
            ..Self::new(stream.chunks(chunk_len.max(1)).map(<[u8]>::to_vec))
        }
    }

    /// Sleep this long before every read, to mimic the device's rate
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Buffers not yet played back
    pub fn remaining(&self) -> usize {
        self.packets.len()
    }
}

impl PacketSource for ReplaySource {
    fn read_packet(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.interval.is_zero() {
            sleep(self.interval);
        }
        self.packets
            .pop_front()
            .map(Some)
            .ok_or(Error::Disconnected)
    }

    fn name(&self) -> &'static str {
        "replay"
    }

    fn framing(&self) -> Framing {
        self.framing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plays_back_then_disconnects() {
        let mut source = ReplaySource::new([vec![1, 2], vec![3]]);
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.read_packet().unwrap(), Some(vec![1, 2]));
        assert_eq!(source.read_packet().unwrap(), Some(vec![3]));
        assert!(matches!(source.read_packet(), Err(Error::Disconnected)));
    }

    #[test]
    fn chunks_stream() {
        let mut source = ReplaySource::chunked(&[1, 2, 3, 4, 5], 2);
        assert_eq!(source.framing(), Framing::Stream);
        assert_eq!(ReplaySource::new([vec![1]]).framing(), Framing::Packets);
        assert_eq!(source.remaining(), 3);
        assert_eq!(source.read_packet().unwrap(), Some(vec![1, 2]));
    }

    #[test]
    fn readings_are_encoded() {
        let reading = Orientation::new(90.0, 0.0, -90.0);
        let mut source = ReplaySource::from_readings([reading]);
        let packet = source.read_packet().unwrap().unwrap();
        assert_eq!(witmotion::decode(&packet), Some(reading));
    }
}
