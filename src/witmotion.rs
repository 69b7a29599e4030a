// Copyright (C) 2023, Alex Badics
// This file is part of witmotion-orient
// Licensed under the MIT license. See LICENSE file in the project root for details.

//! WitMotion "Euler angle" frame decoding. See [`decode`]
//! It only uses [`byteorder`] for parsing.

use std::collections::VecDeque;

use byteorder::{ByteOrder, LittleEndian};

use crate::Orientation;

/*
        Frame layout (no checksum, no trailer):

        0      1      2      3      4      5      6      7
        +------+------+------+------+------+------+------+------+
        | 0x55 | 0x61 |    roll     |    pitch    |     yaw     |
        +------+------+------+------+------+------+------+------+
                       i16 LE        i16 LE        i16 LE

        angle = raw / 32768 * 180 degrees
*/

/// Magic byte followed by the "Euler angle" packet type
pub const HEADER: [u8; 2] = [0x55, 0x61];

/// Header plus three `i16` angles
pub const FRAME_LEN: usize = 8;

const FULL_SCALE_DEGREES: f64 = 180.0;
const RAW_FULL_SCALE: f64 = 32768.0;

/// Decode the first Euler angle frame in `buffer`.
///
/// Bytes before the frame are skipped. Returns `None` if there is no complete
/// frame in the buffer, which is the normal case for other packet types or
/// mid-frame buffers. Frames after the first one are ignored, use [`frames`] for those.
pub fn decode(buffer: &[u8]) -> Option<Orientation> {
    find_frame(buffer, 0).map(|pos| parse_frame(&buffer[pos..pos + FRAME_LEN]))
}

/// Iterate over every Euler angle frame in `buffer`, in order.
pub fn frames(buffer: &[u8]) -> Frames<'_> {
    Frames {
        buffer,
        position: 0,
    }
}

/// Build a frame for `orientation`. Angles are rounded to the nearest
/// representable step and saturate at the ends of the `i16` range.
pub fn encode(orientation: &Orientation) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[..HEADER.len()].copy_from_slice(&HEADER);
    LittleEndian::write_i16(&mut frame[2..4], degrees_to_raw(orientation.roll));
    LittleEndian::write_i16(&mut frame[4..6], degrees_to_raw(orientation.pitch));
    LittleEndian::write_i16(&mut frame[6..8], degrees_to_raw(orientation.yaw));
    frame
}

fn find_frame(buffer: &[u8], from: usize) -> Option<usize> {
    if buffer.len() < FRAME_LEN {
        return None;
    }
    (from..=buffer.len() - FRAME_LEN).find(|&i| buffer[i..i + HEADER.len()] == HEADER)
}

/// `frame` must be exactly [`FRAME_LEN`] long and start with [`HEADER`]
fn parse_frame(frame: &[u8]) -> Orientation {
    Orientation {
        roll: raw_to_degrees(LittleEndian::read_i16(&frame[2..4])),
        pitch: raw_to_degrees(LittleEndian::read_i16(&frame[4..6])),
        yaw: raw_to_degrees(LittleEndian::read_i16(&frame[6..8])),
    }
}

fn raw_to_degrees(raw: i16) -> f64 {
    raw as f64 / RAW_FULL_SCALE * FULL_SCALE_DEGREES
}

fn degrees_to_raw(degrees: f64) -> i16 {
    // float -> int casts saturate
    (degrees / FULL_SCALE_DEGREES * RAW_FULL_SCALE).round() as i16
}

/// Iterator returned by [`frames`]
pub struct Frames<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> Iterator for Frames<'a> {
    type Item = Orientation;

    fn next(&mut self) -> Option<Orientation> {
        let pos = find_frame(self.buffer, self.position)?;
        // Payload bytes never start another frame
        self.position = pos + FRAME_LEN;
        Some(parse_frame(&self.buffer[pos..pos + FRAME_LEN]))
    }
}

/// Reassembles frames from a byte stream, where reads do not line up with frame
/// boundaries (e.g. a serial port).
///
/// Only a trailing partial frame is kept between calls, everything that cannot
/// start a frame is thrown away.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: VecDeque<u8>,
}

impl StreamDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(2 * FRAME_LEN),
        }
    }

    /// Append received bytes
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend(data);
    }

    /// Number of bytes waiting for the rest of their frame
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Get the next complete reading, if any
    pub fn next_reading(&mut self) -> Option<Orientation> {
        let buf = self.buffer.make_contiguous();
        match find_frame(buf, 0) {
            Some(pos) => {
                let reading = parse_frame(&buf[pos..pos + FRAME_LEN]);
                if pos > 0 {
                    tracing::trace!(skipped = pos, "Discarding bytes before frame");
                }
                self.buffer.drain(..pos + FRAME_LEN);
                Some(reading)
            }
            None => {
                let keep_from = Self::partial_frame_start(buf).unwrap_or(buf.len());
                if keep_from > 0 {
                    tracing::trace!(skipped = keep_from, "Discarding bytes without header");
                }
                self.buffer.drain(..keep_from);
                None
            }
        }
    }

    /// Start of the first suffix of `buf` that could still grow into a frame
    fn partial_frame_start(buf: &[u8]) -> Option<usize> {
        (0..buf.len()).find(|&i| {
            buf[i] == HEADER[0] && buf.get(i + 1).map_or(true, |&next| next == HEADER[1])
        })
    }
}
