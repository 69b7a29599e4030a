// Copyright (C) 2023, Alex Badics
// This file is part of witmotion-orient
// Licensed under the MIT license. See LICENSE file in the project root for details.

//! USB serial receivers (the CH340 based dongles WitMotion ships with its
//! wireless sensors, or a wired sensor). See [`SerialSource`]
//! It only uses [`serialport`] for communication.

use std::{
    io::{ErrorKind, Read},
    time::Duration,
};

use serialport::{SerialPort, SerialPortType, UsbPortInfo};

use crate::{config::SerialConfig, Error, Framing, PacketSource, Result};

/// A serial port delivering the raw WitMotion byte stream.
///
/// Reads do not line up with frames; [`crate::producer::Producer`] takes care of that.
pub struct SerialSource {
    port: Box<dyn SerialPort>,
}

/// CH340 USB-serial converter
const USB_VID: u16 = 0x1a86;
const USB_PID: u16 = 0x7523;

const READ_TIMEOUT: Duration = Duration::from_millis(50);
const READ_SIZE: usize = 64;

impl SerialSource {
    /// Find the first connected CH340 adapter and open it.
    pub fn find(baud_rate: u32) -> Result<Self> {
        let ports = serialport::available_ports()?;
        let port = ports
            .into_iter()
            .find(|p| {
                matches!(
                    p.port_type,
                    SerialPortType::UsbPort(UsbPortInfo {
                        vid: USB_VID,
                        pid: USB_PID,
                        ..
                    })
                )
            })
            .ok_or(Error::NotFound)?;
        Self::open(&port.port_name, baud_rate)
    }

    /// Open a specific port, e.g. `/dev/ttyUSB0` or `COM3`
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .timeout(READ_TIMEOUT)
            .open()?;
        port.clear(serialport::ClearBuffer::All)?;
        tracing::info!(path, baud_rate, "Opened serial port");
        Ok(Self { port })
    }

    /// Open the configured port, or search for one if none is configured
    pub fn from_config(config: &SerialConfig) -> Result<Self> {
        match &config.port {
            Some(path) => Self::open(path, config.baud_rate),
            None => Self::find(config.baud_rate),
        }
    }
}

impl PacketSource for SerialSource {
    fn read_packet(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = [0u8; READ_SIZE];
        match self.port.read(&mut buf) {
            Ok(0) => Err(Error::Disconnected),
            Ok(n) => Ok(Some(buf[..n].to_vec())),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(None),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Err(Error::Disconnected),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "serial"
    }

    fn framing(&self) -> Framing {
        Framing::Stream
    }
}
