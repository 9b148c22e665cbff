// Copyright (C) 2026 Brian Johnson
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.


use std::io::{Read, Write};
use std::time::Duration;
use serialport::{ClearBuffer, SerialPort as SerialPortTrait, DataBits, Parity, StopBits};
use crate::config::LinkConfig;

// ============================================================================
// SerialPort Trait
// ============================================================================

/// Trait for serial port operations needed by the printer link
pub trait SerialPort: Send {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()>;

    fn flush(&mut self) -> std::io::Result<()>;

    /// Drop anything already waiting in the input buffer
    fn discard_input(&mut self) -> std::io::Result<()>;

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> std::io::Result<usize>;
}

/// Claims a serial device for one print job
pub trait PortOpener {
    fn open(&self, port_name: &str, link: &LinkConfig) -> Result<Box<dyn SerialPort>, serialport::Error>;
}

// ============================================================================
// Real Serial Port Implementation
// ============================================================================

/// Real serial port implementation that wraps the serialport crate
pub struct RealSerialPort {
    port: Box<dyn SerialPortTrait>,
    write_timeout: Duration,
}

impl RealSerialPort {
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        data_bits: DataBits,
        parity: Parity,
        stop_bits: StopBits,
        write_timeout: Duration,
    ) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .timeout(write_timeout)
            .open()?;

        Ok(RealSerialPort { port, write_timeout })
    }
}

impl SerialPort for RealSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.port.set_timeout(self.write_timeout)?;
        self.port.write_all(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }

    fn discard_input(&mut self) -> std::io::Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> std::io::Result<usize> {
        self.port.set_timeout(timeout)?;
        self.port.read(buf)
    }
}

/// Opens system serial devices, always 8 data bits, 1 stop bit, no parity
pub struct SystemPorts;

impl PortOpener for SystemPorts {
    fn open(&self, port_name: &str, link: &LinkConfig) -> Result<Box<dyn SerialPort>, serialport::Error> {
        let port = RealSerialPort::open(
            port_name,
            link.baud_rate,
            DataBits::Eight,
            Parity::None,
            StopBits::One,
            link.write_timeout,
        )?;
        Ok(Box::new(port))
    }
}

/// Names of the serial devices present on this machine
pub fn available_ports() -> Result<Vec<String>, serialport::Error> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|p| p.port_name)
        .collect())
}

// ============================================================================
// Mock Serial Port for Testing
// ============================================================================

/// Observations shared with the test after the port has been handed off
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockLog {
    pub write_sizes: Vec<usize>,
    pub flushes: usize,
    pub discards: usize,
    pub dropped: bool,
}

#[cfg(test)]
pub struct MockSerialPort {
    // Data to return on reads (None = timeout)
    read_buffer: Vec<Option<u8>>,
    read_pos: usize,
    // Stale bytes sitting in the input buffer until discarded
    pending: Vec<u8>,
    // Bytes the printer sends once this many bytes have been written
    replies: Vec<(usize, u8)>,
    // Writes starting at or past this offset fail
    fail_writes_at: Option<usize>,
    // Track what was written
    write_log: Vec<u8>,
    // Expected writes for verification
    expected_writes: Vec<u8>,
    log: std::sync::Arc<std::sync::Mutex<MockLog>>,
}

#[cfg(test)]
impl MockSerialPort {
    pub fn new(responses: Vec<Option<u8>>, expected_writes: Vec<u8>) -> Self {
        MockSerialPort {
            read_buffer: responses,
            read_pos: 0,
            pending: Vec::new(),
            replies: Vec::new(),
            fail_writes_at: None,
            write_log: Vec::new(),
            expected_writes,
            log: Default::default(),
        }
    }

    pub fn with_pending(mut self, pending: Vec<u8>) -> Self {
        self.pending = pending;
        self
    }

    /// Queue `byte` as input once `offset` bytes have been written
    pub fn reply_after(mut self, offset: usize, byte: u8) -> Self {
        self.replies.push((offset, byte));
        self
    }

    /// Fail every write that starts once `offset` bytes have been written
    pub fn fail_writes_at(mut self, offset: usize) -> Self {
        self.fail_writes_at = Some(offset);
        self
    }

    pub fn log(&self) -> std::sync::Arc<std::sync::Mutex<MockLog>> {
        self.log.clone()
    }
}

#[cfg(test)]
impl SerialPort for MockSerialPort {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        if self.fail_writes_at.is_some_and(|offset| self.write_log.len() >= offset) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "Mock write failure"
            ));
        }

        self.write_log.extend_from_slice(buf);
        self.log.lock().unwrap().write_sizes.push(buf.len());

        let written = self.write_log.len();
        let (due, later): (Vec<_>, Vec<_>) = self.replies.drain(..).partition(|&(offset, _)| offset <= written);
        self.replies = later;
        self.pending.extend(due.into_iter().map(|(_, byte)| byte));
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.log.lock().unwrap().flushes += 1;
        Ok(())
    }

    fn discard_input(&mut self) -> std::io::Result<()> {
        self.pending.clear();
        self.log.lock().unwrap().discards += 1;
        Ok(())
    }

    fn read_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> std::io::Result<usize> {
        if !self.pending.is_empty() {
            buf[0] = self.pending.remove(0);
            return Ok(1);
        }

        // Out of responses = timeout
        if self.read_pos >= self.read_buffer.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Mock timeout"
            ));
        }

        // If current response is None = timeout
        if self.read_buffer[self.read_pos].is_none() {
            self.read_pos += 1;
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Mock timeout"
            ));
        }

        let mut bytes_read = 0;
        while bytes_read < buf.len() && self.read_pos < self.read_buffer.len() {
            match self.read_buffer[self.read_pos] {
                Some(byte) => {
                    buf[bytes_read] = byte;
                    bytes_read += 1;
                    self.read_pos += 1;
                }
                None => break,  // Stop at timeout marker
            }
        }

        Ok(bytes_read)
    }
}

#[cfg(test)]
impl Drop for MockSerialPort {
    fn drop(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.dropped = true;
        }

        if std::thread::panicking() {
            return;
        }

        assert_eq!(
            self.read_pos,
            self.read_buffer.len(),
            "MockSerialPort dropped with {} unconsumed responses (read {} of {} bytes)",
            self.read_buffer.len() - self.read_pos,
            self.read_pos,
            self.read_buffer.len()
        );

        assert_eq!(
            &self.write_log,
            &self.expected_writes,
            "MockSerialPort write log mismatch!\nExpected {} bytes:\n{:02X?}\nGot {} bytes:\n{:02X?}",
            self.expected_writes.len(),
            self.expected_writes,
            self.write_log.len(),
            self.write_log
        );
    }
}

/// Hands out one prepared mock port, or fails like a busy device
#[cfg(test)]
pub struct MockOpener {
    port: std::sync::Mutex<Option<MockSerialPort>>,
}

#[cfg(test)]
impl MockOpener {
    pub fn new(port: MockSerialPort) -> Self {
        MockOpener { port: std::sync::Mutex::new(Some(port)) }
    }

    pub fn busy() -> Self {
        MockOpener { port: std::sync::Mutex::new(None) }
    }
}

#[cfg(test)]
impl PortOpener for MockOpener {
    fn open(&self, port_name: &str, _link: &LinkConfig) -> Result<Box<dyn SerialPort>, serialport::Error> {
        match self.port.lock().unwrap().take() {
            Some(port) => Ok(Box::new(port)),
            None => Err(serialport::Error::new(
                serialport::ErrorKind::NoDevice,
                format!("{} is busy", port_name),
            )),
        }
    }
}
