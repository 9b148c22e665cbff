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

//! Link session: one open serial port for the lifetime of one print job

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use log::{debug, warn};
use crate::config::LinkConfig;
use crate::error::PrintError;
use crate::frame::{decode_ack, hex, AckByte};
use crate::serial::{PortOpener, SerialPort};

/// Longest uninterrupted sleep while an abort flag is attached
const ABORT_CHECK: Duration = Duration::from_millis(10);

/// Outcome of waiting for the printer's reply to one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Acked,
    /// NAK or any byte the printer should not have sent
    Rejected(u8),
    TimedOut,
}

pub struct Session {
    port: Option<Box<dyn SerialPort>>,
    port_name: String,
    link: LinkConfig,
    abort: Option<Arc<AtomicBool>>,
}

impl Session {
    pub fn open(opener: &dyn PortOpener, port_name: &str, link: LinkConfig) -> Result<Self, PrintError> {
        debug!("Opening {} at {} baud", port_name, link.baud_rate);
        let port = opener.open(port_name, &link).map_err(|source| PrintError::PortUnavailable {
            port: port_name.to_string(),
            source,
        })?;

        Ok(Session {
            port: Some(port),
            port_name: port_name.to_string(),
            link,
            abort: None,
        })
    }

    /// Attach a flag that, once set, makes every timed wait fail with `Interrupted`
    pub fn with_abort(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = Some(abort);
        self
    }

    pub fn link(&self) -> &LinkConfig {
        &self.link
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "session is closed")
        })
    }

    /// Write a complete frame, chunked and paced per the link settings, then flush.
    ///
    /// Input already buffered is discarded before the first byte goes out, so
    /// a late reply to an earlier frame is never taken for this one's.
    pub fn send_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        debug!("Sending frame: {}", hex(frame));
        self.port()?.discard_input()?;

        match self.link.chunk_size {
            Some(size) => {
                let delay = self.link.chunk_delay;
                for (i, chunk) in frame.chunks(size.max(1)).enumerate() {
                    if i > 0 {
                        self.pause(delay)?;
                    }
                    self.port()?.write_all(chunk)?;
                }
            }
            None => self.port()?.write_all(frame)?,
        }

        self.port()?.flush()
    }

    /// Write bytes as-is with no framing
    pub fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        debug!("Sending raw: {}", hex(bytes));
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()
    }

    /// Wait up to `deadline` for a single acknowledgment byte. A reply that
    /// arrived while the frame was still being written counts.
    pub fn await_ack(&mut self, deadline: Duration) -> io::Result<Ack> {
        let start = Instant::now();

        let poll = self.link.poll_interval;
        let mut buf = [0u8; 1];

        loop {
            let remaining = deadline.saturating_sub(start.elapsed());
            match self.port()?.read_timeout(&mut buf, remaining.min(poll)) {
                Ok(n) if n > 0 => {
                    debug!("Received: {:02X}", buf[0]);
                    return Ok(match decode_ack(buf[0]) {
                        AckByte::Acked => Ack::Acked,
                        AckByte::Rejected => Ack::Rejected(buf[0]),
                        AckByte::Unknown(byte) => {
                            warn!("Unexpected reply byte 0x{:02X}, treating as NAK", byte);
                            Ack::Rejected(byte)
                        }
                    });
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e),
            }

            if start.elapsed() >= deadline {
                debug!("No reply within {:?}", deadline);
                return Ok(Ack::TimedOut);
            }

            self.pause(poll)?;
        }
    }

    /// Fixed delay, cut short with `Interrupted` if the abort flag is raised
    pub fn pause(&self, duration: Duration) -> io::Result<()> {
        let Some(abort) = &self.abort else {
            if !duration.is_zero() {
                thread::sleep(duration);
            }
            return Ok(());
        };

        let end = Instant::now() + duration;
        loop {
            if abort.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "print job interrupted"));
            }
            let now = Instant::now();
            if now >= end {
                return Ok(());
            }
            thread::sleep((end - now).min(ABORT_CHECK));
        }
    }

    /// Release the port. Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(port) = self.port.take() {
            drop(port);
            debug!("Closed {}", self.port_name);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode;
    use crate::protocol::*;
    use crate::serial::{MockOpener, MockSerialPort};
    use pretty_assertions::assert_eq;

    fn session(port: MockSerialPort, chunk_size: Option<usize>) -> Session {
        Session::open(&MockOpener::new(port), "mock0", LinkConfig::fast(chunk_size)).unwrap()
    }

    #[test]
    fn test_open_busy_port() {
        let result = Session::open(&MockOpener::busy(), "COM4", LinkConfig::fast(None));
        match result {
            Err(PrintError::PortUnavailable { port, .. }) => assert_eq!(port, "COM4"),
            Err(e) => panic!("wrong error: {}", e),
            Ok(_) => panic!("busy port opened"),
        }
    }

    #[test]
    fn test_send_frame_chunked() {
        let frame = encode(CMD_PRINT, &[b'x'; 64]).unwrap();
        assert_eq!(frame.len(), 70);

        let mock = MockSerialPort::new(vec![], frame.clone());
        let log = mock.log();
        let mut session = session(mock, Some(32));

        session.send_frame(&frame).unwrap();
        session.close();

        let log = log.lock().unwrap();
        assert_eq!(log.write_sizes, vec![32, 32, 6]);
        assert_eq!(log.flushes, 1);
    }

    #[test]
    fn test_send_frame_whole() {
        let frame = encode(CMD_PRINT, b"Hello\n").unwrap();
        let mock = MockSerialPort::new(vec![], frame.clone());
        let log = mock.log();
        let mut session = session(mock, None);

        session.send_frame(&frame).unwrap();
        drop(session);

        assert_eq!(log.lock().unwrap().write_sizes, vec![frame.len()]);
    }

    #[test]
    fn test_await_ack_outcomes() {
        let mock = MockSerialPort::new(vec![Some(ACK), Some(NAK), Some(b'?')], vec![]);
        let mut session = session(mock, None);
        let deadline = Duration::from_millis(30);

        assert_eq!(session.await_ack(deadline).unwrap(), Ack::Acked);
        assert_eq!(session.await_ack(deadline).unwrap(), Ack::Rejected(NAK));
        assert_eq!(session.await_ack(deadline).unwrap(), Ack::Rejected(b'?'));
    }

    #[test]
    fn test_await_ack_timeout() {
        let mock = MockSerialPort::new(vec![None], vec![]);
        let mut session = session(mock, None);

        let start = Instant::now();
        assert_eq!(session.await_ack(Duration::from_millis(20)).unwrap(), Ack::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_await_ack_polls_until_reply() {
        let mock = MockSerialPort::new(vec![None, Some(ACK)], vec![]);
        let mut session = session(mock, None);

        assert_eq!(session.await_ack(Duration::from_millis(200)).unwrap(), Ack::Acked);
    }

    #[test]
    fn test_send_frame_discards_stale_input() {
        let frame = encode(CMD_PRINT, b"Hi\n").unwrap();
        let mock = MockSerialPort::new(vec![Some(ACK)], frame.clone()).with_pending(vec![NAK, NAK]);
        let log = mock.log();
        let mut session = session(mock, None);

        session.send_frame(&frame).unwrap();
        assert_eq!(session.await_ack(Duration::from_millis(30)).unwrap(), Ack::Acked);
        drop(session);
        assert_eq!(log.lock().unwrap().discards, 1);
    }

    #[test]
    fn test_reply_during_write_is_kept() {
        // Printer answers as soon as the checksum byte lands
        for chunk_size in [None, Some(4)] {
            let frame = encode(CMD_PRINT, b"Hello\n").unwrap();
            let mock = MockSerialPort::new(vec![], frame.clone()).reply_after(frame.len(), ACK);
            let mut session = session(mock, chunk_size);

            session.send_frame(&frame).unwrap();
            assert_eq!(
                session.await_ack(Duration::from_millis(50)).unwrap(),
                Ack::Acked,
                "chunk size {:?}",
                chunk_size
            );
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let mock = MockSerialPort::new(vec![], vec![]);
        let mut session = session(mock, None);

        assert!(session.is_open());
        session.close();
        session.close();
        assert!(!session.is_open());

        let err = session.send_raw(INIT).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_abort_interrupts_wait() {
        let abort = Arc::new(AtomicBool::new(false));
        let mock = MockSerialPort::new(vec![], vec![]);
        let mut session = session(mock, None).with_abort(abort.clone());

        session.pause(Duration::from_millis(1)).unwrap();

        abort.store(true, Ordering::SeqCst);
        let err = session.pause(Duration::from_secs(5)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);

        let err = session.await_ack(Duration::from_secs(5)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
    }
}
