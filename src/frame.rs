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

//! Packet frame codec
//!
//! Frame layout: `STX | LEN_HI | LEN_LO | CMD | PAYLOAD... | ETX | CHECKSUM`
//!
//! `LEN` counts the command byte plus the payload. The checksum is the XOR of
//! every byte from `CMD` through `ETX`; the start marker and the length bytes
//! are outside the checksum domain.

use thiserror::Error;
use crate::protocol::*;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("payload of {len} bytes exceeds the {max} byte frame limit", max = MAX_PAYLOAD)]
    PayloadTooLong { len: usize },
}

// ============================================================================
// Acknowledgment
// ============================================================================

/// Meaning of a single byte read back from the printer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckByte {
    Acked,
    Rejected,
    Unknown(u8),
}

pub fn decode_ack(byte: u8) -> AckByte {
    match byte {
        ACK => AckByte::Acked,
        NAK => AckByte::Rejected,
        other => AckByte::Unknown(other),
    }
}

// ============================================================================
// Encoding
// ============================================================================

pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Build a ready-to-transmit frame for `command` carrying `payload`.
pub fn encode(command: u8, payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLong { len: payload.len() });
    }

    let length = (payload.len() + 1) as u16;

    let mut frame = Vec::with_capacity(payload.len() + 6);
    frame.push(STX);
    frame.extend_from_slice(&length.to_be_bytes());
    frame.push(command);
    frame.extend_from_slice(payload);
    frame.push(ETX);

    let lrc = checksum(&frame[3..]);
    frame.push(lrc);

    Ok(frame)
}

/// Upper-case hex dump used in debug logs
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_layout() {
        let frame = encode(CMD_PRINT, b"Hi").unwrap();
        let lrc = CMD_PRINT ^ b'H' ^ b'i' ^ ETX;
        assert_eq!(frame, vec![STX, 0x00, 0x03, CMD_PRINT, b'H', b'i', ETX, lrc]);
    }

    #[test]
    fn test_encode_empty_payload() {
        let frame = encode(CMD_PRINT, &[]).unwrap();
        assert_eq!(frame, vec![STX, 0x00, 0x01, CMD_PRINT, ETX, CMD_PRINT ^ ETX]);
    }

    #[test]
    fn test_checksum_excludes_start_and_length() {
        // Long enough that both length bytes are non-zero
        let payload: Vec<u8> = (0..300).map(|i| (i % 251) as u8).collect();
        let frame = encode(CMD_PRINT, &payload).unwrap();

        assert_eq!(&frame[1..3], &[0x01, 0x2D]);

        let n = frame.len() - 2;
        assert_eq!(frame[n], ETX);
        assert_eq!(frame[n + 1], checksum(&frame[3..=n]));
        assert_ne!(frame[n + 1], checksum(&frame[..=n]));
    }

    #[test]
    fn test_checksum_recomputes_for_many_payloads() {
        for len in [0usize, 1, 2, 31, 32, 33, 255, 256, 1024, MAX_PAYLOAD] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 + len) as u8).collect();
            let frame = encode(0x41, &payload).unwrap();
            let length = u16::from_be_bytes([frame[1], frame[2]]) as usize;
            assert_eq!(length, len + 1);
            let n = frame.len() - 2;
            assert_eq!(frame[n + 1], checksum(&frame[3..=n]), "payload length {}", len);
        }
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = vec![0u8; 65535];
        assert_eq!(
            encode(CMD_PRINT, &payload),
            Err(FrameError::PayloadTooLong { len: 65535 })
        );
    }

    #[test]
    fn test_decode_ack() {
        assert_eq!(decode_ack(ACK), AckByte::Acked);
        assert_eq!(decode_ack(NAK), AckByte::Rejected);
        for byte in 0..=255u8 {
            if byte != ACK && byte != NAK {
                assert_eq!(decode_ack(byte), AckByte::Unknown(byte));
            }
        }
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x02, 0x00, 0xAB]), "02 00 AB");
        assert_eq!(hex(&[]), "");
    }
}
