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

//! Receipt printer protocol constants

// ============================================================================
// Packet Framing
// ============================================================================

/// Start of text - first byte of every packet frame
pub const STX: u8 = 0x02;

/// End of text - closes the command and payload, last byte covered by the checksum
pub const ETX: u8 = 0x03;

/// Acknowledge - printer accepted the frame
pub const ACK: u8 = 0x06;

/// Negative acknowledge - printer rejected the frame
pub const NAK: u8 = 0x15;

/// Print command - payload is text bytes or an ESC/POS control sequence
pub const CMD_PRINT: u8 = 0x20;

/// Largest payload the 16-bit length field can describe (it also counts the command byte)
pub const MAX_PAYLOAD: usize = u16::MAX as usize - 1;

// ============================================================================
// ESC/POS Sequences
// ============================================================================

/// Initialize printer
pub const INIT: &[u8] = &[0x1B, 0x40];

/// Line feed
pub const LF: u8 = 0x0A;

/// Full cut
pub const FULL_CUT: &[u8] = &[0x1D, 0x56, 0x00];

/// Partial cut
pub const PARTIAL_CUT: &[u8] = &[0x1D, 0x56, 0x01];

/// Feed then cut, followed by one byte giving the feed amount
pub const FEED_AND_CUT: &[u8] = &[0x1D, 0x56, 0x42];

/// Feed amount sent after FEED_AND_CUT
pub const CUT_FEED_AMOUNT: u8 = 0x50;

/// Left alignment
pub const ALIGN_LEFT: &[u8] = &[0x1B, 0x61, 0x00];

/// Normal character size
pub const TEXT_NORMAL: &[u8] = &[0x1B, 0x21, 0x00];

/// Enter Korean (double byte) character mode
pub const KOREAN_MODE: &[u8] = &[0x1C, 0x26];

/// Leave Korean character mode
pub const ASCII_MODE: &[u8] = &[0x1C, 0x2E];
