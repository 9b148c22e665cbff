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

//! Transport presets and per-job settings

use std::time::Duration;
use clap::ValueEnum;
use crate::protocol::*;

/// Charset labels tried in order when encoding a line
pub const DEFAULT_CHARSETS: &[&str] = &["euc-kr", "windows-949", "ks_c_5601-1987"];

/// Blank lines fed after the text in raw mode so the cut clears the last line
pub const DEFAULT_BLANK_FEEDS: usize = 3;

// ============================================================================
// Link Settings
// ============================================================================

/// Serial line and handshake timing for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    pub baud_rate: u32,
    pub write_timeout: Duration,
    /// Deadline for a single acknowledgment byte
    pub ack_timeout: Duration,
    /// Sleep between acknowledgment polls
    pub poll_interval: Duration,
    /// Frames are written in pieces of this size; None writes the whole frame at once
    pub chunk_size: Option<usize>,
    /// Pacing after each chunk, the receiver's input buffer overruns without it
    pub chunk_delay: Duration,
    /// Settle time after an acknowledged frame or a raw command
    pub frame_delay: Duration,
    /// Extra attempts per frame after a NAK or timeout
    pub retries: u8,
}

#[cfg(test)]
impl LinkConfig {
    /// Millisecond-scale timing so scripted sessions finish quickly
    pub fn fast(chunk_size: Option<usize>) -> Self {
        LinkConfig {
            baud_rate: 115_200,
            write_timeout: Duration::from_millis(10),
            ack_timeout: Duration::from_millis(30),
            poll_interval: Duration::from_millis(2),
            chunk_size,
            chunk_delay: Duration::from_millis(1),
            frame_delay: Duration::ZERO,
            retries: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// STX/ETX frames, one acknowledgment per frame
    Packet,
    /// ESC/POS bytes written straight to the port, no acknowledgment
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// 115200 baud framed packets, 32 byte chunks paced at 20 ms
    Packet,
    /// 115200 baud framed packets written whole
    PacketUnchunked,
    /// 9600 baud raw ESC/POS
    Raw,
}

impl Preset {
    pub fn mode(self) -> TransportMode {
        match self {
            Preset::Packet | Preset::PacketUnchunked => TransportMode::Packet,
            Preset::Raw => TransportMode::Raw,
        }
    }

    pub fn link(self) -> LinkConfig {
        match self {
            Preset::Packet => LinkConfig {
                baud_rate: 115_200,
                write_timeout: Duration::from_millis(1000),
                ack_timeout: Duration::from_millis(3000),
                poll_interval: Duration::from_millis(100),
                chunk_size: Some(32),
                chunk_delay: Duration::from_millis(20),
                frame_delay: Duration::ZERO,
                retries: 0,
            },
            Preset::PacketUnchunked => LinkConfig {
                baud_rate: 115_200,
                write_timeout: Duration::from_millis(1000),
                ack_timeout: Duration::from_millis(1000),
                poll_interval: Duration::from_millis(100),
                chunk_size: None,
                chunk_delay: Duration::ZERO,
                frame_delay: Duration::from_millis(50),
                retries: 0,
            },
            Preset::Raw => LinkConfig {
                baud_rate: 9600,
                write_timeout: Duration::from_millis(2000),
                ack_timeout: Duration::from_millis(2000),
                poll_interval: Duration::from_millis(100),
                chunk_size: None,
                chunk_delay: Duration::ZERO,
                frame_delay: Duration::ZERO,
                retries: 0,
            },
        }
    }

    pub fn cut(self) -> CutMode {
        match self {
            Preset::Packet | Preset::PacketUnchunked => CutMode::Full,
            Preset::Raw => CutMode::Feed,
        }
    }
}

// ============================================================================
// Cutting
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CutMode {
    Full,
    Partial,
    /// Feed then full cut
    Feed,
}

impl CutMode {
    pub fn command(self) -> Vec<u8> {
        match self {
            CutMode::Full => FULL_CUT.to_vec(),
            CutMode::Partial => PARTIAL_CUT.to_vec(),
            CutMode::Feed => {
                let mut cmd = FEED_AND_CUT.to_vec();
                cmd.push(CUT_FEED_AMOUNT);
                cmd
            }
        }
    }
}

// ============================================================================
// Job Settings
// ============================================================================

#[derive(Debug, Clone)]
pub struct JobConfig {
    pub link: LinkConfig,
    pub mode: TransportMode,
    pub cut: CutMode,
    pub charsets: Vec<String>,
    pub blank_feeds: usize,
}

impl JobConfig {
    pub fn from_preset(preset: Preset) -> Self {
        JobConfig {
            link: preset.link(),
            mode: preset.mode(),
            cut: preset.cut(),
            charsets: DEFAULT_CHARSETS.iter().map(|s| s.to_string()).collect(),
            blank_feeds: DEFAULT_BLANK_FEEDS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_pair_baud_with_mode() {
        assert_eq!(Preset::Packet.mode(), TransportMode::Packet);
        assert_eq!(Preset::Packet.link().baud_rate, 115_200);
        assert_eq!(Preset::PacketUnchunked.link().chunk_size, None);
        assert_eq!(Preset::Raw.mode(), TransportMode::Raw);
        assert_eq!(Preset::Raw.link().baud_rate, 9600);
    }

    #[test]
    fn test_no_retries_by_default() {
        for preset in Preset::value_variants() {
            assert_eq!(preset.link().retries, 0);
        }
    }

    #[test]
    fn test_cut_commands() {
        assert_eq!(CutMode::Full.command(), vec![0x1D, 0x56, 0x00]);
        assert_eq!(CutMode::Partial.command(), vec![0x1D, 0x56, 0x01]);
        assert_eq!(CutMode::Feed.command(), vec![0x1D, 0x56, 0x42, 0x50]);
    }

    #[test]
    fn test_job_defaults() {
        let job = JobConfig::from_preset(Preset::Raw);
        assert_eq!(job.cut, CutMode::Feed);
        assert_eq!(job.charsets, vec!["euc-kr", "windows-949", "ks_c_5601-1987"]);
        assert_eq!(job.blank_feeds, 3);
    }
}
