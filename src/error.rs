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

//! Print job error types

use std::fmt;
use thiserror::Error;
use crate::frame::FrameError;

/// Where in a job a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    /// 1-based line index
    Line(usize),
    Feed,
    Cut,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Setup => write!(f, "printer setup"),
            Stage::Line(n) => write!(f, "line {}", n),
            Stage::Feed => write!(f, "trailing feed"),
            Stage::Cut => write!(f, "paper cut"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("cannot open port {port}: {source}")]
    PortUnavailable {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("no configured character set can encode line {line}")]
    EncodingExhausted { line: usize },

    #[error("failed to build frame for {stage}: {source}")]
    ChecksumBuild {
        stage: Stage,
        #[source]
        source: FrameError,
    },

    #[error("write failed during {stage}: {source}")]
    WriteFailure {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    #[error("no acknowledgment for {stage}")]
    AckTimeout { stage: Stage },

    #[error("printer rejected {stage} (received 0x{byte:02X})")]
    AckRejected { stage: Stage, byte: u8 },

    #[error("interrupted during {stage}")]
    Interrupted { stage: Stage },
}

impl PrintError {
    /// Stage the error is attributed to, if it happened after the port was opened
    #[cfg(test)]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PrintError::PortUnavailable { .. } => None,
            PrintError::EncodingExhausted { line } => Some(Stage::Line(*line)),
            PrintError::ChecksumBuild { stage, .. }
            | PrintError::WriteFailure { stage, .. }
            | PrintError::AckTimeout { stage }
            | PrintError::AckRejected { stage, .. }
            | PrintError::Interrupted { stage } => Some(*stage),
        }
    }

    /// Map an I/O error from the session onto the stage that was running
    pub fn io(stage: Stage, e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::Interrupted {
            PrintError::Interrupted { stage }
        } else {
            PrintError::WriteFailure { stage, source: e }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Line(2).to_string(), "line 2");
        assert_eq!(Stage::Feed.to_string(), "trailing feed");
        assert_eq!(Stage::Cut.to_string(), "paper cut");
    }

    #[test]
    fn test_io_mapping() {
        let e = PrintError::io(
            Stage::Line(3),
            std::io::Error::new(std::io::ErrorKind::Interrupted, "abort"),
        );
        assert!(matches!(e, PrintError::Interrupted { stage: Stage::Line(3) }));

        let e = PrintError::io(
            Stage::Cut,
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"),
        );
        assert!(matches!(e, PrintError::WriteFailure { stage: Stage::Cut, .. }));
        assert_eq!(e.stage(), Some(Stage::Cut));
    }

    #[test]
    fn test_rejected_message() {
        let e = PrintError::AckRejected { stage: Stage::Line(1), byte: 0x15 };
        assert_eq!(e.to_string(), "printer rejected line 1 (received 0x15)");
    }
}
