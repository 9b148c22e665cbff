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

//! Print orchestration: turns text into framed handshakes (or raw ESC/POS)

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use encoding_rs::Encoding;
use log::{debug, info, warn};
use crate::charset;
use crate::config::{CutMode, JobConfig, TransportMode};
use crate::error::{PrintError, Stage};
use crate::frame::encode;
use crate::protocol::*;
use crate::serial::PortOpener;
use crate::session::{Ack, Session};

/// Settle time after INIT in raw mode
const INIT_SETTLE: Duration = Duration::from_millis(100);

/// Settle time around leaving Korean mode and cutting in raw mode
const CUT_SETTLE: Duration = Duration::from_millis(200);

/// Blank lines fed by the self test before it cuts
const SELF_TEST_FEEDS: usize = 5;

/// Spacing between self test feeds in raw mode
const SELF_TEST_SPACING: Duration = Duration::from_millis(50);

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub lines: usize,
    /// Frames written, resends included
    pub frames: usize,
    pub retries: usize,
}

// ============================================================================
// Printer
// ============================================================================

pub struct Printer<O> {
    opener: O,
    config: JobConfig,
    abort: Option<Arc<AtomicBool>>,
}

impl<O: PortOpener> Printer<O> {
    pub fn new(opener: O, config: JobConfig) -> Self {
        Printer { opener, config, abort: None }
    }

    pub fn with_abort(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = Some(abort);
        self
    }

    /// Print `text` on `port_name` and report one outcome for the whole job.
    ///
    /// Lines are encoded before the port is opened, so an unprintable line
    /// fails the job without any output.
    pub fn print(&self, port_name: &str, text: &str) -> Result<JobReport, PrintError> {
        let chain = charset::resolve(&self.config.charsets);
        let lines = encode_lines(text, &chain)?;
        info!("Printing {} lines to {} ({:?})", lines.len(), port_name, self.config.mode);

        let session = self.open(port_name)?;
        let report = match self.config.mode {
            TransportMode::Packet => run_packet_job(PacketJob::new(session, lines, 1, self.config.cut)),
            TransportMode::Raw => print_raw(session, &lines, &self.config),
        }?;

        info!("Printed {} lines in {} frames", report.lines, report.frames);
        Ok(report)
    }

    /// Feed a few blank lines and cut, to check the link and the cutter
    pub fn self_test(&self, port_name: &str) -> Result<JobReport, PrintError> {
        info!("Self test on {} ({:?})", port_name, self.config.mode);

        let session = self.open(port_name)?;
        let report = match self.config.mode {
            TransportMode::Packet => {
                run_packet_job(PacketJob::new(session, Vec::new(), SELF_TEST_FEEDS, self.config.cut))
            }
            TransportMode::Raw => self_test_raw(session, self.config.cut),
        }?;

        info!("Self test finished in {} frames", report.frames);
        Ok(report)
    }

    fn open(&self, port_name: &str) -> Result<Session, PrintError> {
        let session = Session::open(&self.opener, port_name, self.config.link.clone())?;
        Ok(match &self.abort {
            Some(abort) => session.with_abort(abort.clone()),
            None => session,
        })
    }
}

/// Split on newlines; a trailing CR is dropped and blank lines become empty
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .map(|line| if line.trim().is_empty() { "" } else { line })
        .collect()
}

/// Encode every line, each with the first charset that can represent it
fn encode_lines(text: &str, chain: &[&'static Encoding]) -> Result<Vec<Vec<u8>>, PrintError> {
    split_lines(text)
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            if line.is_empty() {
                return Ok(Vec::new());
            }
            match charset::encode_line(line, chain) {
                Some((bytes, encoding)) => {
                    debug!("Line {} encoded as {}", i + 1, encoding.name());
                    Ok(bytes)
                }
                None => Err(PrintError::EncodingExhausted { line: i + 1 }),
            }
        })
        .collect()
}

fn run_packet_job(mut state: Box<dyn JobState>) -> Result<JobReport, PrintError> {
    loop {
        match state.step()? {
            Step::Next(next) => state = next,
            Step::Done(report) => return Ok(report),
        }
    }
}

// ============================================================================
// Packet Job States
// ============================================================================

pub struct PrintLines;
pub struct FeedPaper;
pub struct CutPaper;

pub enum Step {
    Next(Box<dyn JobState>),
    Done(JobReport),
}

pub trait JobState: Send {
    fn step(self: Box<Self>) -> Result<Step, PrintError>;
}

pub struct PacketJob<State> {
    state: PhantomData<State>,
    session: Session,
    lines: Vec<Vec<u8>>,
    line_idx: usize,
    /// Line feed frames still to send after the text
    feeds: usize,
    cut: CutMode,
    report: JobReport,
}

impl PacketJob<PrintLines> {
    pub fn new(session: Session, lines: Vec<Vec<u8>>, feeds: usize, cut: CutMode) -> Box<dyn JobState> {
        Box::new(PacketJob {
            state: PhantomData::<PrintLines>,
            session,
            lines,
            line_idx: 0,
            feeds,
            cut,
            report: JobReport::default(),
        })
    }
}

impl<S> PacketJob<S> {
    fn transition<T>(self) -> Box<PacketJob<T>> {
        Box::new(PacketJob {
            state: PhantomData,
            session: self.session,
            lines: self.lines,
            line_idx: self.line_idx,
            feeds: self.feeds,
            cut: self.cut,
            report: self.report,
        })
    }

    /// Send one frame and wait for its acknowledgment, resending up to the
    /// configured retry count on NAK or timeout.
    fn handshake(&mut self, stage: Stage, payload: &[u8]) -> Result<(), PrintError> {
        let frame = encode(CMD_PRINT, payload)
            .map_err(|source| PrintError::ChecksumBuild { stage, source })?;
        let link = self.session.link().clone();

        let mut attempt = 0;
        loop {
            self.session.send_frame(&frame).map_err(|e| PrintError::io(stage, e))?;
            self.report.frames += 1;

            let ack = self.session.await_ack(link.ack_timeout).map_err(|e| PrintError::io(stage, e))?;
            match ack {
                Ack::Acked => {
                    debug!("{}: ACK", stage);
                    return self.session.pause(link.frame_delay).map_err(|e| PrintError::io(stage, e));
                }
                Ack::Rejected(byte) if attempt >= link.retries => {
                    return Err(PrintError::AckRejected { stage, byte });
                }
                Ack::TimedOut if attempt >= link.retries => {
                    return Err(PrintError::AckTimeout { stage });
                }
                other => {
                    attempt += 1;
                    self.report.retries += 1;
                    warn!("{}: {:?}, resending ({}/{})", stage, other, attempt, link.retries);
                }
            }
        }
    }
}

impl JobState for PacketJob<PrintLines> {
    fn step(self: Box<Self>) -> Result<Step, PrintError> {
        let mut job = *self;

        if job.line_idx >= job.lines.len() {
            return Ok(Step::Next(job.transition::<FeedPaper>()));
        }

        let mut payload = std::mem::take(&mut job.lines[job.line_idx]);
        payload.push(LF);
        job.line_idx += 1;

        job.handshake(Stage::Line(job.line_idx), &payload)?;
        job.report.lines += 1;

        Ok(Step::Next(Box::new(job)))
    }
}

impl JobState for PacketJob<FeedPaper> {
    fn step(self: Box<Self>) -> Result<Step, PrintError> {
        let mut job = *self;

        if job.feeds == 0 {
            return Ok(Step::Next(job.transition::<CutPaper>()));
        }

        job.handshake(Stage::Feed, &[LF])?;
        job.feeds -= 1;

        Ok(Step::Next(Box::new(job)))
    }
}

impl JobState for PacketJob<CutPaper> {
    fn step(self: Box<Self>) -> Result<Step, PrintError> {
        let mut job = *self;
        let cut = job.cut.command();
        job.handshake(Stage::Cut, &cut)?;
        job.session.close();
        Ok(Step::Done(job.report))
    }
}

// ============================================================================
// Raw ESC/POS
// ============================================================================

/// Write ESC/POS straight to the port. Without acknowledgments only I/O
/// errors can be detected.
fn print_raw(mut session: Session, lines: &[Vec<u8>], config: &JobConfig) -> Result<JobReport, PrintError> {
    let settle = config.link.frame_delay;
    let setup = |e| PrintError::io(Stage::Setup, e);

    session.send_raw(INIT).map_err(setup)?;
    session.pause(INIT_SETTLE).map_err(setup)?;

    for cmd in [ALIGN_LEFT, TEXT_NORMAL, KOREAN_MODE] {
        session.send_raw(cmd).map_err(setup)?;
        session.pause(settle).map_err(setup)?;
    }

    for (i, line) in lines.iter().enumerate() {
        let stage = Stage::Line(i + 1);
        let mut bytes = line.clone();
        bytes.push(LF);
        session.send_raw(&bytes).map_err(|e| PrintError::io(stage, e))?;
    }

    let feed = |e| PrintError::io(Stage::Feed, e);
    for _ in 0..config.blank_feeds {
        session.send_raw(&[LF]).map_err(feed)?;
    }
    session.pause(CUT_SETTLE).map_err(feed)?;

    let cut = |e| PrintError::io(Stage::Cut, e);
    session.send_raw(ASCII_MODE).map_err(cut)?;
    session.pause(CUT_SETTLE).map_err(cut)?;
    session.send_raw(&config.cut.command()).map_err(cut)?;
    session.close();

    Ok(JobReport { lines: lines.len(), frames: 0, retries: 0 })
}

fn self_test_raw(mut session: Session, cut: CutMode) -> Result<JobReport, PrintError> {
    let setup = |e| PrintError::io(Stage::Setup, e);
    session.send_raw(INIT).map_err(setup)?;
    session.pause(INIT_SETTLE).map_err(setup)?;

    let feed = |e| PrintError::io(Stage::Feed, e);
    for _ in 0..SELF_TEST_FEEDS {
        session.send_raw(&[LF]).map_err(feed)?;
        session.pause(SELF_TEST_SPACING).map_err(feed)?;
    }

    session.send_raw(&cut.command()).map_err(|e| PrintError::io(Stage::Cut, e))?;
    session.close();

    Ok(JobReport::default())
}

// ============================================================================
// Tests
// ============================================================================
