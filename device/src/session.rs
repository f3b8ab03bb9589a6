//! Screen buffer capture cycles.
//!
//! A cycle writes one ScreenBuffer request, then polls bounded reads and
//! places every valid chunk into the frame until coverage is reached, the
//! device goes quiet after covering the frame, or the command deadline
//! passes. Invalid packets are dropped without ending the cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use sayo_protocol::{Command, FrameAssembler, FrameBuffer, ProtocolConstants, Response, ScreenChunk};
use tracing::trace;

use crate::error::{CaptureError, Result};
use crate::transport::{Transport, MAX_READ_FAILURES};

/// Summary of a single capture cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Valid screen buffer reports received
    pub packets: u32,
    /// Coverage reached, capped at the frame size
    pub bytes_covered: usize,
    /// Frame size in bytes
    pub expected: usize,
    pub elapsed: Duration,
}

/// How a capture cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Coverage reached the full frame
    Complete(CaptureStats),
    /// Deadline passed with some coverage. The frame is still usable.
    Partial(CaptureStats),
    /// Deadline passed without a single chunk
    NoData(CaptureStats),
}

impl CaptureOutcome {
    pub fn stats(&self) -> &CaptureStats {
        match self {
            Self::Complete(s) | Self::Partial(s) | Self::NoData(s) => s,
        }
    }

    /// Whether the frame buffer holds anything worth presenting
    pub fn has_frame(&self) -> bool {
        !matches!(self, Self::NoData(_))
    }
}

/// Owns a transport and runs capture cycles on it
#[derive(Debug)]
pub struct CaptureSession<T> {
    transport: T,
    proto: ProtocolConstants,
    scratch: Vec<u8>,
}

impl<T: Transport> CaptureSession<T> {
    pub fn new(transport: T, proto: ProtocolConstants) -> Self {
        let scratch = vec![0u8; proto.report_len];
        Self {
            transport,
            proto,
            scratch,
        }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Run one capture cycle into `frame`.
    ///
    /// The frame is zeroed first and keeps its allocation. When `stop` is
    /// given it is checked between reads, and a stop request ends the cycle
    /// with whatever coverage was reached.
    pub fn capture(
        &mut self,
        frame: &mut FrameBuffer,
        stop: Option<&AtomicBool>,
    ) -> Result<CaptureOutcome> {
        if frame.is_empty() {
            return Err(CaptureError::InvalidDimensions {
                width: frame.width(),
                height: frame.height(),
            });
        }
        frame.clear();
        if self.scratch.len() != self.proto.report_len {
            self.scratch = vec![0u8; self.proto.report_len];
        }

        let proto = &self.proto;
        let request = proto.request(Command::ScreenBuffer, 0, &[]);
        let t0 = Instant::now();
        self.transport
            .write_report(&request)
            .map_err(CaptureError::Disconnected)?;

        let mut assembler = FrameAssembler::new(frame.as_bytes_mut());
        let mut packets = 0u32;
        let mut failures = 0u32;
        let mut last_chunk = Instant::now();

        while t0.elapsed() < proto.command_timeout {
            if stop.is_some_and(|s| s.load(Ordering::Relaxed)) {
                trace!("capture interrupted by stop request");
                break;
            }

            let n = match self.transport.read_report(&mut self.scratch, proto.read_timeout) {
                Ok(n) => {
                    failures = 0;
                    n
                },
                Err(e) => {
                    failures += 1;
                    if failures >= MAX_READ_FAILURES {
                        return Err(CaptureError::Disconnected(e));
                    }
                    trace!("read failed ({failures}/{MAX_READ_FAILURES}): {e}");
                    0
                },
            };

            if n == 0 {
                // nothing more coming for an already covered frame
                if assembler.is_covered() && last_chunk.elapsed() > proto.idle_break {
                    break;
                }
                continue;
            }

            let Some(response) = Response::parse(&self.scratch[..n], proto, Command::ScreenBuffer)
            else {
                trace!("discarding {n} byte report");
                continue;
            };
            packets += 1;

            let Some(chunk) = ScreenChunk::parse(response.payload) else {
                continue;
            };
            if !assembler.push(&chunk) {
                trace!(
                    "dropping chunk at 0x{:x} (+{}) outside {} byte frame",
                    chunk.address,
                    chunk.data.len(),
                    assembler.expected()
                );
                continue;
            }
            last_chunk = Instant::now();

            if proto.exit_on_coverage && assembler.is_covered() {
                break;
            }
        }

        let expected = assembler.expected();
        let stats = CaptureStats {
            packets,
            bytes_covered: assembler.max_end().min(expected),
            expected,
            elapsed: t0.elapsed(),
        };
        trace!("capture cycle: {stats:?}");

        Ok(if assembler.is_covered() {
            CaptureOutcome::Complete(stats)
        } else if assembler.max_end() > 0 {
            CaptureOutcome::Partial(stats)
        } else {
            CaptureOutcome::NoData(stats)
        })
    }
}
