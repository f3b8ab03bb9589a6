//! One-shot request/response queries.

use std::time::Instant;

use sayo_protocol::{Command, ProtocolConstants, Response, SystemInfo};
use tracing::{debug, trace};

use crate::error::{CaptureError, Result};
use crate::transport::{Transport, MAX_READ_FAILURES};

/// Validated, non-zero screen dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u16,
    pub height: u16,
}

impl ScreenSize {
    pub fn new(width: u16, height: u16) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CaptureError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    /// Bytes in one RGB565 frame
    pub fn frame_len(&self) -> usize {
        sayo_protocol::frame_len(self.width, self.height)
    }
}

impl std::fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Send a SystemInfo request and wait for its answer.
///
/// Returns `Ok(None)` when no valid response arrives within the command
/// timeout. A failed write, or `MAX_READ_FAILURES` failed reads in a row,
/// means the device is gone.
pub fn query_system_info<T: Transport + ?Sized>(
    transport: &mut T,
    proto: &ProtocolConstants,
) -> Result<Option<SystemInfo>> {
    let request = proto.request(Command::SystemInfo, 0, &[]);
    transport
        .write_report(&request)
        .map_err(CaptureError::Disconnected)?;

    let mut buf = vec![0u8; proto.report_len];
    let start = Instant::now();
    let mut failures = 0u32;
    while start.elapsed() < proto.command_timeout {
        let n = match transport.read_report(&mut buf, proto.read_timeout) {
            Ok(n) => {
                failures = 0;
                n
            },
            Err(e) => {
                failures += 1;
                if failures >= MAX_READ_FAILURES {
                    return Err(CaptureError::Disconnected(e));
                }
                trace!("system info read failed ({failures}/{MAX_READ_FAILURES}): {e}");
                continue;
            },
        };
        if n == 0 {
            continue;
        }
        let Some(info) = Response::parse(&buf[..n], proto, Command::SystemInfo)
            .and_then(|res| SystemInfo::parse(res.payload))
        else {
            trace!("discarding {n} byte report");
            continue;
        };
        debug!("system info: {info:?}");
        return Ok(Some(info));
    }

    debug!("system info query timed out after {:?}", proto.command_timeout);
    Ok(None)
}

/// Query the LCD size. Zero dimensions are rejected.
pub fn query_screen_size<T: Transport + ?Sized>(
    transport: &mut T,
    proto: &ProtocolConstants,
) -> Result<Option<ScreenSize>> {
    query_system_info(transport, proto)?
        .map(|info| ScreenSize::new(info.width, info.height))
        .transpose()
}

/// Query the LCD refresh rate, if the firmware reports one
pub fn query_refresh_rate<T: Transport + ?Sized>(
    transport: &mut T,
    proto: &ProtocolConstants,
) -> Result<Option<u8>> {
    Ok(query_system_info(transport, proto)?.and_then(|info| info.refresh_rate))
}
