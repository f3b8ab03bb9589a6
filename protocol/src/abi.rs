//! Report construction and inbound report parsing.

use crate::checksum::{seal, verify};
use crate::types::{consts, Command, ProtocolConstants};

/// Mask of the 10-bit length inside the status/length field
const LEN_MASK: u16 = 0x03FF;
/// The peer stores `body_len + 4` in the length field
const LEN_BIAS: usize = 4;

/// Decoded view of the 8 byte report header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportHeader {
    pub report_id: u8,
    pub echo: u8,
    pub checksum: u16,
    /// Upper 6 bits of the status/length field
    pub status: u8,
    /// Raw 10-bit length field, `body_len + 4`
    pub len: u16,
    pub command: u8,
    pub index: u8,
}

impl ReportHeader {
    /// Decode a header. Performs no validation.
    pub fn parse(bytes: &[u8; consts::HEADER_SIZE]) -> Self {
        let sta_len = u16::from_le_bytes([bytes[4], bytes[5]]);
        Self {
            report_id: bytes[0],
            echo: bytes[1],
            checksum: u16::from_le_bytes([bytes[2], bytes[3]]),
            status: (sta_len >> 10) as u8,
            len: sta_len & LEN_MASK,
            command: bytes[6],
            index: bytes[7],
        }
    }

    /// Decode the header at the start of a report, if it is long enough
    pub fn from_report(report: &[u8]) -> Option<Self> {
        let bytes = report.get(..consts::HEADER_SIZE)?.try_into().ok()?;
        Some(Self::parse(bytes))
    }

    /// Body length declared by the header
    pub fn body_len(&self) -> usize {
        (self.len as usize).saturating_sub(LEN_BIAS)
    }

    /// Offset one past the last body byte
    pub fn data_end(&self) -> usize {
        self.len as usize + LEN_BIAS
    }
}

/// Build a fast channel request report.
///
/// The body is truncated if it would overflow the report. The checksum is
/// computed last, over the whole report with its field zeroed.
pub fn request(echo: u8, command: u8, index: u8, body: &[u8], report_len: usize) -> Vec<u8> {
    let mut out = vec![0u8; report_len.max(consts::HEADER_SIZE)];
    out[0] = consts::REPORT_ID_FAST;
    out[1] = echo;

    // status is always zero for requests
    let sta_len = ((body.len() + LEN_BIAS) as u16) & LEN_MASK;
    out[4..6].copy_from_slice(&sta_len.to_le_bytes());
    out[6] = command;
    out[7] = index;

    let room = out.len() - consts::HEADER_SIZE;
    let body = &body[..body.len().min(room)];
    out[consts::HEADER_SIZE..consts::HEADER_SIZE + body.len()].copy_from_slice(body);

    seal(&mut out);
    out
}

impl ProtocolConstants {
    /// Build a request with this configuration's echo and report length
    pub fn request(&self, command: Command, index: u8, body: &[u8]) -> Vec<u8> {
        request(self.echo, command.code(), index, body, self.report_len)
    }
}

/// A validated inbound report and its body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response<'a> {
    pub header: ReportHeader,
    pub payload: &'a [u8],
}

impl<'a> Response<'a> {
    /// Validate a raw report read from the device.
    ///
    /// Returns `None` for anything that is not a well formed response to
    /// `command`: short reads, foreign report ids or echoes, checksum
    /// mismatches and lengths pointing outside the report.
    pub fn parse(report: &'a [u8], proto: &ProtocolConstants, command: Command) -> Option<Self> {
        if report.len() < proto.header_size {
            return None;
        }
        let header = ReportHeader::from_report(report)?;
        if header.report_id != proto.report_id
            || !proto.echo_matches(header.echo)
            || header.command != command.code()
        {
            return None;
        }
        if !verify(report, proto.header_size) {
            return None;
        }

        let end = header.data_end();
        if end <= proto.header_size || end > report.len() {
            return None;
        }
        Some(Self {
            header,
            payload: &report[proto.header_size..end],
        })
    }
}

/// Screen parameters reported by the SystemInfo command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemInfo {
    pub width: u16,
    pub height: u16,
    /// Only present in some firmware revisions
    pub refresh_rate: Option<u8>,
}

impl SystemInfo {
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let [w0, w1, h0, h1, rest @ ..] = payload else {
            return None;
        };
        Some(Self {
            width: u16::from_le_bytes([*w0, *w1]),
            height: u16::from_le_bytes([*h0, *h1]),
            refresh_rate: rest.first().copied(),
        })
    }
}

/// One addressed piece of the screen buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenChunk<'a> {
    pub address: u32,
    pub data: &'a [u8],
}

impl<'a> ScreenChunk<'a> {
    /// Split a ScreenBuffer payload into its address and pixel bytes.
    /// Chunks without pixel bytes are rejected.
    pub fn parse(payload: &'a [u8]) -> Option<Self> {
        let (address, data) = payload.split_first_chunk::<4>()?;
        if data.is_empty() {
            return None;
        }
        Some(Self {
            address: u32::from_le_bytes(*address),
            data,
        })
    }

    /// Offset one past the last byte this chunk writes
    pub fn end(&self) -> usize {
        self.address as usize + self.data.len()
    }
}
