//! 16-bit little-endian word-sum checksum.
//!
//! Even offsets contribute the raw byte, odd offsets contribute the byte
//! shifted into the high half. Sums wrap at 16 bits.

/// Byte range of the checksum field inside a report header
pub const CHECKSUM_RANGE: std::ops::Range<usize> = 2..4;

/// Calculate the checksum of a buffer
pub fn checksum(data: &[u8]) -> u16 {
    data.iter().enumerate().fold(0u16, |acc, (i, byte)| {
        acc.wrapping_add(contribution(i, *byte))
    })
}

#[inline(always)]
fn contribution(offset: usize, byte: u8) -> u16 {
    if offset & 1 == 0 {
        byte as u16
    } else {
        (byte as u16) << 8
    }
}

/// Read the checksum stored in a report header
pub fn stored_checksum(report: &[u8]) -> Option<u16> {
    let bytes = report.get(CHECKSUM_RANGE)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Verify a report against its stored checksum.
///
/// The checksum field is treated as zero while recomputing. Buffers shorter
/// than `header_size` never verify.
pub fn verify(report: &[u8], header_size: usize) -> bool {
    if report.len() < header_size.max(CHECKSUM_RANGE.end) {
        return false;
    }
    let Some(stored) = stored_checksum(report) else {
        return false;
    };
    let computed = report.iter().enumerate().fold(0u16, |acc, (i, byte)| {
        let byte = if CHECKSUM_RANGE.contains(&i) { 0 } else { *byte };
        acc.wrapping_add(contribution(i, byte))
    });
    computed == stored
}

/// Compute the checksum over a report with its checksum field zeroed, and
/// write it into the field.
pub fn seal(report: &mut [u8]) {
    if report.len() < CHECKSUM_RANGE.end {
        return;
    }
    report[CHECKSUM_RANGE].fill(0);
    let crc = checksum(report);
    report[CHECKSUM_RANGE].copy_from_slice(&crc.to_le_bytes());
}
