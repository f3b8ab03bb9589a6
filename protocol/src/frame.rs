//! RGB565 frame buffer and chunk reassembly.

use crate::abi::ScreenChunk;

/// Bytes per RGB565 pixel
pub const BYTES_PER_PIXEL: usize = 2;

/// A tightly packed little-endian RGB565 raster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u16,
    height: u16,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; frame_len(width, height)],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Raw RGB565 bytes, exactly `width * height * 2` long
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Zero the raster in place
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Decode the pixel at (x, y) into RGB888 components
    pub fn rgb888(&self, x: u16, y: u16) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = [self.pixels[i], self.pixels[i + 1]];
        Some(rgb565::Rgb565::from_rgb565_le(px).to_rgb888_components())
    }
}

/// Byte length of a `width * height` RGB565 frame
pub fn frame_len(width: u16, height: u16) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// Accumulates addressed chunks into a destination buffer and tracks the
/// highest offset written.
///
/// Coverage (`max_end`) is a completeness heuristic: chunks may arrive out of
/// order or leave holes, so reaching the frame size does not prove every byte
/// was written.
#[derive(Debug)]
pub struct FrameAssembler<'a> {
    buf: &'a mut [u8],
    max_end: usize,
    chunks: u32,
}

impl<'a> FrameAssembler<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self {
            buf,
            max_end: 0,
            chunks: 0,
        }
    }

    /// Place `data` at `address`.
    ///
    /// Overlapping chunks overwrite earlier bytes. Chunks reaching past the
    /// end of the buffer are dropped whole and do not count towards coverage.
    /// Returns whether the chunk was written.
    pub fn write(&mut self, address: u32, data: &[u8]) -> bool {
        let start = address as usize;
        let Some(end) = start.checked_add(data.len()) else {
            return false;
        };
        if data.is_empty() || end > self.buf.len() {
            return false;
        }
        self.buf[start..end].copy_from_slice(data);
        self.max_end = self.max_end.max(end);
        self.chunks += 1;
        true
    }

    /// Place a parsed screen buffer chunk
    pub fn push(&mut self, chunk: &ScreenChunk<'_>) -> bool {
        self.write(chunk.address, chunk.data)
    }

    /// Highest offset written so far
    pub fn max_end(&self) -> usize {
        self.max_end
    }

    /// Number of chunks written
    pub fn chunks(&self) -> u32 {
        self.chunks
    }

    pub fn expected(&self) -> usize {
        self.buf.len()
    }

    /// Coverage has reached the end of the buffer
    pub fn is_covered(&self) -> bool {
        self.max_end >= self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_chunks_last_write_wins() {
        let mut buf = vec![0u8; 200];
        let mut asm = FrameAssembler::new(&mut buf);
        assert!(asm.write(0, &[0x11; 100]));
        assert!(asm.write(50, &[0x22; 100]));
        assert_eq!(asm.max_end(), 150);
        assert_eq!(asm.chunks(), 2);
        assert!(!asm.is_covered());

        assert!(buf[..50].iter().all(|b| *b == 0x11));
        assert!(buf[50..150].iter().all(|b| *b == 0x22));
        assert!(buf[150..].iter().all(|b| *b == 0));
    }

    #[test]
    fn out_of_range_chunk_is_dropped() {
        let mut buf = vec![0u8; 100];
        let mut asm = FrameAssembler::new(&mut buf);
        assert!(!asm.write(90, &[0xFF; 20]));
        assert_eq!(asm.max_end(), 0);
        assert_eq!(asm.chunks(), 0);
        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn dropped_chunk_keeps_prior_coverage() {
        let mut buf = vec![0u8; 100];
        let mut asm = FrameAssembler::new(&mut buf);
        asm.write(0, &[1; 40]);
        asm.write(u32::MAX, &[2; 8]);
        asm.write(95, &[3; 6]);
        assert_eq!(asm.max_end(), 40);
        assert!(buf[40..].iter().all(|b| *b == 0));
    }

    #[test]
    fn out_of_order_chunks_cover_frame() {
        let mut buf = vec![0u8; 64];
        let mut asm = FrameAssembler::new(&mut buf);
        let data: Vec<u8> = (0..64u8).collect();
        for start in [48usize, 0, 32, 16] {
            asm.write(start as u32, &data[start..start + 16]);
        }
        assert!(asm.is_covered());
        assert_eq!(buf, data);
    }

    #[test]
    fn push_parsed_chunk() {
        let payload = [0x02, 0x00, 0x00, 0x00, 0xAB, 0xCD];
        let chunk = ScreenChunk::parse(&payload).unwrap();
        let mut buf = vec![0u8; 4];
        let mut asm = FrameAssembler::new(&mut buf);
        assert!(asm.push(&chunk));
        assert!(asm.is_covered());
        assert_eq!(buf, [0, 0, 0xAB, 0xCD]);
    }

    #[test]
    fn clear_keeps_allocation() {
        let mut frame = FrameBuffer::new(160, 80);
        assert_eq!(frame.len(), 25600);
        frame.as_bytes_mut().fill(0xFF);
        let ptr = frame.as_bytes().as_ptr();

        frame.clear();
        assert_eq!(frame.as_bytes().as_ptr(), ptr);
        assert!(frame.as_bytes().iter().all(|b| *b == 0));
        assert_eq!((frame.width(), frame.height()), (160, 80));
    }

    #[test]
    fn rgb888_bounds() {
        let frame = FrameBuffer::new(2, 2);
        assert_eq!(frame.rgb888(1, 1), Some([0, 0, 0]));
        assert_eq!(frame.rgb888(2, 0), None);
        assert_eq!(frame.rgb888(0, 2), None);
    }
}
