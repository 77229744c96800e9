//! Fixture builders shared by the unit tests.
//!
//! Images are encoded in memory with the same crates the decoders use, so no
//! binary test data has to live in the repository.

use crate::decoder::{Advance, DecodedFrame, HoldTime, ImageCodec, ImageKind, ImageMetadata, LoopMode};
use crate::error::{ImageError, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::time::Duration;
use tiff::encoder::{colortype, TiffEncoder};

/// Colour of frame `index` in [`gif_bytes`] fixtures
pub fn frame_colour(index: usize) -> [u8; 4] {
    let shade = (index as u8).wrapping_mul(60);
    [shade, 255 - shade, 0, 255]
}

/// A 4x3 GIF with one solid frame per delay
pub fn gif_bytes(delays_ms: &[u32], repeat: Option<Repeat>) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut bytes);
        if let Some(repeat) = repeat {
            encoder.set_repeat(repeat).unwrap();
        }
        let frames = delays_ms.iter().enumerate().map(|(i, &ms)| {
            let buffer = RgbaImage::from_pixel(4, 3, Rgba(frame_colour(i)));
            Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(ms, 1))
        });
        encoder.encode_frames(frames).unwrap();
    }
    bytes
}

/// `gif` with a comment extension of `len` bytes placed right after the
/// logical screen descriptor, ahead of any loop extension.
pub fn gif_with_comment(gif: &[u8], len: usize) -> Vec<u8> {
    let flags = gif[10];
    let mut offset = 13;
    if flags & 0x80 != 0 {
        offset += 3 * (1 << ((flags & 0x07) + 1));
    }

    let mut comment = vec![0x21, 0xfe];
    let text = vec![b'c'; len];
    for block in text.chunks(255) {
        comment.push(block.len() as u8);
        comment.extend_from_slice(block);
    }
    comment.push(0);

    let mut bytes = gif[..offset].to_vec();
    bytes.extend(comment);
    bytes.extend_from_slice(&gif[offset..]);
    bytes
}

/// A solid-colour PNG
pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let mut bytes = Vec::new();
    RgbaImage::from_pixel(width, height, Rgba(rgba))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// A 2x2 RGB TIFF with one solid page per colour
pub fn tiff_pages(pages: &[[u8; 3]]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
        for rgb in pages {
            let data: Vec<u8> = rgb.iter().copied().cycle().take(3 * 2 * 2).collect();
            encoder.write_image::<colortype::RGB8>(2, 2, &data).unwrap();
        }
    }
    cursor.into_inner()
}

/// In-memory codec with scripted frames and an optional injected failure
pub struct ScriptedCodec {
    metadata: ImageMetadata,
    delays_ms: Vec<Option<u32>>,
    index: usize,
    plays: u32,
    /// Fail the advance with this sequence number (0-based).
    pub fail_on_advance: Option<usize>,
    /// Fail decoding the frame with this index.
    pub fail_decode_at: Option<usize>,
    advances: usize,
}

impl ScriptedCodec {
    /// Frames with `Some(delay)` animate; `None` entries are pages.
    pub fn new(delays_ms: Vec<Option<u32>>, loop_mode: LoopMode) -> Self {
        let kind = match delays_ms.first() {
            Some(Some(_)) => ImageKind::Animated,
            _ if delays_ms.len() > 1 => ImageKind::Paged,
            _ => ImageKind::Still,
        };
        Self {
            metadata: ImageMetadata {
                format: "scripted",
                width: 2,
                height: 2,
                kind,
                frame_count: Some(delays_ms.len()),
                loop_mode,
            },
            delays_ms,
            index: 0,
            plays: 0,
            fail_on_advance: None,
            fail_decode_at: None,
            advances: 0,
        }
    }
}

impl ImageCodec for ScriptedCodec {
    fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    fn current_index(&self) -> usize {
        self.index
    }

    fn decode_current(&mut self) -> Result<DecodedFrame> {
        if self.fail_decode_at == Some(self.index) {
            return Err(ImageError::BadData("scripted decode failure".to_string()));
        }
        let shade = self.index as u8;
        Ok(DecodedFrame {
            rgba_data: [shade, shade, shade, 255].repeat(4),
            width: 2,
            height: 2,
            decode_time: Duration::ZERO,
            duration_ms: self.delays_ms.get(self.index).copied().flatten(),
        })
    }

    fn advance(&mut self) -> Result<Advance> {
        let sequence = self.advances;
        self.advances += 1;
        if self.fail_on_advance == Some(sequence) {
            return Err(ImageError::BadData("scripted advance failure".to_string()));
        }

        let hold = match self.delays_ms.get(self.index).copied().flatten() {
            Some(ms) => HoldTime::from_millis(ms),
            None => HoldTime::Immediate,
        };
        if self.index + 1 < self.delays_ms.len() {
            self.index += 1;
            return Ok(Advance::Frame(hold));
        }
        self.plays += 1;
        let again = match self.metadata.loop_mode {
            LoopMode::Forever => true,
            LoopMode::Times(n) => self.plays < n,
        };
        if again && self.delays_ms.len() > 1 {
            self.index = 0;
            Ok(Advance::Frame(hold))
        } else {
            Ok(Advance::Exhausted)
        }
    }

    fn rewind(&mut self) -> Result<()> {
        self.index = 0;
        self.plays = 0;
        Ok(())
    }
}
