use super::paged::PagedCodec;
use super::source::{ImageSource, SourceReader};
use super::{Advance, DecodedFrame, HoldTime, ImageCodec, ImageKind, ImageMetadata, LoopMode};
use crate::config::WidgetConfig;
use crate::error::{ImageError, Result};
use image::codecs::gif::GifDecoder;
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, Delay, Frame, Frames, ImageDecoder, ImageFormat, ImageReader};
use std::io::{self, Read, Seek, SeekFrom};
use std::time::{Duration, Instant};

/// Bytes read up front to identify the format
const SNIFF_LEN: usize = 64;

/// Identify the format of `source` and open the matching codec.
///
/// Only the header is parsed here; no pixel data is decoded.
pub fn open_codec(source: ImageSource, config: &WidgetConfig) -> Result<Box<dyn ImageCodec>> {
    let start = Instant::now();
    log::info!("Opening image from {}", source.describe());

    let header = source.read_header(SNIFF_LEN)?;
    let format = image::guess_format(&header).map_err(|_| ImageError::BadFormat)?;

    let codec: Box<dyn ImageCodec> = match format {
        ImageFormat::Tiff => Box::new(PagedCodec::open(source)?),
        ImageFormat::Gif | ImageFormat::Png | ImageFormat::WebP => {
            match AnimatedCodec::open(source.clone(), format, config)? {
                Some(codec) => Box::new(codec),
                None => Box::new(StillCodec::open(source, format)?),
            }
        }
        _ => Box::new(StillCodec::open(source, format)?),
    };

    let metadata = codec.metadata();
    log::info!(
        "Image info: {} {}x{}, kind: {:?}, loop: {:?} (opened in {:?})",
        metadata.format,
        metadata.width,
        metadata.height,
        metadata.kind,
        metadata.loop_mode,
        start.elapsed()
    );

    Ok(codec)
}

fn format_name(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("unknown")
}

/// Single-picture formats (JPEG, BMP, static PNG/WebP, ...)
pub struct StillCodec {
    source: ImageSource,
    format: ImageFormat,
    metadata: ImageMetadata,
}

impl StillCodec {
    pub fn open(source: ImageSource, format: ImageFormat) -> Result<Self> {
        let (width, height) = ImageReader::with_format(source.reader()?, format).into_dimensions()?;

        Ok(Self {
            source,
            format,
            metadata: ImageMetadata {
                format: format_name(format),
                width,
                height,
                kind: ImageKind::Still,
                frame_count: Some(1),
                loop_mode: LoopMode::Times(1),
            },
        })
    }
}

impl ImageCodec for StillCodec {
    fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    fn current_index(&self) -> usize {
        0
    }

    fn decode_current(&mut self) -> Result<DecodedFrame> {
        let start = Instant::now();
        let image = ImageReader::with_format(self.source.reader()?, self.format).decode()?;
        let rgba = image.to_rgba8();

        Ok(DecodedFrame {
            width: rgba.width(),
            height: rgba.height(),
            rgba_data: rgba.into_raw(),
            decode_time: start.elapsed(),
            duration_ms: None,
        })
    }

    fn advance(&mut self) -> Result<Advance> {
        Ok(Advance::Exhausted)
    }

    fn rewind(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnimatedFormat {
    Gif,
    Apng,
    WebP,
}

struct CurrentFrame {
    frame: Frame,
    decode_time: Duration,
}

/// Timed frame sequences: GIF, APNG and animated WebP
pub struct AnimatedCodec {
    source: ImageSource,
    format: AnimatedFormat,
    metadata: ImageMetadata,
    frames: Option<Frames<'static>>,
    current: Option<CurrentFrame>,
    index: usize,
    plays_completed: u32,
    force_loop: bool,
    min_delay_ms: u32,
    default_delay_ms: u32,
}

impl AnimatedCodec {
    /// Returns `Ok(None)` when the image turns out to be a still picture.
    pub fn open(
        source: ImageSource,
        format: ImageFormat,
        config: &WidgetConfig,
    ) -> Result<Option<Self>> {
        let reader = source.reader()?;
        let (format, dimensions, frames, loop_mode) = match format {
            ImageFormat::Gif => {
                let decoder = GifDecoder::new(reader)?;
                let dimensions = decoder.dimensions();
                let loop_mode = gif_loop_mode(source.reader()?)?;
                (AnimatedFormat::Gif, dimensions, decoder.into_frames(), loop_mode)
            }
            ImageFormat::Png => {
                let decoder = PngDecoder::new(reader)?;
                if !decoder.is_apng()? {
                    return Ok(None);
                }
                let dimensions = decoder.dimensions();
                let (frame_count, loop_mode) = match apng_animation_control(source.reader()?)? {
                    Some(control) => control,
                    None => {
                        log::warn!("APNG from {} has no acTL before its image data", source.describe());
                        (None, LoopMode::Times(1))
                    }
                };
                let frames = decoder.apng()?.into_frames();
                let mut codec = Self::new(source, AnimatedFormat::Apng, dimensions, frames, loop_mode, config);
                codec.metadata.frame_count = frame_count;
                return Ok(Some(codec));
            }
            ImageFormat::WebP => {
                let decoder = WebPDecoder::new(reader)?;
                if !decoder.has_animation() {
                    return Ok(None);
                }
                let dimensions = decoder.dimensions();
                let loop_mode = webp_loop_mode(source.reader()?)?;
                (AnimatedFormat::WebP, dimensions, decoder.into_frames(), loop_mode)
            }
            other => {
                return Err(ImageError::Unsupported(format!(
                    "{} is not an animation format",
                    format_name(other)
                )))
            }
        };

        Ok(Some(Self::new(source, format, dimensions, frames, loop_mode, config)))
    }

    fn new(
        source: ImageSource,
        format: AnimatedFormat,
        (width, height): (u32, u32),
        frames: Frames<'static>,
        loop_mode: LoopMode,
        config: &WidgetConfig,
    ) -> Self {
        let name = match format {
            AnimatedFormat::Gif => "gif",
            AnimatedFormat::Apng => "apng",
            AnimatedFormat::WebP => "webp",
        };
        Self {
            source,
            format,
            metadata: ImageMetadata {
                format: name,
                width,
                height,
                kind: ImageKind::Animated,
                frame_count: None,
                loop_mode,
            },
            frames: Some(frames),
            current: None,
            index: 0,
            plays_completed: 0,
            force_loop: config.force_loop,
            min_delay_ms: config.min_frame_delay_ms(),
            default_delay_ms: config.default_frame_delay_ms,
        }
    }

    /// Start a fresh pass over the frames from the beginning of the source
    fn restart_frames(&mut self) -> Result<()> {
        let reader: SourceReader = self.source.reader()?;
        let frames = match self.format {
            AnimatedFormat::Gif => GifDecoder::new(reader)?.into_frames(),
            AnimatedFormat::Apng => PngDecoder::new(reader)?.apng()?.into_frames(),
            AnimatedFormat::WebP => WebPDecoder::new(reader)?.into_frames(),
        };
        self.frames = Some(frames);
        self.current = None;
        self.index = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<CurrentFrame>> {
        let start = Instant::now();
        let Some(frames) = self.frames.as_mut() else {
            return Ok(None);
        };
        match frames.next() {
            Some(frame) => Ok(Some(CurrentFrame {
                frame: frame?,
                decode_time: start.elapsed(),
            })),
            None => {
                self.frames = None;
                Ok(None)
            }
        }
    }

    fn current_frame(&mut self) -> Result<&CurrentFrame> {
        if self.current.is_none() {
            let first = self
                .next_frame()?
                .ok_or_else(|| ImageError::BadData("animation contains no frames".to_string()))?;
            self.current = Some(first);
        }
        self.current
            .as_ref()
            .ok_or_else(|| ImageError::BadData("animation contains no frames".to_string()))
    }

    fn delay_ms(&self, delay: Delay) -> u32 {
        let (numer, denom) = delay.numer_denom_ms();
        let ms = if denom == 0 { 0 } else { numer / denom };
        if ms == 0 {
            self.default_delay_ms.max(self.min_delay_ms)
        } else {
            ms.max(self.min_delay_ms)
        }
    }

    fn loops_again(&self) -> bool {
        if self.force_loop {
            return true;
        }
        match self.metadata.loop_mode {
            LoopMode::Forever => true,
            LoopMode::Times(plays) => self.plays_completed < plays,
        }
    }
}

impl ImageCodec for AnimatedCodec {
    fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    fn current_index(&self) -> usize {
        self.index
    }

    fn decode_current(&mut self) -> Result<DecodedFrame> {
        let current = self.current_frame()?;
        let buffer = current.frame.buffer();
        let (width, height) = buffer.dimensions();
        let rgba_data = buffer.as_raw().clone();
        let decode_time = current.decode_time;
        let delay = current.frame.delay();

        Ok(DecodedFrame {
            rgba_data,
            width,
            height,
            decode_time,
            duration_ms: Some(self.delay_ms(delay)),
        })
    }

    fn advance(&mut self) -> Result<Advance> {
        let delay = self.current_frame()?.frame.delay();
        let hold = HoldTime::from_millis(self.delay_ms(delay));

        if let Some(next) = self.next_frame()? {
            self.current = Some(next);
            self.index += 1;
            log::debug!("Advanced to frame {} (holding previous {:?})", self.index, hold);
            return Ok(Advance::Frame(hold));
        }

        let total = self.index + 1;
        self.metadata.frame_count = Some(total);
        if total == 1 {
            // A one-frame animation is a still picture
            return Ok(Advance::Exhausted);
        }

        self.plays_completed = self.plays_completed.saturating_add(1);
        if !self.loops_again() {
            log::info!("Animation finished after {} play(s) of {} frames", self.plays_completed, total);
            return Ok(Advance::Exhausted);
        }

        log::debug!("Looping animation ({} frames, play {})", total, self.plays_completed + 1);
        self.restart_frames()?;
        self.current_frame()?;
        Ok(Advance::Frame(hold))
    }

    fn rewind(&mut self) -> Result<()> {
        self.plays_completed = 0;
        self.restart_frames()
    }
}

fn read_array<const N: usize, R: Read>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Skip GIF data sub-blocks up to and including the zero-length terminator.
fn skip_sub_blocks<R: Read + Seek>(reader: &mut R) -> io::Result<()> {
    loop {
        let [len] = read_array::<1, _>(reader)?;
        if len == 0 {
            return Ok(());
        }
        reader.seek(SeekFrom::Current(i64::from(len)))?;
    }
}

/// Loop mode from the NETSCAPE2.0 application extension.
///
/// Extension blocks are walked up to the first image descriptor. The stored
/// count is the number of repeats after the first play; zero repeats
/// forever. Without the extension the animation plays once.
pub fn gif_loop_mode<R: Read + Seek>(mut reader: R) -> io::Result<LoopMode> {
    let screen = read_array::<13, _>(&mut reader)?;
    let flags = screen[10];
    if flags & 0x80 != 0 {
        let table_len = 3 * (1i64 << ((flags & 0x07) + 1));
        reader.seek(SeekFrom::Current(table_len))?;
    }

    loop {
        match read_array::<1, _>(&mut reader)? {
            // Extension introducer
            [0x21] => {
                let [label] = read_array::<1, _>(&mut reader)?;
                if label != 0xff {
                    skip_sub_blocks(&mut reader)?;
                    continue;
                }
                let [id_len] = read_array::<1, _>(&mut reader)?;
                let mut id = vec![0u8; usize::from(id_len)];
                reader.read_exact(&mut id)?;
                if id == b"NETSCAPE2.0" || id == b"ANIMEXTS1.0" {
                    let [len] = read_array::<1, _>(&mut reader)?;
                    if len == 3 {
                        if let [1, lo, hi] = read_array::<3, _>(&mut reader)? {
                            return Ok(match u16::from_le_bytes([lo, hi]) {
                                0 => LoopMode::Forever,
                                repeats => LoopMode::Times(u32::from(repeats) + 1),
                            });
                        }
                    } else {
                        reader.seek(SeekFrom::Current(i64::from(len)))?;
                    }
                    if len == 0 {
                        continue;
                    }
                }
                skip_sub_blocks(&mut reader)?;
            }
            // Image descriptor or trailer: no loop extension before the first frame
            _ => return Ok(LoopMode::Times(1)),
        }
    }
}

/// Frame count and loop mode from the APNG `acTL` chunk.
///
/// Chunks are walked up to the first `IDAT`; `None` if no `acTL` precedes it.
pub fn apng_animation_control<R: Read + Seek>(mut reader: R) -> io::Result<Option<(Option<usize>, LoopMode)>> {
    reader.seek(SeekFrom::Current(8))?;
    loop {
        let [l0, l1, l2, l3, t0, t1, t2, t3] = read_array::<8, _>(&mut reader)?;
        let len = u32::from_be_bytes([l0, l1, l2, l3]);
        match &[t0, t1, t2, t3] {
            b"acTL" => {
                let data = read_array::<8, _>(&mut reader)?;
                let num_frames = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
                let num_plays = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
                let loop_mode = match num_plays {
                    0 => LoopMode::Forever,
                    plays => LoopMode::Times(plays),
                };
                return Ok(Some((Some(num_frames as usize), loop_mode)));
            }
            b"IDAT" | b"IEND" => return Ok(None),
            // Skip payload and CRC
            _ => {
                reader.seek(SeekFrom::Current(i64::from(len) + 4))?;
            }
        }
    }
}

/// Loop mode from the WebP `ANIM` chunk.
///
/// RIFF chunks are walked up to the first frame; a missing `ANIM` loops forever.
pub fn webp_loop_mode<R: Read + Seek>(mut reader: R) -> io::Result<LoopMode> {
    reader.seek(SeekFrom::Current(12))?;
    loop {
        let [t0, t1, t2, t3, s0, s1, s2, s3] = read_array::<8, _>(&mut reader)?;
        let size = u32::from_le_bytes([s0, s1, s2, s3]);
        match &[t0, t1, t2, t3] {
            b"ANIM" => {
                // Background colour, then the loop count
                let data = read_array::<6, _>(&mut reader)?;
                return Ok(match u16::from_le_bytes([data[4], data[5]]) {
                    0 => LoopMode::Forever,
                    plays => LoopMode::Times(u32::from(plays)),
                });
            }
            b"ANMF" | b"VP8 " | b"VP8L" => return Ok(LoopMode::Forever),
            _ => {
                // Chunks are padded to an even size
                reader.seek(SeekFrom::Current(i64::from(size) + i64::from(size & 1)))?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{gif_bytes, gif_with_comment, png_bytes};
    use image::codecs::gif::Repeat;
    use std::io::Cursor;

    fn holds(codec: &mut dyn ImageCodec, steps: usize) -> Vec<Advance> {
        (0..steps).map(|_| codec.advance().unwrap()).collect()
    }

    #[test]
    fn unknown_signature_is_bad_format() {
        let source = ImageSource::memory(b"definitely not an image".to_vec());
        match open_codec(source, &WidgetConfig::default()) {
            Err(ImageError::BadFormat) => {}
            other => panic!("expected BadFormat, got {:?}", other.err()),
        }
    }

    #[test]
    fn png_opens_as_still_image() {
        let mut codec = open_codec(ImageSource::memory(png_bytes(5, 2, [1, 2, 3, 255])), &WidgetConfig::default()).unwrap();
        assert_eq!(codec.metadata().kind, ImageKind::Still);
        assert_eq!((codec.metadata().width, codec.metadata().height), (5, 2));

        let frame = codec.decode_current().unwrap();
        assert_eq!(frame.byte_len(), 5 * 2 * 4);
        assert_eq!(&frame.rgba_data[..4], &[1, 2, 3, 255]);
        assert_eq!(codec.advance().unwrap(), Advance::Exhausted);
    }

    #[test]
    fn truncated_png_fails_to_open() {
        let bytes = png_bytes(5, 2, [1, 2, 3, 255]);
        let source = ImageSource::memory(bytes[..12].to_vec());
        assert!(open_codec(source, &WidgetConfig::default()).is_err());
    }

    #[test]
    fn looping_gif_cycles_authored_delays() {
        let bytes = gif_bytes(&[50, 100, 150], Some(Repeat::Infinite));
        let mut codec = open_codec(ImageSource::memory(bytes), &WidgetConfig::default()).unwrap();
        assert_eq!(codec.metadata().kind, ImageKind::Animated);
        assert_eq!(codec.metadata().loop_mode, LoopMode::Forever);

        let expected: Vec<Advance> = [50, 100, 150, 50, 100, 150, 50]
            .iter()
            .map(|&ms| Advance::Frame(HoldTime::from_millis(ms)))
            .collect();
        assert_eq!(holds(codec.as_mut(), 7), expected);
        assert_eq!(codec.metadata().frame_count, Some(3));
        assert_eq!(codec.current_index(), 1);
    }

    #[test]
    fn gif_without_loop_extension_plays_once() {
        let bytes = gif_bytes(&[40, 60], None);
        let mut codec = open_codec(ImageSource::memory(bytes), &WidgetConfig::default()).unwrap();
        assert_eq!(codec.metadata().loop_mode, LoopMode::Times(1));

        assert_eq!(codec.advance().unwrap(), Advance::Frame(HoldTime::from_millis(40)));
        assert_eq!(codec.advance().unwrap(), Advance::Exhausted);
        assert_eq!(codec.current_index(), 1);
    }

    #[test]
    fn finite_repeat_plays_the_extra_passes() {
        let bytes = gif_bytes(&[20, 30], Some(Repeat::Finite(1)));
        let mut codec = open_codec(ImageSource::memory(bytes), &WidgetConfig::default()).unwrap();
        assert_eq!(codec.metadata().loop_mode, LoopMode::Times(2));

        let steps = holds(codec.as_mut(), 4);
        assert_eq!(steps[0], Advance::Frame(HoldTime::from_millis(20)));
        assert_eq!(steps[1], Advance::Frame(HoldTime::from_millis(30)));
        assert_eq!(steps[2], Advance::Frame(HoldTime::from_millis(20)));
        assert_eq!(steps[3], Advance::Exhausted);
    }

    #[test]
    fn force_loop_overrides_authored_count() {
        let bytes = gif_bytes(&[20, 30], None);
        let config = WidgetConfig {
            force_loop: true,
            ..WidgetConfig::default()
        };
        let mut codec = open_codec(ImageSource::memory(bytes), &config).unwrap();
        assert!(holds(codec.as_mut(), 6).iter().all(|step| *step != Advance::Exhausted));
    }

    #[test]
    fn single_frame_gif_is_exhausted_immediately() {
        let bytes = gif_bytes(&[70], Some(Repeat::Infinite));
        let mut codec = open_codec(ImageSource::memory(bytes), &WidgetConfig::default()).unwrap();
        assert_eq!(codec.advance().unwrap(), Advance::Exhausted);
        assert_eq!(codec.metadata().frame_count, Some(1));
    }

    #[test]
    fn short_delays_are_raised_to_the_minimum() {
        let bytes = gif_bytes(&[10, 10], Some(Repeat::Infinite));
        let config = WidgetConfig {
            min_frame_delay_ms: 40,
            ..WidgetConfig::default()
        };
        let mut codec = open_codec(ImageSource::memory(bytes), &config).unwrap();
        assert_eq!(codec.advance().unwrap(), Advance::Frame(HoldTime::from_millis(40)));
        assert_eq!(codec.decode_current().unwrap().duration_ms, Some(40));
    }

    #[test]
    fn rewind_returns_to_first_frame() {
        let bytes = gif_bytes(&[20, 30, 40], None);
        let mut codec = open_codec(ImageSource::memory(bytes), &WidgetConfig::default()).unwrap();
        let first = codec.decode_current().unwrap().rgba_data;
        codec.advance().unwrap();
        codec.advance().unwrap();
        assert_ne!(codec.decode_current().unwrap().rgba_data, first);

        codec.rewind().unwrap();
        assert_eq!(codec.current_index(), 0);
        assert_eq!(codec.decode_current().unwrap().rgba_data, first);
    }

    fn png_chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut chunk = (data.len() as u32).to_be_bytes().to_vec();
        chunk.extend_from_slice(kind);
        chunk.extend_from_slice(data);
        // CRC is not checked by the chunk walk
        chunk.extend_from_slice(&[0; 4]);
        chunk
    }

    fn png_with_chunks(chunks: &[Vec<u8>]) -> Vec<u8> {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend(png_chunk(b"IHDR", &[0; 13]));
        for chunk in chunks {
            bytes.extend_from_slice(chunk);
        }
        bytes.extend(png_chunk(b"IDAT", &[0; 4]));
        bytes.extend(png_chunk(b"IEND", &[]));
        bytes
    }

    #[test]
    fn gif_loop_extension_is_found_after_large_comment() {
        let bytes = gif_with_comment(&gif_bytes(&[50, 60, 70], Some(Repeat::Infinite)), 5000);
        assert_eq!(gif_loop_mode(Cursor::new(&bytes)).unwrap(), LoopMode::Forever);

        let mut codec = open_codec(ImageSource::memory(bytes), &WidgetConfig::default()).unwrap();
        assert_eq!(codec.metadata().loop_mode, LoopMode::Forever);
        assert!(holds(codec.as_mut(), 10).iter().all(|step| *step != Advance::Exhausted));
    }

    #[test]
    fn gif_repeat_count_is_read_from_extension() {
        let bytes = gif_bytes(&[20, 30], Some(Repeat::Finite(4)));
        assert_eq!(gif_loop_mode(Cursor::new(&bytes)).unwrap(), LoopMode::Times(5));

        let commented = gif_with_comment(&gif_bytes(&[20, 30], None), 300);
        assert_eq!(gif_loop_mode(Cursor::new(&commented)).unwrap(), LoopMode::Times(1));
    }

    #[test]
    fn apng_control_is_found_after_large_chunks() {
        let text = png_chunk(b"tEXt", &vec![b'x'; 6000]);
        let actl = png_chunk(b"acTL", &[0, 0, 0, 4, 0, 0, 0, 1]);
        let bytes = png_with_chunks(&[text, actl]);
        assert_eq!(
            apng_animation_control(Cursor::new(&bytes)).unwrap(),
            Some((Some(4), LoopMode::Times(1)))
        );

        let forever = png_with_chunks(&[png_chunk(b"acTL", &[0, 0, 0, 2, 0, 0, 0, 0])]);
        assert_eq!(
            apng_animation_control(Cursor::new(&forever)).unwrap(),
            Some((Some(2), LoopMode::Forever))
        );
    }

    #[test]
    fn apng_control_after_image_data_is_ignored() {
        let mut bytes = png_with_chunks(&[]);
        bytes.extend(png_chunk(b"acTL", &[0, 0, 0, 2, 0, 0, 0, 0]));
        assert_eq!(apng_animation_control(Cursor::new(&bytes)).unwrap(), None);
    }

    #[test]
    fn webp_loop_count_is_found_after_icc_profile() {
        let mut chunks = Vec::new();
        chunks.extend_from_slice(b"VP8X");
        chunks.extend_from_slice(&10u32.to_le_bytes());
        chunks.extend_from_slice(&[0; 10]);
        chunks.extend_from_slice(b"ICCP");
        chunks.extend_from_slice(&4999u32.to_le_bytes());
        chunks.extend(vec![0; 5000]);
        chunks.extend_from_slice(b"ANIM");
        chunks.extend_from_slice(&6u32.to_le_bytes());
        chunks.extend_from_slice(&[0xff, 0xff, 0xff, 0xff, 3, 0]);

        let mut bytes = b"RIFF".to_vec();
        bytes.extend_from_slice(&(chunks.len() as u32 + 4).to_le_bytes());
        bytes.extend_from_slice(b"WEBP");
        bytes.extend(chunks);
        assert_eq!(webp_loop_mode(Cursor::new(&bytes)).unwrap(), LoopMode::Times(3));
    }
}
