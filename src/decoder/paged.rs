//! Multi-page TIFF documents. Each IFD is one page; pages carry no timing.

use super::rgb_conversion::{samples_to_rgba8, u16_to_u8, SampleLayout};
use super::source::{ImageSource, SourceReader};
use super::{Advance, DecodedFrame, HoldTime, ImageCodec, ImageKind, ImageMetadata, LoopMode};
use crate::error::{ImageError, Result};
use std::time::Instant;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;

pub struct PagedCodec {
    source: ImageSource,
    metadata: ImageMetadata,
    decoder: Decoder<SourceReader>,
    page: usize,
}

impl PagedCodec {
    pub fn open(source: ImageSource) -> Result<Self> {
        let mut decoder = Decoder::new(source.reader()?)?;
        let (width, height) = decoder.dimensions()?;

        Ok(Self {
            source,
            metadata: ImageMetadata {
                format: "tiff",
                width,
                height,
                kind: ImageKind::Paged,
                frame_count: None,
                loop_mode: LoopMode::Times(1),
            },
            decoder,
            page: 0,
        })
    }
}

fn layout_for(color_type: ColorType) -> Option<(SampleLayout, u8)> {
    match color_type {
        ColorType::Gray(bits) => Some((SampleLayout::Gray, bits)),
        ColorType::GrayA(bits) => Some((SampleLayout::GrayAlpha, bits)),
        ColorType::RGB(bits) => Some((SampleLayout::Rgb, bits)),
        ColorType::RGBA(bits) => Some((SampleLayout::Rgba, bits)),
        ColorType::CMYK(bits) => Some((SampleLayout::Cmyk, bits)),
        _ => None,
    }
}

impl ImageCodec for PagedCodec {
    fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    fn current_index(&self) -> usize {
        self.page
    }

    fn decode_current(&mut self) -> Result<DecodedFrame> {
        let start = Instant::now();
        let (width, height) = self.decoder.dimensions()?;
        let color_type = self.decoder.colortype()?;
        let layout = match layout_for(color_type) {
            Some((layout, 8 | 16)) => layout,
            _ => {
                return Err(ImageError::Unsupported(format!(
                    "TIFF page {} has colour type {:?}",
                    self.page, color_type
                )))
            }
        };

        let samples = match self.decoder.read_image()? {
            DecodingResult::U8(samples) => samples,
            DecodingResult::U16(samples) => samples.into_iter().map(u16_to_u8).collect(),
            _ => {
                return Err(ImageError::Unsupported(format!(
                    "TIFF page {} uses a non 8/16-bit sample format",
                    self.page
                )))
            }
        };

        let expected = width as usize * height as usize * layout.channels();
        if samples.len() < expected {
            return Err(ImageError::BadData(format!(
                "TIFF page {} holds {} samples, expected {}",
                self.page,
                samples.len(),
                expected
            )));
        }

        let rgba_data = samples_to_rgba8(&samples, layout, width as usize, height as usize);
        log::debug!("Decoded TIFF page {} ({}x{}) in {:?}", self.page, width, height, start.elapsed());

        Ok(DecodedFrame {
            rgba_data,
            width,
            height,
            decode_time: start.elapsed(),
            duration_ms: None,
        })
    }

    fn advance(&mut self) -> Result<Advance> {
        if !self.decoder.more_images() {
            self.metadata.frame_count = Some(self.page + 1);
            return Ok(Advance::Exhausted);
        }
        self.decoder.next_image()?;
        self.page += 1;
        log::debug!("Advanced to TIFF page {}", self.page);
        Ok(Advance::Frame(HoldTime::Immediate))
    }

    fn rewind(&mut self) -> Result<()> {
        self.decoder = Decoder::new(self.source.reader()?)?;
        self.page = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WidgetConfig;
    use crate::decoder::worker::open_codec;
    use crate::test_utils::tiff_pages;

    #[test]
    fn pages_advance_immediately_then_exhaust() {
        let bytes = tiff_pages(&[[255, 0, 0], [0, 255, 0], [0, 0, 255]]);
        let mut codec = open_codec(ImageSource::memory(bytes), &WidgetConfig::default()).unwrap();
        assert_eq!(codec.metadata().kind, ImageKind::Paged);
        assert_eq!(codec.metadata().frame_count, None);

        assert_eq!(codec.advance().unwrap(), Advance::Frame(HoldTime::Immediate));
        assert_eq!(codec.advance().unwrap(), Advance::Frame(HoldTime::Immediate));
        assert_eq!(codec.advance().unwrap(), Advance::Exhausted);
        assert_eq!(codec.metadata().frame_count, Some(3));
    }

    #[test]
    fn each_page_decodes_its_own_pixels() {
        let bytes = tiff_pages(&[[255, 0, 0], [0, 0, 255]]);
        let mut codec = open_codec(ImageSource::memory(bytes), &WidgetConfig::default()).unwrap();

        let first = codec.decode_current().unwrap();
        assert_eq!((first.width, first.height), (2, 2));
        assert_eq!(&first.rgba_data[..4], &[255, 0, 0, 255]);

        codec.advance().unwrap();
        let second = codec.decode_current().unwrap();
        assert_eq!(&second.rgba_data[..4], &[0, 0, 255, 255]);

        codec.rewind().unwrap();
        assert_eq!(codec.current_index(), 0);
        assert_eq!(&codec.decode_current().unwrap().rgba_data[..4], &[255, 0, 0, 255]);
    }
}
