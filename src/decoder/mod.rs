pub mod handle;
pub mod paged;
pub mod rgb_conversion;
pub mod source;
pub mod worker;

use crate::error::Result;
use std::time::Duration;

/// One decoded frame or page, as interleaved RGBA8
#[derive(Clone)]
pub struct DecodedFrame {
    pub rgba_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub decode_time: Duration,
    pub duration_ms: Option<u32>, // Authored delay, animations only
}

impl DecodedFrame {
    pub fn byte_len(&self) -> usize {
        self.rgba_data.len()
    }
}

/// How the frames of an image relate to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// A single picture
    Still,
    /// Timed frames, possibly looping
    Animated,
    /// Untimed pages shown one after another (e.g. multi-page TIFF)
    Paged,
}

/// How often an animation plays through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Forever,
    Times(u32),
}

/// Header-level facts about a bound image
#[derive(Debug, Clone)]
pub struct ImageMetadata {
    pub format: &'static str,
    pub width: u32,
    pub height: u32,
    pub kind: ImageKind,
    /// Known once the decoder has seen the last frame, or from the header.
    pub frame_count: Option<usize>,
    pub loop_mode: LoopMode,
}

/// How long to keep showing the current frame before drawing again.
///
/// `Immediate` and `Infinite` are sentinels; a `For` duration is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldTime {
    Immediate,
    For(Duration),
    Infinite,
}

impl HoldTime {
    pub const RAW_IMMEDIATE: u32 = 0;
    pub const RAW_INFINITE: u32 = u32::MAX;

    pub fn from_millis(ms: u32) -> Self {
        HoldTime::For(Duration::from_millis(u64::from(ms.max(1))))
    }

    pub fn is_infinite(self) -> bool {
        self == HoldTime::Infinite
    }

    /// Legacy millisecond encoding used by timer-based redraw loops.
    pub fn as_raw_millis(self) -> u32 {
        match self {
            HoldTime::Immediate => Self::RAW_IMMEDIATE,
            HoldTime::Infinite => Self::RAW_INFINITE,
            HoldTime::For(d) => {
                let ms = u32::try_from(d.as_millis()).unwrap_or(u32::MAX);
                ms.clamp(1, Self::RAW_INFINITE - 1)
            }
        }
    }
}

/// Result of moving a codec past its current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Another frame is current now; hold the previous one this long first.
    Frame(HoldTime),
    /// Every frame or page has been shown.
    Exhausted,
}

/// An open image decoder.
///
/// Opening only reads the header; pixel data is decoded on demand by
/// [`ImageCodec::decode_current`].
pub trait ImageCodec {
    fn metadata(&self) -> &ImageMetadata;

    /// Index of the frame or page that would be drawn now.
    fn current_index(&self) -> usize;

    /// Decode the current frame's pixels.
    fn decode_current(&mut self) -> Result<DecodedFrame>;

    /// Step past the current frame, wrapping around looped animations.
    fn advance(&mut self) -> Result<Advance>;

    /// Go back to the first frame and reset loop bookkeeping.
    fn rewind(&mut self) -> Result<()>;
}
