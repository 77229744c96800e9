//! The decoder handle a widget owns while a source is bound.

use super::source::ImageSource;
use super::worker::open_codec;
use super::{Advance, DecodedFrame, ImageCodec, ImageMetadata};
use crate::config::WidgetConfig;
use crate::error::{ErrorCode, ImageError, Result};
use std::borrow::Cow;

struct CachedFrame {
    index: usize,
    frame: DecodedFrame,
}

/// Open decoder plus its cached frame and error state.
///
/// Released explicitly with [`ImageHandle::close`] when the owning widget
/// rebinds or is destroyed.
pub struct ImageHandle {
    origin: String,
    codec: Box<dyn ImageCodec>,
    cached: Option<CachedFrame>,
    last_error: ErrorCode,
    max_cache_bytes: usize,
}

fn record<T>(last_error: &mut ErrorCode, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        *last_error = e.code();
    }
    result
}

impl ImageHandle {
    /// Parse the header of `source` and pick a codec for it.
    pub fn open(source: ImageSource, config: &WidgetConfig) -> Result<Self> {
        let origin = source.describe();
        let codec = open_codec(source, config)?;
        Ok(Self::from_codec(origin, codec, config))
    }

    /// Wrap an already open codec.
    pub fn from_codec(origin: impl Into<String>, codec: Box<dyn ImageCodec>, config: &WidgetConfig) -> Self {
        Self {
            origin: origin.into(),
            codec,
            cached: None,
            last_error: ErrorCode::Ok,
            max_cache_bytes: config.max_cache_bytes,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn metadata(&self) -> &ImageMetadata {
        self.codec.metadata()
    }

    pub fn current_index(&self) -> usize {
        self.codec.current_index()
    }

    /// Most recent failure seen by this handle; `Ok` if none.
    pub fn last_error(&self) -> ErrorCode {
        self.last_error
    }

    /// Index of the frame held in memory, which may no longer be current.
    pub fn cached_index(&self) -> Option<usize> {
        self.cached.as_ref().map(|cached| cached.index)
    }

    /// True when the current frame is held in memory.
    pub fn is_cached(&self) -> bool {
        self.cached_index() == Some(self.codec.current_index())
    }

    /// Decode the current frame into memory so draws stop reading the source.
    ///
    /// On failure any previously cached frame is kept.
    pub fn cache(&mut self) -> Result<()> {
        if self.is_cached() {
            return Ok(());
        }

        let index = self.codec.current_index();
        let limit = self.max_cache_bytes;
        let result = self.codec.decode_current().and_then(|frame| {
            if frame.byte_len() > limit {
                Err(ImageError::NoMemory {
                    needed: frame.byte_len(),
                    limit,
                })
            } else {
                Ok(frame)
            }
        });
        let frame = record(&mut self.last_error, result)?;

        log::info!(
            "Cached frame {} of {} ({} bytes, decoded in {:?})",
            index,
            self.origin,
            frame.byte_len(),
            frame.decode_time
        );
        self.cached = Some(CachedFrame { index, frame });
        Ok(())
    }

    /// Pixels of the current frame, from the cache when possible.
    pub fn frame(&mut self) -> Result<Cow<'_, DecodedFrame>> {
        let index = self.codec.current_index();
        match &self.cached {
            Some(cached) if cached.index == index => Ok(Cow::Borrowed(&cached.frame)),
            _ => {
                let result = self.codec.decode_current();
                record(&mut self.last_error, result).map(Cow::Owned)
            }
        }
    }

    /// Move to the next frame or page.
    ///
    /// The cached frame stays in memory; looped animations reuse it when
    /// they come back round to its index.
    pub fn advance(&mut self) -> Result<Advance> {
        let result = self.codec.advance();
        record(&mut self.last_error, result)
    }

    /// Back to the first frame, discarding the cache.
    pub fn rewind(&mut self) -> Result<()> {
        self.cached = None;
        let result = self.codec.rewind();
        record(&mut self.last_error, result)
    }

    /// Release the decoder and any cached pixels.
    pub fn close(self) {
        log::info!("Closing image from {}", self.origin);
    }
}
