//! Window that displays a still image, an animation or a paged document.

use super::window::{Rect, Surface, Window, WindowBase, WindowInit};
use crate::config::WidgetConfig;
use crate::decoder::handle::ImageHandle;
#[cfg(feature = "stream-source")]
use crate::decoder::source::SharedStream;
use crate::decoder::source::{ImageSource, MemoryImage};
use crate::decoder::{HoldTime, ImageCodec, ImageMetadata};
use crate::error::{ErrorCode, Result};
use crate::scheduler::{FrameScheduler, SchedulerState};
use smallvec::SmallVec;
use std::any::Any;
#[cfg(feature = "file-source")]
use std::path::Path;

struct Binding {
    handle: ImageHandle,
    scheduler: FrameScheduler,
}

impl Binding {
    fn new(handle: ImageHandle) -> Self {
        Self {
            handle,
            scheduler: FrameScheduler::new(),
        }
    }
}

pub struct ImageWidget {
    base: WindowBase,
    config: WidgetConfig,
    binding: Option<Binding>,
}

impl ImageWidget {
    /// Returns `None` when the window would have no drawable area.
    pub fn create(init: &WindowInit, config: &WidgetConfig) -> Option<Self> {
        let Some(base) = WindowBase::new(init, config) else {
            log::warn!("Refusing to create image widget with empty area {:?}", init);
            return None;
        };
        log::debug!("Created image widget at {:?}", base.area);
        Some(Self {
            base,
            config: config.clone(),
            binding: None,
        })
    }

    /// Create the widget inside caller-provided storage.
    ///
    /// A widget already in `slot` is destroyed first.
    pub fn create_in<'a>(
        slot: &'a mut Option<ImageWidget>,
        init: &WindowInit,
        config: &WidgetConfig,
    ) -> Option<&'a mut ImageWidget> {
        let widget = Self::create(init, config)?;
        if let Some(old) = slot.take() {
            old.destroy();
        }
        Some(slot.insert(widget))
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    /// Bind a new source, replacing the current one only on success.
    pub fn try_open(&mut self, source: ImageSource) -> Result<()> {
        let handle = ImageHandle::open(source, &self.config)?;
        self.bind(handle);
        Ok(())
    }

    /// Bind an already opened codec.
    pub fn open_codec(&mut self, origin: impl Into<String>, codec: Box<dyn ImageCodec>) {
        let handle = ImageHandle::from_codec(origin, codec, &self.config);
        self.bind(handle);
    }

    fn bind(&mut self, handle: ImageHandle) {
        let meta = handle.metadata();
        log::info!(
            "Opened {} {}x{} {:?} image from {}",
            meta.format,
            meta.width,
            meta.height,
            meta.kind,
            handle.origin()
        );
        if let Some(old) = self.binding.replace(Binding::new(handle)) {
            old.handle.close();
        }
    }

    pub fn open_source(&mut self, source: ImageSource) -> bool {
        let origin = source.describe();
        match self.try_open(source) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to open image from {}: {}", origin, e);
                false
            }
        }
    }

    /// Bind an image held in memory. Only the header is read here.
    pub fn open_memory(&mut self, bytes: impl Into<MemoryImage>) -> bool {
        self.open_source(ImageSource::memory(bytes))
    }

    #[cfg(feature = "file-source")]
    pub fn open_file(&mut self, path: impl AsRef<Path>) -> bool {
        self.open_source(ImageSource::file(path.as_ref()))
    }

    /// Bind an image read from `stream`, starting at its current position.
    ///
    /// The stream is shared, not owned; the widget never closes it.
    #[cfg(feature = "stream-source")]
    pub fn open_stream(&mut self, stream: SharedStream) -> bool {
        match ImageSource::stream(stream) {
            Ok(source) => self.open_source(source),
            Err(e) => {
                log::warn!("Failed to read stream position: {}", e);
                false
            }
        }
    }

    /// Release the bound image, if any.
    pub fn close(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.handle.close();
        }
    }

    pub fn destroy(mut self) {
        self.close();
        log::debug!("Destroyed image widget at {:?}", self.base.area);
    }

    pub fn is_open(&self) -> bool {
        self.binding.is_some()
    }

    pub fn metadata(&self) -> Option<&ImageMetadata> {
        self.binding.as_ref().map(|b| b.handle.metadata())
    }

    /// Decode the current frame into memory.
    pub fn cache(&mut self) -> ErrorCode {
        match self.binding.as_mut() {
            Some(binding) => match binding.handle.cache() {
                Ok(()) => ErrorCode::Ok,
                Err(e) => {
                    log::warn!("Failed to cache {}: {}", binding.handle.origin(), e);
                    e.code()
                }
            },
            None => ErrorCode::NotOpen,
        }
    }

    /// How long the frame just drawn should stay on screen.
    ///
    /// Call after each redraw; `Infinite` means nothing more will change.
    pub fn next(&mut self) -> HoldTime {
        match self.binding.as_mut() {
            Some(binding) => {
                let hold = binding.scheduler.next(&mut binding.handle);
                log::debug!(
                    "Frame {} of {} holds {:?}",
                    binding.handle.current_index(),
                    binding.handle.origin(),
                    hold
                );
                hold
            }
            None => HoldTime::Infinite,
        }
    }

    /// Go back to the first frame or page and start scheduling afresh.
    ///
    /// The cached frame is dropped. On failure the scheduler is left in the
    /// error state.
    pub fn restart(&mut self) -> ErrorCode {
        let Some(binding) = self.binding.as_mut() else {
            return ErrorCode::NotOpen;
        };
        match binding.handle.rewind() {
            Ok(()) => {
                log::debug!("Restarted {}", binding.handle.origin());
                binding.scheduler = FrameScheduler::new();
                ErrorCode::Ok
            }
            Err(e) => {
                log::error!("Failed to restart {}: {}", binding.handle.origin(), e);
                binding.scheduler.fail();
                e.code()
            }
        }
    }

    pub fn last_error(&self) -> ErrorCode {
        match &self.binding {
            Some(binding) => binding.handle.last_error(),
            None => ErrorCode::NotOpen,
        }
    }

    pub fn scheduler_state(&self) -> Option<SchedulerState> {
        self.binding.as_ref().map(|b| b.scheduler.state())
    }

    pub fn cached_index(&self) -> Option<usize> {
        self.binding.as_ref().and_then(|b| b.handle.cached_index())
    }
}

/// Parts of `area` a `width` x `height` image at its origin leaves uncovered.
fn uncovered(area: Rect, width: u32, height: u32) -> SmallVec<[Rect; 2]> {
    let mut strips = SmallVec::new();
    let width = width.min(area.width);
    let height = height.min(area.height);
    if width < area.width {
        strips.push(Rect::new(area.x + width as i32, area.y, area.width - width, area.height));
    }
    if height < area.height && width > 0 {
        strips.push(Rect::new(area.x, area.y + height as i32, width, area.height - height));
    }
    strips
}

impl Window for ImageWidget {
    fn base(&self) -> &WindowBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WindowBase {
        &mut self.base
    }

    fn class_name(&self) -> &'static str {
        "ImageWidget"
    }

    fn redraw(&mut self, surface: &mut dyn Surface) {
        let area = self.base.area;
        let background = self.base.background;
        let Some(binding) = self.binding.as_mut() else {
            surface.fill_rect(area, background);
            return;
        };
        if binding.scheduler.state() == SchedulerState::Errored {
            surface.fill_rect(area, background);
            return;
        }

        match binding.handle.frame() {
            Ok(frame) => {
                let dest = Rect::new(
                    area.x,
                    area.y,
                    frame.width.min(area.width),
                    frame.height.min(area.height),
                );
                surface.draw_rgba(dest, &frame.rgba_data, frame.width, background);
                for strip in uncovered(area, frame.width, frame.height) {
                    surface.fill_rect(strip, background);
                }
            }
            Err(e) => {
                log::error!("Failed to draw {}: {}", binding.handle.origin(), e);
                binding.scheduler.fail();
                surface.fill_rect(area, background);
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for ImageWidget {
    fn drop(&mut self) {
        self.close();
    }
}
