//! Image operations on type-erased window handles.
//!
//! Toolkit code usually holds windows as `&mut dyn Window`; these helpers
//! check the concrete type before forwarding to [`ImageWidget`] and fail the
//! same way an unbound widget does when the window is something else.

use super::image_widget::ImageWidget;
use super::window::Window;
#[cfg(feature = "stream-source")]
use crate::decoder::source::SharedStream;
use crate::decoder::source::MemoryImage;
use crate::decoder::HoldTime;
use crate::error::{ErrorCode, ImageError, Result};

pub fn image_widget_mut(window: &mut dyn Window) -> Result<&mut ImageWidget> {
    let class = window.class_name();
    match window.as_any_mut().downcast_mut::<ImageWidget>() {
        Some(widget) => Ok(widget),
        None => {
            log::warn!("Expected an image widget, got {}", class);
            Err(ImageError::TypeMismatch)
        }
    }
}

pub fn image_widget(window: &dyn Window) -> Result<&ImageWidget> {
    window.as_any().downcast_ref::<ImageWidget>().ok_or_else(|| {
        log::warn!("Expected an image widget, got {}", window.class_name());
        ImageError::TypeMismatch
    })
}

pub fn open_memory(window: &mut dyn Window, bytes: impl Into<MemoryImage>) -> bool {
    image_widget_mut(window).is_ok_and(|widget| widget.open_memory(bytes))
}

#[cfg(feature = "file-source")]
pub fn open_file(window: &mut dyn Window, path: impl AsRef<std::path::Path>) -> bool {
    image_widget_mut(window).is_ok_and(|widget| widget.open_file(path))
}

#[cfg(feature = "stream-source")]
pub fn open_stream(window: &mut dyn Window, stream: SharedStream) -> bool {
    image_widget_mut(window).is_ok_and(|widget| widget.open_stream(stream))
}

pub fn cache(window: &mut dyn Window) -> ErrorCode {
    match image_widget_mut(window) {
        Ok(widget) => widget.cache(),
        Err(e) => e.code(),
    }
}

pub fn next(window: &mut dyn Window) -> HoldTime {
    image_widget_mut(window).map_or(HoldTime::Infinite, |widget| widget.next())
}

/// Error recorded by the bound image, or `TypeMismatch` for other windows.
pub fn last_error(window: &dyn Window) -> ErrorCode {
    match image_widget(window) {
        Ok(widget) => widget.last_error(),
        Err(e) => e.code(),
    }
}

/// Back to the first frame; see [`ImageWidget::restart`].
pub fn restart(window: &mut dyn Window) -> ErrorCode {
    match image_widget_mut(window) {
        Ok(widget) => widget.restart(),
        Err(e) => e.code(),
    }
}

pub fn close(window: &mut dyn Window) {
    if let Ok(widget) = image_widget_mut(window) {
        widget.close();
    }
}
