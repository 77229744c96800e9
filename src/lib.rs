//! Image widget for a small retained-mode GUI toolkit.
//!
//! An [`ImageWidget`] is bound to an image held in memory, in a file or
//! behind a seekable stream. Only the header is read when binding; frames are
//! decoded when drawn or when [`ImageWidget::cache`] is called. After every
//! redraw, [`ImageWidget::next`] says how long to keep the current frame on
//! screen before drawing again.

pub mod config;
pub mod decoder;
pub mod error;
pub mod player;
pub mod scheduler;
pub mod ui;

#[cfg(test)]
mod test_utils;

pub use config::WidgetConfig;
pub use decoder::source::{ImageSource, MemoryImage};
pub use decoder::{HoldTime, ImageCodec, ImageKind, ImageMetadata, LoopMode};
pub use error::{ErrorCode, ImageError};
pub use player::{PlaybackReport, Player};
pub use scheduler::SchedulerState;
pub use ui::image_widget::ImageWidget;
pub use ui::window::{Color, Rect, Surface, Window, WindowInit};
