//! Generic window record, redraw dispatch and drawing surfaces.

use crate::config::WidgetConfig;
use crate::decoder::rgb_conversion::blend_over;
use image::{Rgba, RgbaImage};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::any::Any;

/// 0xRRGGBB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color(0x000000);
    pub const WHITE: Color = Color(0xffffff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8, 255]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    /// Overlap of two rectangles, `None` when they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= i64::from(x) || bottom <= i64::from(y) {
            return None;
        }
        Some(Rect {
            x,
            y,
            width: (right - i64::from(x)) as u32,
            height: (bottom - i64::from(y)) as u32,
        })
    }
}

/// Geometry and options for a new window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowInit {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub show: bool,
}

impl WindowInit {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height, show: true }
    }
}

/// (foreground, background) given to windows when they are created
static DEFAULT_COLORS: RwLock<(Color, Color)> = RwLock::new((Color::WHITE, Color::BLACK));

pub fn set_default_colors(foreground: Color, background: Color) {
    *DEFAULT_COLORS.write() = (foreground, background);
}

pub fn default_foreground() -> Color {
    DEFAULT_COLORS.read().0
}

pub fn default_background() -> Color {
    DEFAULT_COLORS.read().1
}

/// Clip a span to `[0, limit)`; unbounded when no limit is configured.
fn clip_axis(start: i32, len: u32, limit: Option<u32>) -> Option<(i32, u32)> {
    let Some(limit) = limit else {
        return Some((start, len));
    };
    let lo = i64::from(start).max(0);
    let hi = (i64::from(start) + i64::from(len)).min(i64::from(limit));
    (hi > lo).then(|| (lo as i32, (hi - lo) as u32))
}

/// State shared by every kind of window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowBase {
    pub area: Rect,
    pub foreground: Color,
    pub background: Color,
    pub visible: bool,
}

impl WindowBase {
    /// Returns `None` when no drawable area is left after clipping to the
    /// configured display bounds.
    pub fn new(init: &WindowInit, config: &WidgetConfig) -> Option<Self> {
        let (x, width) = clip_axis(init.x, init.width, config.display_width)?;
        let (y, height) = clip_axis(init.y, init.height, config.display_height)?;
        let area = Rect::new(x, y, width, height);
        if area.is_empty() {
            return None;
        }

        Some(Self {
            area,
            foreground: config.foreground.unwrap_or_else(default_foreground),
            background: config.background.unwrap_or_else(default_background),
            visible: init.show,
        })
    }
}

/// Something windows can paint into
pub trait Surface {
    fn fill_rect(&mut self, area: Rect, color: Color);

    /// Paint the top-left `area.width` x `area.height` pixels of an RGBA
    /// image `src_width` pixels wide at `area`, compositing over `background`.
    fn draw_rgba(&mut self, area: Rect, src: &[u8], src_width: u32, background: Color);
}

impl Surface for RgbaImage {
    fn fill_rect(&mut self, area: Rect, color: Color) {
        let bounds = Rect::new(0, 0, self.width(), self.height());
        let Some(clip) = area.intersect(&bounds) else {
            return;
        };
        let pixel = Rgba(color.to_rgba());
        for y in clip.y..clip.y + clip.height as i32 {
            for x in clip.x..clip.x + clip.width as i32 {
                self.put_pixel(x as u32, y as u32, pixel);
            }
        }
    }

    fn draw_rgba(&mut self, area: Rect, src: &[u8], src_width: u32, background: Color) {
        let bounds = Rect::new(0, 0, self.width(), self.height());
        let Some(clip) = area.intersect(&bounds) else {
            return;
        };
        for y in clip.y..clip.y + clip.height as i32 {
            let sy = (y - area.y) as usize;
            for x in clip.x..clip.x + clip.width as i32 {
                let sx = (x - area.x) as usize;
                let idx = (sy * src_width as usize + sx) * 4;
                if let Some(px) = src.get(idx..idx + 4) {
                    self.put_pixel(x as u32, y as u32, Rgba(blend_over(px, background.0)));
                }
            }
        }
    }
}

/// A window the redraw dispatch can paint
pub trait Window: Any {
    fn base(&self) -> &WindowBase;

    fn base_mut(&mut self) -> &mut WindowBase;

    fn class_name(&self) -> &'static str;

    /// Paint the whole window area.
    fn redraw(&mut self, surface: &mut dyn Surface);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Redraw if visible.
    fn draw(&mut self, surface: &mut dyn Surface) {
        if self.base().visible {
            self.redraw(surface);
        }
    }

    fn set_visible(&mut self, visible: bool) {
        self.base_mut().visible = visible;
    }
}

/// Plain window that just fills its area with the background colour
pub struct PlainWindow {
    base: WindowBase,
}

impl PlainWindow {
    pub fn create(init: &WindowInit, config: &WidgetConfig) -> Option<Self> {
        WindowBase::new(init, config).map(|base| Self { base })
    }
}

impl Window for PlainWindow {
    fn base(&self) -> &WindowBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WindowBase {
        &mut self.base
    }

    fn class_name(&self) -> &'static str {
        "Window"
    }

    fn redraw(&mut self, surface: &mut dyn Surface) {
        surface.fill_rect(self.base.area, self.base.background);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
