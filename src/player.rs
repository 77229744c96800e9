//! Cooperative playback loop: redraw, ask for the hold time, wait, repeat.

use crate::decoder::HoldTime;
use crate::ui::image_widget::ImageWidget;
use crate::ui::window::{Surface, Window};
use smol::Timer;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Player {
    /// Stop after this many redraws even if the image keeps changing.
    pub max_frames: usize,
    /// Multiplier applied to every hold; 0 skips the waits entirely.
    pub speed: f32,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            max_frames: 1000,
            speed: 1.0,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PlaybackReport {
    /// Hold time returned after each redraw, in order.
    pub holds: Vec<HoldTime>,
    pub frames_drawn: usize,
}

impl PlaybackReport {
    /// True if playback ended because the widget reported `Infinite`.
    pub fn finished(&self) -> bool {
        self.holds.last().is_some_and(|hold| hold.is_infinite())
    }
}

impl Player {
    pub fn new(max_frames: usize) -> Self {
        Self {
            max_frames,
            ..Self::default()
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed.max(0.0);
        self
    }

    fn wait_for(&self, hold: HoldTime) -> Option<Duration> {
        match hold {
            HoldTime::For(duration) if self.speed > 0.0 => Some(duration.mul_f32(self.speed)),
            _ => None,
        }
    }

    pub async fn play(&self, widget: &mut ImageWidget, surface: &mut dyn Surface) -> PlaybackReport {
        let mut report = PlaybackReport::default();

        while report.frames_drawn < self.max_frames {
            widget.draw(surface);
            report.frames_drawn += 1;

            let hold = widget.next();
            report.holds.push(hold);
            if hold.is_infinite() {
                break;
            }
            if let Some(duration) = self.wait_for(hold) {
                Timer::after(duration).await;
            }
        }

        log::info!(
            "Played {} frames, last error {}",
            report.frames_drawn,
            widget.last_error()
        );
        report
    }

    pub fn play_blocking(&self, widget: &mut ImageWidget, surface: &mut dyn Surface) -> PlaybackReport {
        smol::block_on(self.play(widget, surface))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WidgetConfig;
    use crate::test_utils::{frame_colour, gif_bytes, png_bytes};
    use crate::ui::window::WindowInit;
    use image::codecs::gif::Repeat;
    use image::RgbaImage;
    use std::time::Instant;

    fn widget(bytes: Vec<u8>) -> ImageWidget {
        let mut widget =
            ImageWidget::create(&WindowInit::new(0, 0, 4, 3), &WidgetConfig::default()).unwrap();
        assert!(widget.open_memory(bytes));
        widget
    }

    #[test]
    fn still_image_plays_one_frame() {
        let mut widget = widget(png_bytes(4, 3, [7, 7, 7, 255]));
        let mut surface = RgbaImage::new(4, 3);

        let report = Player::new(10).play_blocking(&mut widget, &mut surface);
        assert_eq!(report.frames_drawn, 2);
        assert_eq!(report.holds, vec![HoldTime::Immediate, HoldTime::Infinite]);
        assert!(report.finished());
        assert_eq!(surface.get_pixel(0, 0).0, [7, 7, 7, 255]);
    }

    #[test]
    fn looping_animation_stops_at_frame_limit() {
        let mut widget = widget(gif_bytes(&[10, 20], Some(Repeat::Infinite)));
        let mut surface = RgbaImage::new(4, 3);

        let report = Player::new(5).with_speed(0.0).play_blocking(&mut widget, &mut surface);
        assert_eq!(report.frames_drawn, 5);
        assert!(!report.finished());
        assert_eq!(surface.get_pixel(0, 0).0, frame_colour(1));
    }

    #[test]
    fn waits_for_hold_times() {
        let mut widget = widget(gif_bytes(&[30, 30], None));
        let mut surface = RgbaImage::new(4, 3);

        let started = Instant::now();
        let report = smol::block_on(Player::new(10).play(&mut widget, &mut surface));
        assert_eq!(report.holds[1], HoldTime::from_millis(30));
        assert!(report.finished());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
