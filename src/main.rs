//! image-widget - play an image through the widget into an offscreen framebuffer

use anyhow::{bail, Context, Result};
use image::RgbaImage;
use image_widget::config::{self, WidgetConfig};
use image_widget::decoder::handle::ImageHandle;
use image_widget::{ImageSource, ImageWidget, Player, Window, WindowInit};
use std::path::PathBuf;

const USAGE: &str = "usage: image-widget <file> [--config <toml>] [--frames N] [--out <png>]";

const DEFAULT_FRAMES: usize = 100;

#[derive(Debug, PartialEq)]
struct Args {
    file: PathBuf,
    config: Option<PathBuf>,
    frames: usize,
    out: Option<PathBuf>,
}

fn parse_args(mut args: pico_args::Arguments) -> Result<Args> {
    let config = args.opt_value_from_str("--config")?;
    let frames = args.opt_value_from_str("--frames")?.unwrap_or(DEFAULT_FRAMES);
    let out = args.opt_value_from_str("--out")?;
    let file = args.free_from_str().context(USAGE)?;

    let rest = args.finish();
    if !rest.is_empty() {
        bail!("Unexpected arguments {:?}\n{}", rest, USAGE);
    }

    Ok(Args {
        file,
        config,
        frames,
        out,
    })
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        println!("{}", USAGE);
        return Ok(());
    }
    let args = parse_args(args)?;
    let config = match &args.config {
        Some(path) => config::load_from_path(path)?,
        None => WidgetConfig::default(),
    };

    // Size the window to the image
    let first_look = ImageHandle::open(ImageSource::file(&args.file), &config)
        .with_context(|| format!("Failed to open {:?}", args.file))?;
    let meta = first_look.metadata().clone();
    first_look.close();

    let init = WindowInit::new(0, 0, meta.width, meta.height);
    let Some(mut widget) = ImageWidget::create(&init, &config) else {
        bail!("Image {:?} has no drawable area", args.file);
    };
    if let Err(e) = widget.try_open(ImageSource::file(&args.file)) {
        bail!("Failed to bind {:?}: {} (code {:#06x})", args.file, e, e.code().value());
    }

    println!(
        "{}: {} {}x{} {:?}, {} frame(s), {:?}",
        args.file.display(),
        meta.format,
        meta.width,
        meta.height,
        meta.kind,
        meta.frame_count.map_or_else(|| "?".to_string(), |n| n.to_string()),
        meta.loop_mode
    );

    let area = widget.base().area;
    let mut surface = RgbaImage::new(area.width, area.height);
    let report = Player::new(args.frames).play_blocking(&mut widget, &mut surface);
    for (i, hold) in report.holds.iter().enumerate() {
        println!("frame {:>4}: {:?}", i, hold);
    }
    if !report.finished() {
        println!("stopped after {} frames", report.frames_drawn);
    }

    let code = widget.last_error();
    widget.destroy();

    if let Some(out) = &args.out {
        surface
            .save(out)
            .with_context(|| format!("Failed to save framebuffer to {:?}", out))?;
        log::info!("Saved framebuffer to {:?}", out);
    }

    if code.is_fatal() {
        bail!("Playback failed: {}", code);
    }
    Ok(())
}
