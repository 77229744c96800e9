//! Widget configuration, loaded from and saved to TOML.
//!
//! Every key is optional; missing keys take the values of
//! [`WidgetConfig::default`].
//!
//! ```toml
//! min_frame_delay_ms = 20
//! force_loop = true
//! max_cache_bytes = 1048576
//! display_width = 320
//! display_height = 240
//! background = 0x000000
//! ```

use crate::ui::window::Color;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_MIN_FRAME_DELAY_MS: u32 = 10;
pub const DEFAULT_FRAME_DELAY_MS: u32 = 100;
pub const DEFAULT_MAX_CACHE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Lower bound for animation hold times; authored delays below it are raised.
    pub min_frame_delay_ms: u32,
    /// Hold time for animation frames that carry no delay of their own.
    pub default_frame_delay_ms: u32,
    /// Loop every animation forever, ignoring its authored loop count.
    pub force_loop: bool,
    /// Largest decoded frame (RGBA bytes) that `cache` will keep in memory.
    pub max_cache_bytes: usize,
    /// Display bounds new widgets are clipped against.
    pub display_width: Option<u32>,
    pub display_height: Option<u32>,
    /// Overrides for the process-wide default window colours.
    pub background: Option<Color>,
    pub foreground: Option<Color>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            min_frame_delay_ms: DEFAULT_MIN_FRAME_DELAY_MS,
            default_frame_delay_ms: DEFAULT_FRAME_DELAY_MS,
            force_loop: false,
            max_cache_bytes: DEFAULT_MAX_CACHE_BYTES,
            display_width: None,
            display_height: None,
            background: None,
            foreground: None,
        }
    }
}

impl WidgetConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse widget config")
    }

    /// Effective minimum hold time; never zero so real durations stay
    /// distinguishable from the immediate sentinel.
    pub fn min_frame_delay_ms(&self) -> u32 {
        self.min_frame_delay_ms.max(1)
    }
}

pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<WidgetConfig> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config = WidgetConfig::from_toml_str(&text)?;
    log::info!("Loaded widget config from {:?}", path);
    Ok(config)
}

pub fn save_to_path<P: AsRef<Path>>(config: &WidgetConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let text = toml::to_string_pretty(config).context("Failed to serialize widget config")?;
    fs::write(path, text).with_context(|| format!("Failed to write config file {:?}", path))?;
    Ok(())
}
