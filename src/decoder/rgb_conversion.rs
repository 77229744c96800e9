/// Channel layout of raw decoded samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleLayout {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
    Cmyk,
}

impl SampleLayout {
    pub fn channels(self) -> usize {
        match self {
            SampleLayout::Gray => 1,
            SampleLayout::GrayAlpha => 2,
            SampleLayout::Rgb => 3,
            SampleLayout::Rgba | SampleLayout::Cmyk => 4,
        }
    }
}

/// Convert a 16-bit sample to 8 bits
#[inline]
pub fn u16_to_u8(val: u16) -> u8 {
    (val >> 8) as u8
}

/// Convert interleaved 8-bit samples to interleaved RGBA8.
///
/// # Arguments
/// * `samples` - Interleaved samples, `layout.channels()` per pixel
/// * `layout` - Channel layout of `samples`
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
///
/// # Returns
/// Vec<u8> containing RGBA8 data (RGBARGBARGBA...). Pixels missing from a
/// short input stay transparent black.
pub fn samples_to_rgba8(samples: &[u8], layout: SampleLayout, width: usize, height: usize) -> Vec<u8> {
    let mut rgba = vec![0u8; width * height * 4];
    let channels = layout.channels();

    if samples.len() < width * height * channels {
        log::warn!(
            "Short sample buffer for {:?} image: {} < {}",
            layout,
            samples.len(),
            width * height * channels
        );
    }

    for (src, dst) in samples.chunks_exact(channels).zip(rgba.chunks_exact_mut(4)) {
        match layout {
            SampleLayout::Gray => {
                dst[0] = src[0];
                dst[1] = src[0];
                dst[2] = src[0];
                dst[3] = 255;
            }
            SampleLayout::GrayAlpha => {
                dst[0] = src[0];
                dst[1] = src[0];
                dst[2] = src[0];
                dst[3] = src[1];
            }
            SampleLayout::Rgb => {
                dst[..3].copy_from_slice(src);
                dst[3] = 255;
            }
            SampleLayout::Rgba => {
                dst.copy_from_slice(src);
            }
            SampleLayout::Cmyk => {
                let k = 255 - u32::from(src[3]);
                for i in 0..3 {
                    dst[i] = ((255 - u32::from(src[i])) * k / 255) as u8;
                }
                dst[3] = 255;
            }
        }
    }

    rgba
}

/// Composite one RGBA8 pixel over an opaque 0xRRGGBB background
#[inline]
pub fn blend_over(src: &[u8], background: u32) -> [u8; 4] {
    let bg = [
        (background >> 16) as u8,
        (background >> 8) as u8,
        background as u8,
    ];
    let alpha = u32::from(src[3]);
    match alpha {
        255 => [src[0], src[1], src[2], 255],
        0 => [bg[0], bg[1], bg[2], 255],
        _ => {
            let mut out = [0u8, 0, 0, 255];
            for i in 0..3 {
                out[i] = ((u32::from(src[i]) * alpha + u32::from(bg[i]) * (255 - alpha) + 127) / 255) as u8;
            }
            out
        }
    }
}
