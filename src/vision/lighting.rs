//! Brightness, contrast and tone transforms
//!
//! Every mode is a per-channel or per-luma lookup table, so channel
//! arithmetic happens once per level and saturates into 0-255.

use crate::types::LightingMode;
use image::{Rgb, RgbImage};
use std::sync::OnceLock;

type ChannelLut = [u8; 256];
type ToneLut = [[u8; 3]; 256];

#[derive(Debug, Default, Clone, Copy)]
pub struct LightingAdjuster;

impl LightingAdjuster {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Apply `mode` and return a new image
    #[must_use]
    pub fn apply(&self, image: &RgbImage, mode: LightingMode) -> RgbImage {
        let _span = tracing::debug_span!("lighting", mode = mode.name()).entered();
        match mode {
            LightingMode::Daylight => apply_channel_lut(image, &linear_lut(1.2, 20.0)),
            LightingMode::Dimmed => apply_channel_lut(image, &linear_lut(0.8, -30.0)),
            LightingMode::Custom {
                brightness,
                contrast,
            } => {
                let (scale, offset) = custom_scale_offset(brightness, contrast);
                apply_channel_lut(image, &linear_lut(scale, offset))
            },
            LightingMode::Warm => apply_tone_lut(image, warm_lut()),
            LightingMode::Cool => apply_tone_lut(image, cool_lut()),
        }
    }
}

/// Scale `brightness / 50`, offset `contrast - 50`
#[must_use]
pub fn custom_scale_offset(brightness: u8, contrast: u8) -> (f64, f64) {
    (f64::from(brightness) / 50.0, f64::from(contrast) - 50.0)
}

fn saturate(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn linear_lut(scale: f64, offset: f64) -> ChannelLut {
    let mut lut = [0u8; 256];
    for (level, slot) in lut.iter_mut().enumerate() {
        *slot = saturate(level as f64 * scale + offset);
    }
    lut
}

fn apply_channel_lut(image: &RgbImage, lut: &ChannelLut) -> RgbImage {
    let mut out = image.clone();
    for value in out.iter_mut() {
        *value = lut[usize::from(*value)];
    }
    out
}

/// BT.601 luma, rounded
fn luma(Rgb([r, g, b]): Rgb<u8>) -> u8 {
    saturate(0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b))
}

fn apply_tone_lut(image: &RgbImage, lut: &ToneLut) -> RgbImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        *pixel = Rgb(lut[usize::from(luma(*pixel))]);
    }
    out
}

fn build_tone_lut(curve: impl Fn(f64) -> [f64; 3]) -> ToneLut {
    let mut lut = [[0u8; 3]; 256];
    for (level, slot) in lut.iter_mut().enumerate() {
        let rgb = curve(level as f64 / 255.0);
        *slot = rgb.map(|c| saturate(c.clamp(0.0, 1.0) * 255.0));
    }
    lut
}

/// Autumn ramp: red fixed at full, green follows luma, no blue
fn warm_lut() -> &'static ToneLut {
    static LUT: OnceLock<ToneLut> = OnceLock::new();
    LUT.get_or_init(|| build_tone_lut(|x| [1.0, x, 0.0]))
}

/// Ocean ramp: dark green through deep blue to white
fn cool_lut() -> &'static ToneLut {
    static LUT: OnceLock<ToneLut> = OnceLock::new();
    LUT.get_or_init(|| build_tone_lut(|x| [3.0 * x - 2.0, ((3.0 * x - 1.0) / 2.0).abs(), x]))
}
