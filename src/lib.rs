//! # plascii - Terminal ASCII Video Player Library
//!
//! `plascii` converts images and videos into character art and, for video,
//! plays the result back in the terminal in lock-step with the soundtrack.
//!
//! ## Features
//!
//! - Deterministic brightness-to-glyph mapping over a configurable ramp
//! - Frame pipeline that turns extracted video frames into an in-memory
//!   sequence of character frames, with parallel conversion and progress
//!   reporting
//! - Audio-clock driven playback scheduler with pause/resume and cancel
//! - Still-image rendering with terminal cell aspect correction
//!
//! ## Example
//!
//! Mapping brightness to glyphs is pure and total:
//!
//! ```
//! use plascii::GlyphRamp;
//!
//! let ramp = GlyphRamp::default();
//! assert_eq!(ramp.glyph_for(0.0), ' ');
//! assert_eq!(ramp.glyph_for(1.0), '%');
//! ```
//!
//! Building a frame sequence from a directory of extracted frames:
//!
//! ```no_run
//! use plascii::{build_sequence, GlyphRamp};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ramp = GlyphRamp::default();
//! let frames = build_sequence(Path::new("frames"), &ramp, |current, total| {
//!     println!("converted {current}/{total}");
//! })?;
//! println!("{} frames ready for playback", frames.len());
//! # Ok(())
//! # }
//! ```

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use rayon::prelude::*;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use walkdir::WalkDir;

pub mod audio;
pub mod extract;
pub mod playback;
pub mod progress;
pub mod terminal;

/// Default glyph ramp, darkest to brightest.
pub const DEFAULT_RAMP: &str = " .-+*wvGHM#&%";

/// Default vertical correction: a terminal cell is roughly twice as tall as
/// it is wide, so rendered rows are squashed by this factor.
pub const DEFAULT_FONT_RATIO: f32 = 0.55;

fn default_ascii_chars() -> String {
    DEFAULT_RAMP.to_string()
}

fn default_font_ratio() -> f32 {
    DEFAULT_FONT_RATIO
}

fn default_tick_ms() -> u64 {
    30
}

/// Application configuration loaded from `plascii.json`.
///
/// Every field has a built-in default, so a partial (or absent) config file
/// is fine.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Glyph ramp used for rendering, darkest to brightest.
    #[serde(default = "default_ascii_chars")]
    pub ascii_chars: String,
    /// Character cell aspect correction applied to still images.
    #[serde(default = "default_font_ratio")]
    pub font_ratio: f32,
    /// Advisory pacing between playback ticks, in milliseconds.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ascii_chars: default_ascii_chars(),
            font_ratio: default_font_ratio(),
            tick_ms: default_tick_ms(),
        }
    }
}

impl AppConfig {
    /// Reject configurations that would corrupt output or break rendering.
    pub fn validate(&self) -> Result<()> {
        GlyphRamp::new(&self.ascii_chars)?;
        if !self.font_ratio.is_finite() || self.font_ratio <= 0.0 {
            return Err(anyhow!("font_ratio must be positive, got {}", self.font_ratio));
        }
        Ok(())
    }
}

/// Ordered palette of characters representing increasing brightness.
///
/// Immutable once constructed; `glyph_for` is a pure O(1) lookup.
#[derive(Debug, Clone)]
pub struct GlyphRamp {
    glyphs: Vec<char>,
}

impl GlyphRamp {
    /// Build a ramp from an ordered string, index 0 = darkest.
    ///
    /// Fails on ramps shorter than two glyphs or containing non-ASCII
    /// characters (which would corrupt the rendered grid).
    pub fn new(chars: &str) -> Result<Self> {
        if !chars.is_ascii() {
            return Err(anyhow!(
                "glyph ramp contains non-ASCII characters; output would be corrupted"
            ));
        }
        let glyphs: Vec<char> = chars.chars().collect();
        if glyphs.len() < 2 {
            return Err(anyhow!(
                "glyph ramp needs at least 2 characters, got {}",
                glyphs.len()
            ));
        }
        Ok(Self { glyphs })
    }

    /// Map a normalized brightness sample to a glyph.
    ///
    /// `index = floor(brightness * N)` clamped into `[0, N-1]`, so 1.0 maps
    /// to the brightest glyph and out-of-range input is clamped, not
    /// rejected.
    pub fn glyph_for(&self, brightness: f32) -> char {
        let n = self.glyphs.len();
        let index = (brightness * n as f32).floor() as isize;
        let index = index.clamp(0, n as isize - 1) as usize;
        self.glyphs[index]
    }

    /// Number of glyphs in the ramp.
    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }
}

impl Default for GlyphRamp {
    fn default() -> Self {
        Self {
            glyphs: DEFAULT_RAMP.chars().collect(),
        }
    }
}

/// A decoded image as normalized luminance samples in `[0, 1]`, row-major.
#[derive(Debug, Clone)]
pub struct LumaGrid {
    width: u32,
    height: u32,
    samples: Vec<f32>,
}

impl LumaGrid {
    /// Build a grid from raw samples. `samples.len()` must equal
    /// `width * height`.
    pub fn from_samples(width: u32, height: u32, samples: Vec<f32>) -> Result<Self> {
        if samples.len() != (width as usize) * (height as usize) {
            return Err(anyhow!(
                "sample count {} does not match {}x{} grid",
                samples.len(),
                width,
                height
            ));
        }
        Ok(Self { width, height, samples })
    }

    fn from_rgb(img: &image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        let samples = img.pixels().map(|px| luminance(*px)).collect();
        Self { width, height, samples }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sample at `(x, y)`. Out-of-bounds coordinates panic.
    pub fn sample(&self, x: u32, y: u32) -> f32 {
        self.samples[(y * self.width + x) as usize]
    }
}

/// One rendered frame: an immutable grid of glyphs, one row per source
/// scanline, each row terminated by `\n`.
#[derive(Debug, Clone)]
pub struct CharacterFrame {
    width: u32,
    height: u32,
    text: String,
}

impl CharacterFrame {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The full grid, ready to write to a terminal or a file.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Ordered, index-addressable sequence of character frames for one video.
///
/// Built once by [`build_sequence`], then read by the playback scheduler.
#[derive(Debug, Default)]
pub struct FrameSequence {
    frames: Vec<CharacterFrame>,
}

impl FrameSequence {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CharacterFrame> {
        self.frames.get(index)
    }
}

/// Rec. 709 luminance, normalized to `[0, 1]`.
fn luminance(rgb: image::Rgb<u8>) -> f32 {
    let r = f32::from(rgb[0]);
    let g = f32::from(rgb[1]);
    let b = f32::from(rgb[2]);
    (0.2126 * r + 0.7152 * g + 0.0722 * b) / 255.0
}

/// Render one decoded image into a character frame.
///
/// Visits every pixel exactly once, row-major; output dimensions equal the
/// input dimensions exactly. Any resizing happens at decode time, not here.
pub fn render_frame(image: &LumaGrid, ramp: &GlyphRamp) -> CharacterFrame {
    let (width, height) = (image.width(), image.height());
    let mut text = String::with_capacity((width as usize + 1) * height as usize);
    for y in 0..height {
        for x in 0..width {
            text.push(ramp.glyph_for(image.sample(x, y)));
        }
        text.push('\n');
    }
    CharacterFrame { width, height, text }
}

/// Row count for a still image rendered at `target_w` columns, preserving
/// the source aspect ratio corrected by `font_ratio`.
pub fn still_target_height(src_w: u32, src_h: u32, target_w: u32, font_ratio: f32) -> u32 {
    if src_w == 0 {
        return 1;
    }
    let h = (src_h as f32 / src_w as f32 * target_w as f32 * font_ratio).round() as u32;
    h.max(1)
}

/// Decode an image into a luminance grid at its native dimensions.
///
/// Video frames are pre-scaled by the extractor, so no correction is applied
/// here.
pub fn decode_luma(path: &Path) -> Result<LumaGrid> {
    let img = image::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .to_rgb8();
    Ok(LumaGrid::from_rgb(&img))
}

/// Decode an image and resize it to `target_w` x `target_h` (still-image
/// mode; pair with [`still_target_height`]).
pub fn decode_luma_scaled(path: &Path, target_w: u32, target_h: u32) -> Result<LumaGrid> {
    let img = image::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .to_rgb8();
    let (orig_w, orig_h) = img.dimensions();
    let img = if (orig_w, orig_h) != (target_w, target_h) {
        DynamicImage::ImageRgb8(img)
            .resize_exact(target_w, target_h, image::imageops::FilterType::Lanczos3)
            .to_rgb8()
    } else {
        img
    };
    Ok(LumaGrid::from_rgb(&img))
}

/// Convert a directory of extracted `frame_NNNN.png` files into an ordered
/// frame sequence.
///
/// Frames are numbered from 1 by the extractor and normalized to 0-based
/// indices here. Enumeration stops at the first missing index, and the
/// result is truncated at the first frame that fails to decode — playback
/// proceeds with the contiguous prefix that was built. Zero frames yields an
/// empty sequence; callers must not attempt playback on one.
///
/// `progress` is invoked with `(current, total)` as each frame completes.
/// Conversion runs in parallel, so `current` values may arrive out of order.
pub fn build_sequence<F>(frames_dir: &Path, ramp: &GlyphRamp, progress: F) -> Result<FrameSequence>
where
    F: Fn(usize, usize) + Send + Sync,
{
    let expected = WalkDir::new(frames_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|n| n.starts_with("frame_") && n.ends_with(".png"))
        })
        .count();

    let mut paths = Vec::with_capacity(expected);
    for index in 1..=expected {
        let path = frames_dir.join(format!("frame_{:04}.png", index));
        if !path.exists() {
            // Gap in the numbering: keep the contiguous prefix.
            break;
        }
        paths.push(path);
    }

    let total = paths.len();
    let completed = AtomicUsize::new(0);

    let rendered: Vec<Result<CharacterFrame>> = paths
        .par_iter()
        .map(|path| {
            let frame = decode_luma(path).map(|grid| render_frame(&grid, ramp));
            let current = completed.fetch_add(1, Ordering::SeqCst) + 1;
            progress(current, total);
            frame
        })
        .collect();

    let mut frames = Vec::with_capacity(total);
    for result in rendered {
        match result {
            Ok(frame) => frames.push(frame),
            Err(err) => {
                log::warn!(
                    "frame {} failed to decode, keeping {} frames: {err:#}",
                    frames.len() + 1,
                    frames.len()
                );
                break;
            }
        }
    }
    Ok(FrameSequence { frames })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;
    use std::fs;

    #[test]
    fn ramp_endpoints() {
        let ramp = GlyphRamp::new(" .:@").unwrap();
        assert_eq!(ramp.glyph_for(0.0), ' ');
        assert_eq!(ramp.glyph_for(1.0), '@');
    }

    #[test]
    fn ramp_clamps_out_of_range() {
        let ramp = GlyphRamp::new(" .:@").unwrap();
        assert_eq!(ramp.glyph_for(-0.5), ' ');
        assert_eq!(ramp.glyph_for(2.0), '@');
    }

    #[test]
    fn ramp_is_non_decreasing() {
        let ramp = GlyphRamp::default();
        let mut last_index = 0;
        for step in 0..=100 {
            let glyph = ramp.glyph_for(step as f32 / 100.0);
            let index = DEFAULT_RAMP.chars().position(|c| c == glyph).unwrap();
            assert!(index >= last_index, "ramp went backwards at step {}", step);
            last_index = index;
        }
    }

    #[test]
    fn ramp_rejects_short_and_non_ascii() {
        assert!(GlyphRamp::new("#").is_err());
        assert!(GlyphRamp::new("").is_err());
        assert!(GlyphRamp::new(" .é@").is_err());
    }

    #[test]
    fn render_preserves_dimensions() {
        let samples = vec![0.0, 0.25, 0.5, 0.75, 1.0, 0.0];
        let grid = LumaGrid::from_samples(3, 2, samples).unwrap();
        let frame = render_frame(&grid, &GlyphRamp::default());
        assert_eq!(frame.width(), 3);
        assert_eq!(frame.height(), 2);
        let rows: Vec<&str> = frame.text().lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.chars().count() == 3));
    }

    #[test]
    fn render_maps_extremes() {
        let grid = LumaGrid::from_samples(2, 1, vec![0.0, 1.0]).unwrap();
        let frame = render_frame(&grid, &GlyphRamp::default());
        assert_eq!(frame.text(), " %\n");
    }

    #[test]
    fn still_height_applies_aspect_correction() {
        // 200x100 source at 80 columns: round(100/200 * 80 * 0.55) = 22
        assert_eq!(still_target_height(200, 100, 80, 0.55), 22);
    }

    #[test]
    fn still_height_never_zero() {
        assert_eq!(still_target_height(1000, 1, 10, 0.55), 1);
        assert_eq!(still_target_height(0, 100, 80, 0.55), 1);
    }

    #[test]
    fn config_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ascii_chars, DEFAULT_RAMP);
    }

    #[test]
    fn config_rejects_bad_ramp() {
        let config = AppConfig {
            ascii_chars: "x".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    fn write_frame(dir: &Path, index: usize, shade: u8) {
        let img = GrayImage::from_pixel(4, 3, image::Luma([shade]));
        img.save(dir.join(format!("frame_{:04}.png", index))).unwrap();
    }

    #[test]
    fn build_sequence_converts_all_contiguous_frames() {
        let dir = tempfile::tempdir().unwrap();
        for index in 1..=3 {
            write_frame(dir.path(), index, 128);
        }
        let sequence = build_sequence(dir.path(), &GlyphRamp::default(), |_, _| {}).unwrap();
        assert_eq!(sequence.len(), 3);
        let frame = sequence.get(0).unwrap();
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
    }

    #[test]
    fn build_sequence_stops_at_first_gap() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), 1, 0);
        write_frame(dir.path(), 2, 255);
        write_frame(dir.path(), 4, 128);
        let sequence = build_sequence(dir.path(), &GlyphRamp::default(), |_, _| {}).unwrap();
        assert_eq!(sequence.len(), 2);
    }

    #[test]
    fn build_sequence_truncates_at_first_bad_frame() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), 1, 10);
        fs::write(dir.path().join("frame_0002.png"), b"not a png").unwrap();
        write_frame(dir.path(), 3, 20);
        let sequence = build_sequence(dir.path(), &GlyphRamp::default(), |_, _| {}).unwrap();
        assert_eq!(sequence.len(), 1);
    }

    #[test]
    fn build_sequence_empty_dir_yields_empty_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let sequence = build_sequence(dir.path(), &GlyphRamp::default(), |_, _| {}).unwrap();
        assert!(sequence.is_empty());
    }

    #[test]
    fn build_sequence_reports_progress_total() {
        let dir = tempfile::tempdir().unwrap();
        for index in 1..=5 {
            write_frame(dir.path(), index, 64);
        }
        let calls = AtomicUsize::new(0);
        let sequence = build_sequence(dir.path(), &GlyphRamp::default(), |_, total| {
            assert_eq!(total, 5);
            calls.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        assert_eq!(sequence.len(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
