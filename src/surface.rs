//! Software drawing surface for the photo wall renderers.
//!
//! A `Surface` is an owned RGBA8 pixel buffer with a logical size and a
//! device scale factor, standing in for the canvas the renderers paint onto:
//! - Solid and three-stop diagonal gradient fills
//! - Cover-fit image blits (centered crop, no letterboxing)
//! - Optional rounded-corner clipping applied during the blit
//! - PNG export with a fixed or date-stamped filename

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder, Rgba, RgbaImage};
use tracing::debug;

pub type Color = Rgba<u8>;

/// An axis-aligned rectangle in logical (scale-independent) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }
}

/// Compute the centered source crop for a cover-fit draw.
///
/// Returns `(sx, sy, sw, sh)` in source pixels: the largest centered region
/// of the source whose aspect ratio matches the destination, so drawing it
/// stretched to the destination fills the cell without letterboxing.
pub fn cover_crop(src_w: u32, src_h: u32, dest_w: f32, dest_h: f32) -> (f32, f32, f32, f32) {
    let (src_w, src_h) = (src_w as f32, src_h as f32);
    if src_w <= 0.0 || src_h <= 0.0 || dest_w <= 0.0 || dest_h <= 0.0 {
        return (0.0, 0.0, src_w.max(0.0), src_h.max(0.0));
    }
    let src_ar = src_w / src_h;
    let dest_ar = dest_w / dest_h;
    if src_ar > dest_ar {
        // Source is wider: crop the sides.
        let sw = src_h * dest_ar;
        (((src_w - sw) / 2.0), 0.0, sw, src_h)
    } else {
        // Source is taller: crop top and bottom.
        let sh = src_w / dest_ar;
        (0.0, ((src_h - sh) / 2.0), src_w, sh)
    }
}

/// Anti-aliased coverage of a pixel center inside a rounded rectangle of
/// `w` x `h` with corner radius `r`, all in device pixels. Coordinates are
/// local to the rectangle.
fn rounded_coverage(x: f32, y: f32, w: f32, h: f32, r: f32) -> f32 {
    if r <= 0.0 {
        return 1.0;
    }
    let r = r.min(w / 2.0).min(h / 2.0);
    let cx = if x < r {
        r
    } else if x > w - r {
        w - r
    } else {
        return 1.0;
    };
    let cy = if y < r {
        r
    } else if y > h - r {
        h - r
    } else {
        return 1.0;
    };
    let d = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();
    (r + 0.5 - d).clamp(0.0, 1.0)
}

fn lerp_color(a: Color, b: Color, t: f32) -> Color {
    let mix = |x: u8, y: u8| -> u8 {
        (x as f32 + (y as f32 - x as f32) * t).round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        mix(a[0], b[0]),
        mix(a[1], b[1]),
        mix(a[2], b[2]),
        mix(a[3], b[3]),
    ])
}

/// RGBA drawing surface with a logical size and device scale factor.
///
/// Pixel dimensions are `floor(logical x scale)`, matching how the original
/// canvas sized its backing store from CSS size and devicePixelRatio.
pub struct Surface {
    logical_w: f32,
    logical_h: f32,
    scale: f32,
    pixels: RgbaImage,
}

impl Surface {
    /// Create a surface at scale factor 1.
    pub fn new(logical_w: f32, logical_h: f32) -> Self {
        Self::with_scale(logical_w, logical_h, 1.0)
    }

    /// Create a surface with an explicit device scale factor.
    pub fn with_scale(logical_w: f32, logical_h: f32, scale: f32) -> Self {
        let scale = if scale > 0.0 { scale } else { 1.0 };
        let pw = ((logical_w * scale).floor() as u32).max(1);
        let ph = ((logical_h * scale).floor() as u32).max(1);
        Self {
            logical_w: logical_w.max(1.0),
            logical_h: logical_h.max(1.0),
            scale,
            pixels: RgbaImage::new(pw, ph),
        }
    }

    pub fn logical_size(&self) -> (f32, f32) {
        (self.logical_w, self.logical_h)
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Reallocate the backing store for a new logical size. Contents are
    /// discarded; callers repaint after a resize.
    pub fn resize(&mut self, logical_w: f32, logical_h: f32) {
        let pw = ((logical_w * self.scale).floor() as u32).max(1);
        let ph = ((logical_h * self.scale).floor() as u32).max(1);
        self.logical_w = logical_w.max(1.0);
        self.logical_h = logical_h.max(1.0);
        self.pixels = RgbaImage::new(pw, ph);
    }

    /// Fill the whole surface with one color.
    pub fn fill(&mut self, color: Color) {
        for px in self.pixels.pixels_mut() {
            *px = color;
        }
    }

    /// Fill with a three-stop gradient running diagonally from the top-left
    /// corner to the bottom-right corner.
    pub fn fill_gradient(&mut self, stops: [Color; 3]) {
        let (pw, ph) = self.pixels.dimensions();
        let span = ((pw.saturating_sub(1)) + (ph.saturating_sub(1))).max(1) as f32;
        for y in 0..ph {
            for x in 0..pw {
                let t = (x + y) as f32 / span;
                let color = if t < 0.5 {
                    lerp_color(stops[0], stops[1], t * 2.0)
                } else {
                    lerp_color(stops[1], stops[2], (t - 0.5) * 2.0)
                };
                self.pixels.put_pixel(x, y, color);
            }
        }
    }

    /// Draw an image cover-fit into `dest`, optionally clipped to a rounded
    /// rectangle with `corner_radius` (logical pixels).
    ///
    /// The source is cropped to a centered region matching the destination
    /// aspect ratio, scaled to the destination's device size, and blended
    /// over the existing pixels. Pixels falling outside the surface are
    /// clipped, so destinations may extend past the edges.
    pub fn draw_cover(&mut self, image: &DynamicImage, dest: Rect, corner_radius: f32) {
        if dest.w <= 0.0 || dest.h <= 0.0 {
            return;
        }
        let (src_w, src_h) = image.dimensions();
        if src_w == 0 || src_h == 0 {
            return;
        }

        // Device-space destination, rounded the way the original rounded
        // cell coordinates before drawing.
        let dx = (dest.x * self.scale).round() as i64;
        let dy = (dest.y * self.scale).round() as i64;
        let dw = ((dest.w * self.scale).ceil() as u32).max(1);
        let dh = ((dest.h * self.scale).ceil() as u32).max(1);

        let (sx, sy, sw, sh) = cover_crop(src_w, src_h, dw as f32, dh as f32);
        let cx = (sx.round() as u32).min(src_w.saturating_sub(1));
        let cy = (sy.round() as u32).min(src_h.saturating_sub(1));
        let cw = (sw.round() as u32).clamp(1, src_w - cx);
        let ch = (sh.round() as u32).clamp(1, src_h - cy);

        let scaled = image
            .crop_imm(cx, cy, cw, ch)
            .resize_exact(dw, dh, FilterType::CatmullRom)
            .to_rgba8();

        let radius = (corner_radius * self.scale).max(0.0);
        let (pw, ph) = self.pixels.dimensions();

        for py in 0..dh {
            let ty = dy + py as i64;
            if ty < 0 || ty >= ph as i64 {
                continue;
            }
            for px in 0..dw {
                let tx = dx + px as i64;
                if tx < 0 || tx >= pw as i64 {
                    continue;
                }
                let coverage = rounded_coverage(
                    px as f32 + 0.5,
                    py as f32 + 0.5,
                    dw as f32,
                    dh as f32,
                    radius,
                );
                if coverage <= 0.0 {
                    continue;
                }
                let src = scaled.get_pixel(px, py);
                let alpha = (src[3] as f32 / 255.0) * coverage;
                if alpha <= 0.0 {
                    continue;
                }
                let dst = self.pixels.get_pixel_mut(tx as u32, ty as u32);
                for c in 0..3 {
                    dst[c] = (src[c] as f32 * alpha + dst[c] as f32 * (1.0 - alpha))
                        .round()
                        .clamp(0.0, 255.0) as u8;
                }
                dst[3] = ((alpha + (dst[3] as f32 / 255.0) * (1.0 - alpha)) * 255.0)
                    .round()
                    .clamp(0.0, 255.0) as u8;
            }
        }
    }

    /// Read one device pixel. Intended for tests and the host binary.
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        *self.pixels.get_pixel(x, y)
    }

    /// Encode the current pixels as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let (pw, ph) = self.pixels.dimensions();
        PngEncoder::new(&mut buffer)
            .write_image(self.pixels.as_raw(), pw, ph, ExtendedColorType::Rgba8)
            .context("Failed to encode surface as PNG")?;
        Ok(buffer)
    }

    /// Export the current pixels as a PNG file.
    pub fn export_png(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create export file: {:?}", path))?;
        let mut writer = BufWriter::new(file);
        let (pw, ph) = self.pixels.dimensions();
        PngEncoder::new(&mut writer)
            .write_image(self.pixels.as_raw(), pw, ph, ExtendedColorType::Rgba8)
            .with_context(|| format!("Failed to encode PNG: {:?}", path))?;
        debug!(?path, pw, ph, "Exported surface");
        Ok(())
    }

    /// Export under `dir` with a date-stamped name, e.g. `collage-2026-08-30.png`.
    /// Returns the written path.
    pub fn export_dated(&self, dir: &Path, prefix: &str) -> Result<PathBuf> {
        let date = jiff::Zoned::now().date();
        let path = dir.join(format!("{}-{}.png", prefix, date));
        self.export_png(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Color = Rgba([255, 255, 255, 255]);

    fn solid_image(w: u32, h: u32, color: [u8; 4]) -> DynamicImage {
        let mut img = RgbaImage::new(w, h);
        for px in img.pixels_mut() {
            *px = Rgba(color);
        }
        DynamicImage::ImageRgba8(img)
    }

    #[test]
    fn test_pixel_dims_follow_scale_factor() {
        let surface = Surface::with_scale(100.0, 50.0, 2.0);
        assert_eq!(surface.pixel_size(), (200, 100));
        assert_eq!(surface.logical_size(), (100.0, 50.0));
    }

    #[test]
    fn test_resize_reallocates_and_discards_contents() {
        let mut surface = Surface::with_scale(10.0, 10.0, 2.0);
        surface.fill(Rgba([9, 9, 9, 255]));
        surface.resize(20.0, 5.0);
        assert_eq!(surface.logical_size(), (20.0, 5.0));
        // Pixel dims keep following the scale factor.
        assert_eq!(surface.pixel_size(), (40, 10));
        // Old contents are gone; callers repaint after a resize.
        assert_eq!(surface.pixel(0, 0), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_fill_sets_every_pixel() {
        let mut surface = Surface::new(8.0, 8.0);
        surface.fill(Rgba([10, 20, 30, 255]));
        assert_eq!(surface.pixel(0, 0), Rgba([10, 20, 30, 255]));
        assert_eq!(surface.pixel(7, 7), Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_gradient_hits_first_and_last_stop_at_corners() {
        let stops = [
            Rgba([255, 230, 242, 255]),
            Rgba([255, 240, 245, 255]),
            Rgba([240, 248, 255, 255]),
        ];
        let mut surface = Surface::new(32.0, 32.0);
        surface.fill_gradient(stops);
        assert_eq!(surface.pixel(0, 0), stops[0]);
        assert_eq!(surface.pixel(31, 31), stops[2]);
    }

    #[test]
    fn test_cover_crop_wide_source() {
        // 200x100 into a square: crop 100px off the sides, centered.
        let (sx, sy, sw, sh) = cover_crop(200, 100, 50.0, 50.0);
        assert!((sx - 50.0).abs() < 0.01);
        assert_eq!(sy, 0.0);
        assert!((sw - 100.0).abs() < 0.01);
        assert!((sh - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_cover_crop_tall_source() {
        let (sx, sy, sw, sh) = cover_crop(100, 200, 50.0, 50.0);
        assert_eq!(sx, 0.0);
        assert!((sy - 50.0).abs() < 0.01);
        assert!((sw - 100.0).abs() < 0.01);
        assert!((sh - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_cover_crop_matching_aspect_keeps_full_source() {
        let (sx, sy, sw, sh) = cover_crop(120, 80, 60.0, 40.0);
        assert_eq!((sx, sy), (0.0, 0.0));
        assert!((sw - 120.0).abs() < 0.01);
        assert!((sh - 80.0).abs() < 0.01);
    }

    #[test]
    fn test_draw_cover_fills_cell() {
        let mut surface = Surface::new(40.0, 40.0);
        surface.fill(WHITE);
        let img = solid_image(100, 60, [200, 0, 0, 255]);
        surface.draw_cover(&img, Rect::new(10.0, 10.0, 20.0, 20.0), 0.0);
        assert_eq!(surface.pixel(20, 20), Rgba([200, 0, 0, 255]));
        // Outside the destination stays untouched.
        assert_eq!(surface.pixel(5, 5), WHITE);
    }

    #[test]
    fn test_draw_cover_rounded_corners_spare_background() {
        let mut surface = Surface::new(40.0, 40.0);
        surface.fill(WHITE);
        let img = solid_image(64, 64, [0, 0, 200, 255]);
        surface.draw_cover(&img, Rect::new(0.0, 0.0, 40.0, 40.0), 10.0);
        // Corner pixel lies well outside the rounded path.
        assert_eq!(surface.pixel(0, 0), WHITE);
        // Center is fully painted.
        assert_eq!(surface.pixel(20, 20), Rgba([0, 0, 200, 255]));
    }

    #[test]
    fn test_draw_cover_clips_offscreen_destination() {
        let mut surface = Surface::new(20.0, 20.0);
        surface.fill(WHITE);
        let img = solid_image(10, 10, [0, 128, 0, 255]);
        // Mostly off the left edge, as marquee segments routinely are.
        surface.draw_cover(&img, Rect::new(-15.0, 0.0, 20.0, 20.0), 0.0);
        assert_eq!(surface.pixel(2, 10), Rgba([0, 128, 0, 255]));
        assert_eq!(surface.pixel(10, 10), WHITE);
    }

    #[test]
    fn test_png_export_round_trips_dimensions() {
        let mut surface = Surface::with_scale(16.0, 9.0, 2.0);
        surface.fill(Rgba([1, 2, 3, 255]));
        let png = surface.to_png().unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.dimensions(), (32, 18));
    }

    #[test]
    fn test_export_dated_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut surface = Surface::new(4.0, 4.0);
        surface.fill(WHITE);
        let path = surface.export_dated(dir.path(), "collage").unwrap();
        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("collage-"));
        assert!(name.ends_with(".png"));
    }
}
