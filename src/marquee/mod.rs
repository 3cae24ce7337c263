//! Auto-scrolling marquee strip.
//!
//! - `Track` - pure scrolling state: segments, recycling, coverage invariant
//! - `MarqueeRenderer` - owns the decoded images and paints visible segments
//!
//! The renderer has no frame scheduler of its own; the host calls
//! `advance`/`tick` from whatever loop it runs and `render` per frame.

pub mod track;

use std::sync::Arc;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, trace};

use crate::surface::{Rect, Surface};
pub use track::{Segment, Track};

/// Default strip height in logical pixels.
pub const DEFAULT_HEIGHT: f32 = 280.0;

/// Default scroll speed in logical pixels per frame.
pub const DEFAULT_SPEED: f32 = 0.8;

/// Continuously scrolling, looping strip of images at a fixed height.
///
/// Display widths are derived once from each image's aspect ratio scaled to
/// the strip height. Images that failed to decode never enter the rotation;
/// with zero images the renderer clears the surface and draws nothing.
pub struct MarqueeRenderer {
    images: Vec<Arc<DynamicImage>>,
    height: f32,
    speed: f32,
    track: Option<Track>,
}

impl MarqueeRenderer {
    /// Create a renderer over successfully decoded images.
    ///
    /// `height` is the fixed strip height; `speed` is logical pixels per
    /// frame and must be non-negative (clamped at zero).
    pub fn new(images: Vec<Arc<DynamicImage>>, height: f32, speed: f32) -> Self {
        let height = if height > 0.0 { height } else { DEFAULT_HEIGHT };
        debug!(count = images.len(), height, speed, "Created marquee renderer");
        Self {
            images,
            height,
            speed: speed.max(0.0),
            track: None,
        }
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// Display width of one image scaled to the strip height, floored at one
    /// pixel so extreme portrait ratios cannot round to nothing.
    fn display_width(&self, image: &DynamicImage) -> f32 {
        let (w, h) = image.dimensions();
        if h == 0 {
            return 0.0;
        }
        ((w as f32 / h as f32) * self.height).round().max(1.0)
    }

    /// Resize to a new viewport width, building the track on first use and
    /// preserving scroll positions afterwards.
    pub fn resize(&mut self, viewport: f32) {
        match &mut self.track {
            Some(track) => track.set_viewport(viewport),
            None => {
                let widths: Vec<f32> = self
                    .images
                    .iter()
                    .map(|img| self.display_width(img))
                    .collect();
                self.track = Track::new(widths, viewport);
                trace!(viewport, built = self.track.is_some(), "Built marquee track");
            }
        }
    }

    /// Advance the strip by one frame at the configured speed.
    pub fn advance(&mut self) {
        self.tick(self.speed);
    }

    /// Advance the strip by an explicit distance. Exposed separately so the
    /// animation can be driven without a real frame loop.
    pub fn tick(&mut self, delta: f32) {
        if let Some(track) = &mut self.track {
            track.tick(delta);
        }
    }

    /// Paint the currently visible window onto `surface`.
    ///
    /// The surface is cleared each frame; only segments intersecting the
    /// viewport are drawn. Builds or resizes the track to the surface's
    /// logical width first, so callers only need `resize` for explicit
    /// viewport changes between frames.
    pub fn render(&mut self, surface: &mut Surface, background: crate::surface::Color) {
        let (viewport, _) = surface.logical_size();
        if self.track.is_none() {
            self.resize(viewport);
        } else if let Some(track) = &mut self.track {
            if (track.viewport() - viewport).abs() > 0.5 {
                track.set_viewport(viewport);
            }
        }

        surface.fill(background);
        let Some(track) = &self.track else {
            return;
        };
        for segment in track.visible() {
            let Some(image) = self.images.get(segment.image) else {
                continue;
            };
            surface.draw_cover(
                image,
                Rect::new(segment.pos.round(), 0.0, segment.width, self.height),
                0.0,
            );
        }
    }
}
