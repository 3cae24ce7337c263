//! Live guest collage compositor.
//!
//! Lays successfully decoded photos into a centered square-tile grid over a
//! decorative gradient background, with rounded cell corners. Empty and
//! loading states paint the background only and report a status message for
//! the host UI to overlay.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use image::{DynamicImage, Rgba};
use tracing::debug;

use crate::layout::GridSpec;
use crate::surface::{Color, Surface};

/// Default square size in logical pixels when the container doesn't dictate one.
pub const DEFAULT_SIZE: f32 = 640.0;

/// Corner radius as a fraction of the tile side.
pub const DEFAULT_CORNER_RATIO: f32 = 0.06;

/// The soft pink-to-blue diagonal used behind the grid.
pub const DEFAULT_GRADIENT: [Color; 3] = [
    Rgba([255, 230, 242, 255]),
    Rgba([255, 240, 245, 255]),
    Rgba([240, 248, 255, 255]),
];

/// Background painted before the grid.
#[derive(Debug, Clone, Copy)]
pub enum Background {
    Solid(Color),
    Gradient([Color; 3]),
}

/// What a compose pass produced, and the status message (if any) the host
/// should overlay on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollageStatus {
    /// Photo list still loading; layout skipped.
    Loading,
    /// No renderable photos; layout skipped.
    Empty,
    /// Grid rendered over `count` photos.
    Rendered { count: usize, cols: u32, rows: u32 },
}

impl CollageStatus {
    /// Overlay text for the non-rendered states.
    pub fn message(&self) -> Option<&'static str> {
        match self {
            CollageStatus::Loading => Some("Loading photos…"),
            CollageStatus::Empty => Some("Your photos will appear here"),
            CollageStatus::Rendered { .. } => None,
        }
    }
}

/// A composed collage: the painted surface plus its status.
pub struct Collage {
    pub surface: Surface,
    pub status: CollageStatus,
}

impl Collage {
    /// Export as PNG to an explicit path.
    pub fn export_png(&self, path: &Path) -> Result<()> {
        self.surface.export_png(path)
    }

    /// Export under `dir` as `collage-YYYY-MM-DD.png`; returns the path.
    pub fn export_dated(&self, dir: &Path) -> Result<PathBuf> {
        self.surface.export_dated(dir, "collage")
    }
}

/// Configuration for the collage compositor.
#[derive(Debug, Clone)]
pub struct CollageConfig {
    /// Requested square size in logical pixels.
    pub size: f32,
    /// Device scale factor for the surface.
    pub scale: f32,
    /// Corner radius as a fraction of the tile side (0 disables rounding).
    pub corner_ratio: f32,
    /// Gap between tiles in logical pixels.
    pub gap: f32,
    pub background: Background,
}

impl Default for CollageConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            scale: 1.0,
            corner_ratio: DEFAULT_CORNER_RATIO,
            gap: 0.0,
            background: Background::Gradient(DEFAULT_GRADIENT),
        }
    }
}

/// Grid compositor over decoded images.
pub struct CollageCompositor {
    config: CollageConfig,
}

impl CollageCompositor {
    pub fn new(config: CollageConfig) -> Self {
        Self { config }
    }

    /// The square side actually used: the configured size, shrunk to the
    /// container width when one is given.
    fn resolve_size(&self, container_width: Option<f32>) -> f32 {
        let size = match container_width {
            Some(w) if w > 0.0 => self.config.size.min(w),
            _ => self.config.size,
        };
        size.max(1.0)
    }

    /// Compose a collage over already-decoded images.
    ///
    /// `loading` short-circuits to a background-only surface with a loading
    /// status; an empty image list likewise reports the empty state. Decode
    /// failures never reach this point: the caller passes the surviving
    /// images and the grid is computed over exactly those.
    pub fn compose(
        &self,
        images: &[Arc<DynamicImage>],
        loading: bool,
        container_width: Option<f32>,
    ) -> Collage {
        let size = self.resolve_size(container_width);
        let mut surface = Surface::with_scale(size, size, self.config.scale);
        self.paint_background(&mut surface);

        if loading {
            return Collage { surface, status: CollageStatus::Loading };
        }
        if images.is_empty() {
            return Collage { surface, status: CollageStatus::Empty };
        }

        let spec = GridSpec { gap: self.config.gap };
        let Some(layout) = spec.compute(images.len(), size, size) else {
            return Collage { surface, status: CollageStatus::Empty };
        };
        let radius = layout.tile * self.config.corner_ratio.max(0.0);

        for cell in layout.cells() {
            let image = &images[cell.index];
            surface.draw_cover(image, layout.cell_rect(cell), radius);
        }

        debug!(
            count = images.len(),
            cols = layout.cols,
            rows = layout.rows,
            tile = layout.tile,
            "Composed collage"
        );
        Collage {
            surface,
            status: CollageStatus::Rendered {
                count: images.len(),
                cols: layout.cols,
                rows: layout.rows,
            },
        }
    }

    fn paint_background(&self, surface: &mut Surface) {
        match self.config.background {
            Background::Solid(color) => surface.fill(color),
            Background::Gradient(stops) => surface.fill_gradient(stops),
        }
    }
}
