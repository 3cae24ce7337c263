//! Host stand-in for the photo wall page: scans a directory of images,
//! decodes them, and exports a collage plus a few marquee frames as PNGs.
//!
//! Usage: `photowall <photo-dir> [out-dir]`

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use image::Rgba;
use tracing::{info, warn};
use walkdir::WalkDir;

use photowall::models::PhotoSource;
use photowall::{CollageCompositor, CollageConfig, DecodeQueue, MarqueeRenderer, Surface};

/// Marquee strip dimensions for the exported frames.
const MARQUEE_WIDTH: f32 = 800.0;
const MARQUEE_HEIGHT: f32 = 280.0;

/// Ticks between exported marquee frames, at the configured speed.
const TICKS_PER_FRAME: u32 = 30;
const MARQUEE_FRAMES: u32 = 4;
const MARQUEE_SPEED: f32 = 4.0;

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            matches!(
                ext.to_lowercase().as_str(),
                "jpg" | "jpeg" | "png" | "webp" | "gif" | "bmp" | "tiff" | "tif"
            )
        })
        .unwrap_or(false)
}

fn scan_photos(dir: &Path) -> Vec<PhotoSource> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_image(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();
    paths.into_iter().map(PhotoSource::Path).collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("photowall=info".parse().unwrap()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let photo_dir = PathBuf::from(args.next().unwrap_or_else(|| ".".into()));
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "wall-out".into()));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", out_dir))?;

    let sources = scan_photos(&photo_dir);
    info!(count = sources.len(), dir = ?photo_dir, "Scanned photo directory");

    let queue = DecodeQueue::new();
    let mut pass = queue.begin_pass(&sources);
    if !queue.wait_settled(&mut pass, Duration::from_secs(60)) {
        warn!("Decode pass did not settle in time; rendering what arrived");
    }
    let images = pass.images();
    let failed = pass.failed_slots().len();
    if failed > 0 {
        warn!(failed, "Some photos failed to decode and were dropped");
    }

    let compositor = CollageCompositor::new(CollageConfig::default());
    let collage = compositor.compose(&images, false, None);
    if let Some(message) = collage.status.message() {
        info!(message, "Collage has no grid to show");
    }
    let collage_path = collage.export_dated(&out_dir)?;
    info!(path = ?collage_path, status = ?collage.status, "Exported collage");

    let mut marquee = MarqueeRenderer::new(images, MARQUEE_HEIGHT, MARQUEE_SPEED);
    let mut strip = Surface::new(MARQUEE_WIDTH, MARQUEE_HEIGHT);
    let background = Rgba([255, 255, 255, 255]);
    for frame in 0..MARQUEE_FRAMES {
        marquee.render(&mut strip, background);
        let path = out_dir.join(format!("marquee-{:02}.png", frame));
        strip.export_png(&path)?;
        for _ in 0..TICKS_PER_FRAME {
            marquee.advance();
        }
    }
    info!(frames = MARQUEE_FRAMES, "Exported marquee frames");

    Ok(())
}
