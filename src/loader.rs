//! Async decode queue for photo sources.
//!
//! - Small worker pool decoding images off the caller's thread
//! - Results polled back in any order; a pass "settles" once every slot has
//!   reported success or failure
//! - Pass generations: beginning a new pass supersedes older ones, and their
//!   late results are discarded on receipt (a decode in flight cannot be
//!   aborted, only ignored)
//! - LRU cache of decoded images keyed by source identity, so an unchanged
//!   photo is not re-decoded when the list changes around it

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use flume::{Receiver, RecvTimeoutError, Sender};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::models::PhotoSource;

/// Default number of worker threads.
const DEFAULT_WORKERS: usize = 2;

/// Maximum number of worker threads.
const MAX_WORKERS: usize = 4;

/// Maximum number of queued decode requests.
const MAX_QUEUE_SIZE: usize = 256;

/// Decoded images kept in the memory cache.
const CACHE_ENTRIES: usize = 128;

#[derive(Debug, Clone)]
struct DecodeRequest {
    source: PhotoSource,
    slot: usize,
    generation: u64,
    key: u64,
}

#[derive(Debug, Clone)]
struct DecodeOutcome {
    slot: usize,
    generation: u64,
    image: Option<Arc<DynamicImage>>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
enum SlotState {
    Pending,
    Done(Option<Arc<DynamicImage>>),
}

/// One render pass over a source list.
///
/// Holds per-slot decode state. Layout must not start until [`is_settled`]
/// returns true; failed slots are simply absent from [`images`].
///
/// [`is_settled`]: RenderPass::is_settled
/// [`images`]: RenderPass::images
pub struct RenderPass {
    generation: u64,
    slots: Vec<SlotState>,
    settled: usize,
}

impl RenderPass {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether every slot has reported a result.
    pub fn is_settled(&self) -> bool {
        self.settled == self.slots.len()
    }

    /// Successfully decoded images in submission order, failures dropped.
    pub fn images(&self) -> Vec<Arc<DynamicImage>> {
        self.slots
            .iter()
            .filter_map(|slot| match slot {
                SlotState::Done(Some(image)) => Some(Arc::clone(image)),
                _ => None,
            })
            .collect()
    }

    /// Slots whose decode failed, in submission order.
    pub fn failed_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| matches!(slot, SlotState::Done(None)).then_some(i))
            .collect()
    }

    fn apply(&mut self, outcome: DecodeOutcome) {
        if outcome.generation != self.generation {
            trace!(
                stale = outcome.generation,
                current = self.generation,
                "Discarding result from superseded pass"
            );
            return;
        }
        let Some(slot) = self.slots.get_mut(outcome.slot) else {
            return;
        };
        if matches!(slot, SlotState::Pending) {
            if let Some(error) = &outcome.error {
                warn!(slot = outcome.slot, %error, "Photo decode failed");
            }
            *slot = SlotState::Done(outcome.image);
            self.settled += 1;
        }
    }
}

/// Worker-pool decoder for photo sources.
pub struct DecodeQueue {
    request_tx: Sender<DecodeRequest>,
    result_rx: Receiver<DecodeOutcome>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    cache: Arc<Mutex<LruCache<u64, Arc<DynamicImage>>>>,
}

impl DecodeQueue {
    /// Create a queue with the default worker count.
    pub fn new() -> Self {
        Self::with_workers(DEFAULT_WORKERS)
    }

    /// Create a queue with an explicit worker count (clamped to 1..=4).
    pub fn with_workers(workers: usize) -> Self {
        let num_workers = workers.clamp(1, MAX_WORKERS);

        let (request_tx, request_rx) = flume::bounded(MAX_QUEUE_SIZE);
        let (result_tx, result_rx) = flume::unbounded();

        let shutdown = Arc::new(AtomicBool::new(false));
        let generation = Arc::new(AtomicU64::new(0));
        let cache = Arc::new(Mutex::new(LruCache::new(
            NonZeroUsize::new(CACHE_ENTRIES).unwrap(),
        )));

        let mut worker_handles = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let rx = request_rx.clone();
            let tx = result_tx.clone();
            let shutdown = Arc::clone(&shutdown);
            let generation = Arc::clone(&generation);
            let cache = Arc::clone(&cache);

            let handle = thread::Builder::new()
                .name(format!("decode-worker-{}", worker_id))
                .spawn(move || worker_loop(worker_id, rx, tx, shutdown, generation, cache))
                .expect("Failed to spawn decode worker");
            worker_handles.push(handle);
        }

        debug!(num_workers, "Started decode queue");

        Self {
            request_tx,
            result_rx,
            workers: worker_handles,
            shutdown,
            generation,
            cache,
        }
    }

    /// Submit a new render pass, superseding any pass still in flight.
    ///
    /// Cached sources settle immediately; the rest are queued to the workers.
    /// A request that cannot be queued settles its slot as failed rather than
    /// leaving the pass hanging.
    pub fn begin_pass(&self, sources: &[PhotoSource]) -> RenderPass {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let mut pass = RenderPass {
            generation,
            slots: vec![SlotState::Pending; sources.len()],
            settled: 0,
        };

        for (slot, source) in sources.iter().enumerate() {
            let key = source.cache_key();
            if let Some(image) = self.cache.lock().get(&key).map(Arc::clone) {
                trace!(slot, "Decode served from cache");
                pass.slots[slot] = SlotState::Done(Some(image));
                pass.settled += 1;
                continue;
            }
            let request = DecodeRequest {
                source: source.clone(),
                slot,
                generation,
                key,
            };
            if let Err(err) = self.request_tx.try_send(request) {
                warn!(slot, %err, "Decode queue full, dropping source");
                pass.slots[slot] = SlotState::Done(None);
                pass.settled += 1;
            }
        }

        debug!(generation, sources = sources.len(), settled = pass.settled, "Began render pass");
        pass
    }

    /// Drain completed results into `pass` without blocking.
    pub fn poll(&self, pass: &mut RenderPass) {
        while let Ok(outcome) = self.result_rx.try_recv() {
            pass.apply(outcome);
        }
    }

    /// Block until `pass` settles or `timeout` elapses. Returns whether the
    /// pass settled.
    pub fn wait_settled(&self, pass: &mut RenderPass, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !pass.is_settled() {
            match self.result_rx.recv_deadline(deadline) {
                Ok(outcome) => pass.apply(outcome),
                Err(_) => break,
            }
        }
        pass.is_settled()
    }
}

impl Default for DecodeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DecodeQueue {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("Decode queue shut down");
    }
}

fn worker_loop(
    worker_id: usize,
    rx: Receiver<DecodeRequest>,
    tx: Sender<DecodeOutcome>,
    shutdown: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    cache: Arc<Mutex<LruCache<u64, Arc<DynamicImage>>>>,
) {
    trace!(worker_id, "Decode worker started");
    while !shutdown.load(Ordering::Acquire) {
        let request = match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(request) => request,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        // A superseded request is not worth decoding; its result would be
        // discarded on receipt anyway.
        if request.generation < generation.load(Ordering::Acquire) {
            let _ = tx.send(DecodeOutcome {
                slot: request.slot,
                generation: request.generation,
                image: None,
                error: Some("superseded".into()),
            });
            continue;
        }

        let outcome = match decode_source(&request.source) {
            Ok(image) => {
                let image = Arc::new(image);
                cache.lock().put(request.key, Arc::clone(&image));
                DecodeOutcome {
                    slot: request.slot,
                    generation: request.generation,
                    image: Some(image),
                    error: None,
                }
            }
            Err(err) => DecodeOutcome {
                slot: request.slot,
                generation: request.generation,
                image: None,
                error: Some(err.to_string()),
            },
        };
        if tx.send(outcome).is_err() {
            break;
        }
    }
    trace!(worker_id, "Decode worker stopped");
}

/// Decode a photo source into pixels.
pub fn decode_source(source: &PhotoSource) -> Result<DynamicImage> {
    match source {
        PhotoSource::Path(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read image: {:?}", path))?;
            decode_bytes(&bytes)
        }
        PhotoSource::Bytes { data, .. } => decode_bytes(data),
    }
}

/// Decode encoded image bytes; animated GIFs decode to their first frame.
pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    let format = image::guess_format(bytes).ok();

    if format == Some(ImageFormat::Gif) {
        let decoder = GifDecoder::new(std::io::Cursor::new(bytes))
            .context("Failed to decode GIF")?;
        let mut frames = decoder.into_frames();
        if let Some(frame) = frames.next() {
            let frame = frame.context("Failed to decode GIF frame")?;
            return Ok(DynamicImage::ImageRgba8(frame.into_buffer()));
        }
        return Err(anyhow!("GIF has no frames"));
    }

    match format {
        Some(fmt) => image::load_from_memory_with_format(bytes, fmt)
            .context("Failed to decode image"),
        None => image::load_from_memory(bytes).context("Failed to decode image"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, GenericImageView, ImageEncoder, Rgba, RgbaImage};
    use std::path::Path;

    const SETTLE: Duration = Duration::from_secs(10);

    fn write_png(path: &Path, w: u32, h: u32, color: [u8; 4]) {
        let mut img = RgbaImage::new(w, h);
        for px in img.pixels_mut() {
            *px = Rgba(color);
        }
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(img.as_raw(), w, h, ExtendedColorType::Rgba8)
            .unwrap();
        std::fs::write(path, buf).unwrap();
    }

    #[test]
    fn test_pass_settles_with_images_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut sources = Vec::new();
        for (i, w) in [10u32, 20, 30].iter().enumerate() {
            let path = dir.path().join(format!("{}.png", i));
            write_png(&path, *w, 10, [i as u8, 0, 0, 255]);
            sources.push(PhotoSource::Path(path));
        }

        let queue = DecodeQueue::with_workers(2);
        let mut pass = queue.begin_pass(&sources);
        assert!(queue.wait_settled(&mut pass, SETTLE));

        let images = pass.images();
        assert_eq!(images.len(), 3);
        assert_eq!(images[0].width(), 10);
        assert_eq!(images[1].width(), 20);
        assert_eq!(images[2].width(), 30);
        assert!(pass.failed_slots().is_empty());
    }

    #[test]
    fn test_failed_decode_is_dropped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        write_png(&good, 8, 8, [1, 2, 3, 255]);
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"not an image at all").unwrap();

        let queue = DecodeQueue::new();
        let mut pass = queue.begin_pass(&[
            PhotoSource::Path(good),
            PhotoSource::Path(bad),
        ]);
        assert!(queue.wait_settled(&mut pass, SETTLE));
        assert_eq!(pass.images().len(), 1);
        assert_eq!(pass.failed_slots(), vec![1]);
    }

    #[test]
    fn test_missing_file_settles_as_failure() {
        let queue = DecodeQueue::new();
        let mut pass =
            queue.begin_pass(&[PhotoSource::Path("/nonexistent/photo.jpg".into())]);
        assert!(queue.wait_settled(&mut pass, SETTLE));
        assert!(pass.images().is_empty());
        assert_eq!(pass.failed_slots(), vec![0]);
    }

    #[test]
    fn test_bytes_source_decodes() {
        let mut buf = Vec::new();
        let img = RgbaImage::new(5, 7);
        PngEncoder::new(&mut buf)
            .write_image(img.as_raw(), 5, 7, ExtendedColorType::Rgba8)
            .unwrap();
        let queue = DecodeQueue::new();
        let mut pass = queue.begin_pass(&[PhotoSource::Bytes {
            data: Arc::new(buf),
            mime_type: "image/png".into(),
        }]);
        assert!(queue.wait_settled(&mut pass, SETTLE));
        assert_eq!(pass.images()[0].height(), 7);
    }

    #[test]
    fn test_second_pass_hits_cache_and_settles_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_png(&path, 12, 12, [9, 9, 9, 255]);
        let sources = vec![PhotoSource::Path(path)];

        let queue = DecodeQueue::new();
        let mut first = queue.begin_pass(&sources);
        assert!(queue.wait_settled(&mut first, SETTLE));

        let second = queue.begin_pass(&sources);
        assert!(second.is_settled(), "cached source should settle at submit");
        assert_eq!(second.images().len(), 1);
    }

    #[test]
    fn test_superseded_results_do_not_leak_into_new_pass() {
        let dir = tempfile::tempdir().unwrap();
        let mut old_sources = Vec::new();
        for i in 0..4 {
            let path = dir.path().join(format!("old-{}.png", i));
            write_png(&path, 16, 16, [i as u8, 0, 0, 255]);
            old_sources.push(PhotoSource::Path(path));
        }
        let new_path = dir.path().join("new.png");
        write_png(&new_path, 24, 24, [0, 200, 0, 255]);

        let queue = DecodeQueue::new();
        let _old = queue.begin_pass(&old_sources);
        let mut new = queue.begin_pass(&[PhotoSource::Path(new_path)]);
        assert!(queue.wait_settled(&mut new, SETTLE));

        // Old-generation results drained while waiting must not corrupt the
        // new pass: exactly one image, the right one.
        let images = new.images();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].width(), 24);
        assert_eq!(new.generation(), 2);
    }
}
